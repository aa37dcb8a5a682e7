//! Schema reference resolution
//!
//! Turns a [`Subject`] and its remote/local references into a single
//! [`CanonicalSchema`] the registry client can submit. Remote references are
//! pinned to concrete versions first (dialect-agnostic), then the dialect's
//! local resolver runs:
//!
//! - AVRO: first-use definition embedding with a shared-context parse gate
//!   ([`avro`])
//! - JSON Schema: definitions-container embedding ([`json`])
//! - Protobuf: import inlining with reference rewriting ([`proto`])
//!
//! Callers never branch on dialect; the match here is exhaustive, so a new
//! dialect is a compile-time-visible change.

pub mod avro;
pub mod json;
pub mod proto;
pub mod remote;

use std::path::Path;

use crate::client::SchemaRegistryClient;
use crate::error::Result;
use crate::subject::{CanonicalSchema, SchemaDialect, Subject};

/// Resolve a subject into a registry-submittable canonical schema.
///
/// Resolution is read-only over the subject and side-effect-free: resolving
/// twice against unchanged files and registry state yields byte-identical
/// output.
pub fn resolve(
    subject: &Subject,
    base_dir: &Path,
    client: &dyn SchemaRegistryClient,
) -> Result<CanonicalSchema> {
    subject.validate()?;

    let mut pinned = subject.clone();
    remote::pin_remote_versions(&mut pinned.remote_references, client)?;

    match pinned.dialect {
        SchemaDialect::Avro => avro::resolve(&pinned, base_dir, client),
        SchemaDialect::Protobuf => proto::resolve(&pinned, base_dir),
        SchemaDialect::Json => json::resolve(&pinned, base_dir),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use crate::client::{MemoryRegistryClient, SchemaRegistryClient};
    use crate::error::SyncError;
    use crate::subject::{LocalReference, RemoteReference};
    use tempfile::tempdir;

    const USER: &str = r#"{
        "type": "record",
        "name": "User",
        "fields": [{"name": "name", "type": "string"}]
    }"#;

    #[test]
    fn test_remote_references_are_pinned_before_dialect_work() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("player.avsc"),
            r#"{"type": "record", "name": "Player", "fields": [{"name": "id", "type": "int"}]}"#,
        )
        .unwrap();

        let client = MemoryRegistryClient::new();
        client
            .register(
                "user-value",
                &CanonicalSchema::new(SchemaDialect::Avro, USER, Vec::new()),
            )
            .unwrap();

        let subject = Subject::new("player-value", "player.avsc", SchemaDialect::Avro)
            .with_remote_reference(RemoteReference::new("User", "user-value", -1));

        let canonical = resolve(&subject, dir.path(), &client).unwrap();
        assert_eq!(canonical.references.len(), 1);
        assert_eq!(canonical.references[0].version, 1);
    }

    #[test]
    fn test_original_subject_is_not_mutated() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("player.avsc"),
            r#"{"type": "record", "name": "Player", "fields": [{"name": "id", "type": "int"}]}"#,
        )
        .unwrap();

        let client = MemoryRegistryClient::new();
        client
            .register(
                "user-value",
                &CanonicalSchema::new(SchemaDialect::Avro, USER, Vec::new()),
            )
            .unwrap();

        let subject = Subject::new("player-value", "player.avsc", SchemaDialect::Avro)
            .with_remote_reference(RemoteReference::new("User", "user-value", 0));

        resolve(&subject, dir.path(), &client).unwrap();
        assert_eq!(subject.remote_references[0].version, 0);
    }

    #[test]
    fn test_mixed_references_rejected_before_any_io() {
        let client = MemoryRegistryClient::new();
        let subject = Subject::new("player-value", "does-not-exist.avsc", SchemaDialect::Avro)
            .with_remote_reference(RemoteReference::new("User", "user-value", -1))
            .with_local_reference(LocalReference::new("Team", "team.avsc"));

        // fails with the reference-mix error, not a missing-file error
        assert!(matches!(
            resolve(&subject, Path::new("/nonexistent"), &client),
            Err(SyncError::MixedReference { .. })
        ));
    }
}
