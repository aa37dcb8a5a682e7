//! AVRO (record-schema) local resolution
//!
//! Local references are embedded: the subject's schema JSON is walked and
//! the first use of each locally referenced named type is replaced with the
//! referenced file's full definition, so the output parses on its own.
//! Later uses stay as plain names, which AVRO permits once a type is
//! defined. Field defaults, docs and aliases survive untouched.
//!
//! Remote references work the other way round: the referenced schemas are
//! fetched by pinned version into the parse context so the subject text may
//! use their types, but they are never embedded in the output. The registry
//! resolves them through the reference metadata.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use apache_avro::Schema;
use serde_json::Value;

use crate::client::SchemaRegistryClient;
use crate::error::{Result, SyncError};
use crate::subject::{CanonicalSchema, Subject};

/// Resolve an AVRO subject against its local and remote references.
pub fn resolve(
    subject: &Subject,
    base_dir: &Path,
    client: &dyn SchemaRegistryClient,
) -> Result<CanonicalSchema> {
    let parse_error = |message: String| SyncError::SchemaParsing {
        subject: subject.name.clone(),
        dialect: subject.dialect,
        message,
    };

    let mut definitions: HashMap<String, Value> = HashMap::new();
    for reference in &subject.local_references {
        let definition: Value = serde_json::from_str(&reference.read(base_dir)?)
            .map_err(|e| parse_error(e.to_string()))?;
        for name in declared_names(&definition) {
            definitions.insert(name, definition.clone());
        }
    }

    let mut root: Value =
        serde_json::from_str(&subject.read(base_dir)?).map_err(|e| parse_error(e.to_string()))?;
    let mut embedded = HashSet::new();
    embed(&mut root, &definitions, &mut embedded);
    let content = serde_json::to_string_pretty(&root)?;

    // Remote-referenced schemas join the parse context in the same reverse
    // declaration order as local files, so later-declared dependencies are
    // known before their dependents.
    let mut context = Vec::with_capacity(subject.remote_references.len());
    for reference in subject.remote_references.iter().rev() {
        let metadata = client
            .schema_metadata(&reference.subject, reference.version as u32)
            .map_err(|e| {
                SyncError::ReferenceResolution(format!(
                    "could not fetch subject '{}' version {} for reference '{}': {}",
                    reference.subject, reference.version, reference.name, e
                ))
            })?;
        context.push(metadata.schema);
    }

    // Acceptance gate: the embedded document must parse, with the remote
    // schemas available, before anything is submitted
    let mut inputs: Vec<&str> = context.iter().map(String::as_str).collect();
    inputs.push(&content);
    Schema::parse_list(&inputs).map_err(|e| parse_error(e.to_string()))?;

    Ok(CanonicalSchema::new(
        subject.dialect,
        content,
        subject.remote_references.clone(),
    ))
}

/// Names a definition is addressable under: the declared name plus its
/// namespace-qualified form
fn declared_names(definition: &Value) -> Vec<String> {
    let Some(name) = definition.get("name").and_then(Value::as_str) else {
        return Vec::new();
    };
    let mut names = vec![name.to_string()];
    if !name.contains('.') {
        if let Some(namespace) = definition.get("namespace").and_then(Value::as_str) {
            names.push(format!("{}.{}", namespace, name));
        }
    }
    names
}

/// Replace the first use of each known named type with its full definition.
///
/// Walks the positions a schema may occupy: `type` values, `items`/`values`
/// of arrays and maps, union members, and record field lists. Data
/// positions (`name`, `default`, `symbols`) are never touched.
fn embed(node: &mut Value, definitions: &HashMap<String, Value>, embedded: &mut HashSet<String>) {
    match node {
        Value::String(name) => {
            let Some(definition) = definitions.get(name.as_str()) else {
                return;
            };
            let names = declared_names(definition);
            if names.iter().any(|n| embedded.contains(n)) {
                // already defined earlier in the document; keep the name
                return;
            }
            embedded.extend(names);
            let mut expanded = definition.clone();
            embed(&mut expanded, definitions, embedded);
            *node = expanded;
        }
        Value::Array(members) => {
            for member in members {
                embed(member, definitions, embedded);
            }
        }
        Value::Object(map) => {
            for key in ["type", "items", "values", "fields"] {
                if let Some(child) = map.get_mut(key) {
                    embed(child, definitions, embedded);
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use crate::client::{MemoryRegistryClient, SchemaRegistryClient};
    use crate::subject::{LocalReference, RemoteReference, SchemaDialect};
    use tempfile::tempdir;

    const USER: &str = r#"{
        "type": "record",
        "name": "User",
        "fields": [
            {"name": "name", "type": "string"},
            {"name": "email", "type": ["null", "string"], "default": null}
        ]
    }"#;

    const PLAYER: &str = r#"{
        "type": "record",
        "name": "Player",
        "fields": [
            {"name": "identifier", "type": "int"},
            {"name": "user", "type": "User"}
        ]
    }"#;

    fn client() -> MemoryRegistryClient {
        MemoryRegistryClient::new()
    }

    #[test]
    fn test_local_reference_is_embedded_self_contained() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("user.avsc"), USER).unwrap();
        fs::write(dir.path().join("player.avsc"), PLAYER).unwrap();

        let subject = Subject::new("player-value", "player.avsc", SchemaDialect::Avro)
            .with_local_reference(LocalReference::new("User", "user.avsc"));

        let canonical = resolve(&subject, dir.path(), &client()).unwrap();
        // the output must parse without any external context
        Schema::parse_str(&canonical.content).unwrap();
        assert!(canonical.content.contains("\"name\": \"User\""));
        assert!(canonical.references.is_empty());
    }

    #[test]
    fn test_second_use_stays_by_name() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("user.avsc"), USER).unwrap();
        fs::write(
            dir.path().join("pair.avsc"),
            r#"{
                "type": "record",
                "name": "Pair",
                "fields": [
                    {"name": "first", "type": "User"},
                    {"name": "second", "type": "User"}
                ]
            }"#,
        )
        .unwrap();

        let subject = Subject::new("pair-value", "pair.avsc", SchemaDialect::Avro)
            .with_local_reference(LocalReference::new("User", "user.avsc"));

        let canonical = resolve(&subject, dir.path(), &client()).unwrap();
        Schema::parse_str(&canonical.content).unwrap();
        // the definition is embedded exactly once; the second use is a name
        assert_eq!(canonical.content.matches("\"name\": \"User\"").count(), 1);
        assert_eq!(canonical.content.matches("\"User\"").count(), 2);
    }

    #[test]
    fn test_field_defaults_survive_resolution() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("user.avsc"), USER).unwrap();

        let subject = Subject::new("user-value", "user.avsc", SchemaDialect::Avro);
        let canonical = resolve(&subject, dir.path(), &client()).unwrap();
        assert!(canonical.content.contains("\"default\""));
        assert!(canonical.content.contains("\"email\""));
    }

    #[test]
    fn test_referenced_files_may_depend_on_each_other() {
        let dir = tempdir().unwrap();
        // "wrapper" (declared first) depends on "user" (declared second)
        fs::write(
            dir.path().join("wrapper.avsc"),
            r#"{
                "type": "record",
                "name": "Wrapper",
                "fields": [{"name": "user", "type": "User"}]
            }"#,
        )
        .unwrap();
        fs::write(dir.path().join("user.avsc"), USER).unwrap();
        fs::write(
            dir.path().join("game.avsc"),
            r#"{
                "type": "record",
                "name": "Game",
                "fields": [{"name": "wrapped", "type": "Wrapper"}]
            }"#,
        )
        .unwrap();

        let subject = Subject::new("game-value", "game.avsc", SchemaDialect::Avro)
            .with_local_reference(LocalReference::new("Wrapper", "wrapper.avsc"))
            .with_local_reference(LocalReference::new("User", "user.avsc"));

        let canonical = resolve(&subject, dir.path(), &client()).unwrap();
        Schema::parse_str(&canonical.content).unwrap();
        assert!(canonical.content.contains("\"name\": \"Game\""));
    }

    #[test]
    fn test_remote_referenced_type_joins_parse_context_only() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("player.avsc"), PLAYER).unwrap();

        let registry = client();
        registry
            .register(
                "user-value",
                &CanonicalSchema::new(SchemaDialect::Avro, USER, Vec::new()),
            )
            .unwrap();

        let subject = Subject::new("player-value", "player.avsc", SchemaDialect::Avro)
            .with_remote_reference(RemoteReference::new("User", "user-value", 1));

        let canonical = resolve(&subject, dir.path(), &registry).unwrap();
        // the type stays a bare name for the registry to resolve
        assert!(canonical.content.contains("\"type\": \"User\""));
        assert!(!canonical.content.contains("\"name\": \"User\""));
        assert_eq!(canonical.references.len(), 1);
    }

    #[test]
    fn test_idempotent_output() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("user.avsc"), USER).unwrap();
        fs::write(dir.path().join("player.avsc"), PLAYER).unwrap();

        let subject = Subject::new("player-value", "player.avsc", SchemaDialect::Avro)
            .with_local_reference(LocalReference::new("User", "user.avsc"));

        let first = resolve(&subject, dir.path(), &client()).unwrap();
        let second = resolve(&subject, dir.path(), &client()).unwrap();
        assert_eq!(first.content, second.content);
    }

    #[test]
    fn test_missing_local_file_is_io_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("player.avsc"), PLAYER).unwrap();

        let subject = Subject::new("player-value", "player.avsc", SchemaDialect::Avro)
            .with_local_reference(LocalReference::new("User", "missing.avsc"));

        assert!(matches!(
            resolve(&subject, dir.path(), &client()),
            Err(SyncError::Io(_))
        ));
    }

    #[test]
    fn test_invalid_schema_is_parse_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("bad.avsc"), "{\"type\": \"nonsense\"}").unwrap();

        let subject = Subject::new("bad-value", "bad.avsc", SchemaDialect::Avro);
        assert!(matches!(
            resolve(&subject, dir.path(), &client()),
            Err(SyncError::SchemaParsing { .. })
        ));
    }
}
