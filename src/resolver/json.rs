//! JSON Schema local resolution
//!
//! Local references are embedded into a `definitions` container on the
//! subject's schema object, keyed by reference name. The subject is expected
//! to point at the container already (`"$ref": "#/definitions/User"`);
//! `$ref` values are never rewritten here. Embedding is single-level: a
//! local reference's own local references are not resolved transitively.

use std::path::Path;

use jsonschema::JSONSchema;
use serde_json::{Map, Value};

use crate::error::{Result, SyncError};
use crate::subject::{CanonicalSchema, Subject};

/// Key of the definitions container local references are embedded under
pub const DEFINITIONS_KEY: &str = "definitions";

/// Resolve a JSON Schema subject against its local references.
pub fn resolve(subject: &Subject, base_dir: &Path) -> Result<CanonicalSchema> {
    let mut root: Value = serde_json::from_str(&subject.read(base_dir)?)?;
    let object = root.as_object_mut().ok_or_else(|| SyncError::SchemaParsing {
        subject: subject.name.clone(),
        dialect: subject.dialect,
        message: "schema root must be a JSON object".to_string(),
    })?;

    if !subject.local_references.is_empty() {
        let definitions = object
            .entry(DEFINITIONS_KEY)
            .or_insert_with(|| Value::Object(Map::new()));
        let container = definitions
            .as_object_mut()
            .ok_or_else(|| SyncError::SchemaParsing {
                subject: subject.name.clone(),
                dialect: subject.dialect,
                message: format!("'{}' must be a JSON object", DEFINITIONS_KEY),
            })?;

        for reference in &subject.local_references {
            let content: Value = serde_json::from_str(&reference.read(base_dir)?)?;
            container.insert(reference.name.clone(), content);
        }
    }

    // Acceptance gate: the assembled document must compile as a JSON Schema
    JSONSchema::compile(&root).map_err(|e| SyncError::SchemaParsing {
        subject: subject.name.clone(),
        dialect: subject.dialect,
        message: e.to_string(),
    })?;

    Ok(CanonicalSchema::new(
        subject.dialect,
        serde_json::to_string_pretty(&root)?,
        subject.remote_references.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use crate::subject::{LocalReference, SchemaDialect};
    use tempfile::tempdir;

    const USER: &str = r#"{
        "type": "object",
        "properties": {
            "name": { "type": "string" }
        }
    }"#;

    const PLAYER: &str = r##"{
        "type": "object",
        "properties": {
            "identifier": { "type": "integer" },
            "user": { "$ref": "#/definitions/User" }
        }
    }"##;

    #[test]
    fn test_definitions_contain_referenced_schema() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("User.json"), USER).unwrap();
        fs::write(dir.path().join("player.json"), PLAYER).unwrap();

        let subject = Subject::new("player-value", "player.json", SchemaDialect::Json)
            .with_local_reference(LocalReference::new("User", "User.json"));

        let canonical = resolve(&subject, dir.path()).unwrap();
        let resolved: serde_json::Value = serde_json::from_str(&canonical.content).unwrap();

        let definitions = resolved[DEFINITIONS_KEY].as_object().unwrap();
        assert_eq!(definitions.len(), 1);

        let expected: serde_json::Value = serde_json::from_str(USER).unwrap();
        assert_eq!(definitions["User"], expected);
    }

    #[test]
    fn test_no_references_leaves_schema_untouched() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("user.json"), USER).unwrap();

        let subject = Subject::new("user-value", "user.json", SchemaDialect::Json);
        let canonical = resolve(&subject, dir.path()).unwrap();

        let resolved: serde_json::Value = serde_json::from_str(&canonical.content).unwrap();
        assert!(resolved.get(DEFINITIONS_KEY).is_none());
    }

    #[test]
    fn test_idempotent_output() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("User.json"), USER).unwrap();
        fs::write(dir.path().join("player.json"), PLAYER).unwrap();

        let subject = Subject::new("player-value", "player.json", SchemaDialect::Json)
            .with_local_reference(LocalReference::new("User", "User.json"));

        let first = resolve(&subject, dir.path()).unwrap();
        let second = resolve(&subject, dir.path()).unwrap();
        assert_eq!(first.content, second.content);
    }

    #[test]
    fn test_non_object_root_is_parse_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("list.json"), "[1, 2, 3]").unwrap();

        let subject = Subject::new("list-value", "list.json", SchemaDialect::Json);
        assert!(matches!(
            resolve(&subject, dir.path()),
            Err(SyncError::SchemaParsing { .. })
        ));
    }

    #[test]
    fn test_missing_reference_file_is_io_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("player.json"), PLAYER).unwrap();

        let subject = Subject::new("player-value", "player.json", SchemaDialect::Json)
            .with_local_reference(LocalReference::new("User", "missing.json"));

        assert!(matches!(
            resolve(&subject, dir.path()),
            Err(SyncError::Io(_))
        ));
    }
}
