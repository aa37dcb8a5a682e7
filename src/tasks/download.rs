//! Download task
//!
//! Fetches registered schemas and writes them to disk as
//! `<output_name-or-subject>.<extension>`, with the extension chosen by the
//! schema's dialect. An optional `<subject>-metadata.json` sidecar records
//! the registry metadata alongside the schema text.

use std::fs;
use std::path::Path;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::client::SchemaMetadata;
use crate::error::Result;

use super::{expand_subject_patterns, TaskContext, TaskReport};

/// One schema to download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Registry subject to fetch
    pub subject: String,
    /// Specific version; latest when absent
    pub version: Option<u32>,
    /// Output file stem; the subject name when absent
    pub output_name: Option<String>,
}

impl DownloadRequest {
    pub fn latest(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            version: None,
            output_name: None,
        }
    }
}

#[derive(Serialize)]
struct MetadataSidecar<'a> {
    #[serde(flatten)]
    metadata: &'a SchemaMetadata,
    downloaded_at: chrono::DateTime<Utc>,
}

/// Download explicit requests plus every subject matching `patterns`.
pub fn run(
    requests: &[DownloadRequest],
    patterns: &[String],
    ctx: &TaskContext<'_>,
    output_dir: &Path,
    write_metadata: bool,
) -> Result<TaskReport> {
    let mut all: Vec<DownloadRequest> = requests.to_vec();
    for subject in expand_subject_patterns(patterns, ctx.client)? {
        if !all.iter().any(|r| r.subject == subject) {
            all.push(DownloadRequest::latest(subject));
        }
    }

    let mut report = TaskReport::default();
    fs::create_dir_all(output_dir)?;

    for request in &all {
        match download_one(request, ctx, output_dir, write_metadata) {
            Ok(()) => report.record_success(),
            Err(e) => {
                report.record_failure(&request.subject, e);
                if ctx.fail_fast {
                    report.aborted = true;
                    break;
                }
            }
        }
    }
    Ok(report)
}

fn download_one(
    request: &DownloadRequest,
    ctx: &TaskContext<'_>,
    output_dir: &Path,
    write_metadata: bool,
) -> Result<()> {
    let metadata = match request.version {
        Some(version) => ctx.client.schema_metadata(&request.subject, version)?,
        None => ctx.client.latest_schema_metadata(&request.subject)?,
    };

    let stem = request.output_name.as_deref().unwrap_or(&request.subject);
    let file_name = format!("{}.{}", stem, metadata.dialect.extension());
    fs::write(output_dir.join(&file_name), &metadata.schema)?;
    info!(subject = %request.subject, file = %file_name, "downloaded schema");

    if write_metadata {
        let sidecar = MetadataSidecar {
            metadata: &metadata,
            downloaded_at: Utc::now(),
        };
        let sidecar_name = format!("{}-metadata.json", request.subject);
        fs::write(
            output_dir.join(sidecar_name),
            serde_json::to_string_pretty(&sidecar)?,
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    use crate::client::{MemoryRegistryClient, SchemaRegistryClient};
    use crate::subject::{CanonicalSchema, SchemaDialect};
    use tempfile::tempdir;

    fn registry() -> MemoryRegistryClient {
        let client = MemoryRegistryClient::new();
        client
            .register(
                "user-value",
                &CanonicalSchema::new(SchemaDialect::Avro, r#"{"type": "string"}"#, Vec::new()),
            )
            .unwrap();
        client
            .register(
                "order-proto",
                &CanonicalSchema::new(
                    SchemaDialect::Protobuf,
                    "syntax = \"proto3\";\nmessage Order {}\n",
                    Vec::new(),
                ),
            )
            .unwrap();
        client
    }

    fn ctx<'a>(client: &'a MemoryRegistryClient, base: &'a Path) -> TaskContext<'a> {
        TaskContext {
            base_dir: base,
            client,
            fail_fast: false,
        }
    }

    #[test]
    fn test_extension_follows_dialect() {
        let dir = tempdir().unwrap();
        let client = registry();
        let ctx = ctx(&client, dir.path());

        let requests = vec![
            DownloadRequest::latest("user-value"),
            DownloadRequest::latest("order-proto"),
        ];
        let report = run(&requests, &[], &ctx, dir.path(), false).unwrap();
        assert!(report.is_success());
        assert!(dir.path().join("user-value.avsc").exists());
        assert!(dir.path().join("order-proto.proto").exists());
    }

    #[test]
    fn test_output_name_overrides_subject() {
        let dir = tempdir().unwrap();
        let client = registry();
        let ctx = ctx(&client, dir.path());

        let requests = vec![DownloadRequest {
            subject: "user-value".to_string(),
            version: None,
            output_name: Some("user".to_string()),
        }];
        run(&requests, &[], &ctx, dir.path(), false).unwrap();
        assert!(dir.path().join("user.avsc").exists());
    }

    #[test]
    fn test_metadata_sidecar_written() {
        let dir = tempdir().unwrap();
        let client = registry();
        let ctx = ctx(&client, dir.path());

        let requests = vec![DownloadRequest::latest("user-value")];
        run(&requests, &[], &ctx, dir.path(), true).unwrap();

        let sidecar = fs::read_to_string(dir.path().join("user-value-metadata.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&sidecar).unwrap();
        assert_eq!(value["subject"], "user-value");
        assert_eq!(value["version"], 1);
        assert!(value["downloaded_at"].is_string());
    }

    #[test]
    fn test_pattern_expansion_downloads_matches() {
        let dir = tempdir().unwrap();
        let client = registry();
        let ctx = ctx(&client, dir.path());

        let report = run(&[], &[".*-value".to_string()], &ctx, dir.path(), false).unwrap();
        assert!(report.is_success());
        assert_eq!(report.succeeded, 1);
        assert!(dir.path().join("user-value.avsc").exists());
        assert!(!dir.path().join("order-proto.proto").exists());
    }

    #[test]
    fn test_missing_subject_is_counted_per_subject() {
        let dir = tempdir().unwrap();
        let client = registry();
        let ctx = ctx(&client, dir.path());

        let requests = vec![
            DownloadRequest::latest("ghost"),
            DownloadRequest::latest("user-value"),
        ];
        let report = run(&requests, &[], &ctx, dir.path(), false).unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].subject, "ghost");
    }

    #[test]
    fn test_specific_version_downloaded() {
        let dir = tempdir().unwrap();
        let client = registry();
        client
            .register(
                "user-value",
                &CanonicalSchema::new(SchemaDialect::Avro, r#"{"type": "int"}"#, Vec::new()),
            )
            .unwrap();
        let ctx = ctx(&client, dir.path());

        let requests = vec![DownloadRequest {
            subject: "user-value".to_string(),
            version: Some(1),
            output_name: None,
        }];
        run(&requests, &[], &ctx, dir.path(), false).unwrap();
        let content = fs::read_to_string(dir.path().join("user-value.avsc")).unwrap();
        assert_eq!(content, r#"{"type": "string"}"#);
    }
}
