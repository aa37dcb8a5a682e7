//! Subjects, schema dialects and reference model

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Schema dialect of a subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchemaDialect {
    /// AVRO record schemas (.avsc)
    Avro,
    /// Protobuf interface-description schemas (.proto)
    Protobuf,
    /// JSON Schema definitions (.json)
    Json,
}

impl SchemaDialect {
    /// Get the file extension used when downloading schemas of this dialect
    pub fn extension(&self) -> &'static str {
        match self {
            SchemaDialect::Avro => "avsc",
            SchemaDialect::Protobuf => "proto",
            SchemaDialect::Json => "json",
        }
    }

    /// Registry wire token for this dialect
    pub fn token(&self) -> &'static str {
        match self {
            SchemaDialect::Avro => "AVRO",
            SchemaDialect::Protobuf => "PROTOBUF",
            SchemaDialect::Json => "JSON",
        }
    }
}

impl FromStr for SchemaDialect {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "AVRO" => Ok(SchemaDialect::Avro),
            "PROTOBUF" => Ok(SchemaDialect::Protobuf),
            "JSON" => Ok(SchemaDialect::Json),
            _ => Err(SyncError::UnknownDialect(s.to_string())),
        }
    }
}

impl fmt::Display for SchemaDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// A reference to a schema already registered under another subject
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteReference {
    /// Import name as it appears in the referencing schema
    pub name: String,
    /// Registry subject the referenced schema lives under
    pub subject: String,
    /// Registered version; zero or negative means "the single current version"
    pub version: i32,
}

impl RemoteReference {
    pub fn new(name: impl Into<String>, subject: impl Into<String>, version: i32) -> Self {
        Self {
            name: name.into(),
            subject: subject.into(),
            version,
        }
    }

    /// Whether this reference still needs its version pinned by the registry
    pub fn is_current(&self) -> bool {
        self.version <= 0
    }
}

/// A reference to a sibling schema file that is not registered yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalReference {
    /// Import name as it appears in the referencing schema
    pub name: String,
    /// Path to the schema file, relative to the subject's base directory
    pub path: PathBuf,
}

impl LocalReference {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Read the referenced file content. Content is never cached; two
    /// subjects sharing a local reference re-read it independently.
    pub fn read(&self, base_dir: &Path) -> std::io::Result<String> {
        std::fs::read_to_string(resolve_path(base_dir, &self.path))
    }
}

/// A named schema slot to be synchronized with the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// Registry subject name
    pub name: String,
    /// Path to the schema source, relative to the base directory
    pub file: PathBuf,
    /// Schema dialect
    pub dialect: SchemaDialect,
    /// Remote references, in declaration order
    pub remote_references: Vec<RemoteReference>,
    /// Local references, in declaration order
    pub local_references: Vec<LocalReference>,
}

impl Subject {
    /// Create a subject with no references
    pub fn new(name: impl Into<String>, file: impl Into<PathBuf>, dialect: SchemaDialect) -> Self {
        Self {
            name: name.into(),
            file: file.into(),
            dialect,
            remote_references: Vec::new(),
            local_references: Vec::new(),
        }
    }

    /// Add a remote reference, consuming and returning the subject
    pub fn with_remote_reference(mut self, reference: RemoteReference) -> Self {
        self.remote_references.push(reference);
        self
    }

    /// Add a local reference, consuming and returning the subject
    pub fn with_local_reference(mut self, reference: LocalReference) -> Self {
        self.local_references.push(reference);
        self
    }

    /// Validate the reference mix.
    ///
    /// A current-version remote reference pins against whatever the registry
    /// holds right now, while a local reference pins against a file on disk.
    /// Combining the two on one subject is ambiguous and rejected. Remote
    /// references with an explicit version combine freely with local ones.
    pub fn validate(&self) -> Result<(), SyncError> {
        let has_current = self.remote_references.iter().any(RemoteReference::is_current);
        if has_current && !self.local_references.is_empty() {
            return Err(SyncError::MixedReference {
                subject: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Read the subject's own schema file
    pub fn read(&self, base_dir: &Path) -> std::io::Result<String> {
        std::fs::read_to_string(resolve_path(base_dir, &self.file))
    }
}

/// Fully resolved, registry-submittable schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalSchema {
    /// Dialect of the content
    pub dialect: SchemaDialect,
    /// Self-contained schema text; no unresolved local imports remain
    pub content: String,
    /// Remote references, carried as registry metadata (never inlined)
    pub references: Vec<RemoteReference>,
}

impl CanonicalSchema {
    pub fn new(
        dialect: SchemaDialect,
        content: impl Into<String>,
        references: Vec<RemoteReference>,
    ) -> Self {
        Self {
            dialect,
            content: content.into(),
            references,
        }
    }
}

/// Resolve a path against a base directory unless it is already absolute
pub(crate) fn resolve_path(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
