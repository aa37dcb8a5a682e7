//! Registry client boundary
//!
//! The registry service is an external collaborator. This module defines the
//! client contract as a trait so tasks stay independent of the transport:
//!
//! - [`HttpRegistryClient`] talks to a Confluent-compatible REST registry
//! - [`MemoryRegistryClient`] is an in-process registry for development and
//!   testing, with content deduplication on register
//!
//! One client instance is constructed per task invocation and injected into
//! the orchestrator; there is no process-global client.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::checksum::Checksum;
use crate::subject::{CanonicalSchema, RemoteReference, SchemaDialect};

/// Errors raised by registry communication
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Registry rejected request (code {code}): {message}")]
    Api { code: i64, message: String },

    #[error("Subject not found: {subject}")]
    SubjectNotFound { subject: String },

    #[error("Registry does not support {0}")]
    Unsupported(&'static str),
}

impl RegistryError {
    /// Fold the Confluent "subject not found" error code into the dedicated
    /// variant so callers can treat an absent subject specially.
    fn scoped(self, subject: &str) -> Self {
        match self {
            RegistryError::Api { code: 40401, .. } => RegistryError::SubjectNotFound {
                subject: subject.to_string(),
            },
            other => other,
        }
    }
}

/// Compatibility level for a subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompatibilityLevel {
    Backward,
    BackwardTransitive,
    Forward,
    ForwardTransitive,
    Full,
    FullTransitive,
    None,
}

impl CompatibilityLevel {
    pub fn token(&self) -> &'static str {
        match self {
            CompatibilityLevel::Backward => "BACKWARD",
            CompatibilityLevel::BackwardTransitive => "BACKWARD_TRANSITIVE",
            CompatibilityLevel::Forward => "FORWARD",
            CompatibilityLevel::ForwardTransitive => "FORWARD_TRANSITIVE",
            CompatibilityLevel::Full => "FULL",
            CompatibilityLevel::FullTransitive => "FULL_TRANSITIVE",
            CompatibilityLevel::None => "NONE",
        }
    }
}

impl FromStr for CompatibilityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BACKWARD" => Ok(CompatibilityLevel::Backward),
            "BACKWARD_TRANSITIVE" => Ok(CompatibilityLevel::BackwardTransitive),
            "FORWARD" => Ok(CompatibilityLevel::Forward),
            "FORWARD_TRANSITIVE" => Ok(CompatibilityLevel::ForwardTransitive),
            "FULL" => Ok(CompatibilityLevel::Full),
            "FULL_TRANSITIVE" => Ok(CompatibilityLevel::FullTransitive),
            "NONE" => Ok(CompatibilityLevel::None),
            _ => Err(format!("unknown compatibility level '{}'", s)),
        }
    }
}

impl fmt::Display for CompatibilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// A registered schema version as reported by the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaMetadata {
    pub subject: String,
    pub id: u32,
    pub version: u32,
    pub dialect: SchemaDialect,
    pub schema: String,
    #[serde(default)]
    pub references: Vec<RemoteReference>,
}

/// Contract consumed by the task orchestrator.
///
/// All calls are blocking; subjects are processed one at a time. Schema
/// parsing is not part of this contract: the dialect resolvers produce and
/// validate the canonical schema before it reaches the client.
pub trait SchemaRegistryClient {
    /// Register a schema under a subject, returning the new version id
    fn register(&self, subject: &str, schema: &CanonicalSchema) -> Result<u32, RegistryError>;

    /// Test whether a schema is compatible with the latest registered version
    fn test_compatibility(
        &self,
        subject: &str,
        schema: &CanonicalSchema,
    ) -> Result<bool, RegistryError>;

    /// Compatibility check with per-incompatibility messages. Best effort;
    /// implementations may return `RegistryError::Unsupported`.
    fn test_compatibility_verbose(
        &self,
        subject: &str,
        schema: &CanonicalSchema,
    ) -> Result<Vec<String>, RegistryError>;

    /// Metadata of the latest version registered under a subject
    fn latest_schema_metadata(&self, subject: &str) -> Result<SchemaMetadata, RegistryError>;

    /// Metadata of a specific version registered under a subject
    fn schema_metadata(&self, subject: &str, version: u32) -> Result<SchemaMetadata, RegistryError>;

    /// Metadata of every version registered under a subject
    fn schema_versions(&self, subject: &str) -> Result<Vec<SchemaMetadata>, RegistryError>;

    /// Version under which an identical schema is already registered
    fn version_of(&self, subject: &str, schema: &CanonicalSchema) -> Result<u32, RegistryError>;

    /// Set the compatibility level for a subject
    fn update_compatibility(
        &self,
        subject: &str,
        level: CompatibilityLevel,
    ) -> Result<(), RegistryError>;

    /// All subject names currently known to the registry
    fn all_subjects(&self) -> Result<Vec<String>, RegistryError>;
}

// ---------------------------------------------------------------------------
// HTTP client (Confluent-compatible REST)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    schema: &'a str,
    #[serde(rename = "schemaType")]
    schema_type: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    references: Vec<WireReference<'a>>,
}

#[derive(Debug, Serialize)]
struct WireReference<'a> {
    name: &'a str,
    subject: &'a str,
    version: i32,
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    id: u32,
}

#[derive(Debug, Deserialize)]
struct CompatibilityResponse {
    is_compatible: bool,
    #[serde(default)]
    messages: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    version: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error_code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct WireMetadata {
    subject: String,
    id: u32,
    version: u32,
    #[serde(rename = "schemaType", default)]
    schema_type: Option<String>,
    schema: String,
    #[serde(default)]
    references: Vec<WireMetadataReference>,
}

#[derive(Debug, Deserialize)]
struct WireMetadataReference {
    name: String,
    subject: String,
    version: i32,
}

impl WireMetadata {
    fn into_metadata(self) -> Result<SchemaMetadata, RegistryError> {
        // Confluent omits schemaType for AVRO
        let dialect = match self.schema_type.as_deref() {
            None | Some("AVRO") => SchemaDialect::Avro,
            Some("PROTOBUF") => SchemaDialect::Protobuf,
            Some("JSON") => SchemaDialect::Json,
            Some(other) => {
                return Err(RegistryError::Api {
                    code: 0,
                    message: format!("registry returned unknown schema type '{}'", other),
                })
            }
        };
        Ok(SchemaMetadata {
            subject: self.subject,
            id: self.id,
            version: self.version,
            dialect,
            schema: self.schema,
            references: self
                .references
                .into_iter()
                .map(|r| RemoteReference::new(r.name, r.subject, r.version))
                .collect(),
        })
    }
}

/// Blocking client for a Confluent-compatible schema registry
pub struct HttpRegistryClient {
    base_url: String,
    http: reqwest::blocking::Client,
    auth: Option<(String, String)>,
}

impl HttpRegistryClient {
    /// Create a client for the given base URL with a 30 second timeout
    pub fn new(base_url: impl Into<String>) -> Result<Self, RegistryError> {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    /// Create a client with an explicit request timeout
    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RegistryError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            auth: None,
        })
    }

    /// Attach basic-auth credentials
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some((username.into(), password.into()));
        self
    }

    fn apply_auth(&self, request: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
        match &self.auth {
            Some((user, pass)) => request.basic_auth(user, Some(pass)),
            None => request,
        }
    }

    fn handle<T: DeserializeOwned>(
        &self,
        response: reqwest::blocking::Response,
    ) -> Result<T, RegistryError> {
        if response.status().is_success() {
            return Ok(response.json()?);
        }
        let status = response.status();
        match response.json::<ErrorBody>() {
            Ok(body) => Err(RegistryError::Api {
                code: body.error_code,
                message: body.message,
            }),
            Err(_) => Err(RegistryError::Api {
                code: status.as_u16() as i64,
                message: format!("registry returned HTTP {}", status),
            }),
        }
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RegistryError> {
        let request = self.apply_auth(self.http.get(format!("{}{}", self.base_url, path)));
        self.handle(request.send()?)
    }

    fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, RegistryError> {
        let request = self.apply_auth(self.http.post(format!("{}{}", self.base_url, path)));
        self.handle(request.json(body).send()?)
    }

    fn put_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, RegistryError> {
        let request = self.apply_auth(self.http.put(format!("{}{}", self.base_url, path)));
        self.handle(request.json(body).send()?)
    }

    fn register_body<'a>(schema: &'a CanonicalSchema) -> RegisterRequest<'a> {
        RegisterRequest {
            schema: &schema.content,
            schema_type: schema.dialect.token(),
            references: schema
                .references
                .iter()
                .map(|r| WireReference {
                    name: &r.name,
                    subject: &r.subject,
                    version: r.version,
                })
                .collect(),
        }
    }
}

impl SchemaRegistryClient for HttpRegistryClient {
    fn register(&self, subject: &str, schema: &CanonicalSchema) -> Result<u32, RegistryError> {
        let response: RegisterResponse = self
            .post_json(
                &format!("/subjects/{}/versions", subject),
                &Self::register_body(schema),
            )
            .map_err(|e| e.scoped(subject))?;
        Ok(response.id)
    }

    fn test_compatibility(
        &self,
        subject: &str,
        schema: &CanonicalSchema,
    ) -> Result<bool, RegistryError> {
        let response: CompatibilityResponse = self
            .post_json(
                &format!("/compatibility/subjects/{}/versions/latest", subject),
                &Self::register_body(schema),
            )
            .map_err(|e| e.scoped(subject))?;
        Ok(response.is_compatible)
    }

    fn test_compatibility_verbose(
        &self,
        subject: &str,
        schema: &CanonicalSchema,
    ) -> Result<Vec<String>, RegistryError> {
        let response: CompatibilityResponse = self
            .post_json(
                &format!(
                    "/compatibility/subjects/{}/versions/latest?verbose=true",
                    subject
                ),
                &Self::register_body(schema),
            )
            .map_err(|e| e.scoped(subject))?;
        match response.messages {
            Some(messages) => Ok(messages),
            // Older registries ignore ?verbose; tolerate the absence
            None if response.is_compatible => Ok(Vec::new()),
            None => Ok(vec!["schema is incompatible".to_string()]),
        }
    }

    fn latest_schema_metadata(&self, subject: &str) -> Result<SchemaMetadata, RegistryError> {
        let wire: WireMetadata = self
            .get_json(&format!("/subjects/{}/versions/latest", subject))
            .map_err(|e| e.scoped(subject))?;
        wire.into_metadata()
    }

    fn schema_metadata(&self, subject: &str, version: u32) -> Result<SchemaMetadata, RegistryError> {
        let wire: WireMetadata = self
            .get_json(&format!("/subjects/{}/versions/{}", subject, version))
            .map_err(|e| e.scoped(subject))?;
        wire.into_metadata()
    }

    fn schema_versions(&self, subject: &str) -> Result<Vec<SchemaMetadata>, RegistryError> {
        let versions: Vec<u32> = self
            .get_json(&format!("/subjects/{}/versions", subject))
            .map_err(|e| e.scoped(subject))?;
        versions
            .into_iter()
            .map(|v| self.schema_metadata(subject, v))
            .collect()
    }

    fn version_of(&self, subject: &str, schema: &CanonicalSchema) -> Result<u32, RegistryError> {
        let response: VersionResponse = self
            .post_json(
                &format!("/subjects/{}", subject),
                &Self::register_body(schema),
            )
            .map_err(|e| e.scoped(subject))?;
        Ok(response.version)
    }

    fn update_compatibility(
        &self,
        subject: &str,
        level: CompatibilityLevel,
    ) -> Result<(), RegistryError> {
        #[derive(Serialize)]
        struct ConfigBody<'a> {
            compatibility: &'a str,
        }
        #[derive(Deserialize)]
        struct ConfigResponse {
            #[allow(dead_code)]
            compatibility: String,
        }
        let _: ConfigResponse = self
            .put_json(
                &format!("/config/{}", subject),
                &ConfigBody {
                    compatibility: level.token(),
                },
            )
            .map_err(|e| e.scoped(subject))?;
        Ok(())
    }

    fn all_subjects(&self) -> Result<Vec<String>, RegistryError> {
        self.get_json("/subjects")
    }
}

// ---------------------------------------------------------------------------
// In-memory client (development/testing)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct StoredSchema {
    id: u32,
    version: u32,
    schema: CanonicalSchema,
    checksum: Checksum,
}

#[derive(Debug, Default)]
struct MemoryState {
    subjects: HashMap<String, Vec<StoredSchema>>,
    compatibility: HashMap<String, CompatibilityLevel>,
    incompatible: HashMap<String, Vec<String>>,
    next_id: u32,
}

/// In-process registry with content deduplication.
///
/// Registering byte-identical content under a subject returns the existing
/// version id instead of creating a new version, mirroring registry-side
/// fingerprint deduplication.
#[derive(Debug, Default)]
pub struct MemoryRegistryClient {
    state: Mutex<MemoryState>,
}

impl MemoryRegistryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a subject as incompatible with the given messages, so
    /// compatibility checks against it fail
    pub fn set_incompatible(&self, subject: impl Into<String>, messages: Vec<String>) {
        let mut state = self.lock();
        state.incompatible.insert(subject.into(), messages);
    }

    /// Compatibility level currently configured for a subject
    pub fn compatibility_of(&self, subject: &str) -> Option<CompatibilityLevel> {
        self.lock().compatibility.get(subject).copied()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn metadata_of(subject: &str, stored: &StoredSchema) -> SchemaMetadata {
        SchemaMetadata {
            subject: subject.to_string(),
            id: stored.id,
            version: stored.version,
            dialect: stored.schema.dialect,
            schema: stored.schema.content.clone(),
            references: stored.schema.references.clone(),
        }
    }
}

impl SchemaRegistryClient for MemoryRegistryClient {
    fn register(&self, subject: &str, schema: &CanonicalSchema) -> Result<u32, RegistryError> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let checksum = Checksum::from_content(&schema.content);
        if let Some(existing) = state
            .subjects
            .get(subject)
            .and_then(|v| v.iter().find(|s| s.checksum == checksum))
        {
            return Ok(existing.id);
        }
        state.next_id += 1;
        let id = state.next_id;
        let versions = state.subjects.entry(subject.to_string()).or_default();
        let version = versions.last().map(|s| s.version + 1).unwrap_or(1);
        versions.push(StoredSchema {
            id,
            version,
            schema: schema.clone(),
            checksum,
        });
        Ok(id)
    }

    fn test_compatibility(
        &self,
        subject: &str,
        schema: &CanonicalSchema,
    ) -> Result<bool, RegistryError> {
        Ok(self.test_compatibility_verbose(subject, schema)?.is_empty())
    }

    fn test_compatibility_verbose(
        &self,
        subject: &str,
        _schema: &CanonicalSchema,
    ) -> Result<Vec<String>, RegistryError> {
        let state = self.lock();
        if !state.subjects.contains_key(subject) {
            return Err(RegistryError::SubjectNotFound {
                subject: subject.to_string(),
            });
        }
        Ok(state.incompatible.get(subject).cloned().unwrap_or_default())
    }

    fn latest_schema_metadata(&self, subject: &str) -> Result<SchemaMetadata, RegistryError> {
        let state = self.lock();
        state
            .subjects
            .get(subject)
            .and_then(|v| v.last())
            .map(|s| Self::metadata_of(subject, s))
            .ok_or_else(|| RegistryError::SubjectNotFound {
                subject: subject.to_string(),
            })
    }

    fn schema_metadata(&self, subject: &str, version: u32) -> Result<SchemaMetadata, RegistryError> {
        let state = self.lock();
        state
            .subjects
            .get(subject)
            .and_then(|v| v.iter().find(|s| s.version == version))
            .map(|s| Self::metadata_of(subject, s))
            .ok_or_else(|| RegistryError::SubjectNotFound {
                subject: subject.to_string(),
            })
    }

    fn schema_versions(&self, subject: &str) -> Result<Vec<SchemaMetadata>, RegistryError> {
        let state = self.lock();
        state
            .subjects
            .get(subject)
            .map(|v| v.iter().map(|s| Self::metadata_of(subject, s)).collect())
            .ok_or_else(|| RegistryError::SubjectNotFound {
                subject: subject.to_string(),
            })
    }

    fn version_of(&self, subject: &str, schema: &CanonicalSchema) -> Result<u32, RegistryError> {
        let state = self.lock();
        let checksum = Checksum::from_content(&schema.content);
        state
            .subjects
            .get(subject)
            .and_then(|v| v.iter().find(|s| s.checksum == checksum))
            .map(|s| s.version)
            .ok_or_else(|| RegistryError::SubjectNotFound {
                subject: subject.to_string(),
            })
    }

    fn update_compatibility(
        &self,
        subject: &str,
        level: CompatibilityLevel,
    ) -> Result<(), RegistryError> {
        let mut state = self.lock();
        state.compatibility.insert(subject.to_string(), level);
        Ok(())
    }

    fn all_subjects(&self) -> Result<Vec<String>, RegistryError> {
        let state = self.lock();
        let mut subjects: Vec<String> = state.subjects.keys().cloned().collect();
        subjects.sort();
        Ok(subjects)
    }
}
