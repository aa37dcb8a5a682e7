//! Error types for schema synchronization

use thiserror::Error;

use crate::client::RegistryError;
use crate::subject::SchemaDialect;

/// Result type for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Schema synchronization errors
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Schema parsing failed for subject '{subject}' ({dialect}): {message}")]
    SchemaParsing {
        subject: String,
        dialect: SchemaDialect,
        message: String,
    },

    #[error("Unknown schema dialect: '{0}' (expected AVRO, PROTOBUF or JSON)")]
    UnknownDialect(String),

    #[error("Reference resolution failed: {0}")]
    ReferenceResolution(String),

    #[error("Local reference cycle for subject '{subject}': {chain}")]
    ReferenceCycle { subject: String, chain: String },

    #[error("Subject '{subject}' mixes a current-version remote reference with local references")]
    MixedReference { subject: String },

    #[error("Schema for subject '{subject}' is incompatible: {details}")]
    Incompatible { subject: String, details: String },

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("AVRO error: {0}")]
    Avro(#[from] apache_avro::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}
