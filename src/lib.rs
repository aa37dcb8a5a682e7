//! Schema Registry Sync
//!
//! Keeps local schema files and a Confluent-style schema registry in sync:
//! register, download, compatibility checks and per-subject configuration.
//!
//! ## Features
//!
//! - **Multi-Dialect Resolution**: AVRO, Protobuf and JSON Schema subjects,
//!   each resolved into a single self-contained document before upload
//! - **Local References**: sibling schema files embedded per dialect
//!   (Avro first-use definition embedding, JSON `definitions` container,
//!   Protobuf import inlining with qualified-name rewriting)
//! - **Remote References**: already-registered subjects pinned to an exact
//!   version before any schema work runs
//! - **Registration Ledger**: every successful registration recorded in a
//!   `registered.csv` for build tooling to consume
//! - **Checksum Deduplication**: SHA256 content checksums collapse
//!   identical schema versions during remote-version pinning
//!
//! ## Example
//!
//! ```no_run
//! use schema_sync::{HttpRegistryClient, LocalReference, SchemaDialect, Subject};
//! use schema_sync::tasks::{self, TaskContext};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpRegistryClient::new("http://localhost:8081")?;
//! let ctx = TaskContext {
//!     base_dir: Path::new("schemas"),
//!     client: &client,
//!     fail_fast: false,
//! };
//!
//! let subjects = vec![
//!     Subject::new("player-value", "player.avsc", SchemaDialect::Avro)
//!         .with_local_reference(LocalReference::new("User", "user.avsc")),
//! ];
//! let report = tasks::register::run(&subjects, &ctx, Path::new("build/schema-sync"))?;
//! assert!(report.is_success());
//! # Ok(())
//! # }
//! ```

pub mod checksum;
pub mod client;
pub mod config;
pub mod error;
pub mod resolver;
pub mod subject;
pub mod tasks;

pub use checksum::Checksum;
pub use client::{
    CompatibilityLevel, HttpRegistryClient, MemoryRegistryClient, RegistryError, SchemaMetadata,
    SchemaRegistryClient,
};
pub use config::SyncConfig;
pub use error::{Result, SyncError};
pub use subject::{CanonicalSchema, LocalReference, RemoteReference, SchemaDialect, Subject};
