//! Configuration for schema synchronization
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (schema-sync.toml)
//! - Environment variables (SCHEMA_SYNC_*)
//!
//! ## Example config file (schema-sync.toml):
//! ```toml
//! [registry]
//! url = "http://localhost:8081"
//! username = "ci"
//! password = "secret"
//!
//! [output]
//! dir = "build/schema-sync"
//! metadata = true
//! fail_fast = false
//!
//! [project]
//! base_dir = "schemas"
//!
//! [[subjects]]
//! name = "player-value"
//! file = "player.avsc"
//! dialect = "AVRO"
//!
//! [[subjects.remote_references]]
//! name = "User"
//! subject = "user-value"
//! version = 2
//!
//! [[subjects.local_references]]
//! name = "Team"
//! path = "team.avsc"
//!
//! [download]
//! patterns = ["user-.*"]
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::client::CompatibilityLevel;
use crate::error::SyncError;
use crate::subject::{LocalReference, RemoteReference, Subject};
use crate::tasks::download::DownloadRequest;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SyncConfig {
    /// Registry connection settings
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Project settings
    #[serde(default)]
    pub project: ProjectConfig,

    /// Subjects to synchronize
    #[serde(default)]
    pub subjects: Vec<SubjectConfig>,

    /// Download settings
    #[serde(default)]
    pub download: DownloadConfig,
}

/// Registry connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Base URL of the schema registry
    #[serde(default = "default_registry_url")]
    pub url: String,

    /// Basic-auth username
    #[serde(default)]
    pub username: Option<String>,

    /// Basic-auth password
    #[serde(default)]
    pub password: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory the ledger and downloaded schemas are written to
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// Write a metadata sidecar next to each downloaded schema
    #[serde(default = "default_true")]
    pub metadata: bool,

    /// Abort remaining subjects on the first failure
    #[serde(default)]
    pub fail_fast: bool,
}

/// Project settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Directory schema file paths resolve against
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
}

/// One subject table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectConfig {
    /// Registry subject name
    pub name: String,

    /// Schema file, relative to the project base directory
    pub file: PathBuf,

    /// Dialect token: AVRO, PROTOBUF or JSON
    pub dialect: String,

    /// References to already-registered schemas
    #[serde(default)]
    pub remote_references: Vec<RemoteReferenceConfig>,

    /// References to sibling schema files
    #[serde(default)]
    pub local_references: Vec<LocalReferenceConfig>,

    /// Compatibility level to apply with the set-compatibility task
    #[serde(default)]
    pub compatibility: Option<String>,

    /// Output file stem when downloading; the subject name when absent
    #[serde(default)]
    pub output_name: Option<String>,
}

/// A remote reference table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteReferenceConfig {
    pub name: String,
    pub subject: String,
    /// Explicit version; omitted means "the single current version"
    #[serde(default = "default_current_version")]
    pub version: i32,
}

/// A local reference table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalReferenceConfig {
    pub name: String,
    pub path: PathBuf,
}

/// Download settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DownloadConfig {
    /// Regex patterns expanded against the registry's subject list
    #[serde(default)]
    pub patterns: Vec<String>,
}

// Default value functions
fn default_registry_url() -> String {
    "http://localhost:8081".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("build/schema-sync")
}

fn default_base_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_current_version() -> i32 {
    -1
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: default_registry_url(),
            username: None,
            password: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            metadata: true,
            fail_fast: false,
        }
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
        }
    }
}

impl SubjectConfig {
    /// Build the validated subject this table describes
    pub fn to_subject(&self) -> Result<Subject, SyncError> {
        let dialect = self.dialect.parse()?;
        let mut subject = Subject::new(&self.name, self.file.clone(), dialect);
        for reference in &self.remote_references {
            subject = subject.with_remote_reference(RemoteReference::new(
                &reference.name,
                &reference.subject,
                reference.version,
            ));
        }
        for reference in &self.local_references {
            subject = subject
                .with_local_reference(LocalReference::new(&reference.name, reference.path.clone()));
        }
        subject.validate()?;
        Ok(subject)
    }

    /// Compatibility level, when configured
    pub fn compatibility_level(&self) -> Result<Option<CompatibilityLevel>, SyncError> {
        match &self.compatibility {
            Some(token) => CompatibilityLevel::from_str(token)
                .map(Some)
                .map_err(SyncError::Config),
            None => Ok(None),
        }
    }

    /// Download request for this subject
    pub fn to_download_request(&self) -> DownloadRequest {
        DownloadRequest {
            subject: self.name.clone(),
            version: None,
            output_name: self.output_name.clone(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["schema-sync.toml", ".schema-sync.toml", "config/schema-sync.toml"];
        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "schema-sync") {
            let xdg_config = config_dir.config_dir().join("schema-sync.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("SCHEMA_SYNC")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Build the validated subject list; fails on an unknown dialect or an
    /// illegal reference mix anywhere in the configuration
    pub fn build_subjects(&self) -> Result<Vec<Subject>, SyncError> {
        self.subjects.iter().map(SubjectConfig::to_subject).collect()
    }

    /// Get the base directory (resolves relative paths)
    pub fn base_dir(&self) -> PathBuf {
        if self.project.base_dir.is_absolute() {
            self.project.base_dir.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.project.base_dir)
        }
    }
}
