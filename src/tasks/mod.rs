//! Task orchestration
//!
//! Each task walks its subjects one at a time, in declaration order, and
//! captures failures per subject so one bad schema does not abort its
//! siblings (unless fail-fast is requested). A task as a whole fails when
//! any subject failed.

pub mod compatibility;
pub mod configure;
pub mod download;
pub mod register;

use std::path::Path;

use regex::Regex;
use tracing::warn;

use crate::client::SchemaRegistryClient;
use crate::error::SyncError;

/// Shared state for one task invocation. The client is constructed once by
/// the caller and injected; its lifetime is the task run.
pub struct TaskContext<'a> {
    /// Directory subject and reference paths resolve against
    pub base_dir: &'a Path,
    /// Registry client for this invocation
    pub client: &'a dyn SchemaRegistryClient,
    /// Abort remaining subjects on the first failure
    pub fail_fast: bool,
}

/// A failure captured for one subject
#[derive(Debug)]
pub struct SubjectFailure {
    pub subject: String,
    pub error: SyncError,
}

/// Aggregate outcome of a task run
#[derive(Debug, Default)]
pub struct TaskReport {
    /// Subjects processed successfully
    pub succeeded: usize,
    /// Per-subject failures, in processing order
    pub failures: Vec<SubjectFailure>,
    /// Whether fail-fast cut processing short
    pub aborted: bool,
}

impl TaskReport {
    /// The task succeeds only when no subject failed
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    fn record_success(&mut self) {
        self.succeeded += 1;
    }

    fn record_failure(&mut self, subject: &str, error: SyncError) {
        warn!(subject, %error, "subject failed");
        self.failures.push(SubjectFailure {
            subject: subject.to_string(),
            error,
        });
    }
}

/// Expand subject-name patterns against the registry's full subject list.
///
/// The list is fetched once and reused for every pattern. An invalid
/// pattern is logged and contributes zero subjects; it is not an error.
/// Matched subjects come back in registry-query order.
pub fn expand_subject_patterns(
    patterns: &[String],
    client: &dyn SchemaRegistryClient,
) -> Result<Vec<String>, SyncError> {
    if patterns.is_empty() {
        return Ok(Vec::new());
    }
    let all = client.all_subjects()?;

    let mut matched = Vec::new();
    for pattern in patterns {
        let regex = match Regex::new(pattern) {
            Ok(regex) => regex,
            Err(e) => {
                warn!(%pattern, %e, "invalid subject pattern, skipping");
                continue;
            }
        };
        for subject in &all {
            if regex.is_match(subject) && !matched.contains(subject) {
                matched.push(subject.clone());
            }
        }
    }
    Ok(matched)
}
