//! Compatibility task
//!
//! Resolves each subject and asks the registry whether the schema is
//! compatible with the latest registered version. A subject the registry
//! does not know yet is vacuously compatible: there is nothing to conflict
//! with, so it counts as success, not failure.

use tracing::{debug, info};

use crate::client::RegistryError;
use crate::error::{Result, SyncError};
use crate::resolver;
use crate::subject::Subject;

use super::{TaskContext, TaskReport};

/// Check every subject against the registry.
pub fn run(subjects: &[Subject], ctx: &TaskContext<'_>) -> Result<TaskReport> {
    let mut report = TaskReport::default();

    for subject in subjects {
        match check_one(subject, ctx) {
            Ok(()) => {
                info!(subject = %subject.name, "schema is compatible");
                report.record_success();
            }
            Err(e) => {
                report.record_failure(&subject.name, e);
                if ctx.fail_fast {
                    report.aborted = true;
                    break;
                }
            }
        }
    }
    Ok(report)
}

fn check_one(subject: &Subject, ctx: &TaskContext<'_>) -> Result<()> {
    let canonical = resolver::resolve(subject, ctx.base_dir, ctx.client)?;

    match ctx.client.test_compatibility(&subject.name, &canonical) {
        Ok(true) => Ok(()),
        Ok(false) => {
            // best effort: ask for details, tolerate registries without them
            let details = match ctx.client.test_compatibility_verbose(&subject.name, &canonical) {
                Ok(messages) if !messages.is_empty() => messages.join("; "),
                _ => "registry reported an incompatible change".to_string(),
            };
            Err(SyncError::Incompatible {
                subject: subject.name.clone(),
                details,
            })
        }
        Err(RegistryError::SubjectNotFound { .. }) => {
            debug!(subject = %subject.name, "subject not registered yet, vacuously compatible");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
