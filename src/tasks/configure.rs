//! Configure-compatibility task
//!
//! Sets the per-subject compatibility level on the registry.

use tracing::info;

use crate::client::CompatibilityLevel;
use crate::error::Result;

use super::{TaskContext, TaskReport};

/// Update the compatibility level of every listed subject.
pub fn run(levels: &[(String, CompatibilityLevel)], ctx: &TaskContext<'_>) -> Result<TaskReport> {
    let mut report = TaskReport::default();

    for (subject, level) in levels {
        match ctx.client.update_compatibility(subject, *level) {
            Ok(()) => {
                info!(%subject, %level, "compatibility level updated");
                report.record_success();
            }
            Err(e) => {
                report.record_failure(subject, e.into());
                if ctx.fail_fast {
                    report.aborted = true;
                    break;
                }
            }
        }
    }
    Ok(report)
}
