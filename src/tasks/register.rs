//! Register task
//!
//! Resolves each subject, submits it to the registry and records successful
//! registrations in a `registered.csv` ledger (header plus one row per
//! subject, in declaration order).

use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::resolver;
use crate::subject::Subject;

use super::{TaskContext, TaskReport};

/// Ledger file written next to other task outputs
pub const LEDGER_FILE: &str = "registered.csv";

/// A successful registration, as recorded in the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredSubject {
    pub subject: String,
    pub path: String,
    pub id: u32,
}

/// Register every subject, writing the ledger into `output_dir`.
///
/// Already-written rows stay on disk even if a later subject fails; there
/// is no partial-write cleanup.
pub fn run(subjects: &[Subject], ctx: &TaskContext<'_>, output_dir: &Path) -> Result<TaskReport> {
    let mut report = TaskReport::default();
    let mut registered = Vec::new();

    for subject in subjects {
        match register_one(subject, ctx) {
            Ok(entry) => {
                info!(subject = %entry.subject, id = entry.id, "registered schema");
                registered.push(entry);
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

    write_ledger(&registered, output_dir)?;
    Ok(report)
}

fn register_one(subject: &Subject, ctx: &TaskContext<'_>) -> Result<RegisteredSubject> {
    let canonical = resolver::resolve(subject, ctx.base_dir, ctx.client)?;
    let id = ctx.client.register(&subject.name, &canonical)?;
    Ok(RegisteredSubject {
        subject: subject.name.clone(),
        path: subject.file.display().to_string(),
        id,
    })
}

fn write_ledger(registered: &[RegisteredSubject], output_dir: &Path) -> Result<()> {
    fs::create_dir_all(output_dir)?;
    let mut content = String::from("subject, path, id\n");
    for entry in registered {
        content.push_str(&format!("{}, {}, {}\n", entry.subject, entry.path, entry.id));
    }
    fs::write(output_dir.join(LEDGER_FILE), content)?;
    Ok(())
}
