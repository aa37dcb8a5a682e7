//! Protobuf (interface-description) local resolution
//!
//! Local references are resolved by flattening: every locally referenced
//! file is parsed, its top-level declarations are inlined into the subject
//! file, type references are rewritten to the bare declared names, and the
//! import statements that brought them in are dropped. See [`flatten`] for
//! the rewriting rules. The import graph is checked for cycles up front;
//! a cycle among local references is an error, never an infinite loop.

pub mod ast;
pub mod flatten;

use std::collections::BTreeMap;
use std::path::Path;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::error::{Result, SyncError};
use crate::subject::{CanonicalSchema, Subject};

/// Resolve a protobuf subject against its local references.
///
/// The output is the flattened file in canonical form, prepended with a
/// comment header naming this tool and the subject's original path.
pub fn resolve(subject: &Subject, base_dir: &Path) -> Result<CanonicalSchema> {
    let parse = |source: &str| {
        ast::parse(source).map_err(|e| SyncError::SchemaParsing {
            subject: subject.name.clone(),
            dialect: subject.dialect,
            message: e.to_string(),
        })
    };

    let subject_file = parse(&subject.read(base_dir)?)?;

    let mut local: BTreeMap<String, ast::ProtoFile> = BTreeMap::new();
    for reference in &subject.local_references {
        local.insert(reference.name.clone(), parse(&reference.read(base_dir)?)?);
    }

    check_import_cycles(&subject.name, &local)?;

    // flattening only fails on name collisions, a resolution problem rather
    // than a syntax one
    let flat = flatten::flatten(subject_file, &local)
        .map_err(|e| SyncError::ReferenceResolution(e.message))?;

    let content = format!(
        "// Generated by schema-sync from {}\n{}",
        subject.file.display(),
        ast::print(&flat)
    );

    Ok(CanonicalSchema::new(
        subject.dialect,
        content,
        subject.remote_references.clone(),
    ))
}

/// Reject cyclic imports among the local references before inlining starts.
fn check_import_cycles(
    subject_name: &str,
    local: &BTreeMap<String, ast::ProtoFile>,
) -> Result<()> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for (name, file) in local {
        graph.add_node(name.as_str());
        for import in &file.imports {
            if local.contains_key(&import.path) {
                graph.add_edge(name.as_str(), import.path.as_str(), ());
            }
        }
    }

    toposort(&graph, None).map_err(|cycle| SyncError::ReferenceCycle {
        subject: subject_name.to_string(),
        chain: format!("import cycle through '{}'", cycle.node_id()),
    })?;
    Ok(())
}
