//! Remote-version pinning
//!
//! A remote reference declared with `version <= 0` means "whatever single
//! schema is currently registered under that subject". Pinning turns the
//! marker into a concrete version number before any dialect-specific work
//! runs, so the resolvers and the registry submission always see explicit
//! versions.

use tracing::debug;

use crate::checksum::Checksum;
use crate::client::SchemaRegistryClient;
use crate::error::{Result, SyncError};
use crate::subject::RemoteReference;

/// Pin every current-version reference to a concrete registered version.
///
/// All versions registered under the referenced subject are fetched and
/// deduplicated by content checksum. Exactly one distinct schema must
/// remain: zero means the subject holds nothing to pin against, more than
/// one means the marker is ambiguous.
pub fn pin_remote_versions(
    references: &mut [RemoteReference],
    client: &dyn SchemaRegistryClient,
) -> Result<()> {
    for reference in references.iter_mut().filter(|r| r.is_current()) {
        let versions = client.schema_versions(&reference.subject).map_err(|e| {
            SyncError::ReferenceResolution(format!(
                "could not list versions for subject '{}': {}",
                reference.subject, e
            ))
        })?;

        let mut distinct: Vec<(Checksum, u32)> = Vec::new();
        for metadata in &versions {
            let checksum = Checksum::from_content(&metadata.schema);
            if !distinct.iter().any(|(c, _)| *c == checksum) {
                distinct.push((checksum, metadata.version));
            }
        }

        match distinct.as_slice() {
            [] => {
                return Err(SyncError::ReferenceResolution(format!(
                    "no schema registered under subject '{}' for reference '{}'",
                    reference.subject, reference.name
                )))
            }
            [(_, version)] => {
                debug!(
                    subject = %reference.subject,
                    version,
                    "pinned current-version reference"
                );
                reference.version = *version as i32;
            }
            _ => {
                return Err(SyncError::ReferenceResolution(format!(
                    "more than one distinct schema registered under subject '{}'; \
                     reference '{}' must pin an explicit version",
                    reference.subject, reference.name
                )))
            }
        }
    }
    Ok(())
}
