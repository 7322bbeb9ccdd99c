use crate::descriptor::{FunctionDescriptor, Prefix, ResourceId};
use crate::manifest::Manifest;

/// A remote function that delete or status should address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub resource_id: ResourceId,
    pub origin: TargetOrigin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetOrigin {
    /// Derived from a function currently declared in fnstage.toml.
    Declared,
    /// Only known from the manifest; no longer declared.
    ManifestOnly,
}

/// Everything that lives (or may live) under `prefix`.
///
/// Declared functions come first in declaration order, followed by manifest
/// entries with no matching declaration, in manifest order.
pub fn lifecycle_targets(
    descriptors: &[FunctionDescriptor],
    prefix: &Prefix,
    manifest: Option<&Manifest>,
) -> crate::Result<Vec<Target>> {
    let mut targets = descriptors
        .iter()
        .map(|d| -> crate::Result<Target> {
            Ok(Target {
                resource_id: d.resource_id(prefix)?,
                origin: TargetOrigin::Declared,
            })
        })
        .collect::<crate::Result<Vec<_>>>()?;

    if let Some(manifest) = manifest {
        for id in manifest.resource_ids() {
            if id.prefix() != prefix.as_str() {
                tracing::warn!(resource = %id, %prefix, "manifest entry with foreign prefix ignored");
                continue;
            }
            if !targets.iter().any(|t| &t.resource_id == id) {
                targets.push(Target {
                    resource_id: id.clone(),
                    origin: TargetOrigin::ManifestOnly,
                });
            }
        }
    }

    Ok(targets)
}
