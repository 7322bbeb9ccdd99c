//! Prefix-scoped deploy, delete and status over a [`FunctionPlatform`].
//!
//! Every operation fans out one platform call per function, at most
//! `max_parallel` at a time, and reports results in declaration order.
//! Per-function failures end up in the report. A fatal error (gcloud missing)
//! aborts the batch and is returned as [`LifecycleError::Submission`].

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::stream::{self, StreamExt};

use fnstage_core::{
    DeployConfig, FunctionDescriptor, Manifest, ManifestEntry, ManifestStore, Prefix, ResourceId,
    TargetOrigin, lifecycle_targets,
};

use crate::client::FunctionError;
use crate::platform::{Deletion, DeployRequest, FunctionPlatform, RemoteState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleOptions {
    pub max_parallel: usize,
    /// Stop issuing calls after the first failure. Applies to deploy and delete.
    pub fail_fast: bool,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_parallel: 4,
            fail_fast: false,
        }
    }
}

impl From<&DeployConfig> for LifecycleOptions {
    fn from(config: &DeployConfig) -> Self {
        Self {
            max_parallel: config.max_parallel,
            fail_fast: config.fail_fast,
        }
    }
}

struct ManifestBinding {
    store: ManifestStore,
    gcp_project_id: Option<String>,
    region: String,
}

pub struct Lifecycle<'a, P: FunctionPlatform> {
    platform: &'a P,
    options: LifecycleOptions,
    manifests: Option<ManifestBinding>,
}

impl<'a, P: FunctionPlatform> Lifecycle<'a, P> {
    pub fn new(platform: &'a P, options: LifecycleOptions) -> Self {
        Self {
            platform,
            options,
            manifests: None,
        }
    }

    /// Record deploys in `store` and let delete and status reach functions
    /// that are no longer declared.
    pub fn with_manifests(
        mut self,
        store: ManifestStore,
        gcp_project_id: Option<String>,
        region: impl Into<String>,
    ) -> Self {
        self.manifests = Some(ManifestBinding {
            store,
            gcp_project_id,
            region: region.into(),
        });
        self
    }

    pub async fn deploy(
        &self,
        descriptors: &[FunctionDescriptor],
        prefix: &Prefix,
    ) -> Result<DeployReport, LifecycleError> {
        let planned = descriptors
            .iter()
            .map(|d| d.resource_id(prefix).map(|id| (d, id)))
            .collect::<fnstage_core::Result<Vec<_>>>()?;
        let mut manifest = self.load_manifest(prefix)?;

        tracing::info!(%prefix, functions = planned.len(), "deploying");
        let results = self
            .run_batch(&planned, self.options.fail_fast, |(descriptor, id)| {
                self.platform.deploy_function(DeployRequest {
                    resource_id: id,
                    descriptor,
                })
            })
            .await;

        let mut fatal = None;
        let mut entries = Vec::with_capacity(planned.len());
        for ((descriptor, id), result) in planned.into_iter().zip(results) {
            let outcome = match result {
                None => DeployOutcome::Skipped,
                Some(Ok(deployed)) => {
                    tracing::info!(function = %id, url = ?deployed.url, "deployed");
                    if let Some(manifest) = manifest.as_mut() {
                        manifest.record(ManifestEntry::new(id.clone(), deployed.url.clone()));
                    }
                    DeployOutcome::Deployed { url: deployed.url }
                }
                Some(Err(e)) => DeployOutcome::Failed {
                    error: record_failure(&id, e, &mut fatal),
                },
            };
            entries.push(DeployEntry {
                local_name: descriptor.local_name.clone(),
                resource_id: id,
                outcome,
            });
        }

        if let Some(manifest) = &manifest {
            self.save_manifest(manifest)?;
        }
        if let Some(source) = fatal {
            return Err(LifecycleError::Submission { source });
        }

        Ok(DeployReport {
            prefix: prefix.clone(),
            entries,
        })
    }

    pub async fn delete(
        &self,
        descriptors: &[FunctionDescriptor],
        prefix: &Prefix,
    ) -> Result<DeleteReport, LifecycleError> {
        let mut manifest = self.load_existing_manifest(prefix)?;
        let targets = lifecycle_targets(descriptors, prefix, manifest.as_ref())?;

        tracing::info!(%prefix, functions = targets.len(), "deleting");
        let results = self
            .run_batch(&targets, self.options.fail_fast, |target| {
                self.platform.delete_function(&target.resource_id)
            })
            .await;

        let mut fatal = None;
        let mut entries = Vec::with_capacity(targets.len());
        for (target, result) in targets.into_iter().zip(results) {
            let outcome = match result {
                None => DeleteOutcome::Skipped,
                Some(Ok(deletion)) => {
                    tracing::info!(function = %target.resource_id, ?deletion, "deleted");
                    if let Some(manifest) = manifest.as_mut() {
                        manifest.forget(&target.resource_id);
                    }
                    match deletion {
                        Deletion::Deleted => DeleteOutcome::Deleted,
                        Deletion::AlreadyAbsent => DeleteOutcome::AlreadyAbsent,
                    }
                }
                Some(Err(e)) => DeleteOutcome::Failed {
                    error: record_failure(&target.resource_id, e, &mut fatal),
                },
            };
            entries.push(DeleteEntry {
                resource_id: target.resource_id,
                origin: target.origin,
                outcome,
            });
        }

        if let Some(manifest) = &manifest {
            self.save_manifest(manifest)?;
        }
        if let Some(source) = fatal {
            return Err(LifecycleError::Submission { source });
        }

        Ok(DeleteReport {
            prefix: prefix.clone(),
            entries,
        })
    }

    pub async fn status(
        &self,
        descriptors: &[FunctionDescriptor],
        prefix: &Prefix,
    ) -> Result<StatusReport, LifecycleError> {
        let manifest = self.load_existing_manifest(prefix)?;
        let targets = lifecycle_targets(descriptors, prefix, manifest.as_ref())?;

        let results = self
            .run_batch(&targets, false, |target| {
                self.platform.function_status(&target.resource_id)
            })
            .await;

        let mut fatal = None;
        let mut entries = Vec::with_capacity(targets.len());
        for (target, result) in targets.into_iter().zip(results) {
            let state = match result {
                // Only reachable after a fatal error, which is returned below.
                None => continue,
                Some(Ok(state)) => StatusState::Remote(state),
                Some(Err(e)) => StatusState::Failed {
                    error: record_failure(&target.resource_id, e, &mut fatal),
                },
            };
            entries.push(StatusEntry {
                resource_id: target.resource_id,
                origin: target.origin,
                state,
            });
        }

        if let Some(source) = fatal {
            return Err(LifecycleError::Submission { source });
        }

        Ok(StatusReport {
            prefix: prefix.clone(),
            entries,
        })
    }

    /// Run `op` over `items` with bounded concurrency, preserving order.
    ///
    /// `None` marks an item that was never attempted because an earlier
    /// failure stopped the batch.
    async fn run_batch<'t, T, R, F, Fut>(
        &self,
        items: &'t [T],
        fail_fast: bool,
        op: F,
    ) -> Vec<Option<Result<R, FunctionError>>>
    where
        F: Fn(&'t T) -> Fut,
        Fut: Future<Output = Result<R, FunctionError>>,
    {
        let stop = AtomicBool::new(false);
        let stop = &stop;
        let op = &op;

        stream::iter(items.iter().map(move |item| async move {
            if stop.load(Ordering::SeqCst) {
                return None;
            }
            let result = op(item).await;
            if let Err(e) = &result {
                if fail_fast || e.is_fatal() {
                    stop.store(true, Ordering::SeqCst);
                }
            }
            Some(result)
        }))
        .buffered(self.options.max_parallel.max(1))
        .collect()
        .await
    }

    /// The manifest deploy writes into, created when missing.
    fn load_manifest(&self, prefix: &Prefix) -> Result<Option<Manifest>, LifecycleError> {
        let Some(binding) = &self.manifests else {
            return Ok(None);
        };
        let manifest = binding
            .store
            .load_or_new(prefix, binding.gcp_project_id.clone(), binding.region.clone())
            .map_err(|e| LifecycleError::Manifest { source: e })?;
        Ok(Some(manifest))
    }

    fn load_existing_manifest(&self, prefix: &Prefix) -> Result<Option<Manifest>, LifecycleError> {
        match &self.manifests {
            Some(binding) => binding
                .store
                .load(prefix)
                .map_err(|e| LifecycleError::Manifest { source: e }),
            None => Ok(None),
        }
    }

    fn save_manifest(&self, manifest: &Manifest) -> Result<(), LifecycleError> {
        match &self.manifests {
            Some(binding) => binding
                .store
                .save(manifest)
                .map_err(|e| LifecycleError::Manifest { source: e }),
            None => Ok(()),
        }
    }
}

/// Log a per-function failure and keep the first fatal error aside.
fn record_failure(
    id: &ResourceId,
    error: FunctionError,
    fatal: &mut Option<FunctionError>,
) -> String {
    let message = error_chain(&error);
    tracing::warn!(function = %id, error = %message, "failed");
    if error.is_fatal() && fatal.is_none() {
        *fatal = Some(error);
    }
    message
}

fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

// ── Reports ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    Deployed { url: Option<String> },
    Failed { error: String },
    /// Not attempted after an earlier failure under fail-fast.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployEntry {
    pub local_name: String,
    pub resource_id: ResourceId,
    pub outcome: DeployOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployReport {
    pub prefix: Prefix,
    pub entries: Vec<DeployEntry>,
}

impl DeployReport {
    pub fn is_success(&self) -> bool {
        self.entries
            .iter()
            .all(|e| matches!(e.outcome, DeployOutcome::Deployed { .. }))
    }

    pub fn failures(&self) -> impl Iterator<Item = &DeployEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, DeployOutcome::Failed { .. }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    AlreadyAbsent,
    Failed { error: String },
    Skipped,
}

impl DeleteOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Deleted | Self::AlreadyAbsent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteEntry {
    pub resource_id: ResourceId,
    pub origin: TargetOrigin,
    pub outcome: DeleteOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteReport {
    pub prefix: Prefix,
    pub entries: Vec<DeleteEntry>,
}

impl DeleteReport {
    pub fn is_success(&self) -> bool {
        self.entries.iter().all(|e| e.outcome.is_success())
    }

    pub fn failures(&self) -> impl Iterator<Item = &DeleteEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, DeleteOutcome::Failed { .. }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusState {
    Remote(RemoteState),
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub resource_id: ResourceId,
    pub origin: TargetOrigin,
    pub state: StatusState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub prefix: Prefix,
    pub entries: Vec<StatusEntry>,
}

impl StatusReport {
    pub fn is_success(&self) -> bool {
        self.entries
            .iter()
            .all(|e| matches!(e.state, StatusState::Remote(_)))
    }

    pub fn active(&self) -> impl Iterator<Item = &StatusEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.state, StatusState::Remote(RemoteState::Active { .. })))
    }
}

// ── Display ──

impl fmt::Display for DeployReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            let (tag, detail) = match &entry.outcome {
                DeployOutcome::Deployed { url: Some(url) } => ("OK", url.as_str()),
                DeployOutcome::Deployed { url: None } => ("OK", ""),
                DeployOutcome::Failed { error } => ("FAIL", error.as_str()),
                DeployOutcome::Skipped => ("SKIP", "not attempted"),
            };
            writeln!(f, "  [{tag:<4}] {:<40} {detail}", entry.resource_id)?;
        }
        Ok(())
    }
}

impl fmt::Display for DeleteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            let (tag, detail) = match &entry.outcome {
                DeleteOutcome::Deleted => ("OK", "deleted"),
                DeleteOutcome::AlreadyAbsent => ("OK", "already absent"),
                DeleteOutcome::Failed { error } => ("FAIL", error.as_str()),
                DeleteOutcome::Skipped => ("SKIP", "not attempted"),
            };
            writeln!(
                f,
                "  [{tag:<4}] {:<40} {detail}{}",
                entry.resource_id,
                origin_note(entry.origin)
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            let detail = match &entry.state {
                StatusState::Remote(RemoteState::Active { url: Some(url) }) => {
                    format!("ACTIVE {url}")
                }
                StatusState::Remote(RemoteState::Active { url: None }) => "ACTIVE".to_owned(),
                StatusState::Remote(RemoteState::Absent) => "ABSENT".to_owned(),
                StatusState::Remote(RemoteState::Other { state }) => state.clone(),
                StatusState::Failed { error } => format!("ERROR {error}"),
            };
            writeln!(
                f,
                "  {:<40} {}{}",
                entry.resource_id,
                detail.trim_end(),
                origin_note(entry.origin)
            )?;
        }
        Ok(())
    }
}

fn origin_note(origin: TargetOrigin) -> &'static str {
    match origin {
        TargetOrigin::Declared => "",
        TargetOrigin::ManifestOnly => " (no longer declared)",
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("invalid function descriptor")]
    Descriptor(#[from] fnstage_core::Error),

    #[error("failed to update deploy manifest")]
    Manifest { source: fnstage_core::Error },

    #[error("remote operations aborted")]
    Submission { source: FunctionError },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ResourceId {
        ResourceId::parse(s).unwrap()
    }

    #[test]
    fn error_chain_joins_sources() {
        let err = FunctionError::Unavailable {
            source: crate::gcloud::GcloudError::NotFound {
                program: "gcloud".to_owned(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            },
        };
        let chain = error_chain(&err);
        assert!(chain.starts_with("gcloud is unavailable: "));
        assert!(chain.ends_with("no such file"));
    }

    #[test]
    fn delete_report_marks_manifest_only_entries() {
        let report = DeleteReport {
            prefix: Prefix::new("dev").unwrap(),
            entries: vec![
                DeleteEntry {
                    resource_id: id("dev-a"),
                    origin: TargetOrigin::Declared,
                    outcome: DeleteOutcome::Deleted,
                },
                DeleteEntry {
                    resource_id: id("dev-old"),
                    origin: TargetOrigin::ManifestOnly,
                    outcome: DeleteOutcome::AlreadyAbsent,
                },
            ],
        };
        let text = report.to_string();
        assert!(text.contains("dev-a"));
        assert!(text.contains("already absent (no longer declared)"));
        assert!(report.is_success());
    }

    #[test]
    fn skipped_deploy_is_not_success() {
        let report = DeployReport {
            prefix: Prefix::new("dev").unwrap(),
            entries: vec![DeployEntry {
                local_name: "a".to_owned(),
                resource_id: id("dev-a"),
                outcome: DeployOutcome::Skipped,
            }],
        };
        assert!(!report.is_success());
        assert_eq!(report.failures().count(), 0);
        assert!(report.to_string().contains("[SKIP]"));
    }
}
