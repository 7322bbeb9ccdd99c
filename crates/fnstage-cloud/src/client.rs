use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::executor::{GcloudExecutor, RealExecutor};
use crate::gcloud::GcloudError;

/// APIs every deployment needs.
const BASE_APIS: &[(&str, &str)] = &[
    ("Cloud Functions", "cloudfunctions.googleapis.com"),
    ("Cloud Build", "cloudbuild.googleapis.com"),
];

/// Extra APIs 2nd gen functions run on.
const GEN2_APIS: &[(&str, &str)] = &[
    ("Cloud Run", "run.googleapis.com"),
    ("Artifact Registry", "artifactregistry.googleapis.com"),
];

/// GCP operations client, parameterized over the executor for testability.
pub struct GcloudClient<E: GcloudExecutor = RealExecutor> {
    executor: E,
}

impl GcloudClient<RealExecutor> {
    pub fn new() -> Self {
        Self {
            executor: RealExecutor::from_env(),
        }
    }
}

impl Default for GcloudClient<RealExecutor> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: GcloudExecutor> GcloudClient<E> {
    pub fn with_executor(executor: E) -> Self {
        Self { executor }
    }

    // ── Preflight ──

    pub async fn check_prerequisites(
        &self,
        project_id: &str,
        gen2: bool,
    ) -> Result<PreflightReport, PreflightError> {
        let mut report = PreflightReport::default();

        // 1. gcloud CLI available
        match self
            .executor
            .exec(&args(["version", "--format", "value(version)"]))
            .await
        {
            Ok(version) => report.gcloud_version = Some(version.trim().to_owned()),
            Err(e) => {
                tracing::debug!(error = %e, "gcloud version check failed");
                return Err(PreflightError::GcloudNotInstalled);
            }
        }

        // 2. Authenticated
        match self
            .executor
            .exec(&args(["auth", "print-access-token", "--quiet"]))
            .await
        {
            Ok(_) => report.authenticated = true,
            Err(e) => {
                tracing::debug!(error = %e, "gcloud auth check failed");
                return Err(PreflightError::NotAuthenticated);
            }
        }

        // 3. Project accessible
        match self
            .executor
            .exec(&args([
                "projects",
                "describe",
                project_id,
                "--format",
                "value(name)",
            ]))
            .await
        {
            Ok(name) => report.project_name = Some(name.trim().to_owned()),
            Err(e) => {
                tracing::debug!(error = %e, "project describe failed");
                return Err(PreflightError::ProjectNotAccessible(project_id.to_owned()));
            }
        }

        // 4. Required APIs enabled
        for (_, api) in required_apis(gen2) {
            if !self.api_enabled(project_id, api).await {
                report.disabled_apis.push(api.to_owned());
            }
        }

        Ok(report)
    }

    // ── Doctor ──

    /// Run all diagnostic checks without early return.
    /// Returns a report with pass/fail for each check item.
    pub async fn doctor(&self, project_id: Option<&str>, gen2: bool) -> DoctorReport {
        let mut report = DoctorReport::default();

        // 1. gcloud CLI
        match self.executor.exec(&args(["version"])).await {
            Ok(v) => {
                // "Google Cloud SDK X.Y.Z" on the first line
                let version = match v
                    .lines()
                    .next()
                    .and_then(|line| line.strip_prefix("Google Cloud SDK "))
                {
                    Some(version) => version,
                    None => v.trim(),
                };
                report.gcloud = CheckResult::ok(version.trim());
            }
            Err(e) => report.gcloud = CheckResult::fail(&e.to_string()),
        }

        // 2. Active account
        match self
            .executor
            .exec(&args(["config", "get-value", "account"]))
            .await
        {
            Ok(a) if !a.trim().is_empty() => report.account = CheckResult::ok(a.trim()),
            _ => report.account = CheckResult::fail("no active account"),
        }

        // 3. Project
        let Some(pid) = project_id else {
            report.project = CheckResult::fail("gcp_project_id not set in fnstage.toml");
            return report;
        };

        match self
            .executor
            .exec(&args([
                "projects",
                "describe",
                pid,
                "--format",
                "value(name)",
            ]))
            .await
        {
            Ok(name) => {
                report.project = CheckResult::ok(&format!("{pid} ({name})", name = name.trim()))
            }
            Err(e) => {
                tracing::debug!(error = %e, "project describe failed");
                report.project = CheckResult::fail(&format!("{pid}: not accessible"));
                return report;
            }
        }

        // 4. Required APIs
        for (label, api) in required_apis(gen2) {
            let enabled = self.api_enabled(pid, api).await;
            report.apis.push(ApiCheck {
                name: label.to_owned(),
                result: if enabled {
                    CheckResult::ok("Enabled")
                } else {
                    CheckResult::fail("Not enabled")
                },
            });
        }

        report
    }

    async fn api_enabled(&self, project_id: &str, api: &str) -> bool {
        match self
            .executor
            .exec(&args([
                "services",
                "list",
                "--project",
                project_id,
                "--filter",
                &format!("config.name={api}"),
                "--format",
                "value(config.name)",
            ]))
            .await
        {
            Ok(out) => !out.trim().is_empty(),
            Err(e) => {
                tracing::debug!(api, error = %e, "services list failed");
                false
            }
        }
    }

    // ── Cloud Functions ──

    /// Create or update an HTTP function. Returns the function resource as JSON.
    pub async fn deploy_function(
        &self,
        name: &str,
        source: &Path,
        project_id: &str,
        region: &str,
        flags: &[String],
    ) -> Result<String, FunctionError> {
        let source_str = source.to_str().ok_or_else(|| FunctionError::Source {
            path: source.to_path_buf(),
            reason: "path is not valid UTF-8",
        })?;

        let mut cmd = args([
            "functions",
            "deploy",
            name,
            "--source",
            source_str,
            "--project",
            project_id,
            "--region",
            region,
        ]);
        cmd.extend(flags.iter().cloned());
        cmd.extend(args(["--quiet", "--format", "json"]));

        self.executor
            .exec(&cmd)
            .await
            .map_err(|e| FunctionError::from_gcloud(name, FunctionOp::Deploy, e))
    }

    /// Delete a function. `Ok(false)` when it did not exist.
    pub async fn delete_function(
        &self,
        name: &str,
        project_id: &str,
        region: &str,
    ) -> Result<bool, FunctionError> {
        match self
            .executor
            .exec(&args([
                "functions",
                "delete",
                name,
                "--project",
                project_id,
                "--region",
                region,
                "--quiet",
            ]))
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.is_function_not_found(name) => Ok(false),
            Err(e) => Err(FunctionError::from_gcloud(name, FunctionOp::Delete, e)),
        }
    }

    /// Describe a function as JSON. `Ok(None)` when it does not exist.
    pub async fn describe_function(
        &self,
        name: &str,
        project_id: &str,
        region: &str,
    ) -> Result<Option<String>, FunctionError> {
        match self
            .executor
            .exec(&args([
                "functions",
                "describe",
                name,
                "--project",
                project_id,
                "--region",
                region,
                "--format",
                "json",
            ]))
            .await
        {
            Ok(json) => Ok(Some(json)),
            Err(e) if e.is_function_not_found(name) => Ok(None),
            Err(e) => Err(FunctionError::from_gcloud(name, FunctionOp::Describe, e)),
        }
    }

    pub async fn read_logs(
        &self,
        name: &str,
        project_id: &str,
        region: &str,
        limit: u32,
    ) -> Result<(), FunctionError> {
        let limit = limit.to_string();
        self.executor
            .exec_streaming(&args([
                "functions",
                "logs",
                "read",
                name,
                "--project",
                project_id,
                "--region",
                region,
                "--limit",
                &limit,
            ]))
            .await
            .map_err(|e| FunctionError::from_gcloud(name, FunctionOp::Logs, e))
    }

    // ── Cloud Build ──

    /// Submit a build config with substitutions.
    ///
    /// `source` is the directory to upload; `None` submits with `--no-source`.
    pub async fn submit_build(
        &self,
        config_path: &Path,
        source: Option<&Path>,
        project_id: &str,
        substitutions: &BTreeMap<String, String>,
    ) -> Result<(), CloudBuildError> {
        let config_str = config_path
            .to_str()
            .ok_or_else(|| CloudBuildError::InvalidPath(config_path.to_path_buf()))?;

        let mut cmd = args(["builds", "submit"]);
        match source {
            Some(dir) => {
                let dir_str = dir
                    .to_str()
                    .ok_or_else(|| CloudBuildError::InvalidPath(dir.to_path_buf()))?;
                cmd.push(dir_str.to_owned());
            }
            None => cmd.push("--no-source".to_owned()),
        }
        cmd.extend(args(["--config", config_str, "--project", project_id]));

        if !substitutions.is_empty() {
            let joined = substitutions
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(",");
            cmd.push("--substitutions".to_owned());
            cmd.push(joined);
        }
        cmd.push("--quiet".to_owned());

        self.executor
            .exec_streaming(&cmd)
            .await
            .map_err(|e| CloudBuildError::Submit { source: e })
    }
}

fn required_apis(gen2: bool) -> impl Iterator<Item = (&'static str, &'static str)> {
    BASE_APIS
        .iter()
        .chain(GEN2_APIS.iter().filter(move |_| gen2))
        .copied()
}

// ── Helper ──

fn args<const N: usize>(a: [&str; N]) -> Vec<String> {
    a.iter().map(|s| (*s).to_owned()).collect()
}

// ── Preflight types ──

#[derive(Debug, Default)]
pub struct PreflightReport {
    pub gcloud_version: Option<String>,
    pub authenticated: bool,
    pub project_name: Option<String>,
    pub disabled_apis: Vec<String>,
}

impl PreflightReport {
    pub fn has_warnings(&self) -> bool {
        !self.disabled_apis.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PreflightError {
    #[error("gcloud CLI not installed — https://cloud.google.com/sdk/docs/install")]
    GcloudNotInstalled,

    #[error("not authenticated — run: gcloud auth login")]
    NotAuthenticated,

    #[error("GCP project '{0}' is not accessible — check project ID and permissions")]
    ProjectNotAccessible(String),
}

// ── Doctor types ──

#[derive(Debug, Default)]
pub struct DoctorReport {
    pub gcloud: CheckResult,
    pub account: CheckResult,
    pub project: CheckResult,
    pub apis: Vec<ApiCheck>,
    pub config_file: CheckResult,
}

impl DoctorReport {
    pub fn all_passed(&self) -> bool {
        self.gcloud.passed
            && self.account.passed
            && self.project.passed
            && self.config_file.passed
            && self.apis.iter().all(|a| a.result.passed)
    }
}

impl fmt::Display for DoctorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = [
            ("gcloud CLI", &self.gcloud),
            ("Account", &self.account),
            ("Project", &self.project),
            ("fnstage.toml", &self.config_file),
        ];
        for (label, check) in rows {
            writeln!(f, "  [{}] {label:<20} {}", check.icon(), check.detail)?;
        }
        for api in &self.apis {
            writeln!(
                f,
                "  [{}] {:<20} {}",
                api.result.icon(),
                api.name,
                api.result.detail
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct CheckResult {
    pub passed: bool,
    pub detail: String,
}

impl CheckResult {
    pub fn ok(detail: &str) -> Self {
        Self {
            passed: true,
            detail: detail.to_owned(),
        }
    }

    pub fn fail(detail: &str) -> Self {
        Self {
            passed: false,
            detail: detail.to_owned(),
        }
    }

    pub fn icon(&self) -> &'static str {
        if self.passed { "OK" } else { "NG" }
    }
}

#[derive(Debug, Clone)]
pub struct ApiCheck {
    pub name: String,
    pub result: CheckResult,
}

// ── Error types ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionOp {
    Deploy,
    Delete,
    Describe,
    Logs,
}

impl fmt::Display for FunctionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Deploy => "deploy",
            Self::Delete => "delete",
            Self::Describe => "describe",
            Self::Logs => "read logs for",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FunctionError {
    #[error("cannot package source {path}: {reason}")]
    Source {
        path: PathBuf,
        reason: &'static str,
    },

    #[error("failed to {op} function '{name}'")]
    Command {
        name: String,
        op: FunctionOp,
        source: GcloudError,
    },

    #[error("gcloud is unavailable")]
    Unavailable { source: GcloudError },

    #[error("unexpected gcloud output for function '{name}'")]
    InvalidResponse {
        name: String,
        source: serde_json::Error,
    },
}

impl FunctionError {
    fn from_gcloud(name: &str, op: FunctionOp, source: GcloudError) -> Self {
        if source.is_unavailable() {
            Self::Unavailable { source }
        } else {
            Self::Command {
                name: name.to_owned(),
                op,
                source,
            }
        }
    }

    /// Errors that make every further call pointless.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CloudBuildError {
    #[error("path is not valid UTF-8: {0}")]
    InvalidPath(PathBuf),

    #[error("cloud build submission failed")]
    Submit { source: GcloudError },
}
