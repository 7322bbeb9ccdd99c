use std::process::Stdio;

use crate::gcloud::GcloudError;

/// Environment variable overriding the gcloud binary.
pub const GCLOUD_ENV: &str = "FNSTAGE_GCLOUD";

const DEFAULT_PROGRAM: &str = "gcloud";

/// Abstraction over gcloud CLI execution for testability.
///
/// Production code uses [`RealExecutor`], tests use mockall-generated mocks.
#[allow(async_fn_in_trait)]
pub trait GcloudExecutor: Send + Sync {
    /// Execute a gcloud command and capture stdout.
    async fn exec(&self, args: &[String]) -> Result<String, GcloudError>;

    /// Execute a gcloud command, streaming output to the terminal.
    async fn exec_streaming(&self, args: &[String]) -> Result<(), GcloudError>;
}

/// Real gcloud CLI executor.
#[derive(Debug, Clone)]
pub struct RealExecutor {
    program: String,
}

impl RealExecutor {
    /// Executor for `$FNSTAGE_GCLOUD`, or `gcloud` from `PATH`.
    pub fn from_env() -> Self {
        let program = match std::env::var(GCLOUD_ENV) {
            Ok(p) if !p.trim().is_empty() => p,
            Ok(_) | Err(std::env::VarError::NotPresent) => DEFAULT_PROGRAM.to_owned(),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring {GCLOUD_ENV}");
                DEFAULT_PROGRAM.to_owned()
            }
        };
        Self::with_program(program)
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn command(&self, args: &[String]) -> tokio::process::Command {
        tracing::debug!(program = %self.program, ?args, "running gcloud");
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(args);
        cmd
    }

    fn not_found(&self, source: std::io::Error) -> GcloudError {
        GcloudError::NotFound {
            program: self.program.clone(),
            source,
        }
    }
}

impl Default for RealExecutor {
    fn default() -> Self {
        Self::from_env()
    }
}

impl GcloudExecutor for RealExecutor {
    async fn exec(&self, args: &[String]) -> Result<String, GcloudError> {
        let output = self
            .command(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| self.not_found(e))?;

        if output.status.success() {
            String::from_utf8(output.stdout).map_err(|e| GcloudError::InvalidUtf8 { source: e })
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            tracing::debug!(status = %output.status, %stderr, "gcloud failed");
            Err(GcloudError::CommandFailed {
                args: args.to_vec(),
                stderr,
            })
        }
    }

    async fn exec_streaming(&self, args: &[String]) -> Result<(), GcloudError> {
        let status = self
            .command(args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| self.not_found(e))?;

        if status.success() {
            Ok(())
        } else {
            Err(GcloudError::CommandFailed {
                args: args.to_vec(),
                stderr: format!("exit code: {status}"),
            })
        }
    }
}
