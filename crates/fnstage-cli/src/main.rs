mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use fnstage_build::BuildKind;
use fnstage_core::Prefix;

#[derive(Parser)]
#[command(
    name = "fnstage",
    about = "Deploy and delete prefixed groups of HTTP Cloud Functions"
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create fnstage.toml and .env.example in the current directory
    Init,
    /// Deploy every declared function as <prefix>-<name>
    Deploy {
        /// Stage prefix (lowercase letters and digits)
        #[arg(long, env = "FNSTAGE_PREFIX")]
        prefix: Prefix,
        /// Deploy through Cloud Build instead of calling gcloud locally
        #[arg(long)]
        cloud_build: bool,
        /// With --cloud-build, bundle even with uncommitted changes
        #[arg(long)]
        allow_dirty: bool,
        /// Stop after the first failed function
        #[arg(long)]
        fail_fast: bool,
    },
    /// Delete every function deployed under a prefix
    Delete {
        /// Stage prefix (lowercase letters and digits)
        #[arg(long, env = "FNSTAGE_PREFIX")]
        prefix: Prefix,
        /// Delete through Cloud Build instead of calling gcloud locally
        #[arg(long)]
        cloud_build: bool,
        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Show the remote state of every function under a prefix
    Status {
        #[arg(long, env = "FNSTAGE_PREFIX")]
        prefix: Prefix,
    },
    /// List prefixes deployed from this checkout
    List,
    /// Print the Cloud Build config
    Render {
        #[arg(value_enum)]
        kind: RenderKind,
        /// Resolve ${_PREFIX} for this prefix instead of printing the template
        #[arg(long, env = "FNSTAGE_PREFIX")]
        prefix: Option<Prefix>,
    },
    /// Eject Cloud Build configs to .fnstage/ for manual customization
    Eject,
    /// Check GCP setup and readiness
    Doctor,
    /// Read logs of one function under a prefix
    Logs {
        #[arg(long, env = "FNSTAGE_PREFIX")]
        prefix: Prefix,
        /// Function name as declared in fnstage.toml
        function: String,
        /// Number of log entries to show
        #[arg(long, short = 'n', default_value_t = 100)]
        limit: u32,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum RenderKind {
    Deploy,
    Delete,
}

impl From<RenderKind> for BuildKind {
    fn from(kind: RenderKind) -> Self {
        match kind {
            RenderKind::Deploy => BuildKind::Deploy,
            RenderKind::Delete => BuildKind::Delete,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Before parsing, so FNSTAGE_PREFIX and RUST_LOG can come from .env.
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    match dotenv {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
        // arch-lint: allow(no-error-swallowing) reason=".env is optional"
        Err(e) if e.not_found() => tracing::debug!("no .env file"),
        // arch-lint: allow(no-error-swallowing) reason="an unreadable .env falls back to the process environment"
        Err(e) => tracing::warn!(error = %e, "ignoring unreadable .env"),
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => commands::init_project().await?,
        Commands::Deploy {
            prefix,
            cloud_build,
            allow_dirty,
            fail_fast,
        } => commands::deploy(&prefix, cloud_build, allow_dirty, fail_fast).await?,
        Commands::Delete {
            prefix,
            cloud_build,
            yes,
        } => commands::delete(&prefix, cloud_build, yes).await?,
        Commands::Status { prefix } => commands::status(&prefix).await?,
        Commands::List => commands::list().await?,
        Commands::Render { kind, prefix } => commands::render(kind.into(), prefix.as_ref()).await?,
        Commands::Eject => commands::eject().await?,
        Commands::Doctor => commands::doctor().await?,
        Commands::Logs {
            prefix,
            function,
            limit,
        } => commands::logs(&prefix, &function, limit).await?,
    }

    Ok(())
}
