mod delete;
mod deploy;
mod doctor;
mod eject;
mod init;
mod list;
mod logs;
mod render;
mod status;

use std::collections::BTreeMap;
use std::io::Write;

use fnstage_build::PREFIX_VAR;
use fnstage_cloud::{GcloudClient, GcloudExecutor};
use fnstage_core::{FnstageConfig, FunctionDescriptor, Prefix};

pub use delete::delete;
pub use deploy::deploy;
pub use doctor::doctor;
pub use eject::eject;
pub use init::init_project;
pub use list::list;
pub use logs::logs;
pub use render::render;
pub use status::status;

fn require_gcp_project_id(config: &FnstageConfig) -> anyhow::Result<&str> {
    config.project.gcp_project_id.as_deref().ok_or_else(|| {
        anyhow::anyhow!("gcp_project_id not set in fnstage.toml — set [project].gcp_project_id")
    })
}

/// Declared functions, or none when fnstage.toml declares nothing.
///
/// Delete and status still reach manifest entries without declarations.
fn declared_or_empty(config: &FnstageConfig) -> anyhow::Result<Vec<FunctionDescriptor>> {
    if config.functions.is_empty() {
        Ok(Vec::new())
    } else {
        Ok(config.descriptors()?)
    }
}

/// The substitutions bound at submission time.
fn prefix_substitutions(prefix: &Prefix) -> BTreeMap<String, String> {
    BTreeMap::from([(PREFIX_VAR.to_owned(), prefix.to_string())])
}

async fn preflight<E: GcloudExecutor>(
    client: &GcloudClient<E>,
    gcp_project_id: &str,
    gen2: bool,
) -> anyhow::Result<()> {
    println!("Running pre-flight checks...");
    let report = client.check_prerequisites(gcp_project_id, gen2).await?;

    if report.has_warnings() {
        println!("Warning: the following APIs are not enabled:");
        for api in &report.disabled_apis {
            println!("  - {api}");
        }
        println!("Enable them with: gcloud services enable <api> --project {gcp_project_id}");
        anyhow::bail!("required APIs not enabled");
    }
    Ok(())
}

/// Ask on stdin; anything but yes aborts.
fn confirm(question: &str) -> anyhow::Result<bool> {
    print!("{question} [y/N] ");
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(matches!(input.trim(), "y" | "Y" | "yes" | "YES"))
}
