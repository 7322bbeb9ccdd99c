use std::path::PathBuf;

use fnstage_cloud::{GcloudClient, GcloudFunctions, Lifecycle, LifecycleOptions};
use fnstage_core::{FnstageConfig, ManifestStore, Prefix};

use super::{declared_or_empty, require_gcp_project_id};

pub async fn status(prefix: &Prefix) -> anyhow::Result<()> {
    let project_dir = PathBuf::from(".");
    let config = FnstageConfig::load(&project_dir)?;
    let descriptors = declared_or_empty(&config)?;
    let gcp_project_id = require_gcp_project_id(&config)?;
    let region = &config.project.region;

    let platform = GcloudFunctions::new(GcloudClient::new(), gcp_project_id, region, &project_dir);
    let lifecycle = Lifecycle::new(&platform, LifecycleOptions::from(&config.deploy))
        .with_manifests(
            ManifestStore::in_project(&project_dir),
            Some(gcp_project_id.to_owned()),
            region,
        );

    let report = lifecycle.status(&descriptors, prefix).await?;
    if report.entries.is_empty() {
        println!("No functions declared or recorded under prefix '{prefix}'.");
        return Ok(());
    }

    println!("Prefix '{prefix}' in {gcp_project_id} ({region}):");
    print!("{report}");
    Ok(())
}
