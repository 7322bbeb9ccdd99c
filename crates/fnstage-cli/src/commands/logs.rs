use std::path::PathBuf;

use fnstage_cloud::GcloudClient;
use fnstage_core::{FnstageConfig, Prefix, ResourceId};

use super::require_gcp_project_id;

pub async fn logs(prefix: &Prefix, function: &str, limit: u32) -> anyhow::Result<()> {
    let config = FnstageConfig::load(&PathBuf::from("."))?;
    let project_id = require_gcp_project_id(&config)?;
    let name = ResourceId::derive(prefix, function)?;

    let client = GcloudClient::new();
    client
        .read_logs(name.as_str(), project_id, &config.project.region, limit)
        .await?;

    Ok(())
}
