use std::path::Path;

use fnstage_cloud::{CheckResult, GcloudClient};
use fnstage_core::FnstageConfig;
use fnstage_core::config::CONFIG_FILE;

pub async fn doctor() -> anyhow::Result<()> {
    let config = FnstageConfig::load(Path::new("."));
    let loaded = config
        .as_ref()
        // arch-lint: allow(no-silent-result-drop) reason="doctor must report diagnostics even when fnstage.toml is missing or invalid"
        .ok();
    let project_id = loaded.and_then(|c| c.project.gcp_project_id.as_deref());
    let gen2 = loaded.is_some_and(|c| c.uses_gen2());

    let client = GcloudClient::new();
    let mut report = client.doctor(project_id, gen2).await;

    report.config_file = match &config {
        Ok(_) if !Path::new(CONFIG_FILE).exists() => CheckResult::fail("Not found"),
        Ok(c) => match c.descriptors() {
            Ok(d) => CheckResult::ok(&format!("{} function(s)", d.len())),
            Err(e) => CheckResult::fail(&e.to_string()),
        },
        Err(e) => CheckResult::fail(&e.to_string()),
    };

    println!();
    println!("{report}");

    if !report.all_passed() {
        anyhow::bail!("some checks failed — see above for details");
    }

    Ok(())
}
