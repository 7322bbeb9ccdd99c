use std::path::Path;

use fnstage_core::ManifestStore;

/// Prefixes this checkout has deployed, from the local manifests.
pub async fn list() -> anyhow::Result<()> {
    let store = ManifestStore::in_project(Path::new("."));
    let prefixes = store.list()?;

    if prefixes.is_empty() {
        println!("No deployed prefixes recorded in {}.", store.dir().display());
        return Ok(());
    }

    for prefix in &prefixes {
        let Some(manifest) = store.load(prefix)? else {
            continue;
        };
        let project = match &manifest.gcp_project_id {
            Some(id) => id.as_str(),
            None => "-",
        };
        println!(
            "{prefix:<20} {:>3} function(s)  {project} ({})",
            manifest.resources.len(),
            manifest.region
        );
    }
    Ok(())
}
