use std::path::{Path, PathBuf};

use fnstage_build::{BuildKind, CloudBuildGenerator, CloudBuildSpec, bundle, eject as eject_mod};
use fnstage_cloud::{GcloudClient, GcloudFunctions, Lifecycle, LifecycleOptions};
use fnstage_core::config::CONFIG_FILE;
use fnstage_core::{
    FnstageConfig, FunctionDescriptor, ManifestStore, Prefix, TargetOrigin, lifecycle_targets,
};

use super::{confirm, declared_or_empty, preflight, prefix_substitutions, require_gcp_project_id};

/// Delete every function that lives under `prefix`.
///
/// Targets are the declared functions plus anything the local manifest
/// recorded for the prefix. Source directories are never touched.
pub async fn delete(prefix: &Prefix, cloud_build: bool, skip_confirm: bool) -> anyhow::Result<()> {
    let project_dir = PathBuf::from(".");
    let config = FnstageConfig::load(&project_dir)?;
    let descriptors = declared_or_empty(&config)?;
    let gcp_project_id = require_gcp_project_id(&config)?;
    let region = &config.project.region;

    let store = ManifestStore::in_project(&project_dir);
    let manifest = store.load(prefix)?;
    let targets = lifecycle_targets(&descriptors, prefix, manifest.as_ref())?;

    if targets.is_empty() {
        println!("Nothing to delete under prefix '{prefix}'.");
        return Ok(());
    }

    // A build with no steps is rejected; manifest-only ids need the direct path.
    if cloud_build && descriptors.is_empty() {
        anyhow::bail!(
            "no functions declared in {CONFIG_FILE}, so the delete build would have no steps.\n\
             {} function(s) recorded for '{prefix}' can be deleted with: fnstage delete --prefix {prefix}",
            targets.len()
        );
    }

    if !skip_confirm {
        println!("This will delete from project '{gcp_project_id}' ({region}):");
        for t in &targets {
            let note = match t.origin {
                TargetOrigin::Declared => "",
                TargetOrigin::ManifestOnly => " (no longer declared)",
            };
            println!("  - {}{note}", t.resource_id);
        }
        println!();
        if !confirm("Are you sure?")? {
            println!("Aborted.");
            return Ok(());
        }
    }

    if cloud_build {
        return delete_with_cloud_build(&project_dir, &config, &descriptors, prefix).await;
    }

    let platform = GcloudFunctions::new(GcloudClient::new(), gcp_project_id, region, &project_dir);
    preflight(platform.client(), gcp_project_id, config.uses_gen2()).await?;

    let lifecycle = Lifecycle::new(&platform, LifecycleOptions::from(&config.deploy))
        .with_manifests(store, Some(gcp_project_id.to_owned()), region);

    println!("Deleting {} function(s) under prefix '{prefix}'...", targets.len());
    let report = lifecycle.delete(&descriptors, prefix).await?;

    println!();
    print!("{report}");

    let failed = report.failures().count();
    if failed > 0 {
        anyhow::bail!("{failed} of {} function(s) failed to delete", report.entries.len());
    }
    if !report.is_success() {
        anyhow::bail!("delete stopped early");
    }

    // Leftover bundle from a Cloud Build deploy
    let bundle_dir = project_dir.join(bundle::BUNDLE_DIR);
    if bundle_dir.exists() {
        std::fs::remove_dir_all(&bundle_dir)?;
        println!("Removed local {}/", bundle::BUNDLE_DIR);
    }

    Ok(())
}

async fn delete_with_cloud_build(
    project_dir: &Path,
    config: &FnstageConfig,
    descriptors: &[FunctionDescriptor],
    prefix: &Prefix,
) -> anyhow::Result<()> {
    let gcp_project_id = require_gcp_project_id(config)?;
    config.validate_substitutions()?;

    let client = GcloudClient::new();
    preflight(&client, gcp_project_id, config.uses_gen2()).await?;

    let config_path = if eject_mod::is_ejected(project_dir, BuildKind::Delete) {
        println!("Using ejected build config from .fnstage/cloudbuild-delete.yaml");
        eject_mod::ejected_path(project_dir, BuildKind::Delete)
    } else {
        let yaml = CloudBuildGenerator::new(config, descriptors)
            .delete()
            .to_yaml()?;
        bundle::write_generated_config(project_dir, BuildKind::Delete, &yaml)?
    };

    let yaml = std::fs::read_to_string(&config_path)?;
    let substitutions = prefix_substitutions(prefix);
    CloudBuildSpec::from_yaml(&yaml)?.resolve(&substitutions)?;

    println!("Submitting delete build to Cloud Build (prefix '{prefix}')...");
    client
        .submit_build(&config_path, None, gcp_project_id, &substitutions)
        .await?;

    // Only declared functions have steps; manifest-only ones stay recorded.
    let store = ManifestStore::in_project(project_dir);
    if let Some(mut manifest) = store.load(prefix)? {
        for d in descriptors {
            manifest.forget(&d.resource_id(prefix)?);
        }
        if !manifest.is_empty() {
            println!(
                "Note: {} function(s) recorded for '{prefix}' are no longer declared.",
                manifest.resources.len()
            );
            println!("  To delete them: fnstage delete --prefix {prefix}");
        }
        store.save(&manifest)?;
    }

    println!();
    println!("Deleted functions under prefix '{prefix}' via Cloud Build.");
    Ok(())
}
