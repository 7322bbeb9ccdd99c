use std::path::{Path, PathBuf};

use fnstage_build::{BuildKind, CloudBuildGenerator, CloudBuildSpec, bundle, eject as eject_mod};
use fnstage_cloud::{GcloudClient, GcloudFunctions, Lifecycle, LifecycleOptions};
use fnstage_core::{
    FnstageConfig, FunctionDescriptor, ManifestEntry, ManifestStore, Prefix,
};

use super::{preflight, prefix_substitutions, require_gcp_project_id};

/// Deploy every declared function under `prefix`.
pub async fn deploy(
    prefix: &Prefix,
    cloud_build: bool,
    allow_dirty: bool,
    fail_fast: bool,
) -> anyhow::Result<()> {
    let project_dir = PathBuf::from(".");
    let config = FnstageConfig::load(&project_dir)?;
    let descriptors = config.descriptors()?;
    let gcp_project_id = require_gcp_project_id(&config)?;

    if cloud_build {
        return deploy_with_cloud_build(
            &project_dir,
            &config,
            &descriptors,
            prefix,
            allow_dirty,
            fail_fast,
        )
        .await;
    }

    let platform = GcloudFunctions::new(
        GcloudClient::new(),
        gcp_project_id,
        &config.project.region,
        &project_dir,
    );
    preflight(platform.client(), gcp_project_id, config.uses_gen2()).await?;

    let mut options = LifecycleOptions::from(&config.deploy);
    options.fail_fast |= fail_fast;
    let lifecycle = Lifecycle::new(&platform, options).with_manifests(
        ManifestStore::in_project(&project_dir),
        Some(gcp_project_id.to_owned()),
        &config.project.region,
    );

    println!(
        "Deploying {} function(s) under prefix '{prefix}' ({})...",
        descriptors.len(),
        config.project.region
    );
    let report = lifecycle.deploy(&descriptors, prefix).await?;

    println!();
    print!("{report}");

    let failed = report.failures().count();
    if failed > 0 {
        anyhow::bail!("{failed} of {} function(s) failed to deploy", report.entries.len());
    }
    if !report.is_success() {
        anyhow::bail!("deploy stopped early");
    }
    Ok(())
}

async fn deploy_with_cloud_build(
    project_dir: &Path,
    config: &FnstageConfig,
    descriptors: &[FunctionDescriptor],
    prefix: &Prefix,
    allow_dirty: bool,
    fail_fast: bool,
) -> anyhow::Result<()> {
    // The bundle is built from git; refuse uncommitted changes unless --allow-dirty
    if !allow_dirty && bundle::is_dirty(project_dir)? {
        anyhow::bail!(
            "uncommitted changes detected.\n\
             Commit your changes, or use `fnstage deploy --cloud-build --allow-dirty` to deploy anyway."
        );
    }

    let gcp_project_id = require_gcp_project_id(config)?;
    config.validate_substitutions()?;

    let client = GcloudClient::new();
    preflight(&client, gcp_project_id, config.uses_gen2()).await?;

    let yaml = if eject_mod::is_ejected(project_dir, BuildKind::Deploy) {
        println!("Using ejected build config from .fnstage/cloudbuild.yaml");
        eject_mod::load_ejected(project_dir, BuildKind::Deploy)?
    } else {
        CloudBuildGenerator::new(config, descriptors)
            .fail_fast(fail_fast)
            .deploy()
            .to_yaml()?
    };

    // Unbound user variables fail here rather than in the build.
    let substitutions = prefix_substitutions(prefix);
    CloudBuildSpec::from_yaml(&yaml)?.resolve(&substitutions)?;

    println!("Bundling source...");
    let bundle_dir = bundle::create_bundle(project_dir, &yaml, descriptors)?;

    println!("Submitting build to Cloud Build (prefix '{prefix}')...");
    client
        .submit_build(
            &bundle_dir.join(BuildKind::Deploy.file_name()),
            Some(&bundle_dir),
            gcp_project_id,
            &substitutions,
        )
        .await?;

    // The build fails as a whole, so reaching here means every step succeeded.
    let store = ManifestStore::in_project(project_dir);
    let mut manifest = store.load_or_new(
        prefix,
        Some(gcp_project_id.to_owned()),
        &config.project.region,
    )?;
    for d in descriptors {
        manifest.record(ManifestEntry::new(d.resource_id(prefix)?, None));
    }
    store.save(&manifest)?;

    println!();
    println!(
        "Deployed {} function(s) under prefix '{prefix}' via Cloud Build.",
        descriptors.len()
    );
    Ok(())
}
