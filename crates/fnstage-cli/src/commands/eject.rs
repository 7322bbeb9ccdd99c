use std::path::PathBuf;

use fnstage_build::CloudBuildGenerator;
use fnstage_core::FnstageConfig;

pub async fn eject() -> anyhow::Result<()> {
    let project_dir = PathBuf::from(".");
    let config = FnstageConfig::load(&project_dir)?;
    config.validate_substitutions()?;
    let descriptors = config.descriptors()?;

    let generator = CloudBuildGenerator::new(&config, &descriptors);
    let deploy = generator.deploy().to_yaml()?;
    let delete = generator.delete().to_yaml()?;

    fnstage_build::eject::eject(&project_dir, &deploy, &delete)?;

    println!("Ejected build configs to .fnstage/cloudbuild.yaml and .fnstage/cloudbuild-delete.yaml");
    println!("You can now edit them directly. --cloud-build deploys and deletes will use these files.");
    Ok(())
}
