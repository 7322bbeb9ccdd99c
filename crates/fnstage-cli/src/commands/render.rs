use std::path::PathBuf;

use fnstage_build::{BuildKind, CloudBuildGenerator, CloudBuildSpec, eject as eject_mod};
use fnstage_core::{FnstageConfig, Prefix};

use super::prefix_substitutions;

/// Print the build config `deploy --cloud-build` or `delete --cloud-build`
/// would submit. With a prefix, `${_PREFIX}` is resolved.
pub async fn render(kind: BuildKind, prefix: Option<&Prefix>) -> anyhow::Result<()> {
    let project_dir = PathBuf::from(".");
    let config = FnstageConfig::load(&project_dir)?;
    config.validate_substitutions()?;

    let spec = if eject_mod::is_ejected(&project_dir, kind) {
        CloudBuildSpec::from_yaml(&eject_mod::load_ejected(&project_dir, kind)?)?
    } else {
        let descriptors = config.descriptors()?;
        CloudBuildGenerator::new(&config, &descriptors).generate(kind)
    };

    let spec = match prefix {
        Some(prefix) => spec.resolve(&prefix_substitutions(prefix))?,
        None => spec,
    };

    print!("{}", spec.to_yaml()?);
    Ok(())
}
