use std::collections::{BTreeMap, HashSet};
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::descriptor::{FunctionDescriptor, TriggerKind, validate_local_name};

/// Config file name looked up in the project directory.
pub const CONFIG_FILE: &str = "fnstage.toml";

/// fnstage.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FnstageConfig {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub defaults: FunctionDefaults,
    #[serde(default)]
    pub deploy: DeployConfig,
    #[serde(default)]
    pub cloud_build: CloudBuildConfig,
    #[serde(default)]
    pub functions: Vec<FunctionSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// GCP project ID
    pub gcp_project_id: Option<String>,
    /// GCP region (defaults to us-central1)
    #[serde(default = "default_region")]
    pub region: String,
}

/// Values applied to every `[[functions]]` entry that does not set its own.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionDefaults {
    pub runtime: Option<String>,
    pub memory: Option<String>,
    pub timeout: Option<String>,
    /// Deploy as 2nd gen functions (`--gen2`)
    #[serde(default)]
    pub gen2: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Upper bound on concurrent per-function calls
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
    /// Stop issuing calls after the first failed function
    #[serde(default)]
    pub fail_fast: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudBuildConfig {
    /// Builder image that runs the gcloud steps
    #[serde(default = "default_builder_image")]
    pub builder_image: String,
    /// Extra user substitutions passed to every build (keys start with `_`)
    #[serde(default)]
    pub substitutions: BTreeMap<String, String>,
}

/// A `[[functions]]` entry as written in fnstage.toml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    /// Exported symbol to invoke (defaults to `name`)
    pub entry_point: Option<String>,
    /// Source directory relative to the project root
    pub source: PathBuf,
    #[serde(default)]
    pub trigger: TriggerKind,
    pub runtime: Option<String>,
    pub memory: Option<String>,
    pub timeout: Option<String>,
    pub gen2: Option<bool>,
}

impl FunctionSpec {
    /// Per-function `gen2`, else the `[defaults]` value.
    fn resolved_gen2(&self, defaults: &FunctionDefaults) -> bool {
        match self.gen2 {
            Some(gen2) => gen2,
            None => defaults.gen2,
        }
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            gcp_project_id: None,
            region: default_region(),
        }
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
            fail_fast: false,
        }
    }
}

impl Default for CloudBuildConfig {
    fn default() -> Self {
        Self {
            builder_image: default_builder_image(),
            substitutions: BTreeMap::new(),
        }
    }
}

impl FnstageConfig {
    /// Load from fnstage.toml at the given path, or return defaults if not found.
    pub fn load(project_dir: &Path) -> crate::Result<Self> {
        let config_path = project_dir.join(CONFIG_FILE);
        if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).map_err(|e| crate::Error::ConfigLoad {
                    path: config_path.clone(),
                    source: e,
                })?;
            let config: Self = toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
                path: config_path.clone(),
                source: e,
            })?;
            tracing::debug!(
                path = %config_path.display(),
                functions = config.functions.len(),
                "loaded config",
            );
            Ok(config)
        } else {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Resolve `[[functions]]` against `[defaults]` and validate them.
    ///
    /// Declaration order is preserved.
    pub fn descriptors(&self) -> crate::Result<Vec<FunctionDescriptor>> {
        if self.functions.is_empty() {
            return Err(crate::Error::NoFunctions);
        }

        let mut seen = HashSet::new();
        let mut descriptors = Vec::with_capacity(self.functions.len());

        for spec in &self.functions {
            validate_local_name(&spec.name)?;
            if !seen.insert(spec.name.as_str()) {
                return Err(crate::Error::DuplicateFunction(spec.name.clone()));
            }
            validate_source_path(&spec.name, &spec.source)?;

            let runtime = spec
                .runtime
                .clone()
                .or_else(|| self.defaults.runtime.clone())
                .ok_or_else(|| crate::Error::MissingRuntime(spec.name.clone()))?;

            descriptors.push(FunctionDescriptor {
                local_name: spec.name.clone(),
                entry_point: match &spec.entry_point {
                    Some(entry_point) => entry_point.clone(),
                    None => spec.name.clone(),
                },
                runtime,
                trigger: spec.trigger,
                source: spec.source.clone(),
                memory: spec.memory.clone().or_else(|| self.defaults.memory.clone()),
                timeout: spec.timeout.clone().or_else(|| self.defaults.timeout.clone()),
                gen2: spec.resolved_gen2(&self.defaults),
            });
        }

        Ok(descriptors)
    }

    /// Check that user substitution keys follow Cloud Build's `_NAME` rule.
    pub fn validate_substitutions(&self) -> crate::Result<()> {
        match self
            .cloud_build
            .substitutions
            .keys()
            .find(|k| !k.starts_with('_') || k.len() < 2)
        {
            Some(key) => Err(crate::Error::InvalidSubstitutionKey { key: key.clone() }),
            None => Ok(()),
        }
    }

    /// Whether any declared function deploys as 2nd gen.
    pub fn uses_gen2(&self) -> bool {
        self.functions
            .iter()
            .any(|f| f.resolved_gen2(&self.defaults))
    }
}

/// Source directories must stay inside the project: the build-service path
/// uses them as step working directories inside the uploaded bundle.
fn validate_source_path(function: &str, path: &Path) -> crate::Result<()> {
    let invalid = |reason| crate::Error::InvalidSourcePath {
        function: function.to_owned(),
        path: path.to_path_buf(),
        reason,
    };

    if path.as_os_str().is_empty() {
        return Err(invalid("path must not be empty"));
    }
    if path.is_absolute() {
        return Err(invalid("path must be relative to the project root"));
    }
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(invalid("path must not contain '..'"));
    }
    if path.to_str().is_none() {
        return Err(invalid("path must be valid UTF-8"));
    }
    Ok(())
}

fn default_region() -> String {
    "us-central1".to_owned()
}

fn default_max_parallel() -> usize {
    4
}

fn default_builder_image() -> String {
    "gcr.io/google.com/cloudsdktool/cloud-sdk".to_owned()
}
