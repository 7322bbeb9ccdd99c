use std::collections::{BTreeMap, BTreeSet};

use fnstage_core::{FnstageConfig, FunctionDescriptor};
use serde::{Deserialize, Serialize};

use crate::substitute::{self, SubstitutionError, Substitutions};

/// Substitution variable carrying the stage prefix.
pub const PREFIX_VAR: &str = "_PREFIX";

/// Which half of the lifecycle a build config performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildKind {
    Deploy,
    Delete,
}

impl BuildKind {
    /// File name used for the ejected / bundled config.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Deploy => "cloudbuild.yaml",
            Self::Delete => "cloudbuild-delete.yaml",
        }
    }
}

/// A Cloud Build config: ordered steps plus default substitutions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudBuildSpec {
    pub steps: Vec<BuildStep>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub substitutions: Substitutions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<BuildOptions>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStep {
    /// Builder image
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory relative to the uploaded source root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    #[serde(
        rename = "waitFor",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub wait_for: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOptions {
    #[serde(
        rename = "substitutionOption",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub substitution_option: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<String>,
}

impl CloudBuildSpec {
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Apply substitutions to every step.
    ///
    /// `overrides` take precedence over the config's own `substitutions`.
    /// The returned spec carries no substitutions of its own.
    pub fn resolve(&self, overrides: &Substitutions) -> Result<Self, SubstitutionError> {
        let mut vars = self.substitutions.clone();
        vars.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));

        let steps = self
            .steps
            .iter()
            .map(|step| -> Result<BuildStep, SubstitutionError> {
                Ok(BuildStep {
                    args: step
                        .args
                        .iter()
                        .map(|a| substitute::substitute(a, &vars))
                        .collect::<Result<_, _>>()?,
                    dir: step
                        .dir
                        .as_deref()
                        .map(|d| substitute::substitute(d, &vars))
                        .transpose()?,
                    ..step.clone()
                })
            })
            .collect::<Result<_, _>>()?;

        Ok(Self {
            steps,
            substitutions: Substitutions::new(),
            options: self.options.clone(),
        })
    }

    /// User variables (`_NAME`) referenced by any step.
    pub fn user_variables(&self) -> Result<BTreeSet<String>, SubstitutionError> {
        let mut names = BTreeSet::new();
        for step in &self.steps {
            for text in step.args.iter().chain(step.dir.iter()) {
                names.extend(substitute::user_variables(text)?);
            }
        }
        Ok(names)
    }
}

/// Generates deploy and delete build configs for a function group.
pub struct CloudBuildGenerator<'a> {
    config: &'a FnstageConfig,
    descriptors: &'a [FunctionDescriptor],
    fail_fast: bool,
}

impl<'a> CloudBuildGenerator<'a> {
    pub fn new(config: &'a FnstageConfig, descriptors: &'a [FunctionDescriptor]) -> Self {
        Self {
            config,
            descriptors,
            fail_fast: config.deploy.fail_fast,
        }
    }

    /// Run steps one after another so the first failure stops the build.
    /// Adds to `[deploy].fail_fast`; it never turns it off.
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast |= fail_fast;
        self
    }

    pub fn generate(&self, kind: BuildKind) -> CloudBuildSpec {
        match kind {
            BuildKind::Deploy => self.deploy(),
            BuildKind::Delete => self.delete(),
        }
    }

    /// One `gcloud functions deploy ${_PREFIX}-<name>` step per function,
    /// run from the function's source directory.
    pub fn deploy(&self) -> CloudBuildSpec {
        let steps = self
            .descriptors
            .iter()
            .map(|d| {
                let mut args = vec![
                    "functions".to_owned(),
                    "deploy".to_owned(),
                    remote_name(d),
                    "--source".to_owned(),
                    ".".to_owned(),
                    "--region".to_owned(),
                    self.config.project.region.clone(),
                ];
                args.extend(d.gcloud_deploy_flags());
                args.push("--quiet".to_owned());
                self.step(
                    d,
                    "gcloud",
                    args,
                    Some(d.source.to_string_lossy().into_owned()),
                )
            })
            .collect();

        self.spec(steps)
    }

    /// One step per function deleting `${_PREFIX}-<name>` when it exists.
    /// Steps carry no working directory; the build runs without source.
    pub fn delete(&self) -> CloudBuildSpec {
        let steps = self
            .descriptors
            .iter()
            .map(|d| {
                let args = vec!["-c".to_owned(), self.delete_script(d)];
                self.step(d, "bash", args, None)
            })
            .collect();

        self.spec(steps)
    }

    /// Describe first, then delete. A describe failure naming the function
    /// as missing counts as already absent; any other failure (unknown
    /// region, permissions) fails the step. `$$` keeps shell variables away
    /// from substitution.
    fn delete_script(&self, d: &FunctionDescriptor) -> String {
        let name = remote_name(d);
        let mut scope = format!("--region {}", self.config.project.region);
        if d.gen2 {
            scope.push_str(" --gen2");
        }
        [
            format!(
                "if out=$$(gcloud functions describe {name} {scope} --format 'value(name)' 2>&1); then"
            ),
            format!("  gcloud functions delete {name} {scope} --quiet"),
            format!(
                "elif echo \"$$out\" | grep -Eq \"NOT_FOUND|does not exist\" && \
                 echo \"$$out\" | grep -Eq \"functions/{name}'|Function {name} \"; then"
            ),
            format!("  echo \"{name} already absent\""),
            "else".to_owned(),
            "  echo \"$$out\" >&2".to_owned(),
            "  exit 1".to_owned(),
            "fi".to_owned(),
        ]
        .join("\n")
    }

    fn step(
        &self,
        d: &FunctionDescriptor,
        entrypoint: &str,
        args: Vec<String>,
        dir: Option<String>,
    ) -> BuildStep {
        BuildStep {
            name: self.config.cloud_build.builder_image.clone(),
            id: Some(d.local_name.clone()),
            entrypoint: Some(entrypoint.to_owned()),
            args,
            dir,
            // Independent steps start together unless a failure must stop the rest.
            wait_for: if self.fail_fast {
                Vec::new()
            } else {
                vec!["-".to_owned()]
            },
        }
    }

    fn spec(&self, steps: Vec<BuildStep>) -> CloudBuildSpec {
        let mut substitutions = self.config.cloud_build.substitutions.clone();
        substitutions.remove(PREFIX_VAR);
        CloudBuildSpec {
            steps,
            substitutions,
            options: None,
        }
    }
}

fn remote_name(d: &FunctionDescriptor) -> String {
    format!("${{{PREFIX_VAR}}}-{}", d.local_name)
}
