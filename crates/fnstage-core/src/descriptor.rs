use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Cloud Functions name length limit.
pub const MAX_RESOURCE_ID_LEN: usize = 63;

/// Longest accepted prefix, leaving room for `-<name>`.
pub const MAX_PREFIX_LEN: usize = 30;

/// How a deployed function is invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    #[default]
    Http,
}

impl TriggerKind {
    /// The `gcloud functions deploy` flag selecting this trigger.
    pub fn gcloud_flag(self) -> &'static str {
        match self {
            Self::Http => "--trigger-http",
        }
    }
}

/// One function's resolved deployment parameters.
///
/// Produced by [`FnstageConfig::descriptors`](crate::FnstageConfig::descriptors)
/// after `[defaults]` have been applied and names validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDescriptor {
    pub local_name: String,
    pub entry_point: String,
    pub runtime: String,
    pub trigger: TriggerKind,
    /// Source directory, relative to the project root.
    pub source: PathBuf,
    pub memory: Option<String>,
    pub timeout: Option<String>,
    pub gen2: bool,
}

impl FunctionDescriptor {
    /// The name this function is deployed under for `prefix`.
    pub fn resource_id(&self, prefix: &Prefix) -> Result<ResourceId> {
        ResourceId::derive(prefix, &self.local_name)
    }

    /// `gcloud functions deploy` flags describing this function.
    ///
    /// Excludes the function name, `--source`, `--region` and `--project`,
    /// which depend on where the command runs.
    pub fn gcloud_deploy_flags(&self) -> Vec<String> {
        let mut flags = vec![
            "--runtime".to_owned(),
            self.runtime.clone(),
            "--entry-point".to_owned(),
            self.entry_point.clone(),
            self.trigger.gcloud_flag().to_owned(),
            "--allow-unauthenticated".to_owned(),
        ];
        if self.gen2 {
            flags.push("--gen2".to_owned());
        }
        if let Some(memory) = &self.memory {
            flags.push("--memory".to_owned());
            flags.push(memory.clone());
        }
        if let Some(timeout) = &self.timeout {
            flags.push("--timeout".to_owned());
            flags.push(timeout.clone());
        }
        flags
    }
}

/// Namespace for one stage of a function group.
///
/// Lowercase ASCII letters and digits only, starting with a letter. Prefixes
/// never contain `-`, so the first `-` of a [`ResourceId`] always marks the
/// end of its prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Prefix(String);

impl Prefix {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        let invalid = |reason| Error::InvalidPrefix {
            prefix: value.clone(),
            reason,
        };

        let Some(first) = value.chars().next() else {
            return Err(invalid("prefix must not be empty"));
        };
        if !first.is_ascii_lowercase() {
            return Err(invalid("must start with a lowercase letter"));
        }
        if value.len() > MAX_PREFIX_LEN {
            return Err(invalid("must be at most 30 characters"));
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(invalid("only lowercase letters and digits are allowed"));
        }

        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Prefix {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for Prefix {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Prefix> for String {
    fn from(prefix: Prefix) -> Self {
        prefix.0
    }
}

/// Validate a function's local name (`[[functions]].name`).
pub fn validate_local_name(name: &str) -> Result<()> {
    let invalid = |reason| Error::InvalidFunctionName {
        name: name.to_owned(),
        reason,
    };

    let Some(first) = name.chars().next() else {
        return Err(invalid("name must not be empty"));
    };
    if !first.is_ascii_lowercase() {
        return Err(invalid("must start with a lowercase letter"));
    }
    if name.ends_with('-') {
        return Err(invalid("must not end with '-'"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(invalid(
            "only lowercase letters, digits and '-' are allowed",
        ));
    }

    Ok(())
}

/// The globally visible name of a deployed function: `<prefix>-<local_name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceId(String);

impl ResourceId {
    pub fn derive(prefix: &Prefix, local_name: &str) -> Result<Self> {
        validate_local_name(local_name)?;
        let id = format!("{prefix}-{local_name}");
        if id.len() > MAX_RESOURCE_ID_LEN {
            return Err(Error::ResourceIdTooLong {
                len: id.len(),
                id,
                max: MAX_RESOURCE_ID_LEN,
            });
        }
        Ok(Self(id))
    }

    /// Parse an existing id back into its parts.
    pub fn parse(id: &str) -> Result<Self> {
        let (prefix, local_name) = id.split_once('-').ok_or_else(|| Error::InvalidResourceId {
            id: id.to_owned(),
            reason: "missing '-' between prefix and function name",
        })?;
        Self::derive(&Prefix::new(prefix)?, local_name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn prefix(&self) -> &str {
        self.split().0
    }

    pub fn local_name(&self) -> &str {
        self.split().1
    }

    fn split(&self) -> (&str, &str) {
        // Both constructors guarantee a '-' separator.
        match self.0.split_once('-') {
            Some(parts) => parts,
            None => (self.0.as_str(), ""),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ResourceId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ResourceId> for String {
    fn from(id: ResourceId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_rejects_hyphen() {
        assert!(Prefix::new("pr-42").is_err());
    }

    #[test]
    fn prefix_rejects_uppercase_and_leading_digit() {
        assert!(Prefix::new("Dev").is_err());
        assert!(Prefix::new("1dev").is_err());
    }

    #[test]
    fn prefix_rejects_too_long() {
        assert!(Prefix::new("a".repeat(MAX_PREFIX_LEN + 1)).is_err());
        assert!(Prefix::new("a".repeat(MAX_PREFIX_LEN)).is_ok());
    }

    #[test]
    fn local_name_allows_inner_hyphen() {
        assert!(validate_local_name("hello-world").is_ok());
        assert!(validate_local_name("hello-").is_err());
        assert!(validate_local_name("hello_world").is_err());
    }

    #[test]
    fn resource_id_splits_on_first_hyphen() {
        let id = ResourceId::parse("stage2-hello-world").unwrap();
        assert_eq!(id.prefix(), "stage2");
        assert_eq!(id.local_name(), "hello-world");
    }
}
