//! Core types and configuration for fnstage.
//!
//! This crate defines the `fnstage.toml` schema ([`FnstageConfig`]),
//! function descriptors and the prefix naming convention
//! ([`FunctionDescriptor`], [`Prefix`], [`ResourceId`]), the per-prefix deploy
//! manifest ([`Manifest`], [`ManifestStore`]), and shared error types.

pub mod config;
pub mod descriptor;
pub mod error;
pub mod manifest;
pub mod source;
pub mod target;

pub use config::{
    CloudBuildConfig, DeployConfig, FnstageConfig, FunctionDefaults, FunctionSpec, ProjectConfig,
};
pub use descriptor::{FunctionDescriptor, Prefix, ResourceId, TriggerKind};
pub use error::{Error, Result};
pub use manifest::{Manifest, ManifestEntry, ManifestStore};
pub use source::check_source_dir;
pub use target::{Target, TargetOrigin, lifecycle_targets};
