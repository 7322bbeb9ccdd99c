//! Cloud Build configuration, source bundling, and eject for fnstage.
//!
//! # Build-service pipeline
//!
//! ```text
//! fnstage deploy --cloud-build --prefix P
//!   1. Dirty check ── git status --porcelain (skip with --allow-dirty)
//!   2. Config      ── CloudBuildGenerator::deploy() or .fnstage/cloudbuild.yaml
//!   3. Bundle      ── git ls-files → .fnstage-bundle/ (+ cloudbuild.yaml)
//!   4. Submit      ── gcloud builds submit .fnstage-bundle/ --substitutions _PREFIX=P
//!
//! fnstage delete --cloud-build --prefix P
//!   1. Config      ── CloudBuildGenerator::delete() or .fnstage/cloudbuild-delete.yaml
//!   2. Submit      ── gcloud builds submit --no-source --substitutions _PREFIX=P
//! ```
//!
//! Every step addresses its function as `${_PREFIX}-<name>`, so one config
//! serves every stage; the prefix is bound at submission time.

pub mod bundle;
pub mod cloudbuild;
pub mod eject;
pub mod substitute;

pub use cloudbuild::{BuildKind, BuildStep, CloudBuildGenerator, CloudBuildSpec, PREFIX_VAR};
pub use substitute::{SubstitutionError, Substitutions};
