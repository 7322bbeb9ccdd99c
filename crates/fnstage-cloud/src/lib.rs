//! GCP access for fnstage.
//!
//! [`GcloudClient`] shells out to the gcloud CLI through a [`GcloudExecutor`].
//! [`GcloudFunctions`] adapts it to the [`FunctionPlatform`] capability that
//! the prefix [`Lifecycle`] driver runs against.

pub mod client;
pub mod executor;
pub mod gcloud;
pub mod lifecycle;
pub mod platform;

pub use client::{
    ApiCheck, CheckResult, CloudBuildError, DoctorReport, FunctionError, FunctionOp, GcloudClient,
    PreflightError, PreflightReport,
};
pub use executor::{GcloudExecutor, RealExecutor};
pub use lifecycle::{
    DeleteEntry, DeleteOutcome, DeleteReport, DeployEntry, DeployOutcome, DeployReport, Lifecycle,
    LifecycleError, LifecycleOptions, StatusEntry, StatusReport, StatusState,
};
pub use platform::{
    Deletion, DeployRequest, DeployedFunction, FunctionPlatform, GcloudFunctions, RemoteState,
};
