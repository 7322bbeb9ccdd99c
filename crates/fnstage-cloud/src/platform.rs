//! The function-hosting platform as seen by the lifecycle driver.

use std::path::PathBuf;

use fnstage_core::{FunctionDescriptor, ResourceId, check_source_dir};

use crate::client::{FunctionError, GcloudClient};
use crate::executor::{GcloudExecutor, RealExecutor};

/// Create-or-update input for one function.
#[derive(Debug, Clone, Copy)]
pub struct DeployRequest<'a> {
    pub resource_id: &'a ResourceId,
    pub descriptor: &'a FunctionDescriptor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedFunction {
    pub resource_id: ResourceId,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deletion {
    Deleted,
    /// Nothing existed under that id.
    AlreadyAbsent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteState {
    Active { url: Option<String> },
    Absent,
    /// Deploying, failed, or any other non-serving state.
    Other { state: String },
}

#[allow(async_fn_in_trait)]
pub trait FunctionPlatform: Send + Sync {
    async fn deploy_function(
        &self,
        request: DeployRequest<'_>,
    ) -> Result<DeployedFunction, FunctionError>;

    async fn delete_function(&self, id: &ResourceId) -> Result<Deletion, FunctionError>;

    async fn function_status(&self, id: &ResourceId) -> Result<RemoteState, FunctionError>;
}

/// Cloud Functions in one project and region, driven through gcloud.
pub struct GcloudFunctions<E: GcloudExecutor = RealExecutor> {
    client: GcloudClient<E>,
    project_id: String,
    region: String,
    project_dir: PathBuf,
}

impl<E: GcloudExecutor> GcloudFunctions<E> {
    /// `project_dir` is where descriptor source paths are resolved from.
    pub fn new(
        client: GcloudClient<E>,
        project_id: impl Into<String>,
        region: impl Into<String>,
        project_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            project_id: project_id.into(),
            region: region.into(),
            project_dir: project_dir.into(),
        }
    }

    pub fn client(&self) -> &GcloudClient<E> {
        &self.client
    }
}

impl<E: GcloudExecutor> FunctionPlatform for GcloudFunctions<E> {
    async fn deploy_function(
        &self,
        request: DeployRequest<'_>,
    ) -> Result<DeployedFunction, FunctionError> {
        let name = request.resource_id.as_str();
        let source = self.project_dir.join(&request.descriptor.source);
        check_source_dir(&source).map_err(|reason| FunctionError::Source {
            path: source.clone(),
            reason,
        })?;

        tracing::debug!(function = name, source = %source.display(), "deploying");
        let output = self
            .client
            .deploy_function(
                name,
                &source,
                &self.project_id,
                &self.region,
                &request.descriptor.gcloud_deploy_flags(),
            )
            .await?;

        let url = match serde_json::from_str::<serde_json::Value>(&output) {
            Ok(resource) => function_url(&resource),
            Err(e) => {
                tracing::warn!(function = name, error = %e, "deploy output is not JSON; url unknown");
                None
            }
        };

        Ok(DeployedFunction {
            resource_id: request.resource_id.clone(),
            url,
        })
    }

    async fn delete_function(&self, id: &ResourceId) -> Result<Deletion, FunctionError> {
        let deleted = self
            .client
            .delete_function(id.as_str(), &self.project_id, &self.region)
            .await?;
        Ok(if deleted {
            Deletion::Deleted
        } else {
            Deletion::AlreadyAbsent
        })
    }

    async fn function_status(&self, id: &ResourceId) -> Result<RemoteState, FunctionError> {
        let Some(json) = self
            .client
            .describe_function(id.as_str(), &self.project_id, &self.region)
            .await?
        else {
            return Ok(RemoteState::Absent);
        };

        let resource: serde_json::Value =
            serde_json::from_str(&json).map_err(|e| FunctionError::InvalidResponse {
                name: id.to_string(),
                source: e,
            })?;
        Ok(remote_state(&resource))
    }
}

/// 2nd gen reports `state`, 1st gen `status`.
fn remote_state(resource: &serde_json::Value) -> RemoteState {
    let state = resource
        .get("state")
        .or_else(|| resource.get("status"))
        .and_then(|s| s.as_str());

    match state {
        Some("ACTIVE") => RemoteState::Active {
            url: function_url(resource),
        },
        Some(other) => RemoteState::Other {
            state: other.to_owned(),
        },
        None => RemoteState::Other {
            state: "UNKNOWN".to_owned(),
        },
    }
}

fn function_url(resource: &serde_json::Value) -> Option<String> {
    ["/url", "/httpsTrigger/url", "/serviceConfig/uri"]
        .iter()
        .find_map(|pointer| resource.pointer(pointer).and_then(|v| v.as_str()))
        .map(str::to_owned)
}
