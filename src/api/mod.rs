//! Client for the machine/app provisioning service.
pub mod apps;
mod client;

pub use client::{ApiEndpoints, HttpProvisioningClient};

use crate::error::ApiError;
use crate::types::{App, CreateMachineRequest, CustomNode, FileSystemItem, WorkflowUrls};
use async_trait::async_trait;
use std::path::Path;

/// Operations offered by the provisioning backend.
#[async_trait]
pub trait ProvisioningApi: Send + Sync {
    /// Requests a new machine and returns its id, which names its log stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the request or cannot be reached.
    async fn create_machine(&self, request: &CreateMachineRequest) -> Result<String, ApiError>;

    /// Requests a new app and returns the id of the task building it.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the request or cannot be reached.
    async fn create_app(&self, request: &CreateMachineRequest) -> Result<String, ApiError>;

    /// Lists deployed and stopped apps.
    async fn list_apps(&self) -> Result<Vec<App>, ApiError>;

    /// Deletes an app and returns the id the backend reports as deleted.
    async fn delete_app(&self, app_id: &str) -> Result<String, ApiError>;

    /// Lists the remote models directory at `path` (the root when empty).
    async fn list_model_files(&self, path: &str) -> Result<Vec<FileSystemItem>, ApiError>;

    /// Looks up the editor and runner urls of an app's workflow.
    async fn workflow_urls(&self, app_name: &str) -> Result<WorkflowUrls, ApiError>;

    /// Extracts the custom nodes a workflow file depends on.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NoCustomNodes` when the workflow references none.
    async fn generate_custom_nodes(
        &self,
        file_name: &str,
        contents: Vec<u8>,
    ) -> Result<Vec<CustomNode>, ApiError>;
}

/// Reads a workflow file from disk and extracts its custom nodes.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the extraction fails.
pub async fn custom_nodes_from_file(
    api: &dyn ProvisioningApi,
    path: &Path,
) -> Result<Vec<CustomNode>, ApiError> {
    let contents = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workflow.json".to_string());
    api.generate_custom_nodes(&file_name, contents).await
}
