//! HTTP implementation of `ProvisioningApi`.
use super::ProvisioningApi;
use crate::error::ApiError;
use crate::http::endpoint;
use crate::types::{
    App, CreateAppResponse, CreateMachineRequest, CreateMachineResponse, CustomNode,
    FileSystemItem, WorkflowUrls,
};
use async_trait::async_trait;
use reqwest::{multipart, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, error};

const API_KEY_HEADER: &str = "X_API_KEY";

/// Where the two provisioning services live.
#[derive(Debug, Clone, Default)]
pub struct ApiEndpoints {
    /// Serves `/create-machine`, `/generate-custom-nodes` and `/machine-logs`.
    pub machine_base: Option<Url>,
    /// Serves `/app`, `/apps` and `/models`.
    pub app_base: Option<Url>,
    /// Sent as `X_API_KEY` on app-builder requests.
    pub api_key: Option<String>,
}

pub struct HttpProvisioningClient {
    client: reqwest::Client,
    endpoints: ApiEndpoints,
}

#[derive(Deserialize)]
struct DeletedApp {
    app_id: String,
}

impl HttpProvisioningClient {
    pub fn new(client: reqwest::Client, endpoints: ApiEndpoints) -> Self {
        Self { client, endpoints }
    }

    fn machine_url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let base = self
            .endpoints
            .machine_base
            .as_ref()
            .ok_or(ApiError::NotConfigured("MACHINE_BUILDER_API_BASE_URL"))?;
        endpoint(base, segments).map_err(ApiError::InvalidUrl)
    }

    fn app_url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let base = self
            .endpoints
            .app_base
            .as_ref()
            .ok_or(ApiError::NotConfigured("APP_BUILDER_API_BASE_URL"))?;
        endpoint(base, segments).map_err(ApiError::InvalidUrl)
    }

    fn with_api_key(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.endpoints.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }

    /// The app build request carries only its JSON body, no API key.
    fn create_app_request(
        &self,
        request: &CreateMachineRequest,
    ) -> Result<RequestBuilder, ApiError> {
        let url = self.app_url(&["app"])?;
        Ok(self.client.post(url).json(request))
    }

    /// Sends a request and decodes a JSON body, mapping non-2xx to `ApiError::Status`.
    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        failure: &str,
    ) -> Result<T, ApiError> {
        let response = request.send().await.map_err(|e| {
            error!("{}: {}", failure, e);
            ApiError::Http(e)
        })?;
        let response = check_status(response, failure).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

async fn check_status(response: Response, failure: &str) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    debug!("Upstream responded {} with body: {}", status, body);
    Err(ApiError::Status {
        status: status.as_u16(),
        message: failure.to_string(),
    })
}

#[async_trait]
impl ProvisioningApi for HttpProvisioningClient {
    async fn create_machine(&self, request: &CreateMachineRequest) -> Result<String, ApiError> {
        let url = self.machine_url(&["create-machine"])?;
        let response: CreateMachineResponse = self
            .send_json(self.client.post(url).json(request), "Unable to create machine")
            .await?;
        Ok(response.machine_id)
    }

    async fn create_app(&self, request: &CreateMachineRequest) -> Result<String, ApiError> {
        let builder = self.create_app_request(request)?;
        let response: CreateAppResponse = self.send_json(builder, "Unable to create app").await?;
        Ok(response.task_id)
    }

    async fn list_apps(&self) -> Result<Vec<App>, ApiError> {
        let url = self.app_url(&["apps"])?;
        let builder = self.with_api_key(self.client.get(url));
        self.send_json(builder, "Unable to fetch list of apps").await
    }

    async fn delete_app(&self, app_id: &str) -> Result<String, ApiError> {
        let url = self.app_url(&["apps", app_id])?;
        let builder = self.with_api_key(self.client.delete(url));
        let deleted: DeletedApp = self.send_json(builder, "Unable to delete app").await?;
        Ok(deleted.app_id)
    }

    async fn list_model_files(&self, path: &str) -> Result<Vec<FileSystemItem>, ApiError> {
        let mut url = self.app_url(&["models"])?;
        if !path.is_empty() {
            url.query_pairs_mut().append_pair("path", path);
        }
        let builder = self.with_api_key(self.client.get(url));
        self.send_json(builder, "Failed to fetch items").await
    }

    async fn workflow_urls(&self, app_name: &str) -> Result<WorkflowUrls, ApiError> {
        let url = self.app_url(&["apps", app_name, "workflow-urls"])?;
        let builder = self.with_api_key(self.client.get(url));
        self.send_json(builder, "Failed to load edit workflow URL")
            .await
    }

    async fn generate_custom_nodes(
        &self,
        file_name: &str,
        contents: Vec<u8>,
    ) -> Result<Vec<CustomNode>, ApiError> {
        let url = self.machine_url(&["generate-custom-nodes"])?;
        let part = multipart::Part::bytes(contents)
            .file_name(file_name.to_string())
            .mime_str("application/json")?;
        let form = multipart::Form::new().part("file", part);

        let references: Vec<String> = self
            .send_json(
                self.client.post(url).multipart(form),
                "Unable to fetch custom nodes from workflow file",
            )
            .await?;
        nodes_from_references(references)
    }
}

/// Converts the repository urls returned for a workflow into custom nodes.
fn nodes_from_references(references: Vec<String>) -> Result<Vec<CustomNode>, ApiError> {
    if references.is_empty() {
        return Err(ApiError::NoCustomNodes);
    }
    Ok(references.into_iter().map(CustomNode::from_reference).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(endpoints: ApiEndpoints) -> HttpProvisioningClient {
        HttpProvisioningClient::new(reqwest::Client::new(), endpoints)
    }

    #[test]
    fn empty_workflow_has_no_custom_nodes() {
        assert!(matches!(
            nodes_from_references(Vec::new()),
            Err(ApiError::NoCustomNodes)
        ));
    }

    #[test]
    fn workflow_references_become_nodes() {
        let nodes =
            nodes_from_references(vec!["https://github.com/ltdrdata/ComfyUI-Impact-Pack".into()])
                .unwrap();
        assert_eq!(nodes[0].reference, "https://github.com/ltdrdata/ComfyUI-Impact-Pack");
        assert!(nodes[0].title.is_empty());
    }

    #[tokio::test]
    async fn missing_base_url_is_reported_before_any_request() {
        let api = client(ApiEndpoints::default());
        let err = api.list_apps().await.unwrap_err();
        assert!(matches!(err, ApiError::NotConfigured("APP_BUILDER_API_BASE_URL")));

        let err = api.create_machine(&sample_request()).await.unwrap_err();
        assert!(matches!(err, ApiError::NotConfigured("MACHINE_BUILDER_API_BASE_URL")));
    }

    #[test]
    fn app_urls_are_built_from_segments() {
        let api = client(ApiEndpoints {
            app_base: Some(Url::parse("https://apps.example.com/api/").unwrap()),
            ..ApiEndpoints::default()
        });
        let url = api.app_url(&["apps", "sdxl demo", "workflow-urls"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://apps.example.com/api/apps/sdxl%20demo/workflow-urls"
        );
    }

    #[test]
    fn api_key_is_not_sent_with_app_builds() {
        let api = client(ApiEndpoints {
            app_base: Some(Url::parse("https://apps.example.com").unwrap()),
            api_key: Some("secret".into()),
            ..ApiEndpoints::default()
        });

        let create = api
            .create_app_request(&sample_request())
            .unwrap()
            .build()
            .unwrap();
        assert!(create.headers().get(API_KEY_HEADER).is_none());
        assert_eq!(create.url().as_str(), "https://apps.example.com/app");

        let listing = api
            .with_api_key(api.client.get(api.app_url(&["apps"]).unwrap()))
            .build()
            .unwrap();
        assert_eq!(listing.headers().get(API_KEY_HEADER).unwrap(), "secret");
    }

    fn sample_request() -> CreateMachineRequest {
        CreateMachineRequest {
            machine_name: "test".into(),
            gpu: crate::types::Gpu::T4,
            custom_nodes: Default::default(),
            models: Vec::new(),
            additional_dependencies: None,
        }
    }
}
