//! Catalog lists published by ComfyUI-Manager on GitHub.
use super::CatalogSource;
use crate::error::ApiError;
use crate::types::{CustomNode, Model};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

pub const CUSTOM_NODES_URL: &str =
    "https://raw.githubusercontent.com/ltdrdata/ComfyUI-Manager/main/custom-node-list.json";
pub const MODELS_URL: &str =
    "https://raw.githubusercontent.com/ltdrdata/ComfyUI-Manager/main/model-list.json";

#[derive(Deserialize)]
pub(super) struct CustomNodeList {
    pub custom_nodes: Vec<CustomNode>,
}

#[derive(Deserialize)]
pub(super) struct ModelList {
    pub models: Vec<Model>,
}

pub struct GithubCatalog {
    client: reqwest::Client,
    custom_nodes_url: String,
    models_url: String,
}

impl GithubCatalog {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            custom_nodes_url: CUSTOM_NODES_URL.to_string(),
            models_url: MODELS_URL.to_string(),
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        debug!("Fetching catalog {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: format!("Unable to fetch {}", url),
            });
        }
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl CatalogSource for GithubCatalog {
    async fn fetch_custom_nodes(&self) -> Result<Vec<CustomNode>, ApiError> {
        let list: CustomNodeList = self.fetch(&self.custom_nodes_url).await?;
        Ok(list.custom_nodes)
    }

    async fn fetch_models(&self) -> Result<Vec<Model>, ApiError> {
        let list: ModelList = self.fetch(&self.models_url).await?;
        Ok(list.models)
    }
}
