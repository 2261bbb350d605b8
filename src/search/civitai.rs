//! Model search against the Civitai public API.
use super::ModelSearch;
use crate::error::ApiError;
use crate::types::Model;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

pub const CIVITAI_MODELS_URL: &str = "https://civitai.com/api/v1/models";
const RESULT_LIMIT: &str = "5";
const SORT_ORDER: &str = "Most Downloaded";

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
pub struct SearchItem {
    pub name: String,
    #[serde(rename = "type", default)]
    pub model_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "modelVersions", default)]
    pub model_versions: Vec<ModelVersion>,
}

#[derive(Debug, Deserialize)]
pub struct ModelVersion {
    pub name: String,
    #[serde(rename = "baseModel", default)]
    pub base_model: String,
    /// Not part of every response; the item type is used when absent.
    #[serde(rename = "type", default)]
    pub version_type: Option<String>,
    #[serde(default)]
    pub files: Vec<VersionFile>,
}

#[derive(Debug, Deserialize)]
pub struct VersionFile {
    pub name: String,
    #[serde(rename = "downloadUrl")]
    pub download_url: String,
}

/// Flattens search results into one `Model` per model version, using the
/// version's first file. Versions without files are skipped.
pub fn models_from_response(response: SearchResponse) -> Vec<Model> {
    response
        .items
        .into_iter()
        .flat_map(|item| {
            let SearchItem {
                name,
                model_type,
                description,
                model_versions,
            } = item;
            model_versions.into_iter().filter_map(move |version| {
                let file = version.files.into_iter().next()?;
                Some(Model {
                    name: format!("{} {} ({})", name, version.name, file.name),
                    model_type: version
                        .version_type
                        .filter(|kind| !kind.is_empty())
                        .unwrap_or_else(|| model_type.clone()),
                    base: version.base_model,
                    save_path: "default".to_string(),
                    description: description.clone().unwrap_or_default(),
                    reference: String::new(),
                    filename: file.name,
                    url: file.download_url,
                })
            })
        })
        .collect()
}

pub struct CivitaiClient {
    client: reqwest::Client,
    base_url: String,
}

impl CivitaiClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: CIVITAI_MODELS_URL.to_string(),
        }
    }

    fn query_pairs(query: &str) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("limit", RESULT_LIMIT.to_string()),
            ("sort", SORT_ORDER.to_string()),
        ];
        if !query.is_empty() {
            pairs.push(("query", query.to_string()));
        }
        pairs
    }
}

#[async_trait]
impl ModelSearch for CivitaiClient {
    /// An empty query returns the most downloaded models. A rejected search
    /// yields no results rather than an error.
    async fn search(&self, query: &str) -> Result<Vec<Model>, ApiError> {
        debug!("Searching Civitai for {:?}", query);
        let response = self
            .client
            .get(&self.base_url)
            .query(&Self::query_pairs(query))
            .send()
            .await?;

        if !response.status().is_success() {
            warn!("Civitai search responded {}", response.status());
            return Ok(Vec::new());
        }

        let body = response.bytes().await?;
        let parsed: SearchResponse = serde_json::from_slice(&body)?;
        Ok(models_from_response(parsed))
    }
}
