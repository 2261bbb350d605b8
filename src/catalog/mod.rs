//! Custom-node and model catalogs.
//!
//! Catalogs come from the ComfyUI-Manager lists on GitHub. When a list cannot
//! be fetched, a snapshot bundled into the binary is used instead.
mod bundled;
mod github;

pub use bundled::BundledCatalog;
pub use github::GithubCatalog;

use crate::error::ApiError;
use crate::types::{CustomNode, Model};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

/// A source of catalog lists.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_custom_nodes(&self) -> Result<Vec<CustomNode>, ApiError>;
    async fn fetch_models(&self) -> Result<Vec<Model>, ApiError>;
}

/// Where a catalog list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Remote,
    Bundled,
}

#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    pub custom_nodes: Vec<CustomNode>,
    pub models: Vec<Model>,
    pub custom_nodes_origin: Origin,
    pub models_origin: Origin,
}

impl Catalog {
    /// Case-insensitive match on title, author, reference or description.
    pub fn search_nodes(&self, query: &str) -> Vec<&CustomNode> {
        let query = query.to_lowercase();
        self.custom_nodes
            .iter()
            .filter(|node| {
                [&node.title, &node.author, &node.reference, &node.description]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&query))
            })
            .collect()
    }

    /// Case-insensitive match on name, type, base or filename.
    pub fn search_models(&self, query: &str) -> Vec<&Model> {
        let query = query.to_lowercase();
        self.models
            .iter()
            .filter(|model| {
                [&model.name, &model.model_type, &model.base, &model.filename]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&query))
            })
            .collect()
    }
}

/// Loads catalogs from a source, falling back to a bundled snapshot per list.
#[derive(Clone)]
pub struct CatalogProvider {
    source: Arc<dyn CatalogSource>,
    fallback: BundledCatalog,
}

impl CatalogProvider {
    /// Creates a new `CatalogProvider`.
    ///
    /// # Arguments
    ///
    /// * `source` - Where the custom node and model lists are fetched from.
    pub fn new(source: Arc<dyn CatalogSource>) -> Self {
        Self {
            source,
            fallback: BundledCatalog,
        }
    }

    /// Fetches both lists concurrently.
    ///
    /// This never fails. A list that cannot be fetched is replaced by its
    /// bundled snapshot, and the returned `Catalog` records which lists were.
    pub async fn load(&self) -> Catalog {
        let (nodes, models) =
            tokio::join!(self.source.fetch_custom_nodes(), self.source.fetch_models());

        let (custom_nodes, custom_nodes_origin) = match nodes {
            Ok(nodes) => (nodes, Origin::Remote),
            Err(e) => {
                warn!("Custom node catalog unavailable, using bundled list: {}", e);
                (self.fallback.custom_nodes(), Origin::Bundled)
            }
        };

        let (models, models_origin) = match models {
            Ok(models) => (models, Origin::Remote),
            Err(e) => {
                warn!("Model catalog unavailable, using bundled list: {}", e);
                (self.fallback.models(), Origin::Bundled)
            }
        };

        Catalog {
            custom_nodes,
            models,
            custom_nodes_origin,
            models_origin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FlakySource {
        nodes_ok: bool,
        models_ok: bool,
    }

    #[async_trait]
    impl CatalogSource for FlakySource {
        async fn fetch_custom_nodes(&self) -> Result<Vec<CustomNode>, ApiError> {
            if self.nodes_ok {
                Ok(vec![CustomNode::from_reference("https://github.com/example/remote")])
            } else {
                Err(ApiError::Status {
                    status: 503,
                    message: "unavailable".into(),
                })
            }
        }

        async fn fetch_models(&self) -> Result<Vec<Model>, ApiError> {
            if self.models_ok {
                Ok(Vec::new())
            } else {
                Err(ApiError::NotConfigured("catalog"))
            }
        }
    }

    #[tokio::test]
    async fn uses_remote_lists_when_available() {
        let provider = CatalogProvider::new(Arc::new(FlakySource {
            nodes_ok: true,
            models_ok: true,
        }));
        let catalog = provider.load().await;
        assert_eq!(catalog.custom_nodes_origin, Origin::Remote);
        assert_eq!(catalog.models_origin, Origin::Remote);
        assert_eq!(catalog.custom_nodes.len(), 1);
    }

    #[tokio::test]
    async fn falls_back_per_list() {
        let provider = CatalogProvider::new(Arc::new(FlakySource {
            nodes_ok: false,
            models_ok: true,
        }));
        let catalog = provider.load().await;
        assert_eq!(catalog.custom_nodes_origin, Origin::Bundled);
        assert!(!catalog.custom_nodes.is_empty());
        assert_eq!(catalog.models_origin, Origin::Remote);
        assert!(catalog.models.is_empty());
    }

    #[tokio::test]
    async fn searches_bundled_catalog() {
        let provider = CatalogProvider::new(Arc::new(FlakySource {
            nodes_ok: false,
            models_ok: false,
        }));
        let catalog = provider.load().await;
        let impact = catalog.search_nodes("impact");
        assert_eq!(impact.len(), 1);
        assert_eq!(impact[0].author, "ltdrdata");
        assert!(!catalog.search_models("VAE").is_empty());
    }
}
