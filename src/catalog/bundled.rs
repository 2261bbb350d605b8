//! Catalog snapshot compiled into the binary.
use super::github::{CustomNodeList, ModelList};
use crate::types::{CustomNode, Model};
use rust_embed::RustEmbed;
use serde::de::DeserializeOwned;
use tracing::error;

#[derive(RustEmbed)]
#[folder = "data/catalog/"]
struct Snapshot;

/// Read-only fallback lists shipped with the binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundledCatalog;

impl BundledCatalog {
    pub fn custom_nodes(&self) -> Vec<CustomNode> {
        load::<CustomNodeList>("custom-node-list.json")
            .map(|list| list.custom_nodes)
            .unwrap_or_default()
    }

    pub fn models(&self) -> Vec<Model> {
        load::<ModelList>("model-list.json")
            .map(|list| list.models)
            .unwrap_or_default()
    }
}

fn load<T: DeserializeOwned>(name: &str) -> Option<T> {
    let file = Snapshot::get(name)?;
    match serde_json::from_slice(&file.data) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            error!("Bundled catalog {} is invalid: {}", name, e);
            None
        }
    }
}
