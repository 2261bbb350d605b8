//! Remote model search.
pub mod civitai;
pub mod debounce;

pub use civitai::CivitaiClient;
pub use debounce::{DebouncedSearch, SearchResult, SEARCH_DEBOUNCE};

use crate::error::ApiError;
use crate::types::Model;
use async_trait::async_trait;

#[async_trait]
pub trait ModelSearch: Send + Sync {
    /// Returns models matching `query`.
    ///
    /// # Errors
    ///
    /// Returns an error if the search service cannot be reached or answers
    /// with an unreadable body.
    async fn search(&self, query: &str) -> Result<Vec<Model>, ApiError>;
}
