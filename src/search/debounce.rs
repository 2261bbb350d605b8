//! Debounced, cancelable model search.
use super::ModelSearch;
use crate::error::ApiError;
use crate::types::Model;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Quiet period before a query is sent.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// The outcome of one executed query.
#[derive(Debug)]
pub struct SearchResult {
    pub query: String,
    pub models: Result<Vec<Model>, ApiError>,
}

struct InFlight {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Runs only the latest of a burst of queries.
///
/// Each `submit` restarts the quiet period and cancels whatever the previous
/// query was doing, whether still waiting or already requesting.
pub struct DebouncedSearch {
    searcher: Arc<dyn ModelSearch>,
    delay: Duration,
    results: mpsc::UnboundedSender<SearchResult>,
    in_flight: Option<InFlight>,
}

impl DebouncedSearch {
    /// Creates a new `DebouncedSearch` and the receiver its results arrive on.
    ///
    /// # Arguments
    ///
    /// * `searcher` - The search backend queries are sent to.
    /// * `delay` - How long a query must stay unchanged before it is sent.
    pub fn new(
        searcher: Arc<dyn ModelSearch>,
        delay: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<SearchResult>) {
        let (results, rx) = mpsc::unbounded_channel();
        let search = Self {
            searcher,
            delay,
            results,
            in_flight: None,
        };
        (search, rx)
    }

    /// Schedules `query`, superseding any earlier one. Blank queries only cancel.
    pub fn submit(&mut self, query: &str) {
        self.cancel();

        let query = query.trim().to_string();
        if query.is_empty() {
            return;
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let searcher = self.searcher.clone();
        let results = self.results.clone();
        let delay = self.delay;

        let task = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }

            let models = tokio::select! {
                _ = token.cancelled() => {
                    debug!("Search for {:?} superseded", query);
                    return;
                }
                models = searcher.search(&query) => models,
            };

            if !token.is_cancelled() {
                let _ = results.send(SearchResult { query, models });
            }
        });

        self.in_flight = Some(InFlight { cancel, task });
    }

    /// Cancels the pending or running query, if any.
    pub fn cancel(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.cancel.cancel();
            in_flight.task.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|in_flight| !in_flight.task.is_finished())
    }
}

impl Drop for DebouncedSearch {
    fn drop(&mut self) {
        self.cancel();
    }
}
