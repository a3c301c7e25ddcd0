use std::sync::Arc;

use tracing::{debug, error};

use syntra_types::models::ChangeHistoryRecord;

use crate::error::GatewayError;
use crate::store::HistoryStore;

/// Append-only change log for snippets.
#[derive(Clone)]
pub struct HistoryLog {
    store: Arc<dyn HistoryStore>,
}

impl HistoryLog {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    /// Append a record. Store failures are logged and swallowed; the return
    /// value only tells the caller whether to announce the record.
    pub async fn append(&self, record: ChangeHistoryRecord) -> bool {
        let store = self.store.clone();
        let snippet_id = record.snippet_id.clone();

        match tokio::task::spawn_blocking(move || store.append(&record)).await {
            Ok(Ok(())) => {
                debug!("history appended for snippet {}", snippet_id);
                true
            }
            Ok(Err(e)) => {
                error!("Failed to append change history for {}: {:#}", snippet_id, e);
                false
            }
            Err(e) => {
                error!("History append task for {} failed: {}", snippet_id, e);
                false
            }
        }
    }

    /// Every record for the snippet, newest first.
    pub async fn list(&self, snippet_id: &str) -> Result<Vec<ChangeHistoryRecord>, GatewayError> {
        let store = self.store.clone();
        let id = snippet_id.to_string();

        let mut records = tokio::task::spawn_blocking(move || store.list(&id))
            .await
            .map_err(|e| GatewayError::Persistence(e.into()))??;

        // Stable sort: equal timestamps keep the store's order.
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }
}
