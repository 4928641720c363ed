//! Percent document upserts through the `_update` API.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use ratekeeper_control::{CollaboratorError, PercentageStore};
use ratekeeper_core::{ControllerConfig, PercentDocument};

use crate::client::{Endpoint, HttpClient};
use crate::error::{ProbeError, ProbeResult};

/// Writes the percent document into `index` with `doc_as_upsert`.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    client: HttpClient,
    index: String,
}

impl DocumentStore {
    pub fn new(endpoint: &str, index: impl Into<String>, timeout: Duration) -> ProbeResult<Self> {
        Ok(Self {
            client: HttpClient::new(Endpoint::parse(endpoint)?, timeout),
            index: index.into(),
        })
    }

    /// Store configured by `[connections.store]`, or `None` when no remote
    /// endpoint is set and the embedded store should be used.
    pub fn from_config(config: &ControllerConfig) -> ProbeResult<Option<Self>> {
        let store = &config.connections.store;
        store
            .endpoint
            .as_deref()
            .map(|endpoint| Self::new(endpoint, store.index.clone(), config.request_timeout()))
            .transpose()
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub async fn put(&self, document_id: &str, document: &PercentDocument) -> ProbeResult<()> {
        if document_id.is_empty() {
            return Err(ProbeError::Request("empty document id".to_string()));
        }
        let path = format!("{}/_update/{document_id}", self.index);
        self.client.post_json(&path, &update_body(document)).await?;
        debug!(index = %self.index, %document_id, percent = document.percent, "percent document upserted");
        Ok(())
    }
}

fn update_body(document: &PercentDocument) -> serde_json::Value {
    json!({
        "doc": {
            "percent": document.percent,
            "index": document.target,
            "updated": document.updated_at_epoch_ms,
        },
        "doc_as_upsert": true,
    })
}

#[async_trait]
impl PercentageStore for DocumentStore {
    async fn upsert(
        &self,
        document_id: &str,
        document: &PercentDocument,
    ) -> Result<(), CollaboratorError> {
        self.put(document_id, document)
            .await
            .map_err(|e| CollaboratorError::Persistence(e.to_string()))
    }
}
