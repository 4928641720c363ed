//! Redb-backed persistence for percent documents and cycle history.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::{debug, warn};

use ratekeeper_control::{AuditLog, CollaboratorError, PercentageStore};
use ratekeeper_core::{CycleReport, PercentDocument};

use crate::error::{StateError, StateResult};
use crate::tables::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store.
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Storage))?;
        txn.open_table(PERCENT_DOCUMENTS).map_err(map_err!(Storage))?;
        txn.open_table(CYCLE_HISTORY).map_err(map_err!(Storage))?;
        txn.commit().map_err(map_err!(Storage))?;
        Ok(())
    }

    // ── Percent documents ──────────────────────────────────────────

    /// Insert or replace the document stored under `document_id`.
    pub fn put_document(&self, document_id: &str, document: &PercentDocument) -> StateResult<()> {
        let value = serde_json::to_vec(document).map_err(|e| StateError::Encode {
            record: "percent document",
            reason: e.to_string(),
        })?;
        let txn = self.db.begin_write().map_err(map_err!(Storage))?;
        {
            let mut table = txn.open_table(PERCENT_DOCUMENTS).map_err(map_err!(Storage))?;
            table
                .insert(document_id, value.as_slice())
                .map_err(map_err!(Storage))?;
        }
        txn.commit().map_err(map_err!(Storage))?;
        debug!(%document_id, percent = document.percent, "percent document stored");
        Ok(())
    }

    pub fn get_document(&self, document_id: &str) -> StateResult<Option<PercentDocument>> {
        let txn = self.db.begin_read().map_err(map_err!(Storage))?;
        let table = txn.open_table(PERCENT_DOCUMENTS).map_err(map_err!(Storage))?;
        match table.get(document_id).map_err(map_err!(Storage))? {
            Some(guard) => {
                let document: PercentDocument =
                    serde_json::from_slice(guard.value()).map_err(|e| StateError::Corrupt {
                        record: "percent document",
                        key: document_id.to_string(),
                        reason: e.to_string(),
                    })?;
                Ok(Some(document))
            }
            None => Ok(None),
        }
    }

    // ── Cycle history ──────────────────────────────────────────────

    pub fn put_cycle(&self, report: &CycleReport) -> StateResult<()> {
        let key = history_key(&report.target, report.epoch_ms);
        let value = serde_json::to_vec(report).map_err(|e| StateError::Encode {
            record: "cycle report",
            reason: e.to_string(),
        })?;
        let txn = self.db.begin_write().map_err(map_err!(Storage))?;
        {
            let mut table = txn.open_table(CYCLE_HISTORY).map_err(map_err!(Storage))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Storage))?;
        }
        txn.commit().map_err(map_err!(Storage))?;
        Ok(())
    }

    /// Most recent cycles for `target`, newest first.
    pub fn list_history(&self, target: &str, limit: usize) -> StateResult<Vec<CycleReport>> {
        // ';' sorts directly after ':', bounding the scan to this target's keys.
        let start = format!("{target}:");
        let end = format!("{target};");
        let txn = self.db.begin_read().map_err(map_err!(Storage))?;
        let table = txn.open_table(CYCLE_HISTORY).map_err(map_err!(Storage))?;
        let mut results = Vec::new();
        for entry in table
            .range(start.as_str()..end.as_str())
            .map_err(map_err!(Storage))?
            .rev()
        {
            if results.len() >= limit {
                break;
            }
            let (key, value) = entry.map_err(map_err!(Storage))?;
            let report: CycleReport =
                serde_json::from_slice(value.value()).map_err(|e| StateError::Corrupt {
                    record: "cycle report",
                    key: key.value().to_string(),
                    reason: e.to_string(),
                })?;
            results.push(report);
        }
        Ok(results)
    }
}

#[async_trait]
impl PercentageStore for StateStore {
    async fn upsert(
        &self,
        document_id: &str,
        document: &PercentDocument,
    ) -> Result<(), CollaboratorError> {
        self.put_document(document_id, document)
            .map_err(|e| CollaboratorError::Persistence(e.to_string()))
    }
}

impl AuditLog for StateStore {
    fn record(&self, report: &CycleReport) {
        if let Err(e) = self.put_cycle(report) {
            warn!(target = %report.target, error = %e, "failed to record cycle history");
        }
    }
}
