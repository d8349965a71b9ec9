//! Shared journal plus its mirror in the document store.

use std::path::Path;
use std::sync::Arc;

use arkham_core::journal::{Journal, LogEntry, LogFilter};
use arkham_core::storage::{Collection, DocumentStore};
use chrono::Utc;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::warn;

use crate::AppResult;

/// The action journal, persisted to the `logs` collection when a store is
/// connected.
#[derive(Debug)]
pub struct Ledger {
    journal: RwLock<Journal>,
    store: Option<Arc<DocumentStore>>,
}

impl Ledger {
    pub fn new(store: Option<Arc<DocumentStore>>) -> Self {
        Self {
            journal: RwLock::new(Journal::new()),
            store,
        }
    }

    pub fn store(&self) -> Option<&Arc<DocumentStore>> {
        self.store.as_ref()
    }

    /// Run `f` against the journal, then persist whatever it recorded in a
    /// single store transaction.
    ///
    /// The journal lock is released before the store is written.
    pub async fn record<R>(&self, f: impl FnOnce(&mut Journal) -> R) -> R {
        let (out, fresh) = {
            let mut journal = self.journal.write().await;
            let mark = journal.recorded();
            let out = f(&mut journal);
            (out, journal.since(mark))
        };
        self.save_batch(Collection::Logs, &fresh);
        out
    }

    /// Best-effort write of several records in one transaction.
    pub fn save_batch<T: Serialize>(&self, collection: Collection, records: &[T]) {
        let Some(store) = &self.store else {
            return;
        };
        if records.is_empty() {
            return;
        }
        let written = records
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(arkham_core::ArkhamError::from)
            .and_then(|docs| store.insert_many(collection, docs, Utc::now()));
        if let Err(e) = written {
            warn!(collection = %collection, count = records.len(), error = %e, "failed to persist records");
        }
    }

    /// Best-effort write of one record. Failures are logged, not returned.
    pub fn save(&self, collection: Collection, record: &impl Serialize) {
        if let Some(store) = &self.store
            && let Err(e) = store.save(collection, record, Utc::now())
        {
            warn!(collection = %collection, error = %e, "failed to persist record");
        }
    }

    pub async fn query(&self, filter: &LogFilter) -> Vec<LogEntry> {
        self.journal.read().await.query(filter)
    }

    pub async fn export(&self, path: &Path, filter: &LogFilter) -> AppResult<usize> {
        Ok(self.journal.read().await.export(path, filter)?)
    }

    pub async fn len(&self) -> usize {
        self.journal.read().await.len()
    }
}
