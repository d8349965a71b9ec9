//! redb-backed JSON document collections.
//!
//! Each collection is one table of `u64 → JSON bytes`. Keys are assigned
//! from the table's current last key, so insertion order is key order.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::Serialize;
use serde_json::Value;

use crate::feeds::RiskDataPoint;
use crate::{ArkhamError, Result};

/// Default number of documents returned by a risk-data query.
pub const DEFAULT_QUERY_LIMIT: usize = 100;

const RISK_DATA: TableDefinition<u64, &[u8]> = TableDefinition::new("risk_data");
const ROUTES: TableDefinition<u64, &[u8]> = TableDefinition::new("routes");
const ASSESSMENTS: TableDefinition<u64, &[u8]> = TableDefinition::new("assessments");
const EXECUTIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("executions");
const LOGS: TableDefinition<u64, &[u8]> = TableDefinition::new("logs");

// =============================================================================
// COLLECTIONS
// =============================================================================

/// Named document collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Collection {
    RiskData,
    Routes,
    Assessments,
    Executions,
    Logs,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Self::RiskData,
        Self::Routes,
        Self::Assessments,
        Self::Executions,
        Self::Logs,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::RiskData => "risk_data",
            Self::Routes => "routes",
            Self::Assessments => "assessments",
            Self::Executions => "executions",
            Self::Logs => "logs",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.name() == raw)
            .ok_or_else(|| ArkhamError::UnknownCollection(raw.to_string()))
    }

    fn table(&self) -> TableDefinition<'static, u64, &'static [u8]> {
        match self {
            Self::RiskData => RISK_DATA,
            Self::Routes => ROUTES,
            Self::Assessments => ASSESSMENTS,
            Self::Executions => EXECUTIONS,
            Self::Logs => LOGS,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// QUERIES
// =============================================================================

/// Filter for stored risk data. Unset fields match everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskDataQuery {
    pub category: Option<String>,
    /// Case-insensitive substring of the location.
    pub location: Option<String>,
    pub source: Option<String>,
    /// Only documents from the last N days, counted from today's midnight UTC.
    pub days_back: Option<i64>,
    pub limit: usize,
}

impl Default for RiskDataQuery {
    fn default() -> Self {
        Self {
            category: None,
            location: None,
            source: None,
            days_back: None,
            limit: DEFAULT_QUERY_LIMIT,
        }
    }
}

impl RiskDataQuery {
    /// Earliest timestamp kept, or `None` when `days_back` is unset.
    ///
    /// Negative or out-of-range day counts are invalid input.
    fn cutoff(&self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
        let Some(days) = self.days_back else {
            return Ok(None);
        };
        let invalid = || ArkhamError::InvalidInput(format!("days_back out of range: {days}"));
        if days < 0 {
            return Err(invalid());
        }
        let midnight = now.date_naive().and_time(chrono::NaiveTime::MIN).and_utc();
        let cutoff = Duration::try_days(days)
            .and_then(|span| midnight.checked_sub_signed(span))
            .ok_or_else(invalid)?;
        Ok(Some(cutoff))
    }

    fn matches(&self, doc: &Value, cutoff: Option<DateTime<Utc>>) -> bool {
        let field = |name: &str| doc.get(name).and_then(Value::as_str);

        if let Some(category) = &self.category
            && field("category") != Some(category.as_str())
        {
            return false;
        }
        if let Some(source) = &self.source
            && field("source") != Some(source.as_str())
        {
            return false;
        }
        if let Some(location) = &self.location {
            let needle = location.to_lowercase();
            if !field("location").is_some_and(|l| l.to_lowercase().contains(&needle)) {
                return false;
            }
        }
        if let Some(cutoff) = cutoff {
            return timestamp_of(doc).is_some_and(|ts| ts >= cutoff);
        }
        true
    }
}

fn timestamp_of(doc: &Value) -> Option<DateTime<Utc>> {
    doc.get("timestamp")
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|ts| ts.with_timezone(&Utc))
}

/// Per-collection document counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub database: String,
    pub collections: BTreeMap<String, u64>,
    pub total_documents: u64,
}

// =============================================================================
// STORE
// =============================================================================

/// Embedded document store.
pub struct DocumentStore {
    db: Database,
    name: String,
}

impl fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentStore").field("name", &self.name).finish()
    }
}

impl DocumentStore {
    /// Open (or create) a store file.
    pub fn open(path: &Path, name: &str) -> Result<Self> {
        let db = Database::create(path).map_err(ArkhamError::storage)?;
        Self::init(db, name)
    }

    /// Volatile store for tests and one-shot CLI runs.
    pub fn in_memory(name: &str) -> Result<Self> {
        let db = Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())
            .map_err(ArkhamError::storage)?;
        Self::init(db, name)
    }

    fn init(db: Database, name: &str) -> Result<Self> {
        let txn = db.begin_write().map_err(ArkhamError::storage)?;
        for collection in Collection::ALL {
            txn.open_table(collection.table()).map_err(ArkhamError::storage)?;
        }
        txn.commit().map_err(ArkhamError::storage)?;
        Ok(Self {
            db,
            name: name.to_string(),
        })
    }

    /// Database name reported by health and stats.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert one document. Returns its key.
    pub fn insert(&self, collection: Collection, doc: Value) -> Result<u64> {
        let bytes = serde_json::to_vec(&doc)?;
        let txn = self.db.begin_write().map_err(ArkhamError::storage)?;
        let key = {
            let mut table = txn.open_table(collection.table()).map_err(ArkhamError::storage)?;
            let key = next_key(&table)?;
            table.insert(key, bytes.as_slice()).map_err(ArkhamError::storage)?;
            key
        };
        txn.commit().map_err(ArkhamError::storage)?;
        Ok(key)
    }

    /// Insert documents in one transaction, stamping each with `stored_at`.
    ///
    /// Every document must be a JSON object.
    pub fn insert_many(&self, collection: Collection, docs: Vec<Value>, now: DateTime<Utc>) -> Result<usize> {
        if docs.is_empty() {
            return Ok(0);
        }

        let mut encoded = Vec::with_capacity(docs.len());
        for mut doc in docs {
            let Value::Object(map) = &mut doc else {
                return Err(ArkhamError::InvalidInput(format!(
                    "{collection} documents must be JSON objects"
                )));
            };
            map.insert("stored_at".to_string(), serde_json::to_value(now)?);
            encoded.push(serde_json::to_vec(&doc)?);
        }

        let txn = self.db.begin_write().map_err(ArkhamError::storage)?;
        {
            let mut table = txn.open_table(collection.table()).map_err(ArkhamError::storage)?;
            let mut key = next_key(&table)?;
            for bytes in &encoded {
                table.insert(key, bytes.as_slice()).map_err(ArkhamError::storage)?;
                key += 1;
            }
        }
        txn.commit().map_err(ArkhamError::storage)?;
        Ok(encoded.len())
    }

    /// Persist feed results into `risk_data`.
    pub fn store_risk_data(&self, points: &[RiskDataPoint], now: DateTime<Utc>) -> Result<usize> {
        let docs = points
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.insert_many(Collection::RiskData, docs, now)
    }

    /// Persist one serializable record (assessment, action, log entry).
    pub fn save(&self, collection: Collection, record: &impl Serialize, now: DateTime<Utc>) -> Result<()> {
        let doc = serde_json::to_value(record)?;
        self.insert_many(collection, vec![doc], now)?;
        Ok(())
    }

    /// Up to `limit` documents of a collection, most recently inserted first.
    pub fn documents(&self, collection: Collection, limit: usize) -> Result<Vec<Value>> {
        let txn = self.db.begin_read().map_err(ArkhamError::storage)?;
        let table = txn.open_table(collection.table()).map_err(ArkhamError::storage)?;

        let mut docs = Vec::new();
        for row in table.iter().map_err(ArkhamError::storage)?.rev().take(limit) {
            let (_, value) = row.map_err(ArkhamError::storage)?;
            docs.push(serde_json::from_slice(value.value())?);
        }
        Ok(docs)
    }

    pub fn count(&self, collection: Collection) -> Result<u64> {
        let txn = self.db.begin_read().map_err(ArkhamError::storage)?;
        let table = txn.open_table(collection.table()).map_err(ArkhamError::storage)?;
        table.len().map_err(ArkhamError::storage)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let mut collections = BTreeMap::new();
        let mut total = 0;
        for collection in Collection::ALL {
            let n = self.count(collection)?;
            total += n;
            collections.insert(collection.name().to_string(), n);
        }
        Ok(StoreStats {
            database: self.name.clone(),
            collections,
            total_documents: total,
        })
    }

    /// Stored risk data matching `query`, newest first.
    pub fn risk_data(&self, query: &RiskDataQuery, now: DateTime<Utc>) -> Result<Vec<Value>> {
        let cutoff = query.cutoff(now)?;
        let txn = self.db.begin_read().map_err(ArkhamError::storage)?;
        let table = txn
            .open_table(Collection::RiskData.table())
            .map_err(ArkhamError::storage)?;

        let mut matched = Vec::new();
        // newest insertions first so equal timestamps keep that order
        for row in table.iter().map_err(ArkhamError::storage)?.rev() {
            let (_, value) = row.map_err(ArkhamError::storage)?;
            let doc: Value = serde_json::from_slice(value.value())?;
            if query.matches(&doc, cutoff) {
                matched.push(doc);
            }
        }

        matched.sort_by(|a, b| timestamp_of(b).cmp(&timestamp_of(a)));
        matched.truncate(query.limit);
        Ok(matched)
    }
}

fn next_key(table: &impl ReadableTable<u64, &'static [u8]>) -> Result<u64> {
    let last = table.last().map_err(ArkhamError::storage)?;
    Ok(last.map(|(k, _)| k.value() + 1).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::{mock_political, mock_port_congestion, mock_trade_news};
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    }

    fn seeded() -> DocumentStore {
        let store = DocumentStore::in_memory("arkham_ai").unwrap();
        let mut points = mock_trade_news(now(), None, 50);
        points.extend(mock_political(now(), None));
        points.extend(mock_port_congestion(now(), None));
        store.store_risk_data(&points, now()).unwrap();
        store
    }

    #[test]
    fn collections_parse() {
        assert_eq!(Collection::parse("logs").unwrap(), Collection::Logs);
        assert!(matches!(
            Collection::parse("users"),
            Err(ArkhamError::UnknownCollection(name)) if name == "users"
        ));
    }

    #[test]
    fn insert_assigns_sequential_keys() {
        let store = DocumentStore::in_memory("t").unwrap();
        assert_eq!(store.insert(Collection::Executions, json!({"a": 1})).unwrap(), 0);
        assert_eq!(store.insert(Collection::Executions, json!({"a": 2})).unwrap(), 1);
        assert_eq!(store.count(Collection::Executions).unwrap(), 2);
        assert_eq!(store.count(Collection::Logs).unwrap(), 0);
    }

    #[test]
    fn insert_many_rejects_non_objects() {
        let store = DocumentStore::in_memory("t").unwrap();
        let result = store.insert_many(Collection::Logs, vec![json!(1)], now());
        assert!(matches!(result, Err(ArkhamError::InvalidInput(_))));
        assert_eq!(store.count(Collection::Logs).unwrap(), 0);
    }

    #[test]
    fn stats_count_every_collection() {
        let store = seeded();
        let stats = store.stats().unwrap();
        assert_eq!(stats.database, "arkham_ai");
        assert_eq!(stats.collections.len(), 5);
        assert_eq!(stats.collections["risk_data"], 9);
        assert_eq!(stats.total_documents, 9);
    }

    #[test]
    fn risk_data_filters_and_sorts() {
        let store = seeded();

        let all = store.risk_data(&RiskDataQuery::default(), now()).unwrap();
        assert_eq!(all.len(), 9);
        assert!(all[0].get("stored_at").is_some());
        let stamps: Vec<_> = all.iter().map(timestamp_of).collect();
        assert!(stamps.windows(2).all(|w| w[0] >= w[1]));

        let political = RiskDataQuery {
            category: Some("political".to_string()),
            ..RiskDataQuery::default()
        };
        assert_eq!(store.risk_data(&political, now()).unwrap().len(), 3);

        let china = RiskDataQuery {
            location: Some("CHINA".to_string()),
            ..RiskDataQuery::default()
        };
        assert_eq!(store.risk_data(&china, now()).unwrap().len(), 2);

        let limited = RiskDataQuery {
            limit: 2,
            ..RiskDataQuery::default()
        };
        assert_eq!(store.risk_data(&limited, now()).unwrap().len(), 2);
    }

    #[test]
    fn days_back_counts_from_midnight() {
        let store = seeded();
        // cutoff = 2025-03-10T00:00Z; the one-day-old items fall outside
        let today = RiskDataQuery {
            days_back: Some(0),
            ..RiskDataQuery::default()
        };
        assert_eq!(store.risk_data(&today, now()).unwrap().len(), 7);
    }

    #[test]
    fn days_back_out_of_range_is_invalid() {
        let store = seeded();
        for days in [-1, 100_000_000, i64::MAX] {
            let query = RiskDataQuery {
                days_back: Some(days),
                ..RiskDataQuery::default()
            };
            let err = store.risk_data(&query, now()).unwrap_err();
            assert!(matches!(err, ArkhamError::InvalidInput(_)), "days_back={days}");
        }
    }

    #[test]
    fn documents_newest_first() {
        let store = DocumentStore::in_memory("t").unwrap();
        for n in 0..4 {
            store.save(Collection::Logs, &json!({"n": n}), now()).unwrap();
        }
        let docs = store.documents(Collection::Logs, 2).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["n"], 3);
        assert_eq!(docs[1]["n"], 2);
        assert!(docs[0].get("stored_at").is_some());
    }

    #[test]
    fn file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arkham.redb");
        {
            let store = DocumentStore::open(&path, "arkham_ai").unwrap();
            store.insert(Collection::Assessments, json!({"route_id": "TW-LA"})).unwrap();
        }
        let reopened = DocumentStore::open(&path, "arkham_ai").unwrap();
        assert_eq!(reopened.count(Collection::Assessments).unwrap(), 1);
    }
}
