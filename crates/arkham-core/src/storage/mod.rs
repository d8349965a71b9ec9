//! # Storage Module
//!
//! Embedded document store for ingested risk data, assessments, executions
//! and exported logs, backed by redb.
//!
//! redb provides:
//! - ACID transactions
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)

mod document_store;

pub use document_store::{Collection, DocumentStore, RiskDataQuery, StoreStats};
