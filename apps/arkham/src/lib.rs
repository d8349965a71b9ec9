//! # Arkham Library
//!
//! The service side of Arkham AI: HTTP API, CLI, upstream clients and the
//! async orchestration around `arkham-core`.
//!
//! The binary in `main.rs` is a thin shell over these modules; integration
//! tests drive them directly.

pub mod agent;
pub mod api;
pub mod cli;
pub mod clients;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod ledger;
pub mod monitor;

pub use config::Config;
pub use error::{AppError, AppResult};

// Re-export arkham_core for convenience
pub use arkham_core;
