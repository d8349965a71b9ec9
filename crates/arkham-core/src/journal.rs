//! # Journal
//!
//! Structured audit trail of everything the agent decides.
//!
//! Entries are kept in memory (newest at the back, oldest evicted first) and
//! mirrored to `tracing` as they are recorded, so the process log and the
//! `/api/logs` view tell the same story.

use std::collections::VecDeque;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::Result;
use crate::execution::ExecutionStatus;
use crate::forecast::Prediction;
use crate::optimizer::OptimizedRoute;
use crate::risk::RiskAssessment;

/// Entries kept before the oldest are dropped.
pub const DEFAULT_CAPACITY: usize = 10_000;
/// Entries returned by a query when no limit is given.
pub const DEFAULT_QUERY_LIMIT: usize = 100;
/// Entries written by an export when no limit is given.
pub const DEFAULT_EXPORT_LIMIT: usize = 1_000;

// =============================================================================
// ENTRY TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warning" => Some(Self::Warning),
            "error" => Some(Self::Error),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    /// Level for a risk score: critical at 0.75, warning at 0.5.
    pub fn for_risk(score: f64) -> Self {
        if score >= 0.75 {
            Self::Critical
        } else if score >= 0.50 {
            Self::Warning
        } else {
            Self::Info
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogCategory {
    Monitoring,
    RiskAssessment,
    Prediction,
    Optimization,
    Execution,
    DataIngestion,
    AgentQuery,
    System,
}

impl LogCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monitoring => "monitoring",
            Self::RiskAssessment => "risk_assessment",
            Self::Prediction => "prediction",
            Self::Optimization => "optimization",
            Self::Execution => "execution",
            Self::DataIngestion => "data_ingestion",
            Self::AgentQuery => "agent_query",
            Self::System => "system",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "monitoring" => Some(Self::Monitoring),
            "risk_assessment" => Some(Self::RiskAssessment),
            "prediction" => Some(Self::Prediction),
            "optimization" => Some(Self::Optimization),
            "execution" => Some(Self::Execution),
            "data_ingestion" => Some(Self::DataIngestion),
            "agent_query" => Some(Self::AgentQuery),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One journal record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub category: LogCategory,
    pub message: String,
    pub shipment_id: Option<String>,
    pub route_id: Option<String>,
    pub action_id: Option<String>,
    pub user_id: Option<String>,
    pub details: Map<String, Value>,
    pub metadata: Map<String, Value>,
}

impl LogEntry {
    pub fn new(
        timestamp: DateTime<Utc>,
        level: LogLevel,
        category: LogCategory,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            level,
            category,
            message: message.into(),
            shipment_id: None,
            route_id: None,
            action_id: None,
            user_id: None,
            details: Map::new(),
            metadata: Map::new(),
        }
    }

    #[must_use]
    pub fn shipment(mut self, id: Option<&str>) -> Self {
        self.shipment_id = id.map(str::to_string);
        self
    }

    #[must_use]
    pub fn route(mut self, id: Option<&str>) -> Self {
        self.route_id = id.map(str::to_string);
        self
    }

    #[must_use]
    pub fn action(mut self, id: &str) -> Self {
        self.action_id = Some(id.to_string());
        self
    }

    #[must_use]
    pub fn user(mut self, id: &str) -> Self {
        self.user_id = Some(id.to_string());
        self
    }

    /// Merge the fields of a JSON object into `details`.
    #[must_use]
    pub fn details(mut self, details: Value) -> Self {
        if let Value::Object(map) = details {
            self.details.extend(map);
        }
        self
    }

    /// Single-line rendering used for the tracing mirror.
    fn trace_line(&self) -> String {
        let mut line = format!("[{}] {}", self.category, self.message);
        if let Some(id) = &self.shipment_id {
            line.push_str(&format!(" | Shipment: {id}"));
        }
        if let Some(id) = &self.route_id {
            line.push_str(&format!(" | Route: {id}"));
        }
        if let Some(id) = &self.action_id {
            line.push_str(&format!(" | Action: {id}"));
        }
        line
    }
}

/// Query filter. Unset fields match everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    pub category: Option<LogCategory>,
    pub level: Option<LogLevel>,
    pub shipment_id: Option<String>,
    pub route_id: Option<String>,
    pub limit: usize,
}

impl Default for LogFilter {
    fn default() -> Self {
        Self {
            category: None,
            level: None,
            shipment_id: None,
            route_id: None,
            limit: DEFAULT_QUERY_LIMIT,
        }
    }
}

impl LogFilter {
    /// Filter with the export default limit.
    pub fn for_export() -> Self {
        Self {
            limit: DEFAULT_EXPORT_LIMIT,
            ..Self::default()
        }
    }

    fn matches(&self, entry: &LogEntry) -> bool {
        self.category.is_none_or(|c| entry.category == c)
            && self.level.is_none_or(|l| entry.level == l)
            && self
                .shipment_id
                .as_deref()
                .is_none_or(|id| entry.shipment_id.as_deref() == Some(id))
            && self
                .route_id
                .as_deref()
                .is_none_or(|id| entry.route_id.as_deref() == Some(id))
    }
}

// =============================================================================
// JOURNAL
// =============================================================================

/// Bounded in-memory journal.
#[derive(Debug, Clone)]
pub struct Journal {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    recorded: u64,
}

impl Default for Journal {
    fn default() -> Self {
        Self::new()
    }
}

impl Journal {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
            recorded: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append an entry, evicting the oldest past capacity.
    pub fn record(&mut self, entry: LogEntry) {
        mirror(&entry);
        self.entries.push_back(entry);
        self.recorded = self.recorded.saturating_add(1);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn monitoring(
        &mut self,
        now: DateTime<Utc>,
        shipment_id: &str,
        risk_score: f64,
        risk_level: &str,
        action_taken: &str,
        reason: &str,
    ) {
        self.record(
            LogEntry::new(
                now,
                LogLevel::for_risk(risk_score),
                LogCategory::Monitoring,
                format!("Monitoring event: Risk {risk_score:.2} ({risk_level}), Action: {action_taken}"),
            )
            .shipment(Some(shipment_id))
            .details(json!({
                "risk_score": risk_score,
                "risk_level": risk_level,
                "action_taken": action_taken,
                "reason": reason,
            })),
        );
    }

    pub fn risk_assessment(
        &mut self,
        now: DateTime<Utc>,
        assessment: &RiskAssessment,
        shipment_id: Option<&str>,
    ) {
        let route_id = assessment.route_id.as_deref().unwrap_or("unknown");
        self.record(
            LogEntry::new(
                now,
                LogLevel::for_risk(assessment.overall_risk_score),
                LogCategory::RiskAssessment,
                format!(
                    "Risk assessment: Route {route_id} - Risk {:.2} ({})",
                    assessment.overall_risk_score,
                    assessment.risk_level.as_str()
                ),
            )
            .route(Some(route_id))
            .shipment(shipment_id)
            .details(json!({
                "risk_score": assessment.overall_risk_score,
                "risk_level": assessment.risk_level,
                "origin": assessment.origin,
                "destination": assessment.destination,
                "breakdown": assessment.breakdown,
                "recommendation": assessment.recommendation,
            })),
        );
    }

    pub fn prediction(&mut self, now: DateTime<Utc>, route_id: &str, prediction: &Prediction) {
        self.record(
            LogEntry::new(
                now,
                LogLevel::Info,
                LogCategory::Prediction,
                format!(
                    "Prediction: Route {route_id} - {} days ahead: {:.2} ({})",
                    prediction.days_ahead,
                    prediction.predicted_risk_score,
                    prediction.trend.as_str()
                ),
            )
            .route(Some(route_id))
            .details(json!({
                "days_ahead": prediction.days_ahead,
                "predicted_score": prediction.predicted_risk_score,
                "trend": prediction.trend,
                "confidence": prediction.confidence,
            })),
        );
    }

    pub fn optimization(
        &mut self,
        now: DateTime<Utc>,
        original_route_id: &str,
        routes: &[OptimizedRoute],
        recommendation: &str,
        shipment_id: Option<&str>,
    ) {
        let summary: Vec<Value> = routes
            .iter()
            .map(|r| {
                json!({
                    "route_id": r.route_id,
                    "risk_score": r.metrics.risk_score,
                    "optimization_score": r.optimization_score,
                    "rank": r.rank,
                })
            })
            .collect();
        self.record(
            LogEntry::new(
                now,
                LogLevel::Info,
                LogCategory::Optimization,
                format!(
                    "Route optimization: {} alternatives found for route {original_route_id}",
                    routes.len()
                ),
            )
            .route(Some(original_route_id))
            .shipment(shipment_id)
            .details(json!({
                "original_route_id": original_route_id,
                "alternatives_count": routes.len(),
                "optimized_routes": summary,
                "recommendation": recommendation,
            })),
        );
    }

    pub fn execution(
        &mut self,
        now: DateTime<Utc>,
        action_id: &str,
        action_type: &str,
        shipment_id: &str,
        status: ExecutionStatus,
        details: Value,
    ) {
        let level = match status {
            ExecutionStatus::Failed => LogLevel::Error,
            ExecutionStatus::Executing => LogLevel::Warning,
            _ => LogLevel::Info,
        };
        self.record(
            LogEntry::new(
                now,
                level,
                LogCategory::Execution,
                format!(
                    "Execution: {action_type} for shipment {shipment_id} - Status: {}",
                    status.as_str()
                ),
            )
            .action(action_id)
            .shipment(Some(shipment_id))
            .details(json!({ "action_type": action_type, "status": status }))
            .details(details),
        );
    }

    pub fn data_ingestion(
        &mut self,
        now: DateTime<Utc>,
        source: &str,
        count: usize,
        region: Option<&str>,
    ) {
        self.record(
            LogEntry::new(
                now,
                LogLevel::Info,
                LogCategory::DataIngestion,
                format!("Data ingestion: {count} points from {source}"),
            )
            .details(json!({
                "source": source,
                "data_points_count": count,
                "region": region,
            })),
        );
    }

    pub fn agent_query(
        &mut self,
        now: DateTime<Utc>,
        user_id: &str,
        query: &str,
        response: &str,
        success: bool,
    ) {
        let level = if success { LogLevel::Info } else { LogLevel::Error };
        let preview: String = query.chars().take(50).collect();
        self.record(
            LogEntry::new(
                now,
                level,
                LogCategory::AgentQuery,
                format!("Agent query from user {user_id}: {preview}..."),
            )
            .user(user_id)
            .details(json!({
                "query": query,
                "response": response.chars().take(200).collect::<String>(),
                "success": success,
            })),
        );
    }

    pub fn system(&mut self, now: DateTime<Utc>, level: LogLevel, message: impl Into<String>) {
        self.record(LogEntry::new(now, level, LogCategory::System, message));
    }

    /// Total entries ever recorded, including evicted ones.
    pub fn recorded(&self) -> u64 {
        self.recorded
    }

    /// Entries recorded after `mark` (a previous [`Journal::recorded`]),
    /// oldest first. Entries already evicted are skipped.
    pub fn since(&self, mark: u64) -> Vec<LogEntry> {
        let fresh = usize::try_from(self.recorded.saturating_sub(mark)).unwrap_or(usize::MAX);
        let skip = self.entries.len().saturating_sub(fresh);
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// Matching entries, newest first, truncated to the filter's limit.
    pub fn query(&self, filter: &LogFilter) -> Vec<LogEntry> {
        let mut matched: Vec<LogEntry> = self
            .entries
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        // stable: same-timestamp entries keep newest (last recorded) first
        matched.reverse();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matched.truncate(filter.limit);
        matched
    }

    /// Write matching entries to `path` as a pretty JSON array.
    ///
    /// Returns the number of entries written.
    pub fn export(&self, path: &Path, filter: &LogFilter) -> Result<usize> {
        let entries = self.query(filter);
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, &entries)?;
        writer.flush()?;
        tracing::info!(count = entries.len(), path = %path.display(), "exported journal");
        Ok(entries.len())
    }
}

fn mirror(entry: &LogEntry) {
    let line = entry.trace_line();
    match entry.level {
        LogLevel::Debug => tracing::debug!(category = %entry.category, "{line}"),
        LogLevel::Info => tracing::info!(category = %entry.category, "{line}"),
        LogLevel::Warning => tracing::warn!(category = %entry.category, "{line}"),
        LogLevel::Error | LogLevel::Critical => {
            tracing::error!(category = %entry.category, level = %entry.level, "{line}");
        }
    }
}
