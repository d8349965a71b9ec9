//! HTTP API.
//!
//! ## Layers (outermost first)
//!
//! 1. CORS (permissive, the dashboard is served from elsewhere)
//! 2. request tracing
//! 3. global rate limit (`ARKHAM_RATE_LIMIT` per second, 429 over it)
//! 4. bearer key check (only when `ARKHAM_API_KEY` is set; health routes
//!    stay open)

pub mod handlers;
pub mod types;

use std::num::NonZeroU32;
use std::path::Path;
use std::sync::Arc;

use arkham_core::storage::DocumentStore;
use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use subtle::ConstantTimeEq;
use tokio::net::TcpListener;
use tokio::sync::{RwLock, watch};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::agent::Agent;
use crate::ledger::Ledger;
use crate::monitor::{self, DashboardState};
use crate::{AppError, AppResult, Config};

/// Routes reachable without the API key.
pub const PUBLIC_PATHS: &[&str] = &["/", "/health", "/api/health"];

/// Shared handler state.
pub struct AppState {
    pub config: Config,
    pub agent: Agent,
    pub dashboard: Arc<RwLock<DashboardState>>,
    limiter: DefaultDirectRateLimiter,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("agent", &self.agent.name())
            .field("rate_limit", &self.config.rate_limit)
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(config: Config) -> AppResult<Self> {
        Self::with_dashboard(config, DashboardState::new())
    }

    /// State with a caller-provided dashboard (seeded in tests).
    pub fn with_dashboard(config: Config, dashboard: DashboardState) -> AppResult<Self> {
        let store = config
            .store_path
            .as_deref()
            .and_then(|path| open_store(path, &config.database_name));
        let ledger = Arc::new(Ledger::new(store));
        let agent = Agent::new(&config, ledger)?;

        let per_second = NonZeroU32::new(config.rate_limit).unwrap_or(NonZeroU32::MIN);
        Ok(Self {
            limiter: RateLimiter::direct(Quota::per_second(per_second)),
            dashboard: Arc::new(RwLock::new(dashboard)),
            agent,
            config,
        })
    }

    pub fn store(&self) -> Option<&Arc<DocumentStore>> {
        self.agent.ledger().store()
    }
}

/// Open the document store, or run disconnected if it cannot be opened.
fn open_store(path: &Path, name: &str) -> Option<Arc<DocumentStore>> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        warn!(path = %parent.display(), error = %e, "cannot create store directory");
        return None;
    }
    match DocumentStore::open(path, name) {
        Ok(store) => {
            info!(path = %path.display(), database = name, "document store connected");
            Some(Arc::new(store))
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "document store unavailable, running disconnected");
            None
        }
    }
}

// =============================================================================
// ROUTER
// =============================================================================

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/api/health", get(handlers::api_health))
        // Agent
        .route("/api/agent/query", post(handlers::agent_query))
        .route("/api/agent/info", get(handlers::agent_info))
        // Risk data
        .route("/api/data/trade-news", get(handlers::trade_news))
        .route("/api/data/political", get(handlers::political))
        .route("/api/data/ports", get(handlers::ports))
        .route("/api/data/all", get(handlers::all_data))
        .route("/api/data/route", post(handlers::route_data))
        // Routes
        .route("/api/routes", get(handlers::list_routes))
        .route("/api/routes/assess", post(handlers::assess_route))
        .route("/api/routes/compare", post(handlers::compare_routes))
        .route("/api/routes/predict", post(handlers::predict_route))
        .route("/api/routes/optimize", post(handlers::optimize_route))
        .route("/api/routes/{id}/risk", get(handlers::route_risk))
        .route("/api/routes/{id}/predict", get(handlers::route_prediction))
        // Execution
        .route("/api/execution/monitor", post(handlers::monitor_shipment))
        .route("/api/execution/execute", post(handlers::execute_reroute))
        // Logs
        .route("/api/logs", get(handlers::logs))
        .route("/api/logs/export", get(handlers::export_logs))
        // ACLED auth
        .route("/api/auth/acled/token", get(handlers::acled_token))
        .route("/api/auth/acled/refresh", post(handlers::acled_refresh))
        .route("/api/auth/acled/test", get(handlers::acled_test))
        // Document store
        .route("/api/db/health", get(handlers::db_health))
        .route("/api/db/risk-data", get(handlers::db_risk_data))
        .route("/api/db/stats", get(handlers::db_stats))
        // Dashboard
        .route("/api/dashboard", get(handlers::dashboard))
        .route("/api/dashboard/shipment", post(handlers::configure_shipment))
        .route("/api/dashboard/disruption", post(handlers::trigger_disruption))
        .route("/api/dashboard/reset", post(handlers::reset_dashboard))
        .route("/api/dashboard/monitoring", post(handlers::set_monitoring))
        .layer(middleware::from_fn_with_state(Arc::clone(&state), require_api_key))
        .layer(middleware::from_fn_with_state(Arc::clone(&state), rate_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// =============================================================================
// MIDDLEWARE
// =============================================================================

async fn rate_limit(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Result<Response, AppError> {
    if state.limiter.check().is_err() {
        warn!(path = %request.uri().path(), "rate limit exceeded");
        return Err(AppError::RateLimited);
    }
    Ok(next.run(request).await)
}

async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = state.config.api_key.as_deref() else {
        return Ok(next.run(request).await);
    };
    if PUBLIC_PATHS.contains(&request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default();

    if bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(next.run(request).await)
    } else {
        Err(AppError::Unauthorized)
    }
}

// =============================================================================
// SERVER
// =============================================================================

/// Run the server until ctrl-c or SIGTERM.
pub async fn serve(config: Config) -> AppResult<()> {
    let addr = config.bind_addr();
    let state = Arc::new(AppState::new(config)?);

    let (stop_tx, stop_rx) = watch::channel(false);
    let poller = monitor::spawn(Arc::clone(&state.dashboard), monitor::POLL_INTERVAL, stop_rx);

    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, agent = state.agent.name(), "Arkham AI server listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = stop_tx.send(true);
    if let Err(e) = poller.await {
        error!(error = %e, "dashboard monitor ended abnormally");
    }
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install ctrl-c handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received, draining connections");
}
