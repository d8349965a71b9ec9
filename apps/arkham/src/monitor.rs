//! Dashboard state and its polling task.

use std::sync::Arc;
use std::time::Duration;

use arkham_core::dashboard::{Dashboard, Disruption};
use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::{debug, info};

/// Polling period of the dashboard monitor.
pub const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Dashboard plus the RNG that drives its jitter.
#[derive(Debug)]
pub struct DashboardState {
    dashboard: Dashboard,
    rng: StdRng,
    refreshes: u64,
}

impl DashboardState {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Reproducible state for tests and `arkham disrupt --seed`.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(mut rng: StdRng) -> Self {
        let dashboard = Dashboard::new(&mut rng, Utc::now());
        Self {
            dashboard,
            rng,
            refreshes: 0,
        }
    }

    pub fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }

    pub fn dashboard_mut(&mut self) -> &mut Dashboard {
        &mut self.dashboard
    }

    pub fn reset(&mut self) {
        self.dashboard.reset(&mut self.rng, Utc::now());
    }

    pub fn trigger_disruption(&mut self) -> Disruption {
        self.dashboard.trigger_disruption(&mut self.rng, Utc::now())
    }

    pub fn refresh(&mut self) {
        self.dashboard.refresh(&mut self.rng, Utc::now());
        self.refreshes += 1;
    }

    /// Polling ticks applied so far.
    pub fn refreshes(&self) -> u64 {
        self.refreshes
    }
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn the polling task. It refreshes the dashboard every `period` while
/// monitoring is on, and ends when `shutdown` flips to `true` or its sender
/// is dropped.
pub fn spawn(
    state: Arc<RwLock<DashboardState>>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        info!(period_ms = period.as_millis() as u64, "dashboard monitor started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let mut guard = state.write().await;
                    if guard.dashboard().is_monitoring() {
                        guard.refresh();
                        debug!(refreshes = guard.refreshes(), "dashboard refreshed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("dashboard monitor stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn refreshes_only_while_monitoring() {
        let state = Arc::new(RwLock::new(DashboardState::seeded(7)));
        let (tx, rx) = watch::channel(false);
        let handle = spawn(Arc::clone(&state), Duration::from_millis(10), rx);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(state.read().await.refreshes(), 0);

        state.write().await.dashboard_mut().set_monitoring(true, Utc::now());
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(state.read().await.refreshes() > 0);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn dropped_sender_stops_the_task() {
        let state = Arc::new(RwLock::new(DashboardState::seeded(1)));
        let (tx, rx) = watch::channel(false);
        let handle = spawn(state, Duration::from_secs(60), rx);
        drop(tx);
        handle.await.unwrap();
    }

    #[test]
    fn seeded_disruptions_repeat() {
        let a = DashboardState::seeded(42).trigger_disruption();
        let b = DashboardState::seeded(42).trigger_disruption();
        assert_eq!(a.scenario, b.scenario);
        assert_eq!(a.rerouted_to, b.rerouted_to);
    }
}
