//! Accrual scheduler.
//!
//! Drives the periodic tick: each tick advances every connected record,
//! folds in a bandwidth sample and refreshes metrics. The interval timer
//! only exists while at least one connection is `connected`; it is dropped
//! as soon as the last one leaves and recreated when a new one arrives.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::{self, Instant};

use crate::bandwidth::BandwidthSampler;
use crate::metrics::AppMetrics;
use crate::session::SessionStore;

/// Default spacing between accrual ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(3);

/// Run the accrual loop until `shutdown` resolves.
///
/// While idle the loop only waits on the session's accruing flag, so no
/// timer fires. Each tick credits `tick_interval` worth of seconds.
pub async fn run_accrual_loop<F>(
    store: Arc<RwLock<SessionStore>>,
    metrics: Arc<AppMetrics>,
    mut sampler: Box<dyn BandwidthSampler>,
    tick_interval: Duration,
    shutdown: F,
) where
    F: Future<Output = ()>,
{
    let mut accruing = store.read().await.subscribe_accruing();
    tokio::pin!(shutdown);

    tracing::info!(
        "Accrual loop started (interval: {}s)",
        tick_interval.as_secs()
    );

    'outer: loop {
        if !*accruing.borrow_and_update() {
            tokio::select! {
                changed = accruing.changed() => {
                    if changed.is_err() {
                        break 'outer;
                    }
                    continue 'outer;
                }
                _ = &mut shutdown => break 'outer,
            }
        }

        let mut interval = time::interval_at(Instant::now() + tick_interval, tick_interval);
        tracing::debug!("Accrual timer started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if !tick_once(&store, &metrics, sampler.as_mut(), tick_interval).await {
                        break;
                    }
                }

                changed = accruing.changed() => {
                    if changed.is_err() {
                        break 'outer;
                    }
                    if !*accruing.borrow_and_update() {
                        break;
                    }
                }

                _ = &mut shutdown => {
                    tracing::info!("Shutdown signal received. Stopping accrual.");
                    break 'outer;
                }
            }
        }

        tracing::debug!("Accrual timer stopped");
    }

    tracing::info!("Accrual loop stopped cleanly");
}

/// Execute a single tick. Returns whether anything is still accruing.
pub async fn tick_once(
    store: &Arc<RwLock<SessionStore>>,
    metrics: &AppMetrics,
    sampler: &mut dyn BandwidthSampler,
    tick_interval: Duration,
) -> bool {
    let mut store = store.write().await;

    let advanced = store.tick(tick_interval.as_secs());
    store.record_bandwidth(sampler.sample(), tick_interval.as_secs_f64());

    metrics.ticks_total.inc();
    metrics.observe(&store);

    let totals = store.ledger().totals();
    tracing::debug!(
        "Tick advanced {} connection(s); earnings {:.4}, spent {:.4}",
        advanced,
        totals.total_earnings,
        totals.total_spent,
    );

    store.is_accruing()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    use crate::bandwidth::{FixedSampler, Throughput};
    use crate::nodes::NodeDirectory;
    use crate::pricing::{DemandLevel, PricingEngine};
    use crate::settings::ShareSettings;

    fn make_shared_store() -> Arc<RwLock<SessionStore>> {
        Arc::new(RwLock::new(SessionStore::new(
            PricingEngine::default(),
            NodeDirectory::demo(),
            ShareSettings::default(),
        )))
    }

    fn sampler() -> Box<dyn BandwidthSampler> {
        Box::new(FixedSampler(Throughput {
            upload: 12.5,
            download: 8.3,
        }))
    }

    async fn connect(store: &Arc<RwLock<SessionStore>>, node: &str) -> String {
        let mut s = store.write().await;
        let id = s.connect_to_node(node, DemandLevel::Medium).unwrap();
        s.mark_connected(&id).unwrap();
        id
    }

    fn spawn_loop(
        store: &Arc<RwLock<SessionStore>>,
        metrics: &Arc<AppMetrics>,
    ) -> (oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(run_accrual_loop(
            store.clone(),
            metrics.clone(),
            sampler(),
            DEFAULT_TICK_INTERVAL,
            async move {
                let _ = rx.await;
            },
        ));
        (tx, handle)
    }

    #[tokio::test]
    async fn tick_once_advances_connected_records() {
        let store = make_shared_store();
        let metrics = AppMetrics::new().unwrap();
        let id = connect(&store, "node-001").await;
        let mut sampler = sampler();

        let still_accruing = tick_once(&store, &metrics, sampler.as_mut(), DEFAULT_TICK_INTERVAL).await;

        assert!(still_accruing);
        let s = store.read().await;
        assert_eq!(s.connection(&id).unwrap().duration, 3);
        assert_eq!(s.bandwidth().current.upload, 12.5);
        assert!((metrics.ticks_total.get() - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn tick_once_reports_idle_session() {
        let store = make_shared_store();
        let metrics = AppMetrics::new().unwrap();
        let mut sampler = sampler();

        assert!(!tick_once(&store, &metrics, sampler.as_mut(), DEFAULT_TICK_INTERVAL).await);
    }

    #[tokio::test(start_paused = true)]
    async fn no_ticks_while_nothing_is_connected() {
        let store = make_shared_store();
        let metrics = Arc::new(AppMetrics::new().unwrap());
        let (stop, handle) = spawn_loop(&store, &metrics);

        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(metrics.ticks_total.get(), 0.0);

        stop.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn timer_follows_connection_lifecycle() {
        let store = make_shared_store();
        let metrics = Arc::new(AppMetrics::new().unwrap());
        let (stop, handle) = spawn_loop(&store, &metrics);
        tokio::task::yield_now().await;

        let id = connect(&store, "node-002").await;
        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(store.read().await.connection(&id).unwrap().duration, 9);
        assert_eq!(metrics.ticks_total.get(), 3.0);

        store.write().await.disconnect(&id).unwrap();
        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(metrics.ticks_total.get(), 3.0);
        assert_eq!(store.read().await.connection(&id).unwrap().duration, 9);

        let second = connect(&store, "node-003").await;
        time::sleep(Duration::from_secs(4)).await;
        assert_eq!(store.read().await.connection(&second).unwrap().duration, 3);

        stop.send(()).unwrap();
        handle.await.unwrap();
    }
}
