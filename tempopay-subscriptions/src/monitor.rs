//! Background billing loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::{ChargeOutcome, SubscriptionEngine};

/// Drives [`SubscriptionEngine::tick`] on a fixed interval.
///
/// Every tick runs as its own task, so a slow charge never holds back the
/// next tick. The charge guard keeps a second charge for the same service
/// from starting while the first is in flight.
pub struct BillingMonitor;

impl BillingMonitor {
    /// Start billing. The first tick fires one `period` from now.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(engine: Arc<SubscriptionEngine>, period: Duration) -> MonitorHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let ticks = Arc::new(AtomicU64::new(0));
        let counter = ticks.clone();

        let task = tokio::spawn(async move {
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = timer.tick() => {}
                    _ = stop_rx.changed() => break,
                }
                counter.fetch_add(1, Ordering::SeqCst);
                let engine = engine.clone();
                tokio::spawn(async move {
                    for (service_id, outcome) in engine.tick().await {
                        if let ChargeOutcome::Failed(error) = outcome {
                            tracing::error!(%service_id, %error, "billing tick failed");
                        }
                    }
                });
            }
            tracing::debug!("billing monitor stopped");
        });

        tracing::info!(period_secs = period.as_secs_f64(), "billing monitor started");
        MonitorHandle {
            stop: stop_tx,
            task,
            ticks,
        }
    }

    /// Start billing at the engine policy's tick interval.
    pub fn spawn_with_policy(engine: Arc<SubscriptionEngine>) -> MonitorHandle {
        let period = engine.policy().tick_interval();
        Self::spawn(engine, period)
    }
}

/// Handle to a running [`BillingMonitor`]. Dropping it also stops the loop.
pub struct MonitorHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
    ticks: Arc<AtomicU64>,
}

impl MonitorHandle {
    /// Ticks fired so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop scheduling ticks. Charges already started run to completion.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        let _ = self.task.await;
    }
}
