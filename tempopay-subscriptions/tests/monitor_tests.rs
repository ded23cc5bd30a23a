//! Billing monitor timing, on a paused tokio clock.

mod common;

use common::{units, Harness};
use std::time::Duration;
use tempopay_subscriptions::BillingMonitor;

#[tokio::test(start_paused = true)]
async fn test_first_tick_fires_after_one_period() {
    let h = Harness::new(100).await;
    h.engine.subscribe("north").await.unwrap();

    let monitor = BillingMonitor::spawn(h.engine.clone(), Duration::from_secs(10));
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(monitor.ticks(), 0);
    assert_eq!(h.engine.view("north").unwrap().charges_remaining, 11);

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(monitor.ticks(), 1);
    assert_eq!(h.engine.view("north").unwrap().charges_remaining, 10);

    monitor.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_slow_charge_does_not_delay_ticks() {
    let h = Harness::new(100).await;
    h.engine.subscribe("echo").await.unwrap();
    h.chain.set_latency(Some(Duration::from_secs(25)));

    let monitor = BillingMonitor::spawn(h.engine.clone(), Duration::from_secs(10));
    tokio::time::sleep(Duration::from_secs(31)).await;

    // Ticks at 10s, 20s and 30s; only the first one reached the chain.
    assert_eq!(monitor.ticks(), 3);
    assert_eq!(h.chain.transfer_attempts(), 2);
    assert_eq!(h.chain.peak_concurrent_transfers(), 1);

    monitor.stop().await;
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.engine.view("echo").unwrap().charges_remaining, 10);
}

#[tokio::test(start_paused = true)]
async fn test_stopped_monitor_schedules_nothing() {
    let h = Harness::new(100).await;
    h.engine.subscribe("spark").await.unwrap();

    let monitor = BillingMonitor::spawn_with_policy(h.engine.clone());
    tokio::time::sleep(Duration::from_secs(21)).await;
    assert_eq!(monitor.ticks(), 2);
    assert!(monitor.is_running());

    let attempts = h.chain.transfer_attempts();
    monitor.stop().await;
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.chain.transfer_attempts(), attempts);
}

#[tokio::test(start_paused = true)]
async fn test_refreshed_balance_gates_running_monitor() {
    let h = Harness::new(100).await;
    h.engine.subscribe("north").await.unwrap();
    let attempts = h.chain.transfer_attempts();

    let refresher = h.cache.spawn_refresher(
        h.chain.clone(),
        h.token,
        h.root.address(),
        Duration::from_secs(5),
    );
    let monitor = BillingMonitor::spawn(h.engine.clone(), Duration::from_secs(10));
    h.chain
        .set_balance(&h.token.address, &h.root.address(), units(1));

    tokio::time::sleep(Duration::from_secs(11)).await;

    // The pre-check saw the drained balance, so no transfer was tried.
    assert!(h.engine.view("north").unwrap().overdue);
    assert_eq!(h.chain.transfer_attempts(), attempts);

    monitor.stop().await;
    refresher.stop().await;
}
