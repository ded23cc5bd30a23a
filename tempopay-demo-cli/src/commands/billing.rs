//! Billing commands - single pass or foreground monitor

use anyhow::Result;
use std::path::Path;
use std::time::Duration;
use tempopay_subscriptions::{BillingMonitor, ChargeOutcome};

use crate::session::Session;
use crate::ui;

pub async fn tick(storage_dir: &Path) -> Result<()> {
    let session = Session::open(storage_dir).await?;

    ui::header("Billing Pass");
    let outcomes = session.engine.tick().await;
    if outcomes.is_empty() {
        ui::info("No active subscriptions.");
    }
    for (service_id, outcome) in &outcomes {
        print_outcome(service_id, outcome);
    }
    ui::key_value("Balance", &ui::usd(&session.balance().await?));
    session.close()
}

pub async fn run(storage_dir: &Path, seconds: u64, verbose: bool) -> Result<()> {
    let session = Session::open(storage_dir).await?;
    let period = session.engine.policy().tick_interval();

    ui::header("Billing Monitor");
    ui::key_value("Tick interval", &format!("{}s", period.as_secs()));
    ui::key_value("Duration", &format!("{}s", seconds));

    let mut views = session.engine.watch();
    let refresher = session.cache.spawn_refresher(
        session.chain.clone(),
        session.token,
        session.root.address(),
        period,
    );
    let monitor = BillingMonitor::spawn(session.engine.clone(), period);
    let spinner = (!verbose).then(|| ui::spinner("Billing..."));

    let deadline = tokio::time::sleep(Duration::from_secs(seconds));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => break,
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let active = views.borrow_and_update().iter().filter(|v| v.active).count();
                if let Some(spinner) = &spinner {
                    spinner.set_message(format!("Billing... {} active", active));
                }
            }
        }
    }

    let ticks = monitor.ticks();
    monitor.stop().await;
    refresher.stop().await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    ui::success(&format!("Monitor stopped after {} tick(s)", ticks));
    ui::key_value("Balance", &ui::usd(&session.balance().await?));
    session.close()
}

fn print_outcome(service_id: &str, outcome: &ChargeOutcome) {
    match outcome {
        ChargeOutcome::Charged {
            charges_remaining, ..
        } => ui::success(&format!(
            "{}: charged, {} charge(s) left",
            service_id, charges_remaining
        )),
        ChargeOutcome::Completed => {
            ui::success(&format!("{}: final charge, subscription ended", service_id))
        }
        ChargeOutcome::Overdue => {
            ui::warning(&format!("{}: balance too low, marked overdue", service_id))
        }
        ChargeOutcome::Skipped(reason) => {
            ui::info(&format!("{}: skipped ({:?})", service_id, reason))
        }
        ChargeOutcome::InFlight => {
            ui::info(&format!("{}: charge already in flight", service_id))
        }
        ChargeOutcome::Deactivated(reason) => {
            ui::warning(&format!("{}: deactivated ({:?})", service_id, reason))
        }
        ChargeOutcome::Failed(error) => ui::error(&format!("{}: {}", service_id, error)),
    }
}
