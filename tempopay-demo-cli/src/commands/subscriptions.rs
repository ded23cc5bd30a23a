//! Subscription commands

use anyhow::Result;
use std::path::Path;
use tempopay_subscriptions::SubscriptionView;

use crate::session::Session;
use crate::ui;

pub async fn services(storage_dir: &Path) -> Result<()> {
    let session = Session::open(storage_dir).await?;

    ui::header("Services");
    for view in session.engine.list_services_sorted_active_first() {
        ui::service_line(&view);
    }
    if session.restored > 0 {
        println!();
        ui::info(&format!("{} subscription(s) restored", session.restored));
    }
    session.close()
}

#[tracing::instrument(skip(storage_dir))]
pub async fn subscribe(storage_dir: &Path, service: &str) -> Result<()> {
    let session = Session::open(storage_dir).await?;
    let view = session.engine.subscribe(service).await;
    report_start(&session, view).await?;
    session.close()
}

#[tracing::instrument(skip(storage_dir))]
pub async fn cancel(storage_dir: &Path, service: &str) -> Result<()> {
    let session = Session::open(storage_dir).await?;
    let view = session.engine.cancel(service).await?;
    ui::success(&format!("{} cancelled, access key revoked", view.name));
    session.close()
}

#[tracing::instrument(skip(storage_dir))]
pub async fn toggle(storage_dir: &Path, service: &str) -> Result<()> {
    let session = Session::open(storage_dir).await?;
    let was_active = session.engine.is_active(service);
    let view = session.engine.toggle(service).await;
    if was_active {
        let view = view?;
        ui::success(&format!("{} cancelled, access key revoked", view.name));
    } else {
        report_start(&session, view).await?;
    }
    session.close()
}

pub async fn status(storage_dir: &Path, service: Option<&str>) -> Result<()> {
    let session = Session::open(storage_dir).await?;
    match service {
        Some(id) => ui::subscription_details(&session.engine.view(id)?),
        None => {
            let active: Vec<_> = session
                .engine
                .views()
                .into_iter()
                .filter(|view| view.active)
                .collect();
            if active.is_empty() {
                ui::info("No active subscriptions.");
            }
            for view in &active {
                ui::subscription_details(view);
            }
        }
    }
    session.close()
}

async fn report_start(session: &Session, view: Result<SubscriptionView>) -> Result<()> {
    let view = view?;
    if !view.active {
        ui::error(&format!("Could not start {}", view.name));
        ui::info("The first charge failed; check the balance and try again.");
        return Ok(());
    }
    ui::success(&format!("Subscribed to {}", view.name));
    if view.overdue {
        ui::warning("Balance too low for the first charge; it will be retried on the next tick.");
    }
    ui::key_value("Charges left", &view.charges_remaining.to_string());
    ui::key_value("Balance", &ui::usd(&session.balance().await?));
    Ok(())
}
