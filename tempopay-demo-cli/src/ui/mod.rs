//! Terminal UI utilities

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tempopay_lib::Amount;
use tempopay_subscriptions::SubscriptionView;

/// Print a success message
pub fn success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print an info message
pub fn info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Print a warning message
pub fn warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print a section header
pub fn header(text: &str) {
    println!("\n{}", text.bold().underline());
}

/// Print a key-value pair
pub fn key_value(key: &str, value: &str) {
    println!("  {}: {}", key.cyan(), value);
}

/// Print a separator line
pub fn separator() {
    println!("{}", "─".repeat(60).dimmed());
}

/// Format a token amount for display
pub fn usd(amount: &Amount) -> String {
    format!("${}", amount.format_balance())
}

/// Create a spinner progress indicator
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Prompt for user confirmation
pub fn confirm(prompt: &str, default: bool) -> anyhow::Result<bool> {
    use dialoguer::Confirm;
    Ok(Confirm::new()
        .with_prompt(prompt)
        .default(default)
        .interact()?)
}

/// One line per service: status badge, name, price.
pub fn service_line(view: &SubscriptionView) {
    let badge = if !view.active {
        "inactive".dimmed()
    } else if view.overdue {
        "overdue".yellow().bold()
    } else {
        "active".green().bold()
    };
    println!(
        "  {:<12} {:<14} {:>8}/cycle  [{}]",
        view.service_id.cyan(),
        view.name,
        usd(&view.price),
        badge
    );
}

/// Full details of a single subscription.
pub fn subscription_details(view: &SubscriptionView) {
    header(&view.name);
    key_value("Service", &view.service_id);
    if !view.description.is_empty() {
        key_value("Description", &view.description);
    }
    key_value("Price", &usd(&view.price));
    if !view.active {
        key_value("Status", "inactive");
        return;
    }
    key_value("Status", if view.overdue { "overdue" } else { "active" });
    key_value("Charges left", &view.charges_remaining.to_string());
    key_value("Limit left (units)", &view.remaining_limit.to_string());
    key_value(
        "Key authorized on-chain",
        if view.key_authorized { "yes" } else { "no" },
    );
    if let Some(expiry) = view.expires_at_utc() {
        key_value("Key expires", &expiry.format("%Y-%m-%d %H:%M:%S UTC").to_string());
    }
}
