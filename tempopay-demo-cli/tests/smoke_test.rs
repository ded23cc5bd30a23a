//! Smoke tests for tempopay-demo-cli
//!
//! These drive the built binary against a temporary storage directory. The
//! chain is simulated, so no network access is needed.

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn demo(storage: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tempopay-demo"))
        .args(args)
        .env("TEMPOPAY_DEMO_DIR", storage)
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to execute command")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn assert_success(output: &Output) {
    if !output.status.success() {
        eprintln!("stdout: {}", stdout(output));
        eprintln!("stderr: {}", String::from_utf8_lossy(&output.stderr));
    }
    assert!(output.status.success(), "command should succeed");
}

/// Test that the CLI can show help
#[test]
fn test_cli_help() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = demo(temp_dir.path(), &["--help"]);

    assert_success(&output);
    let help = stdout(&output);
    assert!(help.contains("subscribe"), "Help should mention 'subscribe'");
    assert!(help.contains("cancel"), "Help should mention 'cancel'");
}

/// Test that version is shown
#[test]
fn test_cli_version() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = demo(temp_dir.path(), &["--version"]);

    assert_success(&output);
    assert!(stdout(&output).contains("tempopay-demo"));
}

/// Whoami without a wallet explains how to create one
#[test]
fn test_whoami_without_wallet() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = demo(temp_dir.path(), &["whoami"]);

    assert_success(&output);
    assert!(String::from_utf8_lossy(&output.stderr).contains("No wallet configured"));
}

/// Commands that need a wallet fail cleanly without one
#[test]
fn test_balance_requires_wallet() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = demo(temp_dir.path(), &["balance"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("tempopay-demo init"));
}

/// Subscribing bills the first cycle and survives a restart of the CLI
#[test]
fn test_subscription_flow() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let dir = temp_dir.path();

    assert_success(&demo(dir, &["init", "--force"]));
    assert!(dir.join("identity.json").exists());

    assert_success(&demo(dir, &["fund", "100"]));

    let output = demo(dir, &["subscribe", "north"]);
    assert_success(&output);
    assert!(stdout(&output).contains("Subscribed to NorthShield"));
    assert!(dir.join("chain.json").exists());

    // A fresh process restores the subscription from disk.
    let output = demo(dir, &["status", "north"]);
    assert_success(&output);
    let status = stdout(&output);
    assert!(status.contains("active"));
    assert!(status.contains("11"), "one of twelve cycles should be billed");

    let output = demo(dir, &["balance"]);
    assert_success(&output);
    assert!(stdout(&output).contains("$86.00"));

    assert_success(&demo(dir, &["cancel", "north"]));
    let output = demo(dir, &["services"]);
    assert_success(&output);
    assert!(!stdout(&output).contains("[active]"));
}

/// Payments show up in the activity feed with their memo
#[test]
fn test_pay_and_activity() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let dir = temp_dir.path();

    assert_success(&demo(dir, &["init", "--force"]));
    assert_success(&demo(dir, &["fund", "50"]));

    let recipient = "0x00000000000000000000000000000000000000aa";
    let output = demo(dir, &["pay", recipient, "12.50", "--memo", "lunch"]);
    assert_success(&output);
    assert!(stdout(&output).contains("Payment confirmed"));

    let output = demo(dir, &["activity"]);
    assert_success(&output);
    let feed = stdout(&output);
    assert!(feed.contains("lunch"));
    assert!(feed.contains("12.50"));
}

/// Amounts with more than two decimals are rejected
#[test]
fn test_pay_rejects_fine_amount() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let dir = temp_dir.path();

    assert_success(&demo(dir, &["init", "--force"]));
    assert_success(&demo(dir, &["fund", "50"]));

    let recipient = "0x00000000000000000000000000000000000000aa";
    let output = demo(dir, &["pay", recipient, "1.234"]);
    assert!(!output.status.success());
}
