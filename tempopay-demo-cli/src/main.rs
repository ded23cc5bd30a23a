//! Tempo Pay Demo CLI
//!
//! Command-line wallet for trying out subscriptions on a simulated Tempo testnet.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod session;
mod ui;

#[derive(Parser)]
#[command(name = "tempopay-demo")]
#[command(about = "Tempo Pay Demo CLI - stablecoin wallet with delegated-key subscriptions", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Custom storage directory (can also be set via TEMPOPAY_DEMO_DIR env var)
    #[arg(long, global = true)]
    storage_dir: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new wallet
    Init {
        /// Overwrite an existing wallet without asking
        #[arg(long)]
        force: bool,
    },

    /// Show the wallet address
    Whoami,

    /// Mint testnet AlphaUSD into the wallet
    Fund {
        /// Amount, e.g. 100 or 12.50
        amount: String,
    },

    /// Show the wallet balance
    Balance,

    /// List services, active subscriptions first
    Services,

    /// Subscribe to a service
    Subscribe {
        /// Service ID
        service: String,
    },

    /// Cancel a subscription and revoke its access key
    Cancel {
        /// Service ID
        service: String,
    },

    /// Subscribe if inactive, cancel if active
    Toggle {
        /// Service ID
        service: String,
    },

    /// Show subscription details
    Status {
        /// Service ID (all services when omitted)
        service: Option<String>,
    },

    /// Run a single billing pass
    Tick,

    /// Run the billing monitor in the foreground
    Run {
        /// Stop after this many seconds
        #[arg(short, long, default_value = "60")]
        seconds: u64,
    },

    /// Send a payment from the wallet
    Pay {
        /// Recipient address (0x...)
        recipient: String,

        /// Amount, at most two decimal places
        amount: String,

        /// Optional memo (up to 32 bytes)
        #[arg(short, long)]
        memo: Option<String>,
    },

    /// Show recent transfers
    Activity {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(
                "tempopay_demo_cli=debug,tempopay_lib=debug,tempopay_subscriptions=debug",
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("tempopay_demo_cli=info,tempopay_lib=warn,tempopay_subscriptions=warn")
            .init();
    }

    // Setup storage directory
    let storage_dir = if let Some(dir) = cli.storage_dir {
        PathBuf::from(dir)
    } else if let Ok(dir) = std::env::var("TEMPOPAY_DEMO_DIR") {
        PathBuf::from(dir)
    } else {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tempopay-demo")
    };

    // Dispatch commands
    match cli.command {
        Commands::Init { force } => {
            commands::init::run(&storage_dir, force, cli.verbose).await?;
        }
        Commands::Whoami => {
            commands::wallet::whoami(&storage_dir).await?;
        }
        Commands::Fund { amount } => {
            commands::wallet::fund(&storage_dir, &amount).await?;
        }
        Commands::Balance => {
            commands::wallet::balance(&storage_dir).await?;
        }
        Commands::Services => {
            commands::subscriptions::services(&storage_dir).await?;
        }
        Commands::Subscribe { service } => {
            commands::subscriptions::subscribe(&storage_dir, &service).await?;
        }
        Commands::Cancel { service } => {
            commands::subscriptions::cancel(&storage_dir, &service).await?;
        }
        Commands::Toggle { service } => {
            commands::subscriptions::toggle(&storage_dir, &service).await?;
        }
        Commands::Status { service } => {
            commands::subscriptions::status(&storage_dir, service.as_deref()).await?;
        }
        Commands::Tick => {
            commands::billing::tick(&storage_dir).await?;
        }
        Commands::Run { seconds } => {
            commands::billing::run(&storage_dir, seconds, cli.verbose).await?;
        }
        Commands::Pay {
            recipient,
            amount,
            memo,
        } => {
            commands::pay::run(&storage_dir, &recipient, &amount, memo).await?;
        }
        Commands::Activity { limit } => {
            commands::activity::run(&storage_dir, limit).await?;
        }
    }

    Ok(())
}
