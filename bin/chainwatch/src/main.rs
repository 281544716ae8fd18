//! Entrypoint.

use std::time::Duration;

use clap::Parser;
use config::{Command, Opts};
use dotenvy::dotenv;
use driver::driver::{Driver, add_address, list_addresses, open_store};
use runtime::shutdown::{ShutdownSignal, run_until_shutdown_graceful};
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::filter::EnvFilter;

/// Time the watcher gets to finish the block in flight after a shutdown signal
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> eyre::Result<()> {
    if let Ok(custom_env_file) = std::env::var("ENV_FILE") {
        dotenvy::from_filename(custom_env_file)?;
    } else {
        // Try the default .env file, and ignore if it doesn't exist.
        dotenv().ok();
    }

    let opts = Opts::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match opts.command {
        Command::Add { ref address } => {
            let store = open_store(&opts).await?;
            let registered = add_address(&store, address).await?;
            println!("Watching {registered}");
        }
        Command::Addresses => {
            let store = open_store(&opts).await?;
            let addresses = list_addresses(&store).await?;
            if addresses.is_empty() {
                warn!("No watched addresses");
            }
            for watched in addresses {
                println!("{}", watched.address);
            }
        }
        Command::Status => {
            let status = Driver::new(&opts).await?.status().await?;
            println!("{status}");
        }
        Command::Start => {
            info!("Chainwatch starting...");
            let driver = Driver::new(&opts).await?;
            let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

            run_until_shutdown_graceful(
                driver.start(Some(shutdown_rx)),
                ShutdownSignal::new()?,
                SHUTDOWN_GRACE,
                move || {
                    let _ = shutdown_tx.send(());
                },
            )
            .await?;
            info!("Chainwatch stopped");
        }
    }

    Ok(())
}
