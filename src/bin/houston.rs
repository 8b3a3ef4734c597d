use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::watch;

use houston::api::janitor::spawn_janitor;
use houston::api::Api;
use houston::config::HoustonConfig;
use houston::logging::init_logging;
use houston::web;

#[derive(Parser)]
#[command(name = "houston", about = "HOUSTON · Workflow Orchestration API")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the Houston API server
    Api,
    /// Print the version number
    Version,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Version => {
            println!("v{}", env!("CARGO_PKG_VERSION"));
        }
        Command::Api => {
            init_logging();

            let config = match HoustonConfig::from_env() {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("{e}");
                    std::process::exit(1);
                }
            };

            let api = match Api::new(config).await {
                Ok(api) => Arc::new(api),
                Err(e) => {
                    eprintln!("{e}");
                    std::process::exit(1);
                }
            };

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            spawn_janitor(Arc::clone(&api), shutdown_rx.clone());

            let result = web::serve(api, shutdown_rx).await;
            let _ = shutdown_tx.send(true);

            if let Err(e) = result {
                eprintln!("{e}");
                std::process::exit(1);
            }
        }
    }
}
