mod agg;
mod api;
mod cli;
mod db;
mod error;
mod ingest;
mod models;

use clap::Parser;
use cli::{App, Cli};
use colored::Colorize;
use error::Result;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    info!("Initializing measurement store app...");
    let app = match App::new().await {
        Ok(app) => {
            info!("Application initialized successfully.");
            app
        },
        Err(e) => {
            error!("Failed to initialize application: {:?}", e);
            println!(
                "{}",
                "Error: Failed to initialize application. Check logs.".red()
            );
            return Err(e);
        },
    };

    if let Err(e) = app.run(cli).await {
        error!("Command execution failed: {:?}", e);
        println!("{} {}", "Error:".red(), e.to_string().red());
        return Err(e);
    }

    Ok(())
}
