mod config;
mod menu;

use crate::config::CLIArgs;
use crate::menu::Prompt;
use clap::Parser;
use rfa_network::{ClientConfig, Session};
use std::process::ExitCode;
use tracing::{error, info};

pub type Result<T> = std::result::Result<T, Error>;
pub type Error = Box<dyn std::error::Error>;

async fn run(config: ClientConfig) -> Result<()> {
    info!(
        "Connecting to {} from {} ({} attempts, {}ms timeout, {}ms freshness)",
        config.server, config.bind, config.retries, config.timeout_ms, config.freshness_ms
    );
    let session = Session::connect(&config).await?;
    let mut prompt = Prompt::stdin();
    menu::run(session, &mut prompt).await
}

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let args = CLIArgs::parse();

    let config = match config::load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let rt = match tokio::runtime::Builder::new_current_thread()
        .thread_name("client")
        .enable_io()
        .enable_time()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("Could not start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
