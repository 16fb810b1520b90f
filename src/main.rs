#![cfg(not(tarpaulin_include))]

use rusty_calculator::app;
use rusty_calculator::config::AppConfig;
use std::env;

/// Main entry point for the web application
///
/// Settings come from the environment (`CALCULATOR_ADDR`,
/// `CALCULATOR_DATABASE`) and can be overridden positionally:
///
/// ```text
/// website [addr] [database-dir]
/// ```
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let config = AppConfig::from_env().with_args(&args);

    log::info!(
        "Starting calculator server on {} with database {}",
        config.bind_addr,
        config.database_dir.display()
    );
    app::run(config).await
}
