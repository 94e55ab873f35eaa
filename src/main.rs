//! # Atmosphere API Main Entry Point

use atmosphere::{config::ConfigLoader, server::run_server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from layered env files and variables
    let config = ConfigLoader::new().load()?;

    println!("Loaded configuration for profile: {}", config.profile);
    if let Ok(redacted_json) = config.redacted_json() {
        println!("Configuration: {}", redacted_json);
    }

    run_server(config).await
}
