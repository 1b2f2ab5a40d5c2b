use fluxgen::{config::DEFAULT_PORT, logger, CloudflareClient, Config};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv_loaded = dotenv::dotenv().is_ok();

    logger::init_with_config(logger::LoggerConfig::from_env())?;
    if !dotenv_loaded {
        log::warn!("No .env file found, using system environment variables");
    }

    let config = Config::from_env()?;
    logger::log_config_info(&config);
    config.validate()?;

    let client = CloudflareClient::new(config.cloudflare.clone())?;
    log::info!(
        "Workers AI client ready ({} account(s))",
        client.account_count()
    );

    logger::log_startup_info(
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        config.port.unwrap_or(DEFAULT_PORT),
    );

    fluxgen::server::run(config, Arc::new(client)).await?;
    Ok(())
}
