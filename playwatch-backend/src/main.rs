use std::sync::Arc;

use anyhow::Context;
use playwatch_backend::config::Config;
use playwatch_backend::scheduler::spawn_cycles;
use playwatch_backend::sink::DiscordApi;
use playwatch_backend::build_poller;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing for structured logging
    #[cfg(debug_assertions)]
    let default_filter = "debug,hyper=warn,reqwest=warn,serenity=warn";
    #[cfg(not(debug_assertions))]
    let default_filter = "info,hyper=warn,reqwest=warn,serenity=warn";

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .compact()
        .init();
    tracing::info!("Starting playwatch...");

    let config = Config::from_env().context("invalid configuration")?;
    tracing::info!(
        "Configuration: server_id={}, channel_id={}, data_dir={}, directory_url={}",
        config.server_id,
        config.channel_id,
        config.data_dir.display(),
        config.directory_url
    );
    tracing::info!(
        "Polling: list every {}s, details every {}s, cache ttl {}s, max {} requests in flight, {} retries",
        config.player_list_interval.as_secs(),
        config.player_details_interval.as_secs(),
        config.cache_ttl.as_secs(),
        config.max_concurrent_requests,
        config.max_retries
    );

    let discord = DiscordApi::new(&config.discord_token);
    let (bot_name, bot_id) = discord
        .current_user()
        .await
        .context("failed to log in to Discord")?;
    tracing::info!("Logged in as {} (ID: {})", bot_name, bot_id);

    let poller = Arc::new(
        build_poller(&config, discord)
            .await
            .context("failed to start poller")?,
    );
    let (fast, slow) = spawn_cycles(
        poller,
        config.player_list_interval,
        config.player_details_interval,
    );

    tokio::select! {
        result = fast => {
            if let Err(e) = result {
                tracing::error!("Player list cycle stopped: {}", e);
            }
        }
        result = slow => {
            if let Err(e) = result {
                tracing::error!("Player details cycle stopped: {}", e);
            }
        }
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutting down");
        }
    }
    Ok(())
}
