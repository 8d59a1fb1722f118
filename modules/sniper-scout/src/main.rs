use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sniper_common::Config;
use sniper_scout::{notify::DiscordWebhook, scout::Scout};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("sniper=info".parse()?))
        .init();

    info!("Sora sniper starting...");

    let config = Config::from_env();

    let Some(webhook_url) = config.discord_webhook_url.clone() else {
        error!("DISCORD_WEBHOOK_URL is not set, nothing to report to. Exiting.");
        return Ok(());
    };

    let notifier = match DiscordWebhook::new(webhook_url) {
        Ok(hook) => hook,
        Err(e) => {
            error!(error = %e, "Failed to build Discord client");
            return Ok(());
        }
    };

    let scout = match Scout::from_config(&config, Box::new(notifier)) {
        Ok(scout) => scout,
        Err(e) => {
            error!(error = %e, "Failed to set up sniper");
            return Ok(());
        }
    };

    match scout.run().await {
        Ok(output) => info!(new_codes = output.entries.len(), "Sniper run complete"),
        Err(e) => error!(error = %e, "Sniper run failed"),
    }
    Ok(())
}
