use herald_common::config::AppConfig;
use herald_notifier::TelegramNotifier;
use herald_watcher::client::StatusClient;
use herald_watcher::poller::{PollerSettings, StatusPoller};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "herald_watcher=debug,herald_notifier=info,herald_interpreter=info".into()
            }),
        )
        .json()
        .init();

    tracing::info!("Review Herald watcher starting...");

    // Load configuration
    let config = AppConfig::from_env()?;

    let source = StatusClient::new(
        config.status_api_url.clone(),
        config.status_api_token.clone(),
        config.request_timeout(),
    )?;
    let notifier = TelegramNotifier::new(
        config.telegram_api_url.clone(),
        config.telegram_bot_token.clone(),
        config.telegram_chat_id.clone(),
        config.request_timeout(),
    )?;

    let mut poller = StatusPoller::new(
        Box::new(source),
        Box::new(notifier),
        PollerSettings::from_config(&config),
    );

    // Run with graceful shutdown on Ctrl+C; the signal also cuts a pending sleep short
    tokio::select! {
        _ = poller.run() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping gracefully...");
        }
    }

    tracing::info!("Review Herald watcher stopped.");
    Ok(())
}
