//! mimic-bot - Main entry point.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;

use mimic_bot::ai::manager::SessionManager;
use mimic_bot::ai::meta::MetaAiBackend;
use mimic_bot::censor::CensorList;
use mimic_bot::channels::discord::DiscordChannel;
use mimic_bot::config::BotConfig;
use mimic_bot::dispatch::Dispatcher;
use mimic_bot::logging::init_logging;
use mimic_bot::persona::PersonaSource;
use mimic_bot::watchdog;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(&std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()));

    let config = match BotConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Startup configuration missing");
            return Err(e.into());
        }
    };

    tracing::info!("mimic-bot v{}", env!("CARGO_PKG_VERSION"));

    let censor = CensorList::load(&config.censor_list_path);
    tracing::info!(words = censor.len(), "Censor list loaded");

    let backend = Arc::new(MetaAiBackend::new(config.docker_env));
    let persona = PersonaSource::Corpus {
        path: config.persona_corpus_path.clone(),
        username: config.persona_name.clone(),
    };
    let manager = Arc::new(SessionManager::new(backend, persona));

    let discord = Arc::new(DiscordChannel::new(config.discord_token.clone()));
    let bot_user_id = discord.connect().await?;

    // Session boot is best-effort: a failure leaves the handle absent and
    // the first request retries lazily.
    if !manager.start_session().await {
        tracing::warn!("Initial session start failed, will retry on first request");
    }

    let watchdog_handle = watchdog::spawn(Arc::clone(&manager), watchdog::CHECK_PERIOD);

    let dispatcher = Arc::new(Dispatcher::new(
        discord.clone(),
        Arc::clone(&manager),
        censor,
        bot_user_id,
        config.owner_id.clone(),
        config.refusal_phrase.clone(),
    ));

    let (tx, mut rx) = mpsc::channel(64);

    // Gateway listener with reconnect loop.
    let listener = {
        let discord = discord.clone();
        tokio::spawn(async move {
            loop {
                match discord.listen(tx.clone()).await {
                    Ok(()) => tracing::warn!("Gateway closed, reconnecting"),
                    Err(e) => tracing::error!(error = %e, "Gateway error, reconnecting"),
                }
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        })
    };

    tracing::info!("Ready, dispatching messages");

    loop {
        tokio::select! {
            maybe_msg = rx.recv() => {
                match maybe_msg {
                    Some(msg) => Arc::clone(&dispatcher).handle_message(msg).await,
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    listener.abort();
    watchdog_handle.abort();
    Ok(())
}
