//! Telegram shopping-list bot: screens, update handling and the polling loop.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use shoplist_core::backend::{MemoryBackend, RestBackend, UserDirectory};
use shoplist_core::config::{Config, paths};
use shoplist_core::core::SessionStore;

use crate::bot::{BotContext, dispatch_update, new_user_queues};
use crate::commands::telegram_command_specs;
use crate::telegram::{TelegramClient, TelegramSettings};

mod bot;
mod commands;
mod handlers;
mod nodes;
mod render;
mod telegram;

/// Pause after a failed poll before asking Telegram again.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(1);

/// How the bot is started.
#[derive(Debug, Clone, Copy, Default)]
pub struct BotOptions {
    /// Keep users and lists in process memory instead of the REST backend.
    pub in_memory: bool,
}

/// Loads the configuration and polls Telegram until Ctrl-C.
///
/// # Errors
/// Fails when the configuration is unusable (no bot token, missing or invalid
/// backend URL).
pub async fn run(options: BotOptions) -> Result<()> {
    let config = Config::load()?;
    let settings = TelegramSettings::from_config(&config)?;
    let config_path = paths::config_path();
    if config_path.exists() {
        tracing::info!(path = %config_path.display(), "config file loaded");
    }
    run_bot(&config, settings, options).await
}

fn user_directory(config: &Config, options: BotOptions) -> Result<Arc<dyn UserDirectory>> {
    if options.in_memory {
        tracing::warn!("using the in-memory backend; lists are lost on exit");
        return Ok(Arc::new(MemoryBackend::new()));
    }
    let settings = config.backend.rest_settings()?;
    tracing::info!(base_url = %settings.base_url, "using the REST backend");
    let backend = RestBackend::new(settings)?;
    Ok(Arc::new(backend))
}

async fn run_bot(config: &Config, settings: TelegramSettings, options: BotOptions) -> Result<()> {
    let directory = user_directory(config, options)?;
    let sessions = SessionStore::new(
        directory,
        config.session.ttl(),
        &config.session.start_node,
    );
    let router = nodes::router(&nodes::NodeOptions::new(config.service_version.clone()));
    if !router.contains(sessions.start_node()) {
        return Err(anyhow!(
            "session.start_node '{}' is not a known screen",
            sessions.start_node()
        ));
    }

    let client = TelegramClient::new(settings.bot_token);
    if let Err(err) = client.set_my_commands(&telegram_command_specs()).await {
        tracing::warn!("failed to register bot commands: {err:#}");
    }

    let allowlist_len = settings.allowlist_user_ids.len();
    let context = Arc::new(BotContext::new(
        client.clone(),
        sessions,
        router,
        settings.allowlist_user_ids,
        settings.debug_tokens,
    ));
    let user_queues = new_user_queues();

    let mut offset: Option<i64> = None;
    let poll_timeout = settings.poll_timeout;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    tracing::info!(
        version = %config.service_version,
        allowlist_users = allowlist_len,
        "shoplist bot started; polling for updates"
    );

    loop {
        let current_offset = offset;
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("shutting down Telegram bot");
                break;
            }
            updates = client.get_updates(current_offset, poll_timeout) => {
                let updates = match updates {
                    Ok(updates) => updates,
                    Err(err) => {
                        tracing::warn!("Telegram polling error: {err:#}");
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                        continue;
                    }
                };

                if !updates.is_empty() {
                    tracing::debug!(count = updates.len(), "received updates");
                }
                for update in updates {
                    offset = Some(update.update_id + 1);
                    dispatch_update(&user_queues, &context, update).await;
                }
            }
        }
    }

    Ok(())
}
