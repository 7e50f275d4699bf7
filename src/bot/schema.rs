//! Dispatcher schema and handler dependencies.
//!
//! One handler tree serves both transports (polling and webhook) — the
//! listener choice is a deployment concern, not a design fork.

use std::sync::Arc;

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;

use crate::bot::commands::{
    handle_audio_command, handle_settings_command, handle_start_command, handle_yt_command, Command,
};
use crate::bot::messages::{handle_url_message, recognized_url};
use crate::bot::settings::SettingsStore;
use crate::bot::Bot;
use crate::core::config;
use crate::jobs::JobStore;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub jobs: Arc<JobStore>,
    pub settings: Arc<SettingsStore>,
    /// Shared HTTP client for the Piped API
    pub http: reqwest::Client,
}

impl HandlerDeps {
    /// Create handler dependencies with fresh stores.
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            jobs: JobStore::new(),
            settings: SettingsStore::new(),
            http: reqwest::Client::builder()
                .timeout(config::network::piped_timeout())
                .build()?,
        })
    }
}

/// Creates the main dispatcher schema for the Telegram bot.
///
/// The same tree is used in production and in integration tests.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_commands = deps.clone();
    let deps_messages = deps.clone();
    let deps_callback = deps;

    dptree::entry()
        .branch(command_handler(deps_commands))
        .branch(message_handler(deps_messages))
        .branch(callback_handler(deps_callback))
}

/// Handler for bot commands (/start, /settings, /audio, /yt)
fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                log::info!("received command {:?} from chat {}", cmd, msg.chat.id);

                let result = match cmd {
                    Command::Start | Command::Help => handle_start_command(&bot, &msg).await,
                    Command::Settings => handle_settings_command(&bot, &msg, &deps).await,
                    Command::Audio => handle_audio_command(&bot, &msg, &deps).await,
                    Command::Yt(query) => handle_yt_command(&bot, &msg, &deps, &query).await,
                };

                if let Err(e) = result {
                    log::error!("command handler failed for chat {}: {}", msg.chat.id, e);
                    let _ = bot.send_message(msg.chat.id, e.user_message()).await;
                }
                Ok(())
            }
        },
    ))
}

/// Handler for plain messages carrying a recognized video URL
fn message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.text().map(|text| recognized_url(text).is_some()).unwrap_or(false))
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                if let Err(e) = handle_url_message(&bot, &msg, &deps).await {
                    log::error!("url handler failed for chat {}: {}", msg.chat.id, e);
                    let _ = bot.send_message(msg.chat.id, e.user_message()).await;
                }
                Ok(())
            }
        })
}

/// Handler for callback queries (inline keyboard buttons)
fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move {
            let chat = q.message.as_ref().map(|m| m.chat().id);
            if let Err(e) = crate::bot::callbacks::handle_callback(bot.clone(), q, deps).await {
                log::error!("callback handler failed: {}", e);
                if let Some(chat) = chat {
                    let _ = bot.send_message(chat, e.user_message()).await;
                }
            }
            Ok(())
        }
    })
}
