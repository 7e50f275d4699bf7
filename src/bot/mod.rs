//! Telegram bot integration: dispatcher schema, handlers, keyboards.

pub mod callbacks;
pub mod commands;
pub mod keyboard;
pub mod messages;
pub mod progress;
pub mod schema;
pub mod settings;

pub use commands::Command;
pub use schema::{schema, HandlerDeps};

use reqwest::ClientBuilder;
use teloxide::types::InlineKeyboardButton;

use crate::core::config;

/// The bot type used across the crate
pub type Bot = teloxide::Bot;

/// Shorthand for a callback button.
pub fn cb(text: impl Into<String>, data: impl Into<String>) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text.into(), data.into())
}

/// Creates a Bot instance with custom or default API URL
///
/// The HTTP client timeout is sized for media uploads, not chat messages.
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - Invalid BOT_API_URL or client build failure
pub fn create_bot() -> anyhow::Result<Bot> {
    let client = ClientBuilder::new().timeout(config::network::telegram_timeout()).build()?;

    let bot = if let Ok(bot_api_url) = std::env::var("BOT_API_URL") {
        log::info!("Using custom Bot API URL: {}", bot_api_url);
        let url = url::Url::parse(&bot_api_url).map_err(|e| anyhow::anyhow!("Invalid BOT_API_URL: {}", e))?;
        Bot::from_env_with_client(client).set_api_url(url)
    } else {
        Bot::from_env_with_client(client)
    };

    Ok(bot)
}
