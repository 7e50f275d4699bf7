//! Bot commands and their handlers.

use teloxide::prelude::*;
use teloxide::types::{Message, ParseMode};
use teloxide::utils::command::BotCommands;

use crate::bot::messages::extract_video_id;
use crate::bot::settings::{settings_keyboard, settings_text};
use crate::bot::{Bot, HandlerDeps};
use crate::core::AppError;
use crate::piped;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "What I can do:")]
pub enum Command {
    #[command(description = "show the welcome message")]
    Start,
    #[command(description = "show the welcome message")]
    Help,
    #[command(description = "download preferences")]
    Settings,
    #[command(description = "toggle audio-only mode")]
    Audio,
    #[command(description = "get direct stream links for a video")]
    Yt(String),
}

/// Sets up the command list shown in the Telegram UI.
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(Command::bot_commands()).await?;
    Ok(())
}

/// `/start` and `/help`.
pub async fn handle_start_command(bot: &Bot, msg: &Message) -> Result<(), AppError> {
    bot.send_message(
        msg.chat.id,
        "🎬 <b>Welcome!</b>\n\n\
         Paste a YouTube link and pick a format — I'll download it and send \
         the file back.\n\n\
         /yt &lt;link or id&gt; — direct stream links instead of a file\n\
         /settings — resolution ceiling and audio profile\n\
         /audio — audio-only mode for pasted links",
    )
    .parse_mode(ParseMode::Html)
    .await?;
    Ok(())
}

/// `/settings` — shows the settings menu.
pub async fn handle_settings_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), AppError> {
    let settings = deps.settings.get(msg.chat.id).await;
    bot.send_message(msg.chat.id, settings_text(&settings))
        .parse_mode(ParseMode::Html)
        .reply_markup(settings_keyboard(&settings))
        .await?;
    Ok(())
}

/// `/audio` — toggles audio-only mode for this user.
pub async fn handle_audio_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), AppError> {
    let settings = deps.settings.toggle_audio_mode(msg.chat.id).await;
    let text = if settings.audio_mode {
        "🎵 Audio mode ON — pasted links go straight to the audio options."
    } else {
        "🎬 Audio mode OFF — pasted links show both categories again."
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

/// `/yt <url|id>` — answers with direct stream links via Piped.
pub async fn handle_yt_command(bot: &Bot, msg: &Message, deps: &HandlerDeps, query: &str) -> Result<(), AppError> {
    let query = query.trim();
    if query.is_empty() {
        bot.send_message(msg.chat.id, "⚠️ Usage: /yt <YouTube URL or video id>")
            .await?;
        return Ok(());
    }

    let Some(video_id) = extract_video_id(query) else {
        bot.send_message(msg.chat.id, "❌ Couldn't find a valid YouTube video id in that.")
            .await?;
        return Ok(());
    };

    let pending = bot.send_message(msg.chat.id, "⏳ Fetching video info…").await?;

    let result = piped::fetch_streams(&deps.http, &video_id).await;
    let text = match result {
        Ok(streams) => {
            if let Some(error) = streams.error.as_deref() {
                log::warn!("Piped error for id {}: {}", video_id, error);
                format!("❌ API error: {}", crate::core::escape_html(error))
            } else {
                piped::links_message(&video_id, &streams)
                    .unwrap_or_else(|| "❌ No direct video streams with audio found.".to_string())
            }
        }
        Err(e) => {
            log::error!("Piped fetch failed for id {}: {}", video_id, e);
            e.user_message()
        }
    };

    bot.edit_message_text(msg.chat.id, pending.id, text)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}
