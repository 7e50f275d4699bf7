//! Callback query routing: category taps, option picks, cancel, settings.
//!
//! Every branch answers the callback query and converts failures into one
//! user-facing response; index resolution is bounds-checked against the
//! stored option list, so a stale button soft-fails instead of crashing.

use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, CallbackQueryId, ParseMode};
use tokio::sync::mpsc;

use crate::bot::keyboard::{category_keyboard, options_keyboard, parse_callback, CallbackAction, SettingsAction};
use crate::bot::progress::spawn_progress_task;
use crate::bot::settings::{settings_keyboard, settings_text};
use crate::bot::{Bot, HandlerDeps};
use crate::core::{config, format_size};
use crate::delivery;
use crate::extract::download_with_selector;
use crate::jobs::{self, CancelError, JobKey, OptionKind, SelectError};

/// Capacity of the per-download progress channel; overflow drops events
const PROGRESS_CHANNEL_CAPACITY: usize = 32;

/// Routes one callback query.
pub async fn handle_callback(bot: Bot, q: CallbackQuery, deps: HandlerDeps) -> Result<(), crate::AppError> {
    let callback_id = q.id.clone();
    let Some(data) = q.data.as_deref() else {
        bot.answer_callback_query(callback_id).await?;
        return Ok(());
    };
    let Some(chat) = q.message.as_ref().map(|m| m.chat().id) else {
        bot.answer_callback_query(callback_id).await?;
        return Ok(());
    };

    let Some(action) = parse_callback(data) else {
        log::warn!("unparsable callback payload from chat {}: {:?}", chat.0, data);
        bot.answer_callback_query(callback_id)
            .text("⚠️ This button is no longer valid.")
            .await?;
        return Ok(());
    };

    match action {
        CallbackAction::Category { kind, message } => {
            let key = JobKey::new(chat, message);
            show_options(&bot, &deps, key, kind).await?;
            bot.answer_callback_query(callback_id).await?;
        }
        CallbackAction::Back { message } => {
            let key = JobKey::new(chat, message);
            if let Some(status_msg) = deps.jobs.status_msg(key).await {
                let _ = bot
                    .edit_message_reply_markup(chat, status_msg)
                    .reply_markup(category_keyboard(message))
                    .await;
            }
            bot.answer_callback_query(callback_id).await?;
        }
        CallbackAction::Pick { kind, message, index } => {
            let key = JobKey::new(chat, message);
            handle_pick(&bot, &deps, key, kind, index, callback_id).await?;
        }
        CallbackAction::Cancel { message } => {
            let key = JobKey::new(chat, message);
            match deps.jobs.cancel(key).await {
                Ok(td) => {
                    jobs::teardown(&bot, td).await;
                    bot.answer_callback_query(callback_id).text("Cancelled.").await?;
                }
                Err(CancelError::NotCancellable) => {
                    bot.answer_callback_query(callback_id)
                        .text("⚠️ Download already running — it can't be cancelled.")
                        .await?;
                }
                Err(CancelError::Gone) => {
                    bot.answer_callback_query(callback_id)
                        .text("⚠️ This request has already finished.")
                        .await?;
                }
            }
        }
        CallbackAction::Settings(action) => {
            handle_settings_tap(&bot, &q, &deps, action).await?;
        }
    }

    Ok(())
}

/// Renders the stored option list for a category tap.
async fn show_options(bot: &Bot, deps: &HandlerDeps, key: JobKey, kind: OptionKind) -> Result<(), crate::AppError> {
    let Some(options) = deps.jobs.options_for(key, kind).await else {
        // Job gone (expired or torn down); the keyboard under this tap is stale
        return Ok(());
    };
    let Some(status_msg) = deps.jobs.status_msg(key).await else {
        return Ok(());
    };

    if options.is_empty() {
        let label = match kind {
            OptionKind::Audio => "audio",
            OptionKind::Video => "video",
        };
        let _ = bot
            .edit_message_text(key.chat, status_msg, format!("❌ No {} formats available here.", label))
            .reply_markup(category_keyboard(key.message))
            .await;
        return Ok(());
    }

    let _ = bot
        .edit_message_reply_markup(key.chat, status_msg)
        .reply_markup(options_keyboard(kind, key.message, &options))
        .await;
    Ok(())
}

/// Resolves a pick tap: size guard, at-most-once binding, then the
/// download → delivery → teardown flow.
async fn handle_pick(
    bot: &Bot,
    deps: &HandlerDeps,
    key: JobKey,
    kind: OptionKind,
    index: usize,
    callback_id: CallbackQueryId,
) -> Result<(), crate::AppError> {
    let limit = config::limits::max_upload_size_bytes();

    let option = match deps.jobs.begin_download(key, kind, index, limit).await {
        Ok(option) => option,
        Err(SelectError::TooLarge { est, limit }) => {
            bot.answer_callback_query(callback_id)
                .text(format!(
                    "⚠️ ~{} is over the {} limit — pick a smaller option.",
                    format_size(est),
                    format_size(limit)
                ))
                .show_alert(true)
                .await?;
            return Ok(());
        }
        Err(SelectError::AlreadyStarted) => {
            bot.answer_callback_query(callback_id)
                .text("⚠️ Already in progress.")
                .await?;
            return Ok(());
        }
        Err(SelectError::Stale | SelectError::Gone) => {
            bot.answer_callback_query(callback_id)
                .text("⚠️ That option is no longer valid. Send the link again.")
                .await?;
            return Ok(());
        }
    };

    bot.answer_callback_query(callback_id).await?;

    // Drop the keyboard; from here the status message shows progress
    if let Some(status_msg) = deps.jobs.status_msg(key).await {
        let _ = bot
            .edit_message_text(key.chat, status_msg, format!("📥 Downloading {}…", option.label))
            .await;
    }

    let result = run_download(bot, deps, key, kind, &option.selector).await;

    match result {
        Ok(()) => {
            if let Some(td) = deps.jobs.complete(key).await {
                jobs::teardown(bot, td).await;
            }
        }
        Err(e) => {
            log::error!("job {} failed: {}", key, e);
            let user_text = e.user_message();
            if let Some(td) = deps.jobs.fail(key).await {
                jobs::teardown(bot, td).await;
            }
            bot.send_message(key.chat, user_text).parse_mode(ParseMode::Html).await?;
        }
    }

    Ok(())
}

/// The download and delivery legs, with progress reporting in between.
async fn run_download(
    bot: &Bot,
    deps: &HandlerDeps,
    key: JobKey,
    kind: OptionKind,
    selector: &str,
) -> Result<(), crate::AppError> {
    let snapshot = deps.jobs.snapshot(key).await.ok_or(crate::AppError::StaleSelection)?;

    let audio_profile = match kind {
        OptionKind::Audio => Some(deps.settings.get(key.chat).await.audio_profile),
        OptionKind::Video => None,
    };

    let label = snapshot
        .chosen
        .as_ref()
        .map(|o| o.label.clone())
        .unwrap_or_else(|| snapshot.title.clone());

    let (tx, rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
    let progress_task = spawn_progress_task(bot.clone(), deps.jobs.clone(), key, label, rx);

    let outcome = download_with_selector(&snapshot.url, selector, &snapshot.scratch_dir, audio_profile, tx).await;
    // Sender side is gone; let the reporter drain its queue before the
    // delivery edit races it
    let _ = progress_task.await;

    let outcome = outcome?;

    if !deps.jobs.mark_delivering(key).await {
        return Err(crate::AppError::StaleSelection);
    }

    delivery::send_media(bot, key.chat, &outcome, &snapshot, kind).await
}

/// Settings menu taps mutate only the tapping user's entry.
async fn handle_settings_tap(
    bot: &Bot,
    q: &CallbackQuery,
    deps: &HandlerDeps,
    action: SettingsAction,
) -> Result<(), crate::AppError> {
    let callback_id = q.id.clone();
    let Some((chat, message)) = q.message.as_ref().map(|m| (m.chat().id, m.id())) else {
        bot.answer_callback_query(callback_id).await?;
        return Ok(());
    };

    let updated = match action {
        SettingsAction::MaxHeight(height) => Some(deps.settings.set_max_height(chat, height).await),
        SettingsAction::AudioProfile(profile) => Some(deps.settings.set_audio_profile(chat, profile).await),
        SettingsAction::Close => None,
    };

    match updated {
        Some(settings) => {
            let _ = bot
                .edit_message_text(chat, message, settings_text(&settings))
                .parse_mode(ParseMode::Html)
                .reply_markup(settings_keyboard(&settings))
                .await;
            bot.answer_callback_query(callback_id).await?;
        }
        None => {
            let _ = bot.delete_message(chat, message).await;
            bot.answer_callback_query(callback_id).await?;
        }
    }

    Ok(())
}
