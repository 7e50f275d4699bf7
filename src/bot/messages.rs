//! URL recognition and the probe flow.
//!
//! A recognized YouTube link in a plain message starts a job: the chat's
//! slot is reserved, the URL is probed for available encodings, and the
//! ranked options are stored and rendered as a category chooser.

use once_cell::sync::Lazy;
use regex::Regex;
use teloxide::prelude::*;
use teloxide::types::{Message, ParseMode};
use url::Url;

use crate::bot::keyboard::{category_keyboard, options_keyboard};
use crate::bot::{Bot, HandlerDeps};
use crate::core::escape_html;
use crate::extract::{filter_by_max_height, probe, rank_streams};
use crate::jobs::{self, BeginError, JobKey, OptionKind};

/// Matches the video id in every common YouTube URL shape (watch, short
/// youtu.be, embed, shorts).
static YOUTUBE_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:youtube\.com/(?:[^/]+/.+/|(?:v|e(?:mbed)?)/|.*[?&]v=)|youtu\.be/|youtube\.com/shorts/)([a-zA-Z0-9_-]{11})",
    )
    .expect("static regex compiles")
});

static BARE_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_-]{11}$").expect("static regex compiles"));

/// Extracts a YouTube video id from a URL or a bare 11-character id.
pub fn extract_video_id(text: &str) -> Option<String> {
    if let Some(caps) = YOUTUBE_ID_RE.captures(text) {
        return caps.get(1).map(|m| m.as_str().to_string());
    }
    if BARE_ID_RE.is_match(text) {
        return Some(text.to_string());
    }
    None
}

/// Canonical watch URL for a message that contains a recognizable link.
///
/// Bare ids are deliberately NOT recognized here — only in /yt — so that
/// arbitrary 11-character chat messages don't trigger downloads.
pub fn recognized_url(text: &str) -> Option<Url> {
    let caps = YOUTUBE_ID_RE.captures(text)?;
    let id = caps.get(1)?.as_str();
    Url::parse(&format!("https://www.youtube.com/watch?v={}", id)).ok()
}

/// Handles a plain message that carries a recognized video URL.
pub async fn handle_url_message(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), crate::AppError> {
    let Some(text) = msg.text() else { return Ok(()) };
    let Some(url) = recognized_url(text) else { return Ok(()) };

    let key = JobKey::new(msg.chat.id, msg.id);

    // Per-chat single-flight: one active job per chat, a second URL is
    // rejected while the first is live
    let scratch_dir = match deps.jobs.begin(key, url.clone()).await {
        Ok(dir) => dir,
        Err(BeginError::ChatBusy) => {
            bot.send_message(
                msg.chat.id,
                "⏳ One download at a time — finish or cancel the current one first.",
            )
            .await?;
            return Ok(());
        }
    };

    if let Err(e) = tokio::fs::create_dir_all(&scratch_dir).await {
        log::error!("cannot create scratch dir {}: {}", scratch_dir.display(), e);
        if let Some(td) = deps.jobs.fail(key).await {
            jobs::teardown(bot, td).await;
        }
        bot.send_message(msg.chat.id, crate::AppError::Io(e).user_message()).await?;
        return Ok(());
    }

    let status = bot.send_message(msg.chat.id, "🔍 Fetching available formats…").await?;
    deps.jobs.set_status_msg(key, status.id).await;

    let probe_result = match probe(&url).await {
        Ok(result) => result,
        Err(e) => {
            // Structural failure: surface it, never retry silently
            let user_text = e.user_message();
            if let Some(td) = deps.jobs.fail(key).await {
                jobs::teardown(bot, td).await;
            }
            bot.send_message(msg.chat.id, user_text).await?;
            return Ok(());
        }
    };

    let settings = deps.settings.get(msg.chat.id).await;
    let mut ranked = rank_streams(&probe_result.streams);
    ranked.video = filter_by_max_height(&ranked.video, settings.max_height);

    if ranked.is_empty() {
        if let Some(td) = deps.jobs.fail(key).await {
            jobs::teardown(bot, td).await;
        }
        bot.send_message(msg.chat.id, "❌ No downloadable formats found for this video.")
            .await?;
        return Ok(());
    }

    let audio_mode = settings.audio_mode && !ranked.audio.is_empty();
    let audio_options = ranked.audio.clone();
    let title = probe_result.title.clone();

    if !deps.jobs.store_options(key, &probe_result, ranked).await {
        // Job vanished while probing (swept or cancelled)
        return Ok(());
    }

    let header = format!("🎬 <b>{}</b>\n\nPick what to download:", escape_html(&title));
    let keyboard = if audio_mode {
        options_keyboard(OptionKind::Audio, key.message, &audio_options)
    } else {
        category_keyboard(key.message)
    };
    bot.edit_message_text(msg.chat.id, status.id, header)
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboard)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== extract_video_id tests ====================

    #[test]
    fn test_extract_from_watch_url() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_extract_from_short_url() {
        assert_eq!(
            extract_video_id("https://youtu.be/dQw4w9WgXcQ?t=10"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_extract_from_shorts_url() {
        assert_eq!(
            extract_video_id("https://youtube.com/shorts/abcdefghijk"),
            Some("abcdefghijk".to_string())
        );
    }

    #[test]
    fn test_extract_from_embed_url() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/embed/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_extract_from_bare_id() {
        assert_eq!(extract_video_id("dQw4w9WgXcQ"), Some("dQw4w9WgXcQ".to_string()));
    }

    #[test]
    fn test_extract_rejects_junk() {
        assert_eq!(extract_video_id("not a video"), None);
        assert_eq!(extract_video_id("https://example.com/watch?v=dQw4w9WgXcQ"), None);
        assert_eq!(extract_video_id("tooshort"), None);
    }

    #[test]
    fn test_extract_from_url_with_extra_params() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?list=PL123&v=dQw4w9WgXcQ&t=1"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    // ==================== recognized_url tests ====================

    #[test]
    fn test_recognized_url_canonicalizes() {
        let url = recognized_url("check this: https://youtu.be/dQw4w9WgXcQ").expect("recognized");
        assert_eq!(url.as_str(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    }

    #[test]
    fn test_recognized_url_ignores_bare_ids() {
        assert!(recognized_url("dQw4w9WgXcQ").is_none());
    }

    #[test]
    fn test_recognized_url_ignores_plain_text() {
        assert!(recognized_url("hello there").is_none());
    }
}
