//! Sending finished media files back to the chat.
//!
//! The caption is derived from probe metadata; the actual on-disk size is
//! re-checked against the platform cap because estimates can lie. A
//! transport failure here is a distinct, user-visible error and is never
//! re-attempted automatically.

use teloxide::prelude::*;
use teloxide::types::{ChatId, InputFile, ParseMode};

use crate::bot::Bot;
use crate::core::{config, escape_html, format_duration, AppError};
use crate::extract::DownloadOutcome;
use crate::jobs::{JobSnapshot, OptionKind};

/// Extensions delivered through `send_audio`
const AUDIO_EXTS: [&str; 6] = ["mp3", "m4a", "opus", "flac", "ogg", "wav"];

/// Sends the produced file to the chat.
///
/// # Errors
/// - [`AppError::SizeLimitExceeded`] when the actual file is over the cap
/// - [`AppError::Delivery`] when Telegram rejects the upload
pub async fn send_media(
    bot: &Bot,
    chat: ChatId,
    outcome: &DownloadOutcome,
    job: &JobSnapshot,
    kind: OptionKind,
) -> Result<(), AppError> {
    let limit = config::limits::max_upload_size_bytes();
    if outcome.size > limit {
        return Err(AppError::SizeLimitExceeded {
            size: outcome.size,
            limit,
        });
    }

    let caption = caption_html(&job.title, job.uploader.as_deref(), job.duration);
    let input = InputFile::file(outcome.path.clone());

    log::info!(
        "delivering {} ({} bytes) to chat {}",
        outcome.path.display(),
        outcome.size,
        chat.0
    );

    let result = match kind {
        OptionKind::Audio if is_audio_file(outcome) => {
            let mut request = bot.send_audio(chat, input).caption(caption).parse_mode(ParseMode::Html);
            if let Some(duration) = job.duration {
                request = request.duration(duration);
            }
            request.await
        }
        _ => {
            let mut request = bot.send_video(chat, input).caption(caption).parse_mode(ParseMode::Html);
            if let Some(duration) = job.duration {
                request = request.duration(duration);
            }
            request.await
        }
    };

    result.map_err(|e| AppError::Delivery(e.to_string()))?;
    Ok(())
}

fn is_audio_file(outcome: &DownloadOutcome) -> bool {
    outcome
        .path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| AUDIO_EXTS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Caption: bold title, uploader and duration when known.
fn caption_html(title: &str, uploader: Option<&str>, duration: Option<u32>) -> String {
    let mut caption = format!("<b>{}</b>", escape_html(title));
    if let Some(uploader) = uploader {
        caption.push_str(&format!("\n👤 {}", escape_html(uploader)));
    }
    if let Some(duration) = duration {
        caption.push_str(&format!("\n⏱ {}", format_duration(duration)));
    }
    caption
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn outcome(path: &str, size: u64) -> DownloadOutcome {
        DownloadOutcome {
            path: PathBuf::from(path),
            size,
        }
    }

    // ==================== caption tests ====================

    #[test]
    fn test_caption_full() {
        let caption = caption_html("A <Song>", Some("Band & Co"), Some(212));
        assert_eq!(caption, "<b>A &lt;Song&gt;</b>\n👤 Band &amp; Co\n⏱ 3:32");
    }

    #[test]
    fn test_caption_title_only() {
        assert_eq!(caption_html("Title", None, None), "<b>Title</b>");
    }

    // ==================== file kind tests ====================

    #[test]
    fn test_is_audio_file() {
        assert!(is_audio_file(&outcome("/tmp/x.mp3", 1)));
        assert!(is_audio_file(&outcome("/tmp/x.FLAC", 1)));
        assert!(!is_audio_file(&outcome("/tmp/x.mp4", 1)));
        assert!(!is_audio_file(&outcome("/tmp/noext", 1)));
    }
}
