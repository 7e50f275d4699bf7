//! Best-effort progress reporting into the job's status message.
//!
//! The downloader pushes [`ProgressEvent`]s into a bounded channel; this
//! task drains it and edits the status message in place. Edits are
//! throttled and every failure is swallowed — a user deleting the message
//! mid-download must never abort the download itself.

use std::sync::Arc;
use std::time::Instant;

use teloxide::prelude::*;
use tokio::sync::mpsc;

use crate::bot::Bot;
use crate::core::{config, format_size};
use crate::extract::{DownloadPhase, ProgressEvent};
use crate::jobs::{JobKey, JobStore};

const BAR_WIDTH: usize = 10;

/// Spawns the consumer side of the progress channel for one job.
///
/// Ends when the sender is dropped (download finished or failed).
pub fn spawn_progress_task(
    bot: Bot,
    store: Arc<JobStore>,
    key: JobKey,
    label: String,
    mut rx: mpsc::Receiver<ProgressEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_edit: Option<Instant> = None;
        let mut last_percent: Option<u8> = None;

        while let Some(event) = rx.recv().await {
            let percent = percent_of(&event);

            // Throttle: phase changes always go through, byte updates only
            // every few percent and not too often
            if event.phase == DownloadPhase::Downloading {
                let step = config::progress::MIN_PERCENT_STEP;
                let too_soon = last_edit.is_some_and(|t| t.elapsed() < config::progress::min_edit_interval());
                let too_close = match (percent, last_percent) {
                    (Some(now), Some(prev)) => now < prev.saturating_add(step),
                    _ => false,
                };
                if too_soon || too_close {
                    continue;
                }
            }
            last_edit = Some(Instant::now());
            last_percent = percent.or(last_percent);

            let text = render_progress(&label, &event);
            edit_or_create(&bot, &store, key, &text).await;
        }
    })
}

/// Edits the job's status message, creating it on first use.
///
/// Best-effort on both paths: a failed edit (message deleted by the user)
/// is logged at debug and otherwise ignored.
async fn edit_or_create(bot: &Bot, store: &JobStore, key: JobKey, text: &str) {
    match store.status_msg(key).await {
        Some(msg_id) => {
            if let Err(e) = bot.edit_message_text(key.chat, msg_id, text).await {
                log::debug!("progress edit failed for job {}: {}", key, e);
            }
        }
        None => match bot.send_message(key.chat, text).await {
            Ok(msg) => store.set_status_msg(key, msg.id).await,
            Err(e) => log::debug!("progress message create failed for job {}: {}", key, e),
        },
    }
}

fn percent_of(event: &ProgressEvent) -> Option<u8> {
    event
        .total
        .filter(|total| *total > 0)
        .map(|total| ((event.transferred as f64 / total as f64) * 100.0).round().min(100.0) as u8)
}

/// Renders the status message body for one progress event.
fn render_progress(label: &str, event: &ProgressEvent) -> String {
    match event.phase {
        DownloadPhase::Finished => format!("📤 {} — uploading to Telegram…", label),
        DownloadPhase::Downloading => match percent_of(event) {
            Some(percent) => format!(
                "📥 {}\n{} {}% of {}",
                label,
                progress_bar(percent),
                percent,
                format_size(event.total.unwrap_or(0)),
            ),
            None => format!("📥 {}\ndownloading… ({} so far)", label, format_size(event.transferred)),
        },
    }
}

/// Classic bar: `[█████░░░░░]`
fn progress_bar(percent: u8) -> String {
    let filled = (percent as usize * BAR_WIDTH) / 100;
    let filled = filled.min(BAR_WIDTH);
    format!("[{}{}]", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(transferred: u64, total: Option<u64>, phase: DownloadPhase) -> ProgressEvent {
        ProgressEvent {
            transferred,
            total,
            phase,
        }
    }

    // ==================== progress_bar tests ====================

    #[test]
    fn test_progress_bar_bounds() {
        assert_eq!(progress_bar(0), "[░░░░░░░░░░]");
        assert_eq!(progress_bar(100), "[██████████]");
        assert_eq!(progress_bar(50), "[█████░░░░░]");
    }

    #[test]
    fn test_progress_bar_never_overflows() {
        assert_eq!(progress_bar(255).chars().filter(|c| *c == '█').count(), BAR_WIDTH);
    }

    // ==================== render tests ====================

    #[test]
    fn test_render_known_total() {
        let text = render_progress("1080p", &event(50 * 1024 * 1024, Some(100 * 1024 * 1024), DownloadPhase::Downloading));
        assert!(text.contains("50%"));
        assert!(text.contains("100.0 MB"));
        assert!(text.contains("1080p"));
    }

    #[test]
    fn test_render_unknown_total() {
        let text = render_progress("audio", &event(1024 * 1024, None, DownloadPhase::Downloading));
        assert!(text.contains("downloading…"));
        assert!(text.contains("1.0 MB"));
    }

    #[test]
    fn test_render_finished_phase() {
        let text = render_progress("audio", &event(1, Some(1), DownloadPhase::Finished));
        assert!(text.contains("uploading"));
    }

    #[test]
    fn test_percent_of_handles_zero_total() {
        assert_eq!(percent_of(&event(10, Some(0), DownloadPhase::Downloading)), None);
        assert_eq!(percent_of(&event(10, None, DownloadPhase::Downloading)), None);
        assert_eq!(percent_of(&event(50, Some(100), DownloadPhase::Downloading)), Some(50));
    }
}
