//! Per-user preferences and the settings menu.
//!
//! Settings are created lazily on first interaction, live for the process
//! lifetime, and are mutated only by that user's settings taps. The map is
//! mutex-guarded and passed to handlers by reference.

use std::collections::HashMap;
use std::sync::Arc;

use teloxide::types::{ChatId, InlineKeyboardMarkup};
use tokio::sync::Mutex;

use crate::bot::cb;
use crate::core::config;
use crate::extract::AudioProfile;

/// One user's download preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserSettings {
    /// Maximum acceptable vertical resolution for video options
    pub max_height: u32,
    /// Audio extraction post-processing profile
    pub audio_profile: AudioProfile,
    /// When on, a pasted URL goes straight to the audio option list
    pub audio_mode: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            max_height: config::rank::DEFAULT_MAX_HEIGHT,
            audio_profile: AudioProfile::Best,
            audio_mode: false,
        }
    }
}

/// Mutex-guarded per-user settings map.
pub struct SettingsStore {
    inner: Mutex<HashMap<ChatId, UserSettings>>,
}

impl SettingsStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(HashMap::new()),
        })
    }

    /// Current settings for a chat (defaults when never touched).
    pub async fn get(&self, chat: ChatId) -> UserSettings {
        let inner = self.inner.lock().await;
        inner.get(&chat).copied().unwrap_or_default()
    }

    pub async fn set_max_height(&self, chat: ChatId, max_height: u32) -> UserSettings {
        let mut inner = self.inner.lock().await;
        let entry = inner.entry(chat).or_default();
        entry.max_height = max_height;
        *entry
    }

    pub async fn set_audio_profile(&self, chat: ChatId, profile: AudioProfile) -> UserSettings {
        let mut inner = self.inner.lock().await;
        let entry = inner.entry(chat).or_default();
        entry.audio_profile = profile;
        *entry
    }

    pub async fn toggle_audio_mode(&self, chat: ChatId) -> UserSettings {
        let mut inner = self.inner.lock().await;
        let entry = inner.entry(chat).or_default();
        entry.audio_mode = !entry.audio_mode;
        *entry
    }
}

/// Resolution ceilings offered in the settings menu
const HEIGHT_CHOICES: [u32; 6] = [360, 480, 720, 1080, 1440, 2160];

/// Renders the settings message body.
pub fn settings_text(settings: &UserSettings) -> String {
    format!(
        "⚙️ <b>Settings</b>\n\n\
         Max video resolution: <b>{}p</b>\n\
         Audio profile: <b>{}</b>\n\
         Audio mode: <b>{}</b>",
        settings.max_height,
        settings.audio_profile.display_name(),
        if settings.audio_mode { "on" } else { "off" },
    )
}

/// Renders the settings keyboard, marking the active choices.
pub fn settings_keyboard(settings: &UserSettings) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();

    let mut row = Vec::new();
    for height in HEIGHT_CHOICES {
        let mark = if settings.max_height == height { " ✓" } else { "" };
        row.push(cb(format!("{}p{}", height, mark), format!("set:res:{}", height)));
        if row.len() == 3 {
            rows.push(std::mem::take(&mut row));
        }
    }
    if !row.is_empty() {
        rows.push(row);
    }

    for profile in AudioProfile::all() {
        let mark = if settings.audio_profile == *profile { " ✓" } else { "" };
        rows.push(vec![cb(
            format!("🎵 {}{}", profile.display_name(), mark),
            format!("set:ap:{}", profile.as_str()),
        )]);
    }

    rows.push(vec![cb("✖️ Close", "set:close")]);

    InlineKeyboardMarkup::new(rows)
}
