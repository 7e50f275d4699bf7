//! Per-chat download job lifecycle.
//!
//! One job per originating chat message, identified by (chat id, message
//! id). The state machine is explicit — `Probing → AwaitingSelection →
//! Downloading → Delivering → Done`, with `Cancelled` reachable from
//! `AwaitingSelection` and `Failed` from anywhere — and every transition
//! goes through [`JobState::can_transition`], so illegal orderings are
//! rejected instead of silently reordered.

mod store;

pub use store::{BeginError, CancelError, JobSnapshot, JobStore, SelectError, Teardown};

use std::path::{Path, PathBuf};
use std::time::Instant;

use teloxide::prelude::*;
use teloxide::types::MessageId;
use url::Url;

use crate::bot::Bot;
use crate::extract::FormatOption;

/// Identity of one in-flight request: the chat plus the user message that
/// carried the URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobKey {
    pub chat: ChatId,
    pub message: MessageId,
}

impl JobKey {
    pub fn new(chat: ChatId, message: MessageId) -> Self {
        Self { chat, message }
    }
}

impl std::fmt::Display for JobKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.chat.0, self.message.0)
    }
}

/// Which option list a selection refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Audio,
    Video,
}

impl OptionKind {
    /// Single-letter form used in callback payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "a",
            Self::Video => "v",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "a" => Some(Self::Audio),
            "v" => Some(Self::Video),
            _ => None,
        }
    }
}

/// Explicit job states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Probing,
    AwaitingSelection,
    Downloading,
    Delivering,
    Done,
    Cancelled,
    Failed,
}

impl JobState {
    /// Whether this state ends the job (entry removed, workspace torn down).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled | Self::Failed)
    }

    /// The legal transition edges.
    ///
    /// `Failed` is reachable from any live state; `Cancelled` only from
    /// `AwaitingSelection`. Everything else is the single forward chain.
    pub fn can_transition(&self, to: JobState) -> bool {
        use JobState::*;
        match (self, to) {
            (_, Failed) => !self.is_terminal(),
            (Probing, AwaitingSelection) => true,
            (AwaitingSelection, Downloading) => true,
            (AwaitingSelection, Cancelled) => true,
            (Downloading, Delivering) => true,
            (Delivering, Done) => true,
            _ => false,
        }
    }
}

/// One in-flight request.
#[derive(Debug)]
pub struct Job {
    pub key: JobKey,
    pub url: Url,
    pub scratch_dir: PathBuf,
    pub state: JobState,
    pub title: String,
    pub uploader: Option<String>,
    pub duration: Option<u32>,
    /// Options shown for this message; indices stay stable for the
    /// message's whole lifetime (a later tap never re-probes)
    pub audio_options: Vec<FormatOption>,
    pub video_options: Vec<FormatOption>,
    /// The bound option; set exactly once, on AwaitingSelection → Downloading
    pub chosen: Option<FormatOption>,
    /// The single in-chat status message, created lazily, edited in place
    pub status_msg: Option<MessageId>,
    pub created_at: Instant,
}

impl Job {
    fn new(key: JobKey, url: Url, scratch_dir: PathBuf) -> Self {
        Self {
            key,
            url,
            scratch_dir,
            state: JobState::Probing,
            title: String::new(),
            uploader: None,
            duration: None,
            audio_options: Vec::new(),
            video_options: Vec::new(),
            chosen: None,
            status_msg: None,
            created_at: Instant::now(),
        }
    }
}

/// Removes a job's scratch directory. Best-effort and non-fatal when the
/// directory is already gone.
pub async fn remove_scratch(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => log::debug!("removed scratch dir {}", dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("failed to remove scratch dir {}: {}", dir.display(), e),
    }
}

/// Executes a [`Teardown`]: deletes the status message and the scratch
/// directory. Both steps are best-effort — the map entry is already gone
/// by the time this runs, so nothing can observe a partial teardown.
pub async fn teardown(bot: &Bot, td: Teardown) {
    if let Some(msg_id) = td.status_msg {
        if let Err(e) = bot.delete_message(td.key.chat, msg_id).await {
            log::debug!("status message delete failed for job {}: {}", td.key, e);
        }
    }
    remove_scratch(&td.scratch_dir).await;
    log::info!("job {} torn down", td.key);
}

/// Spawns the bounded-lifetime sweeper: jobs older than the configured
/// ceiling are force-torn-down so an abandoned selection can't pin its
/// scratch directory and chat slot forever.
pub fn spawn_sweeper(bot: Bot, store: std::sync::Arc<JobStore>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(crate::core::config::jobs::sweep_interval());
        loop {
            interval.tick().await;
            let expired = store.reap_expired(crate::core::config::jobs::max_age()).await;
            for td in expired {
                log::info!("job {} exceeded max age, forcing teardown", td.key);
                teardown(&bot, td).await;
            }
        }
    })
}
