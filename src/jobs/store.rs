//! Process-scoped job store.
//!
//! A single mutex guards both the job map and the per-chat slot table, so
//! the single-flight check and the insert are one atomic step. Handlers
//! receive the store by `Arc` reference — no ambient module state.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use teloxide::types::{ChatId, MessageId};
use tokio::sync::Mutex;
use url::Url;

use super::{Job, JobKey, JobState, OptionKind};
use crate::extract::{FormatOption, ProbeResult, RankedOptions};

/// Why a new job could not be started.
#[derive(Debug, PartialEq, Eq)]
pub enum BeginError {
    /// The chat already has an active job (single-flight)
    ChatBusy,
}

/// Why a selection tap could not bind an option.
#[derive(Debug, PartialEq, Eq)]
pub enum SelectError {
    /// The job no longer exists (expired, cancelled, or finished)
    Gone,
    /// Index out of range for the stored option list
    Stale,
    /// The job already bound an option; a second pick is rejected, not queued
    AlreadyStarted,
    /// Estimated size over the platform cap; job stays in AwaitingSelection
    TooLarge { est: u64, limit: u64 },
}

/// Why a cancel tap was rejected.
#[derive(Debug, PartialEq, Eq)]
pub enum CancelError {
    Gone,
    /// Download already started; cancel is only legal while selecting
    NotCancellable,
}

/// Everything needed to clean up after a job once its map entry is gone.
#[derive(Debug)]
pub struct Teardown {
    pub key: JobKey,
    pub scratch_dir: PathBuf,
    pub status_msg: Option<MessageId>,
}

/// Read-only copy of the fields the download flow needs after binding.
#[derive(Debug, Clone)]
pub struct JobSnapshot {
    pub url: Url,
    pub scratch_dir: PathBuf,
    pub title: String,
    pub uploader: Option<String>,
    pub duration: Option<u32>,
    pub chosen: Option<FormatOption>,
}

struct Inner {
    jobs: HashMap<JobKey, Job>,
    /// One slot per chat; value is the key of the chat's active job
    per_chat: HashMap<ChatId, JobKey>,
}

/// Mutex-guarded map of active jobs plus the per-chat concurrency guard.
pub struct JobStore {
    inner: Mutex<Inner>,
    scratch_root: PathBuf,
}

impl JobStore {
    /// Store rooted at the configured work directory.
    pub fn new() -> Arc<Self> {
        let root = shellexpand::tilde(crate::core::config::WORK_DIR.as_str()).to_string();
        Self::with_root(PathBuf::from(root))
    }

    /// Store with an explicit scratch root (used by tests).
    pub fn with_root(scratch_root: PathBuf) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                jobs: HashMap::new(),
                per_chat: HashMap::new(),
            }),
            scratch_root,
        })
    }

    /// Starts a job in `Probing` and reserves the chat's slot.
    ///
    /// Returns the job's scratch directory path (not yet created on disk).
    /// A second URL submission in the same chat while a job is active is
    /// rejected — the status message and scratch directory are shared
    /// mutable state per job key, so interleaving is never allowed.
    pub async fn begin(&self, key: JobKey, url: Url) -> Result<PathBuf, BeginError> {
        let mut inner = self.inner.lock().await;
        if inner.per_chat.contains_key(&key.chat) {
            return Err(BeginError::ChatBusy);
        }
        let scratch_dir = self.scratch_root.join(format!("job-{}-{}", key.chat.0, key.message.0));
        inner.per_chat.insert(key.chat, key);
        inner.jobs.insert(key, Job::new(key, url, scratch_dir.clone()));
        log::info!("job {} started", key);
        Ok(scratch_dir)
    }

    /// `Probing → AwaitingSelection`: stores probe metadata and the ranked
    /// option lists. Indices into these lists stay stable until teardown.
    pub async fn store_options(&self, key: JobKey, probe: &ProbeResult, ranked: RankedOptions) -> bool {
        let mut inner = self.inner.lock().await;
        let Some(job) = inner.jobs.get_mut(&key) else {
            return false;
        };
        if !job.state.can_transition(JobState::AwaitingSelection) {
            log::warn!("job {} cannot move to AwaitingSelection from {:?}", key, job.state);
            return false;
        }
        job.state = JobState::AwaitingSelection;
        job.title = probe.title.clone();
        job.uploader = probe.uploader.clone();
        job.duration = probe.duration;
        job.audio_options = ranked.audio;
        job.video_options = ranked.video;
        true
    }

    /// Records the job's lazily created status message.
    pub async fn set_status_msg(&self, key: JobKey, msg_id: MessageId) {
        let mut inner = self.inner.lock().await;
        if let Some(job) = inner.jobs.get_mut(&key) {
            job.status_msg = Some(msg_id);
        }
    }

    pub async fn status_msg(&self, key: JobKey) -> Option<MessageId> {
        let inner = self.inner.lock().await;
        inner.jobs.get(&key).and_then(|job| job.status_msg)
    }

    /// The stored option list for a key, for (re-)rendering keyboards.
    pub async fn options_for(&self, key: JobKey, kind: OptionKind) -> Option<Vec<FormatOption>> {
        let inner = self.inner.lock().await;
        let job = inner.jobs.get(&key)?;
        Some(match kind {
            OptionKind::Audio => job.audio_options.clone(),
            OptionKind::Video => job.video_options.clone(),
        })
    }

    /// Resolves a selection tap and, if it passes every guard, binds the
    /// option and transitions `AwaitingSelection → Downloading`.
    ///
    /// All checks happen under one lock acquisition:
    /// - the job must still exist (`Gone`)
    /// - it must still be awaiting selection (`AlreadyStarted` — a second
    ///   tap after binding is rejected, never queued)
    /// - the index must be in range of the stored list (`Stale`)
    /// - the estimated size must fit under `limit` (`TooLarge`; the job
    ///   stays in `AwaitingSelection` so the user can pick smaller)
    pub async fn begin_download(
        &self,
        key: JobKey,
        kind: OptionKind,
        index: usize,
        limit: u64,
    ) -> Result<FormatOption, SelectError> {
        let mut inner = self.inner.lock().await;
        let job = inner.jobs.get_mut(&key).ok_or(SelectError::Gone)?;

        if job.state != JobState::AwaitingSelection {
            return Err(SelectError::AlreadyStarted);
        }

        let options = match kind {
            OptionKind::Audio => &job.audio_options,
            OptionKind::Video => &job.video_options,
        };
        let option = options.get(index).ok_or(SelectError::Stale)?.clone();

        if option.est_size > limit {
            return Err(SelectError::TooLarge {
                est: option.est_size,
                limit,
            });
        }

        job.chosen = Some(option.clone());
        job.state = JobState::Downloading;
        log::info!("job {} bound option '{}' ({})", key, option.label, option.selector);
        Ok(option)
    }

    /// `Downloading → Delivering`.
    pub async fn mark_delivering(&self, key: JobKey) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.jobs.get_mut(&key) {
            Some(job) if job.state.can_transition(JobState::Delivering) => {
                job.state = JobState::Delivering;
                true
            }
            _ => false,
        }
    }

    /// Snapshot of the fields the download/delivery flow reads.
    pub async fn snapshot(&self, key: JobKey) -> Option<JobSnapshot> {
        let inner = self.inner.lock().await;
        inner.jobs.get(&key).map(|job| JobSnapshot {
            url: job.url.clone(),
            scratch_dir: job.scratch_dir.clone(),
            title: job.title.clone(),
            uploader: job.uploader.clone(),
            duration: job.duration,
            chosen: job.chosen.clone(),
        })
    }

    /// Ends a job in `Done` and removes it. Returns the teardown handle.
    pub async fn complete(&self, key: JobKey) -> Option<Teardown> {
        self.finish(key, JobState::Done).await
    }

    /// Ends a job in `Failed` and removes it. Legal from any live state —
    /// failure teardown is identical to the success path.
    pub async fn fail(&self, key: JobKey) -> Option<Teardown> {
        self.finish(key, JobState::Failed).await
    }

    /// Explicit cancellation, legal only while awaiting selection.
    pub async fn cancel(&self, key: JobKey) -> Result<Teardown, CancelError> {
        let mut inner = self.inner.lock().await;
        let job = inner.jobs.get(&key).ok_or(CancelError::Gone)?;
        if !job.state.can_transition(JobState::Cancelled) {
            return Err(CancelError::NotCancellable);
        }
        Self::remove_locked(&mut inner, key).ok_or(CancelError::Gone)
    }

    async fn finish(&self, key: JobKey, terminal: JobState) -> Option<Teardown> {
        debug_assert!(terminal.is_terminal());
        let mut inner = self.inner.lock().await;
        if !inner.jobs.contains_key(&key) {
            return None;
        }
        Self::remove_locked(&mut inner, key)
    }

    fn remove_locked(inner: &mut Inner, key: JobKey) -> Option<Teardown> {
        let job = inner.jobs.remove(&key)?;
        // Only clear the chat slot if it still points at this job
        if inner.per_chat.get(&key.chat) == Some(&key) {
            inner.per_chat.remove(&key.chat);
        }
        Some(Teardown {
            key,
            scratch_dir: job.scratch_dir,
            status_msg: job.status_msg,
        })
    }

    /// Removes and returns every job older than `max_age`.
    pub async fn reap_expired(&self, max_age: Duration) -> Vec<Teardown> {
        let mut inner = self.inner.lock().await;
        let expired: Vec<JobKey> = inner
            .jobs
            .values()
            .filter(|job| job.created_at.elapsed() > max_age)
            .map(|job| job.key)
            .collect();
        expired
            .into_iter()
            .filter_map(|key| Self::remove_locked(&mut inner, key))
            .collect()
    }

    /// Number of active jobs (for the health page).
    pub async fn active_count(&self) -> usize {
        self.inner.lock().await.jobs.len()
    }

    /// Current state of a job, if it exists. Test/diagnostic helper.
    pub async fn state_of(&self, key: JobKey) -> Option<JobState> {
        self.inner.lock().await.jobs.get(&key).map(|job| job.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::probe::ProbeResult;

    fn key(chat: i64, msg: i32) -> JobKey {
        JobKey::new(ChatId(chat), MessageId(msg))
    }

    fn test_url() -> Url {
        Url::parse("https://youtube.com/watch?v=dQw4w9WgXcQ").expect("static url")
    }

    fn probe_result() -> ProbeResult {
        ProbeResult {
            title: "Title".to_string(),
            uploader: Some("Uploader".to_string()),
            duration: Some(212),
            thumbnail: None,
            streams: Vec::new(),
        }
    }

    fn option(label: &str, est_size: u64) -> FormatOption {
        FormatOption {
            selector: "22".to_string(),
            label: label.to_string(),
            est_size,
        }
    }

    fn ranked(video_sizes: &[u64]) -> RankedOptions {
        RankedOptions {
            audio: vec![option("🎵 128 kbps · 3 MB", 3_000_000)],
            video: video_sizes.iter().map(|s| option("🎬 720p · x", *s)).collect(),
        }
    }

    async fn store_awaiting(store: &JobStore, k: JobKey, video_sizes: &[u64]) {
        store.begin(k, test_url()).await.expect("begin");
        assert!(store.store_options(k, &probe_result(), ranked(video_sizes)).await);
    }

    fn test_store() -> Arc<JobStore> {
        JobStore::with_root(std::env::temp_dir().join("epictube-test"))
    }

    // ==================== single-flight tests ====================

    #[tokio::test]
    async fn test_second_submission_in_same_chat_rejected() {
        let store = test_store();
        store.begin(key(1, 10), test_url()).await.expect("first begin");
        assert_eq!(store.begin(key(1, 11), test_url()).await.unwrap_err(), BeginError::ChatBusy);
    }

    #[tokio::test]
    async fn test_different_chats_are_independent() {
        let store = test_store();
        store.begin(key(1, 10), test_url()).await.expect("chat 1");
        store.begin(key(2, 10), test_url()).await.expect("chat 2");
        assert_eq!(store.active_count().await, 2);
    }

    #[tokio::test]
    async fn test_chat_slot_freed_after_teardown() {
        let store = test_store();
        let k = key(1, 10);
        store.begin(k, test_url()).await.expect("begin");
        store.fail(k).await.expect("teardown");
        store.begin(key(1, 11), test_url()).await.expect("slot free again");
    }

    // ==================== binding tests ====================

    #[tokio::test]
    async fn test_begin_download_binds_at_most_once() {
        let store = test_store();
        let k = key(1, 10);
        store_awaiting(&store, k, &[1000]).await;

        store
            .begin_download(k, OptionKind::Video, 0, u64::MAX)
            .await
            .expect("first bind");
        assert_eq!(
            store.begin_download(k, OptionKind::Video, 0, u64::MAX).await.unwrap_err(),
            SelectError::AlreadyStarted
        );
        assert_eq!(store.state_of(k).await, Some(JobState::Downloading));
    }

    #[tokio::test]
    async fn test_out_of_range_index_is_stale() {
        let store = test_store();
        let k = key(1, 10);
        store_awaiting(&store, k, &[1000]).await;
        assert_eq!(
            store.begin_download(k, OptionKind::Video, 5, u64::MAX).await.unwrap_err(),
            SelectError::Stale
        );
        // Soft failure: job still selectable
        assert_eq!(store.state_of(k).await, Some(JobState::AwaitingSelection));
    }

    #[tokio::test]
    async fn test_unknown_key_is_gone() {
        let store = test_store();
        assert_eq!(
            store.begin_download(key(9, 9), OptionKind::Audio, 0, u64::MAX).await.unwrap_err(),
            SelectError::Gone
        );
    }

    // ==================== size guard tests ====================

    #[tokio::test]
    async fn test_oversized_option_never_reaches_downloading() {
        let store = test_store();
        let k = key(1, 10);
        store_awaiting(&store, k, &[100 * 1024 * 1024]).await;

        let err = store
            .begin_download(k, OptionKind::Video, 0, 50 * 1024 * 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, SelectError::TooLarge { .. }));
        // Job stays in AwaitingSelection so the user can pick smaller
        assert_eq!(store.state_of(k).await, Some(JobState::AwaitingSelection));
    }

    #[tokio::test]
    async fn test_unknown_size_passes_the_guard() {
        let store = test_store();
        let k = key(1, 10);
        store_awaiting(&store, k, &[0]).await;
        // 0 means "unknown", not "free" — but an unknown estimate cannot be
        // refused up front; the actual size is re-checked at delivery
        store
            .begin_download(k, OptionKind::Video, 0, 50 * 1024 * 1024)
            .await
            .expect("unknown size is allowed through");
    }

    // ==================== teardown path tests ====================

    #[tokio::test]
    async fn test_teardown_on_every_exit_path() {
        // success, prober failure, download failure, delivery failure,
        // explicit cancel — the map entry is gone after each
        let store = test_store();

        // success
        let k1 = key(1, 1);
        store_awaiting(&store, k1, &[10]).await;
        store.begin_download(k1, OptionKind::Video, 0, u64::MAX).await.expect("bind");
        assert!(store.mark_delivering(k1).await);
        assert!(store.complete(k1).await.is_some());
        assert_eq!(store.state_of(k1).await, None);

        // prober failure (still Probing)
        let k2 = key(2, 1);
        store.begin(k2, test_url()).await.expect("begin");
        assert!(store.fail(k2).await.is_some());
        assert_eq!(store.state_of(k2).await, None);

        // download failure
        let k3 = key(3, 1);
        store_awaiting(&store, k3, &[10]).await;
        store.begin_download(k3, OptionKind::Video, 0, u64::MAX).await.expect("bind");
        assert!(store.fail(k3).await.is_some());
        assert_eq!(store.state_of(k3).await, None);

        // delivery failure
        let k4 = key(4, 1);
        store_awaiting(&store, k4, &[10]).await;
        store.begin_download(k4, OptionKind::Video, 0, u64::MAX).await.expect("bind");
        assert!(store.mark_delivering(k4).await);
        assert!(store.fail(k4).await.is_some());
        assert_eq!(store.state_of(k4).await, None);

        // explicit cancel
        let k5 = key(5, 1);
        store_awaiting(&store, k5, &[10]).await;
        assert!(store.cancel(k5).await.is_ok());
        assert_eq!(store.state_of(k5).await, None);

        assert_eq!(store.active_count().await, 0);
    }

    #[tokio::test]
    async fn test_cancel_rejected_once_downloading() {
        let store = test_store();
        let k = key(1, 10);
        store_awaiting(&store, k, &[10]).await;
        store.begin_download(k, OptionKind::Video, 0, u64::MAX).await.expect("bind");
        assert_eq!(store.cancel(k).await.unwrap_err(), CancelError::NotCancellable);
    }

    #[tokio::test]
    async fn test_teardown_carries_status_msg_and_scratch() {
        let store = test_store();
        let k = key(1, 10);
        let scratch = store.begin(k, test_url()).await.expect("begin");
        store.set_status_msg(k, MessageId(77)).await;
        let td = store.fail(k).await.expect("teardown");
        assert_eq!(td.status_msg, Some(MessageId(77)));
        assert_eq!(td.scratch_dir, scratch);
    }

    // ==================== sweeper tests ====================

    #[tokio::test]
    async fn test_reap_expired_removes_old_jobs_only() {
        let store = test_store();
        store.begin(key(1, 10), test_url()).await.expect("begin");

        assert!(store.reap_expired(Duration::from_secs(3600)).await.is_empty());
        let reaped = store.reap_expired(Duration::ZERO).await;
        assert_eq!(reaped.len(), 1);
        assert_eq!(store.active_count().await, 0);
    }

    // ==================== option stability tests ====================

    #[tokio::test]
    async fn test_option_lists_stable_after_store() {
        let store = test_store();
        let k = key(1, 10);
        store_awaiting(&store, k, &[100, 200]).await;

        let first = store.options_for(k, OptionKind::Video).await.expect("options");
        let second = store.options_for(k, OptionKind::Video).await.expect("options");
        assert_eq!(first.len(), 2);
        assert_eq!(first[1], second[1]);
    }
}
