use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Configuration constants for the bot
/// Cached yt-dlp binary path
/// Read once at startup from YTDL_BIN environment variable or defaults to "yt-dlp"
pub static YTDL_BIN: Lazy<String> = Lazy::new(|| env::var("YTDL_BIN").unwrap_or_else(|_| "yt-dlp".to_string()));

/// Path to a Netscape-format cookies file for YouTube authentication
/// Read from YTDL_COOKIES_FILE environment variable
/// Produced out-of-band by the browser-automation login flow (or by the
/// `convert-cookies` subcommand from a JSON browser export)
pub static YTDL_COOKIES_FILE: Lazy<Option<String>> = Lazy::new(|| env::var("YTDL_COOKIES_FILE").ok());

/// Root directory for per-job scratch workspaces
/// Read from WORK_DIR environment variable, supports tilde (~) expansion
/// Default: /tmp/epictube
pub static WORK_DIR: Lazy<String> = Lazy::new(|| env::var("WORK_DIR").unwrap_or_else(|_| "/tmp/epictube".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: epictube.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "epictube.log".to_string()));

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Webhook URL for Telegram updates (used only with `run --webhook`)
/// Read from WEBHOOK_URL environment variable
pub static WEBHOOK_URL: Lazy<Option<String>> = Lazy::new(|| env::var("WEBHOOK_URL").ok());

/// Local port the webhook listener binds to
/// Read from WEBHOOK_PORT environment variable
/// Default: 8443
pub static WEBHOOK_PORT: Lazy<u16> = Lazy::new(|| {
    env::var("WEBHOOK_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8443)
});

/// Port for the HTTP health/status endpoint
/// Read from HEALTH_PORT environment variable
/// Unset disables the endpoint
pub static HEALTH_PORT: Lazy<Option<u16>> = Lazy::new(|| env::var("HEALTH_PORT").ok().and_then(|v| v.parse().ok()));

/// Piped API instance used for direct stream links (/yt command)
/// Read from PIPED_API_INSTANCE environment variable
pub static PIPED_API_INSTANCE: Lazy<String> =
    Lazy::new(|| env::var("PIPED_API_INSTANCE").unwrap_or_else(|_| "https://pipedapi.kavin.rocks".to_string()));

/// Download configuration
pub mod download {
    use super::Duration;

    /// Timeout for the metadata-only probe call (in seconds)
    pub const PROBE_TIMEOUT_SECS: u64 = 60;

    /// Timeout for the download call (in seconds)
    /// Generous because it covers download plus audio extraction
    pub const DOWNLOAD_TIMEOUT_SECS: u64 = 900; // 15 minutes

    /// Probe timeout duration
    pub fn probe_timeout() -> Duration {
        Duration::from_secs(PROBE_TIMEOUT_SECS)
    }

    /// Download timeout duration
    pub fn download_timeout() -> Duration {
        Duration::from_secs(DOWNLOAD_TIMEOUT_SECS)
    }
}

/// Job lifecycle configuration
pub mod jobs {
    use once_cell::sync::Lazy;
    use std::env;
    use std::time::Duration;

    /// Maximum age of a job before the sweeper force-tears it down (in seconds)
    /// Read from JOB_MAX_AGE_SECS environment variable
    /// Default: 1800 (30 minutes)
    pub static MAX_AGE_SECS: Lazy<u64> = Lazy::new(|| {
        env::var("JOB_MAX_AGE_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1800)
    });

    /// Interval between sweeper passes (in seconds)
    pub const SWEEP_INTERVAL_SECS: u64 = 60;

    /// Maximum job age duration
    pub fn max_age() -> Duration {
        Duration::from_secs(*MAX_AGE_SECS)
    }

    /// Sweeper interval duration
    pub fn sweep_interval() -> Duration {
        Duration::from_secs(SWEEP_INTERVAL_SECS)
    }
}

/// Progress message configuration
pub mod progress {
    use super::Duration;

    /// Minimum interval between progress message edits (in milliseconds)
    /// Telegram throttles message edits; editing on every yt-dlp line
    /// would hit the flood limits immediately
    pub const MIN_EDIT_INTERVAL_MS: u64 = 1500;

    /// Minimum percentage delta between edits
    pub const MIN_PERCENT_STEP: u8 = 5;

    /// Minimum edit interval duration
    pub fn min_edit_interval() -> Duration {
        Duration::from_millis(MIN_EDIT_INTERVAL_MS)
    }
}

/// Retry configuration
pub mod retry {
    use super::Duration;

    /// Maximum number of retries for dispatcher reconnection
    pub const MAX_DISPATCHER_RETRIES: u32 = 5;

    /// Delay between dispatcher retry attempts (in seconds)
    pub const DISPATCHER_RETRY_DELAY_SECS: u64 = 5;

    /// Base for exponential backoff calculation
    pub const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

    /// Dispatcher retry delay duration
    pub fn dispatcher_delay() -> Duration {
        Duration::from_secs(DISPATCHER_RETRY_DELAY_SECS)
    }

    /// Delay before the single Piped retry on a transient network failure
    pub const PIPED_RETRY_DELAY_SECS: u64 = 2;

    /// Piped retry delay duration
    pub fn piped_delay() -> Duration {
        Duration::from_secs(PIPED_RETRY_DELAY_SECS)
    }
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for Piped API requests (in seconds)
    pub const PIPED_TIMEOUT_SECS: u64 = 15;

    /// Request timeout for Telegram API requests (in seconds)
    /// Large because it covers media uploads
    pub const TELEGRAM_TIMEOUT_SECS: u64 = 900; // 15 minutes

    /// Piped request timeout duration
    pub fn piped_timeout() -> Duration {
        Duration::from_secs(PIPED_TIMEOUT_SECS)
    }

    /// Telegram request timeout duration
    pub fn telegram_timeout() -> Duration {
        Duration::from_secs(TELEGRAM_TIMEOUT_SECS)
    }
}

/// Upload size limits
pub mod limits {
    /// Maximum file size for Telegram uploads (50MB in bytes)
    /// Standard Bot API (api.telegram.org) cap
    pub const MAX_UPLOAD_SIZE_BYTES: u64 = 50 * 1024 * 1024; // 50 MB

    /// Maximum upload size for the configured Bot API server
    ///
    /// Standard Telegram Bot API (api.telegram.org): 50 MB
    /// Local Bot API Server: up to 2 GB (see
    /// https://core.telegram.org/bots/api#using-a-local-bot-api-server)
    ///
    /// If BOT_API_URL is set and not pointing to api.telegram.org, a local
    /// server is assumed.
    pub fn max_upload_size_bytes() -> u64 {
        if let Ok(bot_api_url) = std::env::var("BOT_API_URL") {
            if !bot_api_url.contains("api.telegram.org") {
                log::info!(
                    "Local Bot API server detected (BOT_API_URL={}), using 2 GB upload limit",
                    bot_api_url
                );
                return 2 * 1024 * 1024 * 1024; // 2 GB for local server
            }
        }

        MAX_UPLOAD_SIZE_BYTES
    }
}

/// Ranker configuration
pub mod rank {
    /// Default maximum vertical resolution for video options
    pub const DEFAULT_MAX_HEIGHT: u32 = 1080;

    /// Maximum number of audio options shown to the user
    pub const MAX_AUDIO_OPTIONS: usize = 6;

    /// Maximum number of video options shown to the user
    pub const MAX_VIDEO_OPTIONS: usize = 12;
}
