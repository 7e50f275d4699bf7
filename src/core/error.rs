use thiserror::Error;

use crate::core::format_size;
use crate::extract::ExtractionError;

/// Centralized error types for the application
///
/// Every externally observable operation converts library-level errors to
/// this enum at its own boundary and renders exactly one user-facing chat
/// message from it. Nothing propagates far enough to crash the dispatcher.
#[derive(Error, Debug)]
pub enum AppError {
    /// The upstream extraction tool could not resolve the URL
    /// (private/removed video, site-layout change, invalid cookies).
    /// Structural — never retried.
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    /// Transient connectivity failure talking to an HTTP API
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Estimated or actual payload exceeds the platform upload cap
    #[error("file size {size} exceeds the {limit} byte upload limit")]
    SizeLimitExceeded { size: u64, limit: u64 },

    /// Upload rejected by the chat platform
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// A button referenced an option list that no longer exists
    #[error("selection is no longer valid")]
    StaleSelection,

    /// Telegram API errors
    #[error("telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing errors
    #[error("url parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// Cookie export parsing errors
    #[error("cookie export error: {0}")]
    CookieFormat(#[from] serde_json::Error),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// One user-facing chat line per error class.
    ///
    /// Internal detail stays in the logs; the user sees what happened and
    /// what to do next.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Extraction(e) => e.user_message().to_string(),
            AppError::Network(_) => "❌ Network problem while talking to the video service.\n\nTry again in a minute.".to_string(),
            AppError::SizeLimitExceeded { size, limit } => format!(
                "⚠️ That file is {} — over the {} upload limit.\n\nPick a smaller option.",
                format_size(*size),
                format_size(*limit)
            ),
            AppError::Delivery(_) => "❌ Telegram rejected the upload.\n\nTry a smaller format.".to_string(),
            AppError::StaleSelection => "⚠️ That option is no longer valid. Send the link again.".to_string(),
            AppError::Telegram(_) => "❌ Telegram API error. Try again.".to_string(),
            AppError::Io(_) => "❌ Internal storage error. Try again.".to_string(),
            AppError::Url(_) => "❌ That doesn't look like a valid link.".to_string(),
            AppError::CookieFormat(_) => "❌ Cookie export could not be parsed.".to_string(),
        }
    }
}
