//! Classification of yt-dlp failures.
//!
//! yt-dlp reports everything through stderr text; the kind decides the
//! user-facing message and whether the failure is worth a retry (it never
//! is — a structural failure won't change on the second attempt).

use thiserror::Error;

/// Failure categories recognized in yt-dlp stderr
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionErrorKind {
    /// Cookies are stale or rotated
    InvalidCookies,
    /// YouTube flagged the request as automated
    BotDetection,
    /// Video is private, removed, or region-locked
    VideoUnavailable,
    /// Connectivity problem between yt-dlp and the site
    Network,
    /// The probe or download exceeded its deadline
    Timeout,
    /// Anything else
    Unknown,
}

/// A failed yt-dlp invocation with its classified kind and raw detail
#[derive(Debug, Error)]
#[error("{detail}")]
pub struct ExtractionError {
    pub kind: ExtractionErrorKind,
    pub detail: String,
}

impl ExtractionError {
    pub fn new(kind: ExtractionErrorKind, detail: String) -> Self {
        Self { kind, detail }
    }

    /// Builds an error from a failed invocation's stderr.
    pub fn from_stderr(stderr: &str) -> Self {
        let kind = classify_stderr(stderr);
        let detail = stderr.lines().next().unwrap_or("yt-dlp failed").to_string();
        Self { kind, detail }
    }

    /// One chat line per kind.
    pub fn user_message(&self) -> &'static str {
        match self.kind {
            ExtractionErrorKind::InvalidCookies => {
                "❌ Temporary problem with YouTube authentication.\n\nTry another video or retry later."
            }
            ExtractionErrorKind::BotDetection => "❌ YouTube blocked the request.\n\nTry another video or retry later.",
            ExtractionErrorKind::VideoUnavailable => {
                "❌ Video is unavailable.\n\nIt may be private, removed, or blocked in this region."
            }
            ExtractionErrorKind::Network => "❌ Network problem reaching the site.\n\nTry again in a minute.",
            ExtractionErrorKind::Timeout => "❌ The site took too long to respond.\n\nTry again in a minute.",
            ExtractionErrorKind::Unknown => "❌ Could not process this video.\n\nCheck that the link is correct.",
        }
    }
}

/// Classifies yt-dlp stderr into an [`ExtractionErrorKind`].
///
/// Matching is substring-based on the lowercased output; yt-dlp's error
/// strings are stable enough for this to hold across versions.
pub fn classify_stderr(stderr: &str) -> ExtractionErrorKind {
    let stderr_lower = stderr.to_lowercase();

    if stderr_lower.contains("cookies are no longer valid")
        || stderr_lower.contains("cookies have likely been rotated")
        || stderr_lower.contains("sign in to confirm you're not a bot")
        || stderr_lower.contains("please sign in")
        || stderr_lower.contains("use --cookies-from-browser")
        || stderr_lower.contains("use --cookies for the authentication")
    {
        return ExtractionErrorKind::InvalidCookies;
    }

    if stderr_lower.contains("bot detection")
        || stderr_lower.contains("http error 403")
        || stderr_lower.contains("unable to extract")
        || stderr_lower.contains("signature extraction failed")
    {
        return ExtractionErrorKind::BotDetection;
    }

    if stderr_lower.contains("private video")
        || stderr_lower.contains("video unavailable")
        || stderr_lower.contains("this video is not available")
        || stderr_lower.contains("video is private")
        || stderr_lower.contains("video has been removed")
        || stderr_lower.contains("this video does not exist")
    {
        return ExtractionErrorKind::VideoUnavailable;
    }

    if stderr_lower.contains("timed out") || stderr_lower.contains("timeout") {
        return ExtractionErrorKind::Timeout;
    }

    if stderr_lower.contains("connection")
        || stderr_lower.contains("network")
        || stderr_lower.contains("socket")
        || stderr_lower.contains("dns")
        || stderr_lower.contains("failed to connect")
    {
        return ExtractionErrorKind::Network;
    }

    ExtractionErrorKind::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_invalid_cookies() {
        assert_eq!(
            classify_stderr("ERROR: The provided cookies are no longer valid"),
            ExtractionErrorKind::InvalidCookies
        );
        assert_eq!(
            classify_stderr("Sign in to confirm you're not a bot"),
            ExtractionErrorKind::InvalidCookies
        );
    }

    #[test]
    fn test_classify_bot_detection() {
        assert_eq!(classify_stderr("HTTP Error 403: Forbidden"), ExtractionErrorKind::BotDetection);
        assert_eq!(
            classify_stderr("ERROR: unable to extract player response"),
            ExtractionErrorKind::BotDetection
        );
    }

    #[test]
    fn test_classify_video_unavailable() {
        assert_eq!(
            classify_stderr("ERROR: Private video. Sign in if you've been granted access"),
            ExtractionErrorKind::VideoUnavailable
        );
        assert_eq!(classify_stderr("ERROR: Video unavailable"), ExtractionErrorKind::VideoUnavailable);
    }

    #[test]
    fn test_classify_timeout_before_network() {
        // "timed out" lines usually also mention the connection; timeout wins
        assert_eq!(
            classify_stderr("ERROR: Connection to www.youtube.com timed out"),
            ExtractionErrorKind::Timeout
        );
    }

    #[test]
    fn test_classify_network() {
        assert_eq!(
            classify_stderr("ERROR: Unable to download webpage: <urlopen error [Errno -3] dns failure>"),
            ExtractionErrorKind::Network
        );
    }

    #[test]
    fn test_classify_unknown() {
        assert_eq!(classify_stderr("something nobody has seen before"), ExtractionErrorKind::Unknown);
        assert_eq!(classify_stderr(""), ExtractionErrorKind::Unknown);
    }

    #[test]
    fn test_from_stderr_keeps_first_line_as_detail() {
        let err = ExtractionError::from_stderr("ERROR: Video unavailable\nmore noise\nand more");
        assert_eq!(err.kind, ExtractionErrorKind::VideoUnavailable);
        assert_eq!(err.detail, "ERROR: Video unavailable");
    }

    #[test]
    fn test_user_message_is_nonempty_for_all_kinds() {
        for kind in [
            ExtractionErrorKind::InvalidCookies,
            ExtractionErrorKind::BotDetection,
            ExtractionErrorKind::VideoUnavailable,
            ExtractionErrorKind::Network,
            ExtractionErrorKind::Timeout,
            ExtractionErrorKind::Unknown,
        ] {
            let err = ExtractionError::new(kind, String::new());
            assert!(!err.user_message().is_empty());
        }
    }
}
