//! Direct stream links via a Piped API instance.
//!
//! `/yt <url|id>` answers with the best progressive MP4 link and the best
//! audio-only link, fetched read-only from `GET {instance}/streams/{id}`.
//! No media flows through the bot on this path.

use serde::Deserialize;

use crate::core::{config, escape_html, AppError};

/// Response of the Piped `/streams/{id}` endpoint (subset we use).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipedStreams {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub video_streams: Vec<PipedStream>,
    #[serde(default)]
    pub audio_streams: Vec<PipedStream>,
    /// Piped reports upstream failures in-band
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipedStream {
    #[serde(default)]
    pub url: Option<String>,
    /// e.g. "720p"
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub bitrate: Option<u64>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub video_only: Option<bool>,
}

/// Fetches stream metadata for a video id.
///
/// A transient network failure is retried exactly once after a short
/// delay; an in-band Piped error is structural and surfaced immediately.
pub async fn fetch_streams(client: &reqwest::Client, video_id: &str) -> Result<PipedStreams, AppError> {
    let api_url = format!("{}/streams/{}", config::PIPED_API_INSTANCE.as_str(), video_id);

    let response = match client.get(&api_url).send().await {
        Ok(response) => response,
        Err(first_err) => {
            log::warn!("Piped request failed, retrying once: {}", first_err);
            tokio::time::sleep(config::retry::piped_delay()).await;
            client.get(&api_url).send().await?
        }
    };

    let streams: PipedStreams = response.error_for_status()?.json().await?;
    Ok(streams)
}

/// Best direct-playable video: progressive (not video-only) MP4 with the
/// highest parsed quality.
pub fn best_video(streams: &PipedStreams) -> Option<&PipedStream> {
    streams
        .video_streams
        .iter()
        .filter(|s| {
            s.url.is_some()
                && s.quality.is_some()
                && s.video_only != Some(true)
                && s.mime_type.as_deref() == Some("video/mp4")
        })
        .max_by_key(|s| parse_quality(s.quality.as_deref()))
}

/// Best audio-only stream by bitrate.
pub fn best_audio(streams: &PipedStreams) -> Option<&PipedStream> {
    streams
        .audio_streams
        .iter()
        .filter(|s| s.url.is_some() && s.bitrate.is_some())
        .max_by_key(|s| s.bitrate.unwrap_or(0))
}

fn parse_quality(quality: Option<&str>) -> u32 {
    quality
        .and_then(|q| q.trim_end_matches('p').parse().ok())
        .unwrap_or(0)
}

/// Renders the direct-links chat message (HTML parse mode), or `None`
/// when no playable progressive stream exists.
pub fn links_message(video_id: &str, streams: &PipedStreams) -> Option<String> {
    let video = best_video(streams)?;
    let video_url = video.url.as_deref()?;

    let title = streams.title.as_deref().unwrap_or("YouTube Video");
    let mut message = format!(
        "✅ <b>{}</b>\n\n🔗 Source: https://youtube.com/watch?v={}\n\n🎥 <a href=\"{}\">Direct Video Link ({})</a>",
        escape_html(title),
        video_id,
        video_url,
        video.quality.as_deref().unwrap_or("?"),
    );

    if let Some(audio) = best_audio(streams) {
        if let Some(audio_url) = audio.url.as_deref() {
            message.push_str(&format!("\n🎵 <a href=\"{}\">Direct Audio Only</a>", audio_url));
        }
    }

    Some(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> PipedStreams {
        serde_json::from_str(json).expect("fixture parses")
    }

    fn fixture() -> PipedStreams {
        parse(
            r#"{
                "title": "A <Video>",
                "uploader": "Someone",
                "videoStreams": [
                    {"url": "https://v/360", "quality": "360p", "mimeType": "video/mp4", "videoOnly": false},
                    {"url": "https://v/720", "quality": "720p", "mimeType": "video/mp4", "videoOnly": false},
                    {"url": "https://v/1080", "quality": "1080p", "mimeType": "video/mp4", "videoOnly": true},
                    {"url": "https://v/webm", "quality": "2160p", "mimeType": "video/webm", "videoOnly": false}
                ],
                "audioStreams": [
                    {"url": "https://a/low", "bitrate": 64000},
                    {"url": "https://a/high", "bitrate": 160000}
                ]
            }"#,
        )
    }

    #[test]
    fn test_best_video_skips_video_only_and_non_mp4() {
        let streams = fixture();
        let best = best_video(&streams).expect("progressive mp4 exists");
        assert_eq!(best.url.as_deref(), Some("https://v/720"));
    }

    #[test]
    fn test_best_audio_by_bitrate() {
        let streams = fixture();
        assert_eq!(best_audio(&streams).and_then(|s| s.url.as_deref()), Some("https://a/high"));
    }

    #[test]
    fn test_links_message_escapes_title_and_includes_both_links() {
        let streams = fixture();
        let message = links_message("abc123DEF-_", &streams).expect("message");
        assert!(message.contains("A &lt;Video&gt;"));
        assert!(message.contains("https://v/720"));
        assert!(message.contains("https://a/high"));
        assert!(message.contains("watch?v=abc123DEF-_"));
    }

    #[test]
    fn test_links_message_none_without_progressive_streams() {
        let streams = parse(r#"{"videoStreams": [], "audioStreams": []}"#);
        assert!(links_message("x", &streams).is_none());
    }

    #[test]
    fn test_error_field_deserializes() {
        let streams = parse(r#"{"error": "Video unavailable"}"#);
        assert_eq!(streams.error.as_deref(), Some("Video unavailable"));
        assert!(streams.video_streams.is_empty());
    }

    #[test]
    fn test_parse_quality() {
        assert_eq!(parse_quality(Some("1080p")), 1080);
        assert_eq!(parse_quality(Some("junk")), 0);
        assert_eq!(parse_quality(None), 0);
    }
}
