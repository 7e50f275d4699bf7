//! Metadata-only probe of a video URL.
//!
//! Runs `yt-dlp --dump-json --no-download` once per URL and parses the
//! JSON into the title, basic metadata, and the raw list of available
//! streams. No media data is fetched.

use serde::Serialize;
use serde_json::Value;
use std::process::Stdio;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;
use url::Url;

use crate::core::config;
use crate::extract::errors::{ExtractionError, ExtractionErrorKind};

/// One encoding as reported by yt-dlp, before ranking.
#[derive(Debug, Clone, Serialize)]
pub struct RawStream {
    /// Opaque selector understood by the download step
    pub format_id: String,
    /// Container extension ("mp4", "webm", "m4a", ...)
    pub ext: String,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    /// Vertical resolution, video streams only
    pub height: Option<u32>,
    /// Audio bitrate in kbps, audio streams only
    pub abr: Option<f64>,
    /// Total bitrate in kbps
    pub tbr: Option<f64>,
    /// Declared (`filesize`) or estimated (`filesize_approx`) byte size
    pub filesize: Option<u64>,
}

impl RawStream {
    /// True when the stream carries a video track.
    pub fn has_video(&self) -> bool {
        matches!(self.vcodec.as_deref(), Some(v) if v != "none")
    }

    /// True when the stream carries an audio track.
    pub fn has_audio(&self) -> bool {
        matches!(self.acodec.as_deref(), Some(a) if a != "none")
    }
}

/// Result of a successful probe.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub title: String,
    pub uploader: Option<String>,
    /// Duration in seconds
    pub duration: Option<u32>,
    pub thumbnail: Option<String>,
    pub streams: Vec<RawStream>,
}

/// Probes `url` for available encodings without downloading anything.
///
/// # Errors
/// Returns [`ExtractionError`] when yt-dlp cannot resolve the URL
/// (private/removed video, network failure, site-layout change). Callers
/// surface this to the chat and never retry — a structural failure won't
/// change on the second attempt.
pub async fn probe(url: &Url) -> Result<ProbeResult, ExtractionError> {
    let mut args: Vec<String> = vec![
        "--dump-json".to_string(),
        "--no-download".to_string(),
        "--no-playlist".to_string(),
    ];
    add_cookies_args(&mut args);
    args.push(url.as_str().to_string());

    log::debug!("probe: {} {}", config::YTDL_BIN.as_str(), args.join(" "));

    let output = match timeout(
        config::download::probe_timeout(),
        TokioCommand::new(config::YTDL_BIN.as_str())
            .args(&args)
            .stdin(Stdio::null())
            .output(),
    )
    .await
    {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return Err(ExtractionError::new(
                ExtractionErrorKind::Unknown,
                format!("failed to run {}: {}", config::YTDL_BIN.as_str(), e),
            ));
        }
        Err(_) => {
            return Err(ExtractionError::new(
                ExtractionErrorKind::Timeout,
                "probe timed out".to_string(),
            ));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        log::error!("probe failed for {}: {}", url, stderr.lines().next().unwrap_or("?"));
        return Err(ExtractionError::from_stderr(&stderr));
    }

    let json: Value = serde_json::from_slice(&output.stdout).map_err(|e| {
        ExtractionError::new(ExtractionErrorKind::Unknown, format!("unparsable probe output: {}", e))
    })?;

    Ok(parse_probe_json(&json))
}

/// Appends `--cookies <jar>` when a jar is configured and present on disk.
pub(crate) fn add_cookies_args(args: &mut Vec<String>) {
    if let Some(jar) = crate::cookies::configured_jar() {
        if jar.exists() {
            args.push("--cookies".to_string());
            args.push(jar.display().to_string());
        }
    }
}

/// Parses yt-dlp's `--dump-json` output into a [`ProbeResult`].
///
/// Streams with neither an audio nor a video codec (storyboards and the
/// like) are dropped here so the ranker only sees real encodings.
fn parse_probe_json(json: &Value) -> ProbeResult {
    let title = json
        .get("title")
        .and_then(|v| v.as_str())
        .unwrap_or("Untitled")
        .to_string();
    let uploader = json
        .get("uploader")
        .or_else(|| json.get("channel"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let duration = json.get("duration").and_then(|v| v.as_u64()).map(|d| d as u32);
    let thumbnail = json.get("thumbnail").and_then(|v| v.as_str()).map(|s| s.to_string());

    let mut streams = Vec::new();
    if let Some(formats) = json.get("formats").and_then(|v| v.as_array()) {
        for format in formats {
            let format_id = match format.get("format_id").and_then(|v| v.as_str()) {
                Some(id) => id.to_string(),
                None => continue,
            };

            let stream = RawStream {
                format_id,
                ext: format
                    .get("ext")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                vcodec: format.get("vcodec").and_then(|v| v.as_str()).map(|s| s.to_string()),
                acodec: format.get("acodec").and_then(|v| v.as_str()).map(|s| s.to_string()),
                height: format.get("height").and_then(|v| v.as_u64()).map(|h| h as u32),
                abr: format.get("abr").and_then(|v| v.as_f64()),
                tbr: format.get("tbr").and_then(|v| v.as_f64()),
                filesize: format
                    .get("filesize")
                    .or_else(|| format.get("filesize_approx"))
                    .and_then(|v| v.as_u64()),
            };

            if !stream.has_video() && !stream.has_audio() {
                continue;
            }
            streams.push(stream);
        }
    }

    ProbeResult {
        title,
        uploader,
        duration,
        thumbnail,
        streams,
    }
}
