//! Downloading a chosen encoding via yt-dlp.
//!
//! The selector string from the ranked option is passed verbatim to
//! `yt-dlp -f`; audio options additionally go through `-x` with the user's
//! post-processing profile. Progress lines from `--newline` stdout are
//! parsed into events and pushed into a bounded channel — delivery is
//! best-effort, a full channel just drops the event.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command as TokioCommand;
use tokio::sync::mpsc;
use tokio::time::timeout;
use url::Url;

use crate::core::config;
use crate::extract::errors::{ExtractionError, ExtractionErrorKind};
use crate::extract::probe::add_cookies_args;

/// Audio post-processing profile applied when an audio option is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioProfile {
    /// Keep whatever codec the best source stream uses
    #[default]
    Best,
    /// Transcode to 320 kbps MP3
    Mp3At320,
    /// Transcode to 160 kbps Opus
    Opus160,
    /// Lossless FLAC
    Flac,
}

impl AudioProfile {
    /// Parse from stored string value.
    pub fn parse(s: &str) -> Self {
        match s {
            "mp3-320" => Self::Mp3At320,
            "opus-160" => Self::Opus160,
            "flac" => Self::Flac,
            _ => Self::Best,
        }
    }

    /// Serialize for callback payloads and storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Best => "best",
            Self::Mp3At320 => "mp3-320",
            Self::Opus160 => "opus-160",
            Self::Flac => "flac",
        }
    }

    /// Human-readable display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Best => "Best (no transcode)",
            Self::Mp3At320 => "MP3 320 kbps",
            Self::Opus160 => "Opus 160 kbps",
            Self::Flac => "FLAC",
        }
    }

    /// All profiles, in display order.
    pub fn all() -> &'static [Self] {
        &[Self::Best, Self::Mp3At320, Self::Opus160, Self::Flac]
    }

    /// The yt-dlp post-processing arguments for this profile.
    fn ytdlp_args(&self) -> Vec<String> {
        let mut args = vec!["-x".to_string()];
        match self {
            Self::Best => {}
            Self::Mp3At320 => args.extend_from_slice(&[
                "--audio-format".to_string(),
                "mp3".to_string(),
                "--audio-quality".to_string(),
                "320K".to_string(),
            ]),
            Self::Opus160 => args.extend_from_slice(&[
                "--audio-format".to_string(),
                "opus".to_string(),
                "--audio-quality".to_string(),
                "160K".to_string(),
            ]),
            Self::Flac => args.extend_from_slice(&["--audio-format".to_string(), "flac".to_string()]),
        }
        args
    }
}

/// Phase reported alongside byte counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPhase {
    Downloading,
    /// Download done; yt-dlp may still be merging or transcoding
    Finished,
}

/// One progress callback invocation: bytes transferred, total bytes if
/// known, and the phase.
#[derive(Debug, Clone, Copy)]
pub struct ProgressEvent {
    pub transferred: u64,
    pub total: Option<u64>,
    pub phase: DownloadPhase,
}

/// A finished download: the produced file and its on-disk size.
#[derive(Debug)]
pub struct DownloadOutcome {
    pub path: PathBuf,
    pub size: u64,
}

/// Downloads `url` with the given selector into `dest_dir`.
///
/// `audio` being `Some` switches on audio extraction with that profile.
/// Progress events are pushed into `progress` best-effort; the receiver
/// disappearing or falling behind never aborts the download.
///
/// # Errors
/// [`ExtractionError`] on spawn failure, non-zero exit, timeout, or a
/// missing output file.
pub async fn download_with_selector(
    url: &Url,
    selector: &str,
    dest_dir: &Path,
    audio: Option<AudioProfile>,
    progress: mpsc::Sender<ProgressEvent>,
) -> Result<DownloadOutcome, ExtractionError> {
    let output_template = format!("{}/%(id)s.%(ext)s", dest_dir.display());
    let mut args: Vec<String> = vec![
        "-f".to_string(),
        selector.to_string(),
        "-o".to_string(),
        output_template,
        "--no-playlist".to_string(),
        "--newline".to_string(),
    ];
    if let Some(profile) = audio {
        args.extend(profile.ytdlp_args());
    } else {
        args.extend_from_slice(&["--merge-output-format".to_string(), "mp4".to_string()]);
    }
    add_cookies_args(&mut args);
    args.push(url.as_str().to_string());

    log::info!("download: {} -f {} -> {}", url, selector, dest_dir.display());
    log::debug!("download args: {} {}", config::YTDL_BIN.as_str(), args.join(" "));

    let mut child = TokioCommand::new(config::YTDL_BIN.as_str())
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            ExtractionError::new(
                ExtractionErrorKind::Unknown,
                format!("failed to spawn {}: {}", config::YTDL_BIN.as_str(), e),
            )
        })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    // If the deadline fires, the dropped future kills the child via
    // kill_on_drop
    let status = timeout(config::download::download_timeout(), async {
        if let Some(out) = stdout {
            let mut lines = BufReader::new(out).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(event) = parse_progress_line(&line) {
                    let _ = progress.try_send(event);
                }
            }
        }

        let mut stderr_buf = String::new();
        if let Some(mut err) = stderr {
            let _ = err.read_to_string(&mut stderr_buf).await;
        }

        (child.wait().await, stderr_buf)
    })
    .await;

    let (status, stderr_buf) = match status {
        Ok((Ok(status), stderr_buf)) => (status, stderr_buf),
        Ok((Err(e), _)) => {
            return Err(ExtractionError::new(
                ExtractionErrorKind::Unknown,
                format!("failed to wait for yt-dlp: {}", e),
            ));
        }
        Err(_) => {
            return Err(ExtractionError::new(
                ExtractionErrorKind::Timeout,
                "download timed out".to_string(),
            ));
        }
    };

    if !status.success() {
        log::error!(
            "download failed for {}: {}",
            url,
            stderr_buf.lines().next().unwrap_or("?")
        );
        return Err(ExtractionError::from_stderr(&stderr_buf));
    }

    let outcome = find_produced_file(dest_dir).await?;
    let _ = progress.try_send(ProgressEvent {
        transferred: outcome.size,
        total: Some(outcome.size),
        phase: DownloadPhase::Finished,
    });
    Ok(outcome)
}

/// Locates the file yt-dlp produced in the scratch directory.
///
/// The scratch directory belongs to exactly one job, so the newest regular
/// file is the output (audio extraction leaves only the final file; video
/// merge intermediates are cleaned up by yt-dlp itself).
async fn find_produced_file(dest_dir: &Path) -> Result<DownloadOutcome, ExtractionError> {
    let mut newest: Option<(PathBuf, u64, std::time::SystemTime)> = None;

    let mut entries = tokio::fs::read_dir(dest_dir).await.map_err(|e| {
        ExtractionError::new(ExtractionErrorKind::Unknown, format!("cannot read scratch dir: {}", e))
    })?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let meta = match entry.metadata().await {
            Ok(m) if m.is_file() => m,
            _ => continue,
        };
        // yt-dlp leaves a `.part` behind only on failure paths
        if entry.path().extension().is_some_and(|ext| ext == "part") {
            continue;
        }
        let modified = meta.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH);
        let replace = match &newest {
            Some((_, _, when)) => modified > *when,
            None => true,
        };
        if replace {
            newest = Some((entry.path(), meta.len(), modified));
        }
    }

    match newest {
        Some((path, size, _)) => Ok(DownloadOutcome { path, size }),
        None => Err(ExtractionError::new(
            ExtractionErrorKind::Unknown,
            "yt-dlp reported success but produced no file".to_string(),
        )),
    }
}

/// Parses one `--newline` progress line into an event.
///
/// Typical shapes:
/// `[download]  42.3% of ~  12.34MiB at  1.23MiB/s ETA 00:05`
/// `[download] 100% of 12.34MiB in 00:05`
pub(crate) fn parse_progress_line(line: &str) -> Option<ProgressEvent> {
    let line = line.trim();
    if !line.starts_with("[download]") {
        return None;
    }

    let percent_pos = line.find('%')?;
    let percent: f64 = line[..percent_pos]
        .rsplit(char::is_whitespace)
        .next()?
        .parse()
        .ok()?;

    let total = ["GiB", "MiB", "KiB"]
        .iter()
        .find_map(|unit| parse_size_token(line, unit));

    let transferred = total
        .map(|t| ((percent / 100.0) * t as f64) as u64)
        .unwrap_or(0);

    Some(ProgressEvent {
        transferred,
        total,
        phase: DownloadPhase::Downloading,
    })
}

/// Extracts the first `<number><unit>` token from the line as bytes.
fn parse_size_token(line: &str, unit: &str) -> Option<u64> {
    let unit_pos = line.find(unit)?;
    let before = &line[..unit_pos];
    let digits: String = before
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    let value: f64 = digits.trim().parse().ok()?;
    if !(0.0..1e7).contains(&value) {
        return None;
    }
    let multiplier = match unit {
        "GiB" => 1024.0 * 1024.0 * 1024.0,
        "MiB" => 1024.0 * 1024.0,
        "KiB" => 1024.0,
        _ => return None,
    };
    Some((value * multiplier) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== AudioProfile tests ====================

    #[test]
    fn test_audio_profile_parse_roundtrip() {
        for profile in AudioProfile::all() {
            assert_eq!(AudioProfile::parse(profile.as_str()), *profile);
        }
    }

    #[test]
    fn test_audio_profile_parse_unknown_defaults_to_best() {
        assert_eq!(AudioProfile::parse("wav"), AudioProfile::Best);
        assert_eq!(AudioProfile::parse(""), AudioProfile::Best);
    }

    #[test]
    fn test_audio_profile_args() {
        assert_eq!(AudioProfile::Best.ytdlp_args(), vec!["-x"]);
        let mp3 = AudioProfile::Mp3At320.ytdlp_args();
        assert!(mp3.contains(&"mp3".to_string()));
        assert!(mp3.contains(&"320K".to_string()));
        let flac = AudioProfile::Flac.ytdlp_args();
        assert!(flac.contains(&"flac".to_string()));
    }

    // ==================== progress line parsing tests ====================

    #[test]
    fn test_parse_progress_line_mid_download() {
        let event = parse_progress_line("[download]  42.3% of ~  100.00MiB at  1.23MiB/s ETA 00:05")
            .expect("line should parse");
        assert_eq!(event.total, Some(100 * 1024 * 1024));
        assert_eq!(event.transferred, (0.423 * (100u64 * 1024 * 1024) as f64) as u64);
        assert_eq!(event.phase, DownloadPhase::Downloading);
    }

    #[test]
    fn test_parse_progress_line_complete() {
        let event = parse_progress_line("[download] 100% of 12.00MiB in 00:05").expect("line should parse");
        assert_eq!(event.total, Some(12 * 1024 * 1024));
        assert_eq!(event.transferred, 12 * 1024 * 1024);
    }

    #[test]
    fn test_parse_progress_line_gigabytes() {
        let event = parse_progress_line("[download]  50.0% of 2.00GiB at 5.00MiB/s ETA 03:25").expect("parse");
        assert_eq!(event.total, Some(2 * 1024 * 1024 * 1024));
        assert_eq!(event.transferred, 1024 * 1024 * 1024);
    }

    #[test]
    fn test_parse_progress_line_unknown_total() {
        let event = parse_progress_line("[download]  10.0% of ~ N/A at Unknown speed").expect("parse");
        assert_eq!(event.total, None);
        assert_eq!(event.transferred, 0);
    }

    #[test]
    fn test_parse_progress_line_ignores_other_lines() {
        assert!(parse_progress_line("[info] Downloading video thumbnail").is_none());
        assert!(parse_progress_line("[download] Destination: /tmp/x.mp4").is_none());
        assert!(parse_progress_line("").is_none());
    }

    // ==================== size token tests ====================

    #[test]
    fn test_parse_size_token() {
        assert_eq!(parse_size_token("12.34MiB", "MiB"), Some((12.34 * 1024.0 * 1024.0) as u64));
        assert_eq!(parse_size_token("of 512KiB", "KiB"), Some(512 * 1024));
        assert_eq!(parse_size_token("no unit here", "MiB"), None);
    }
}
