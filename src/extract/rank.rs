//! Ranking of raw streams into a small, human-presentable option list.
//!
//! Pure functions, no I/O. Streams are partitioned by codec class, sorted,
//! deduplicated, and video-only encodings are paired with the single best
//! audio stream into synthesized combined options.

use std::cmp::Ordering;

use crate::core::{config, format_size};
use crate::extract::probe::RawStream;

/// One selectable encoding, immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOption {
    /// Passed verbatim to yt-dlp's `-f`; may be a composite
    /// `<video-id>+bestaudio` expression
    pub selector: String,
    /// Human-readable button label
    pub label: String,
    /// Estimated byte size; 0 means "unknown", never "free"
    pub est_size: u64,
}

/// The ranker's output: ordered audio options and video options
/// (progressive first, then synthesized combined ones).
#[derive(Debug, Clone, Default)]
pub struct RankedOptions {
    pub audio: Vec<FormatOption>,
    pub video: Vec<FormatOption>,
}

impl RankedOptions {
    pub fn is_empty(&self) -> bool {
        self.audio.is_empty() && self.video.is_empty()
    }
}

/// Ranks raw streams into presentable audio and video option lists.
pub fn rank_streams(streams: &[RawStream]) -> RankedOptions {
    let mut audio_only: Vec<&RawStream> = Vec::new();
    let mut progressive: Vec<&RawStream> = Vec::new();
    let mut video_only: Vec<&RawStream> = Vec::new();

    for stream in streams {
        match (stream.has_video(), stream.has_audio()) {
            (false, true) => audio_only.push(stream),
            (true, true) => progressive.push(stream),
            (true, false) => video_only.push(stream),
            (false, false) => {}
        }
    }

    // Audio: bitrate descending, then size descending
    audio_only.sort_by(|a, b| {
        cmp_f64_desc(a.abr, b.abr).then_with(|| b.filesize.unwrap_or(0).cmp(&a.filesize.unwrap_or(0)))
    });

    // Video (both classes): height descending, then bitrate descending
    let video_key = |a: &&RawStream, b: &&RawStream| {
        b.height
            .unwrap_or(0)
            .cmp(&a.height.unwrap_or(0))
            .then_with(|| cmp_f64_desc(a.tbr, b.tbr))
    };
    progressive.sort_by(video_key);
    video_only.sort_by(video_key);

    let mut audio: Vec<FormatOption> = Vec::new();
    let mut last_abr: Option<u32> = None;
    for stream in &audio_only {
        // Dedupe by rounded bitrate; the list is sorted, so equal bitrates
        // are adjacent and only the biggest of each survives
        let rounded = stream.abr.map(|v| v.round() as u32);
        if rounded.is_some() && rounded == last_abr {
            continue;
        }
        last_abr = rounded;
        audio.push(FormatOption {
            selector: stream.format_id.clone(),
            label: audio_label(stream),
            est_size: stream.filesize.unwrap_or(0),
        });
        if audio.len() >= config::rank::MAX_AUDIO_OPTIONS {
            break;
        }
    }

    let best_audio_size = audio_only.first().and_then(|s| s.filesize).unwrap_or(0);

    let mut video: Vec<FormatOption> = Vec::new();
    let mut seen_heights: Vec<Option<u32>> = Vec::new();
    for stream in &progressive {
        if seen_heights.contains(&stream.height) {
            continue;
        }
        seen_heights.push(stream.height);
        video.push(FormatOption {
            selector: stream.format_id.clone(),
            label: video_label(stream),
            est_size: stream.filesize.unwrap_or(0),
        });
    }

    // Synthesize combined options: each video-only stream + the best audio.
    // Estimated size is the sum of both components, or 0 (unknown) when
    // either side is unknown.
    let mut seen_combined: Vec<Option<u32>> = Vec::new();
    for stream in &video_only {
        if seen_combined.contains(&stream.height) {
            continue;
        }
        seen_combined.push(stream.height);
        let est_size = match (stream.filesize, best_audio_size) {
            (Some(v), a) if a > 0 => v + a,
            _ => 0,
        };
        video.push(FormatOption {
            selector: format!("{}+bestaudio", stream.format_id),
            label: combined_label(stream, est_size),
            est_size,
        });
    }

    video.truncate(config::rank::MAX_VIDEO_OPTIONS);

    RankedOptions { audio, video }
}

fn cmp_f64_desc(a: Option<f64>, b: Option<f64>) -> Ordering {
    b.unwrap_or(0.0).partial_cmp(&a.unwrap_or(0.0)).unwrap_or(Ordering::Equal)
}

fn audio_label(stream: &RawStream) -> String {
    let size = format_size(stream.filesize.unwrap_or(0));
    match stream.abr {
        Some(abr) => format!("🎵 {} kbps · {}", abr.round() as u32, size),
        None => format!("🎵 audio · {}", size),
    }
}

fn resolution_of(stream: &RawStream) -> String {
    match stream.height {
        Some(h) => format!("{}p", h),
        None => stream.ext.to_uppercase(),
    }
}

fn video_label(stream: &RawStream) -> String {
    format!("🎬 {} · {}", resolution_of(stream), format_size(stream.filesize.unwrap_or(0)))
}

fn combined_label(stream: &RawStream, est_size: u64) -> String {
    format!("🎬 {}+audio · {}", resolution_of(stream), format_size(est_size))
}

/// Parses the vertical resolution back out of an option label
/// (`"🎬 1080p+audio · 250 MB"` → `1080`).
pub fn parse_label_height(label: &str) -> Option<u32> {
    let p_pos = label.find('p')?;
    let digits: String = label[..p_pos]
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Filters video options by the user's resolution ceiling.
///
/// Options whose label height cannot be parsed are KEPT rather than
/// dropped — hiding a valid encoding because its label is odd is worse
/// than showing one over the ceiling (recorded in DESIGN.md).
pub fn filter_by_max_height(options: &[FormatOption], max_height: u32) -> Vec<FormatOption> {
    options
        .iter()
        .filter(|opt| match parse_label_height(&opt.label) {
            Some(height) => height <= max_height,
            None => true,
        })
        .cloned()
        .collect()
}
