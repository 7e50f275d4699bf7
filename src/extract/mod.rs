//! The yt-dlp boundary: probing available formats, ranking them into
//! selectable options, and running the actual download.

pub mod download;
pub mod errors;
pub mod probe;
pub mod rank;

pub use download::{download_with_selector, AudioProfile, DownloadOutcome, DownloadPhase, ProgressEvent};
pub use errors::{classify_stderr, ExtractionError, ExtractionErrorKind};
pub use probe::{probe, ProbeResult, RawStream};
pub use rank::{filter_by_max_height, parse_label_height, rank_streams, FormatOption, RankedOptions};
