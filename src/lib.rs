//! EpicTube — Telegram bot that turns YouTube links into direct stream
//! links or downloaded media files.
//!
//! All media extraction is delegated to an external `yt-dlp` binary; this
//! crate is the coordination layer around it: format probing, option
//! ranking, interactive selection keyboards, a per-chat single-flight job
//! lifecycle, progress reporting and delivery.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, shared helpers
//! - `extract`: the yt-dlp boundary — probing, ranking, downloading
//! - `jobs`: per-chat download job lifecycle and store
//! - `bot`: Telegram integration (dispatcher schema, handlers, keyboards)
//! - `delivery`: sending finished files back to the chat
//! - `piped`: direct stream links via a Piped API instance
//! - `cookies`: browser cookie export → Netscape jar conversion
//! - `health`: minimal HTTP status endpoint for the process supervisor

pub mod bot;
pub mod cli;
pub mod cookies;
pub mod core;
pub mod delivery;
pub mod extract;
pub mod health;
pub mod jobs;
pub mod piped;

// Re-exports for convenience
pub use crate::core::{config, AppError, AppResult};
pub use crate::jobs::{JobKey, JobStore};
