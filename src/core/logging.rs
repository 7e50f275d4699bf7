//! Logging initialization and configuration checking
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - Cookies configuration validation and logging at startup

use anyhow::Result;
use simplelog::{ColorChoice, CombinedLogger, Config, LevelFilter, TermLogger, TerminalMode, WriteLogger};
use std::fs::File;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to initialize logger
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs cookies configuration at application startup
///
/// Validates and logs YTDL_COOKIES_FILE existence; age-gated and
/// bot-checked videos fail without a valid jar, so surfacing a missing or
/// stale file at startup beats debugging it per-download.
pub fn log_cookies_configuration() {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("🍪 Cookies Configuration Check");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    match crate::cookies::configured_jar() {
        Some(path) => {
            if crate::cookies::jar_looks_valid(&path) {
                log::info!("✅ YTDL_COOKIES_FILE: {}", path.display());
                log::info!("   Jar exists and will be passed to yt-dlp");
            } else {
                log::error!("❌ YTDL_COOKIES_FILE: {} (missing or not a Netscape jar)", path.display());
                log::error!("   Age-restricted and bot-checked videos will FAIL");
                log::error!("   Regenerate it with: epictube convert-cookies cookies.json cookies.txt");
            }
        }
        None => {
            log::warn!("⚠️  YTDL_COOKIES_FILE: not set");
            log::warn!("   Downloads will run unauthenticated; age-restricted videos will fail");
        }
    }

    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
