use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "epictube")]
#[command(author, version, about = "Telegram bot that turns YouTube links into direct streams or downloaded media", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bot
    Run {
        /// Use webhook mode instead of long polling (needs WEBHOOK_URL)
        #[arg(long)]
        webhook: bool,
    },

    /// Probe a URL and print the ranked format options
    Probe {
        /// Video URL
        url: String,

        /// Print the raw probe result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Convert a JSON browser cookie export into a Netscape jar
    ConvertCookies {
        /// JSON export produced by the browser-automation login
        input: PathBuf,

        /// Netscape jar to write (point YTDL_COOKIES_FILE at it)
        output: PathBuf,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
