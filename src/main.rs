use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;
use teloxide::prelude::*;
use tokio::time::sleep;

use epictube::bot::commands::setup_bot_commands;
use epictube::bot::{create_bot, schema, HandlerDeps};
use epictube::cli::{Cli, Commands};
use epictube::core::{config, init_logger, log_cookies_configuration};
use epictube::extract::{probe, rank_streams};
use epictube::{cookies, health, jobs};

/// Main entry point for the Telegram bot
///
/// Parses CLI arguments and dispatches to the appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logger(&config::LOG_FILE_PATH)?;

    // Load environment variables from .env if present
    let _ = dotenv();

    match cli.command {
        Some(Commands::Run { webhook }) => {
            log::info!("Running bot (webhook: {})", webhook);
            run_bot(webhook).await
        }
        Some(Commands::Probe { url, json }) => run_cli_probe(url, json).await,
        Some(Commands::ConvertCookies { input, output }) => {
            let count = cookies::convert_file(&input, &output)?;
            println!("✅ Converted {} cookies: {} → {}", count, input.display(), output.display());
            Ok(())
        }
        None => {
            log::info!("No command specified, running bot in polling mode");
            run_bot(false).await
        }
    }
}

/// Probe a URL from the CLI and print what the bot would offer.
async fn run_cli_probe(url: String, json: bool) -> Result<()> {
    let url = url::Url::parse(&url)?;
    let result = probe(&url).await.map_err(|e| anyhow::anyhow!("{}", e))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("🎬 {}", result.title);
    if let Some(uploader) = &result.uploader {
        println!("👤 {}", uploader);
    }
    if let Some(duration) = result.duration {
        println!("⏱ {}", epictube::core::format_duration(duration));
    }

    let ranked = rank_streams(&result.streams);
    println!("\nVideo options:");
    for (i, option) in ranked.video.iter().enumerate() {
        println!("  [{}] {}  (selector: {})", i, option.label, option.selector);
    }
    println!("\nAudio options:");
    for (i, option) in ranked.audio.iter().enumerate() {
        println!("  [{}] {}  (selector: {})", i, option.label, option.selector);
    }

    Ok(())
}

/// Run the Telegram bot
async fn run_bot(use_webhook: bool) -> Result<()> {
    log::info!("Starting bot...");

    log_cookies_configuration();

    let bot = create_bot()?;

    // Bot API may still be warming up right after a container start
    let bot_info = {
        let mut attempt = 0;
        loop {
            match bot.get_me().await {
                Ok(info) => break info,
                Err(e) => {
                    attempt += 1;
                    if attempt >= config::retry::MAX_DISPATCHER_RETRIES {
                        return Err(anyhow::anyhow!("Failed to connect to Bot API after {} retries: {}", attempt, e));
                    }
                    log::warn!("Bot API not ready (attempt {}): {}. Retrying in 5 seconds...", attempt, e);
                    sleep(config::retry::dispatcher_delay()).await;
                }
            }
        }
    };
    log::info!("Bot username: {:?}, Bot ID: {}", bot_info.username, bot_info.id);

    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to set bot commands: {}. Continuing anyway.", e);
    }

    let deps = HandlerDeps::new()?;

    // Bounded job lifetime: abandoned selections get force-torn-down
    let _sweeper = jobs::spawn_sweeper(bot.clone(), Arc::clone(&deps.jobs));

    // Status endpoint for the process supervisor
    if let Some(port) = *config::HEALTH_PORT {
        let jobs = Arc::clone(&deps.jobs);
        tokio::spawn(async move {
            if let Err(e) = health::run_health_server(port, jobs).await {
                log::error!("Health server error: {}", e);
            }
        });
    }

    let handler = schema(deps);

    if use_webhook {
        let Some(webhook_url) = config::WEBHOOK_URL.clone() else {
            return Err(anyhow::anyhow!("--webhook requires WEBHOOK_URL to be set"));
        };
        run_dispatcher_webhook(bot, handler, &webhook_url).await
    } else {
        run_dispatcher_polling(bot, handler).await
    }
}

/// Long-polling transport with reconnect-on-panic.
async fn run_dispatcher_polling(
    bot: epictube::bot::Bot,
    handler: teloxide::dispatching::UpdateHandler<epictube::bot::schema::HandlerError>,
) -> Result<()> {
    log::info!("Starting bot in long polling mode");
    let mut retry_count = 0;

    loop {
        let bot_clone = bot.clone();
        let handler_clone = handler.clone();

        // Run the dispatcher in its own task so a panic is isolated and
        // observable through the JoinHandle
        let handle = tokio::spawn(async move {
            use teloxide::update_listeners::Polling;

            let listener = Polling::builder(bot_clone.clone()).drop_pending_updates().build();

            Dispatcher::builder(bot_clone, handler_clone)
                .dependencies(DependencyMap::new())
                .enable_ctrlc_handler()
                .build()
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await
        });

        match handle.await {
            Ok(()) => {
                log::info!("Dispatcher shutdown gracefully");
                return Ok(());
            }
            Err(join_err) if join_err.is_panic() => {
                log::error!("Dispatcher panicked: {}", join_err);
                retry_count += 1;
                if retry_count >= config::retry::MAX_DISPATCHER_RETRIES {
                    return Err(anyhow::anyhow!("Max dispatcher retries reached"));
                }
                let delay = config::retry::EXPONENTIAL_BACKOFF_BASE.pow(retry_count);
                log::info!(
                    "Retrying dispatcher connection in {}s (attempt {}/{})",
                    delay,
                    retry_count,
                    config::retry::MAX_DISPATCHER_RETRIES
                );
                sleep(std::time::Duration::from_secs(delay)).await;
            }
            Err(join_err) => {
                log::warn!("Dispatcher task was cancelled: {}", join_err);
                return Ok(());
            }
        }
    }
}

/// Webhook transport behind an axum listener.
async fn run_dispatcher_webhook(
    bot: epictube::bot::Bot,
    handler: teloxide::dispatching::UpdateHandler<epictube::bot::schema::HandlerError>,
    webhook_url: &str,
) -> Result<()> {
    use teloxide::update_listeners::webhooks;

    let port = *config::WEBHOOK_PORT;
    let addr = ([0, 0, 0, 0], port).into();
    let url = url::Url::parse(webhook_url)?;
    log::info!("Starting bot in webhook mode at {} (local port {})", url, port);

    let listener = webhooks::axum(bot.clone(), webhooks::Options::new(addr, url)).await?;

    Dispatcher::builder(bot, handler)
        .dependencies(DependencyMap::new())
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        )
        .await;

    Ok(())
}
