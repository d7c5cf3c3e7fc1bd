use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use telegram_poller::config::DEFAULT_API_URL;
use telegram_poller::logging::{self, LoggingMode};
use telegram_poller::{HandlerResult, PollingLoop, PollingOptions, Update};
use tracing::info;

/// Telegram long-polling demo
///
/// Polls `getUpdates` for a bot and prints every update as one JSON line on
/// stdout until interrupted with Ctrl-C. Logs go to stderr.
#[derive(Parser, Debug)]
#[command(name = "telegram-poller")]
#[command(about = "Print Telegram bot updates as JSON lines using long polling")]
#[command(version)]
pub struct Args {
    /// Bot token issued by @BotFather
    #[arg(short, long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Server-side long-poll timeout in seconds
    #[arg(long, default_value = "10")]
    pub timeout: u64,

    /// Delay between polls in milliseconds
    #[arg(short, long, default_value = "300")]
    pub interval: u64,

    /// Maximum number of updates per request (1-100)
    #[arg(short, long)]
    pub limit: Option<u32>,

    /// Bot API base URL
    #[arg(long, env = "TELEGRAM_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Resume after this update id
    #[arg(long, default_value = "0")]
    pub offset: i64,

    /// Log level (error, warn, info, debug, trace)
    ///
    /// Without it, TELEGRAM_POLLER_LOG_MODE, TELEGRAM_POLLER_LOG_LEVEL and
    /// RUST_LOG are honoured, defaulting to info.
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Args {
    /// Validate command line arguments
    pub fn validate(&self) -> Result<()> {
        if self.token.trim().is_empty() {
            return Err(anyhow::anyhow!("Bot token must not be empty"));
        }

        if let Some(level) = &self.log_level {
            match level.to_lowercase().as_str() {
                "error" | "warn" | "info" | "debug" | "trace" => {}
                _ => {
                    return Err(anyhow::anyhow!(
                        "Invalid log level '{}'. Valid levels: error, warn, info, debug, trace",
                        level
                    ));
                }
            }
        }

        self.polling_options()
            .validate()
            .context("Invalid polling options")?;

        Ok(())
    }

    /// Polling options derived from the arguments
    pub fn polling_options(&self) -> PollingOptions {
        let options = PollingOptions::new()
            .with_timeout(Duration::from_secs(self.timeout))
            .with_interval(Duration::from_millis(self.interval))
            .with_api_url(self.api_url.clone())
            .with_initial_offset(self.offset);

        match self.limit {
            Some(limit) => options.with_limit(limit),
            None => options,
        }
    }

    /// Logging mode: verbose output for debug and trace, compact otherwise
    pub fn logging_mode(&self) -> LoggingMode {
        match self.log_level.as_deref().map(str::to_lowercase).as_deref() {
            Some("debug" | "trace") => LoggingMode::Debug,
            Some(_) => LoggingMode::Development,
            None => logging::mode_from_env().unwrap_or(LoggingMode::Development),
        }
    }
}

fn init_tracing(args: &Args) -> Result<()> {
    let mode = args.logging_mode();
    match &args.log_level {
        Some(level) => logging::init_logging_with_level(mode, &level.to_lowercase()),
        None => logging::init_logging(mode),
    }
    .context("Failed to initialize logging")
}

fn print_update(update: Update) -> HandlerResult {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer(&mut out, &update)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    args.validate()?;
    init_tracing(&args)?;

    let polling = PollingLoop::create(&args.token, args.polling_options(), print_update)
        .context("Failed to start polling")?;

    let cancel = polling.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, stopping after the current request");
            cancel.cancel();
        }
    });

    polling.join().await.context("Polling loop terminated abnormally")?;
    info!("Polling stopped");
    Ok(())
}
