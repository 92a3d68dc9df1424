//! Chat log daemon
//!
//! Run with: chatlogd [CONFIG_JSON]
//!
//! Without a config file every setting takes its default and no admin can
//! issue commands. Log verbosity follows `RUST_LOG` (default `info`).

use std::time::Duration;

use chatlog_rs::{ChannelRoster, ChatLogger, FileSink, HttpChannelDirectory, Settings, TwitchFactory};

const STATS_INTERVAL: Duration = Duration::from_secs(60);

fn print_usage() {
    eprintln!("Usage: chatlogd [CONFIG_JSON]");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  RUST_LOG    log filter (default: info)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let settings = match args.get(1) {
        Some(path) => Settings::from_file(path)?,
        None => {
            tracing::warn!("No config file given, using defaults");
            Settings::default()
        }
    };

    let roster = ChannelRoster::load(&settings.logger.channel_list_path).await?;
    let directory = HttpChannelDirectory::new(&settings.directory)?;
    let factory = TwitchFactory::new(settings.twitch.clone());
    let sink = FileSink::new(&settings.log_dir);

    tracing::info!(
        server = %settings.twitch.addr,
        nick = %settings.twitch.nick,
        log_dir = %settings.log_dir.display(),
        command_channel = %settings.logger.command_channel,
        "Starting chatlogd"
    );

    let logger = ChatLogger::new(settings.logger, roster, factory, directory, sink)?;

    let stats_logger = std::sync::Arc::clone(&logger);
    let stats_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(STATS_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            for (shard, stats) in stats_logger.stats().await {
                tracing::info!(
                    shard = shard,
                    routed = stats.routed,
                    sink_dropped = stats.sink_dropped,
                    listener_dropped = stats.listener_dropped,
                    commands = stats.commands,
                    "Shard stats"
                );
            }
        }
    });

    let report = tokio::select! {
        report = logger.start() => Some(report),
        _ = tokio::signal::ctrl_c() => None,
    };
    if let Some(report) = report {
        if !report.failed.is_empty() {
            tracing::warn!(channels = ?report.failed, "Some channels could not be joined");
        }
        tokio::signal::ctrl_c().await?;
    }

    tracing::info!("Shutdown signal received");
    stats_task.abort();
    logger.stop().await;

    Ok(())
}
