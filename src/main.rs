//! # Lectio — timetable change watcher
//!
//! Telegram bot that polls a university timetable API, diffs each group's
//! schedule against the last snapshot, and notifies subscribers about
//! changes.
//!
//! Usage:
//!   lectio                          # Run with ~/.lectio/config.toml
//!   lectio --config ./lectio.toml   # Explicit config path
//!   lectio --check-now              # One check cycle, then exit

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use lectio_api::TimetableClient;
use lectio_channels::TelegramBot;
use lectio_core::LectioConfig;
use lectio_core::traits::{MessageSink, ScheduleSource};
use lectio_scheduler::{ScheduleWatcher, spawn_watcher};
use lectio_store::Store;

#[derive(Parser)]
#[command(name = "lectio", version, about = "📅 Lectio — timetable change watcher")]
struct Cli {
    /// Config file path (default: ~/.lectio/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run one check cycle and exit
    #[arg(long)]
    check_now: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "lectio=debug,lectio_core=debug,lectio_api=debug,lectio_store=debug,lectio_channels=debug,lectio_scheduler=debug"
    } else {
        "lectio=info,lectio_api=info,lectio_store=info,lectio_channels=info,lectio_scheduler=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => LectioConfig::load_from(path)?,
        None => LectioConfig::load()?,
    };
    config.validate()?;

    let store = Arc::new(Store::open(&config.db_path())?);
    let client = Arc::new(TimetableClient::new(&config.api, &config.watcher)?);
    let bot = Arc::new(TelegramBot::new(&config.telegram.bot_token));

    let me = bot.get_me().await?;
    tracing::info!("Connected as @{}", me.username.as_deref().unwrap_or("?"));

    let watcher = Arc::new(ScheduleWatcher::new(
        Arc::clone(&client) as Arc<dyn ScheduleSource>,
        Arc::clone(&store),
        Arc::clone(&bot) as Arc<dyn MessageSink>,
        &config.watcher,
    ));

    if cli.check_now {
        let report = watcher.trigger_manual_check().await;
        println!(
            "✅ Check finished (started {}, took {:.1}s)",
            report.started_at,
            report.duration.as_secs_f64()
        );
        return Ok(());
    }

    println!("📅 Lectio v{}", env!("CARGO_PKG_VERSION"));
    println!("   🤖 Bot:      @{}", me.username.as_deref().unwrap_or("?"));
    println!("   🗄️  Database: {}", config.db_path().display());
    println!("   🌐 API:      {}", config.api.base_url);
    println!("   ⏱️  Interval: {} min", config.watcher.check_interval_minutes);
    println!();

    let admin_chat = config.telegram.admin_chat_id;
    bot.send_message(admin_chat, "🟢 Lectio started").await;

    let watcher_task = tokio::spawn(spawn_watcher(
        Arc::clone(&watcher),
        config.watcher.check_interval_minutes,
    ));

    let admin_task = tokio::spawn(admin_loop(
        Arc::clone(&bot),
        Arc::clone(&store),
        Arc::clone(&watcher),
        admin_chat,
        config.telegram.poll_interval_secs,
    ));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    watcher_task.abort();
    admin_task.abort();
    bot.send_message(admin_chat, "🔴 Lectio stopped").await;

    Ok(())
}

/// Long-poll Telegram for admin commands. Only the configured admin chat is
/// answered; everyone else is ignored.
async fn admin_loop(
    bot: Arc<TelegramBot>,
    store: Arc<Store>,
    watcher: Arc<ScheduleWatcher>,
    admin_chat: i64,
    poll_interval_secs: u64,
) {
    let mut offset = 0i64;
    loop {
        let updates = match bot.get_updates(offset).await {
            Ok(updates) => updates,
            Err(e) => {
                tracing::warn!("getUpdates failed: {e}");
                tokio::time::sleep(std::time::Duration::from_secs(poll_interval_secs.max(1)))
                    .await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some((chat_id, text)) = update.command() else {
                continue;
            };
            if chat_id != admin_chat {
                tracing::debug!("Ignoring message from non-admin chat {chat_id}");
                continue;
            }
            let reply = handle_command(&store, &watcher, text).await;
            bot.send_message(chat_id, &reply).await;
        }
    }
}

async fn handle_command(store: &Store, watcher: &ScheduleWatcher, text: &str) -> String {
    match text.trim() {
        "/check" => {
            let report = watcher.trigger_manual_check().await;
            format!(
                "✅ Check finished\nStarted: {}\nTook: {:.1}s",
                report.started_at,
                report.duration.as_secs_f64()
            )
        }
        "/status" => match store.stats() {
            Ok(stats) => format!(
                "📊 Lectio status\n\
                 Users: {} ({} with a group, {} notifiable)\n\
                 Groups watched: {}\n\
                 Last check: {}\n\
                 Last session probe: {}\n\
                 Last error: {}",
                stats.total_users,
                stats.users_with_groups,
                stats.notifications_enabled,
                stats.unique_groups,
                stats.last_schedule_check.as_deref().unwrap_or("never"),
                stats.last_session_check.as_deref().unwrap_or("never"),
                stats.last_error.as_deref().unwrap_or("none"),
            ),
            Err(e) => format!("⚠️ Failed to read stats: {e}"),
        },
        "/help" | "/start" => "Commands:\n/check — run a check cycle now\n/status — health summary".into(),
        other => format!("Unknown command: {other}\nTry /help"),
    }
}
