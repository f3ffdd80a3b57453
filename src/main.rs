//! Binary entrypoint for the Gym Legend CLI.
//!
//! Commands:
//! - `start` - run the bot on the console transport with the scheduled jobs
//! - `init` - create a starter `config.toml` and the data directory
//! - `status` - print player/clan counts and the inspection-time mode as JSON
//! - `payout` - run the daily hall payout now (idempotent per local day)
//! - `reset-counters` - run the daily inspection counter reset now
//!
//! See the library crate docs for module-level details: `gymlegend::`.
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::info;

use gymlegend::bot::{run_console, BotServer};
use gymlegend::config::Config;
use gymlegend::gym::{GameTables, Gym, GymStoreBuilder};

#[derive(Parser)]
#[command(name = "gymlegend")]
#[command(about = "GYM LEGEND: a chat game about dumbbells, fitness halls and inspectors")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot (console transport: stdin lines "<user_id> <text>")
    Start,
    /// Write a default configuration file and create the data directory
    Init,
    /// Show player, clan and inspection-time status
    Status,
    /// Pay today's fitness hall income now
    Payout,
    /// Reset stale daily inspection counters now
    ResetCounters,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            init_logging(&None, cli.verbose);
            Config::create_default(&cli.config).await?;
            let cfg = Config::default();
            tokio::fs::create_dir_all(&cfg.storage.data_dir)
                .await
                .map_err(|e| anyhow!("Failed to create data dir {}: {}", cfg.storage.data_dir, e))?;
            info!("Configuration file created at {}", cli.config);
            info!("Data directory ready at {}", cfg.storage.data_dir);
        }
        Commands::Start => {
            let config = Config::load(&cli.config).await?;
            init_logging(&Some(config.clone()), cli.verbose);
            info!("Starting Gym Legend v{}", env!("CARGO_PKG_VERSION"));
            let server = BotServer::new(config).await?;
            run_console(server).await?;
        }
        Commands::Status => {
            let config = Config::load(&cli.config).await?;
            init_logging(&Some(config.clone()), cli.verbose);
            let server = BotServer::new(config).await?;
            server.show_status().await?;
        }
        Commands::Payout => {
            let config = Config::load(&cli.config).await?;
            init_logging(&Some(config.clone()), cli.verbose);
            let gym = open_gym(&config)?;
            let summary = gym
                .run_daily_payout(Utc::now())
                .map_err(|e| anyhow!("Payout failed: {}", e))?;
            let payload = serde_json::json!({
                "day": summary.day.to_string(),
                "players_paid": summary.receipts.len(),
                "already_paid": summary.already_paid,
                "total_paid": summary.total_paid,
                "clans_credited": summary.clan_credits.len(),
            });
            println!("{}", payload);
        }
        Commands::ResetCounters => {
            let config = Config::load(&cli.config).await?;
            init_logging(&Some(config.clone()), cli.verbose);
            let gym = open_gym(&config)?;
            let reset = gym
                .reset_daily_counters(Utc::now())
                .map_err(|e| anyhow!("Counter reset failed: {}", e))?;
            println!("{}", serde_json::json!({ "counters_reset": reset }));
        }
    }

    Ok(())
}

/// Open the game directly, without the bot around it.
fn open_gym(config: &Config) -> Result<Gym> {
    let db_path = config.storage.db_path();
    let store = GymStoreBuilder::new(&db_path)
        .open()
        .map_err(|e| anyhow!("Failed to open database {}: {}", db_path.display(), e))?;
    Ok(Gym::new(
        Arc::new(store),
        Arc::new(GameTables::standard()),
        config.schedule.calendar()?,
    )
    .with_admins(config.bot.admins.iter().copied()))
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // -v overrides the configured level
    let configured = config
        .as_ref()
        .and_then(|cfg| log::LevelFilter::from_str(&cfg.logging.level).ok())
        .unwrap_or(log::LevelFilter::Info);
    let base_level = match verbosity {
        0 => configured,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    // sled is chatty at debug
    builder.filter_module("sled", log::LevelFilter::Warn);

    let file = config.as_ref().and_then(|cfg| {
        let path = cfg.logging.file.as_ref()?;
        match std::fs::OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => Some(f),
            Err(e) => {
                eprintln!("Cannot open log file {}: {} (logging to console only)", path, e);
                None
            }
        }
    });
    let security_path = config.as_ref().and_then(|cfg| cfg.logging.security_file.clone());

    match file {
        Some(f) => {
            let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
            // Foreground runs also echo to the console
            let is_tty = atty::is(atty::Stream::Stdout);
            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());
                if let Ok(mut guard) = write_mutex.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
                if record.target() == "security" {
                    if let Some(ref sec_path) = security_path {
                        if let Ok(mut sf) = std::fs::OpenOptions::new()
                            .create(true)
                            .append(true)
                            .open(sec_path)
                        {
                            let _ = writeln!(sf, "{}", line);
                        }
                    }
                }
                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
        }
        None => {
            builder.format(|fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
            });
        }
    }
    let _ = builder.try_init();
}
