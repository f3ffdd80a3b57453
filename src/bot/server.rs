//! The bot server: owns the game, runs the scheduled jobs and feeds incoming chat lines to
//! the [`CommandProcessor`], one tokio task per message.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};
use log::{error, info, warn};
use serde::Serialize;
use tokio::sync::{mpsc, watch};

use crate::bot::handler::{CommandProcessor, IncomingMessage};
use crate::bot::scheduler::JobScheduler;
use crate::config::Config;
use crate::gym::{GameTables, Gym, GymStoreBuilder};
use crate::notify::Outbox;

/// Snapshot printed by `gymlegend status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub name: String,
    pub players: usize,
    pub clans: usize,
    pub local_day: NaiveDate,
    pub inspection_time: bool,
    pub inspection_time_ends: Option<DateTime<Utc>>,
}

pub struct BotServer {
    config: Config,
    gym: Arc<Gym>,
}

impl BotServer {
    /// Open the store under `storage.data_dir` and build the game.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let db_path = config.storage.db_path();
        tokio::fs::create_dir_all(&config.storage.data_dir)
            .await
            .map_err(|e| anyhow!("Failed to create data dir {}: {}", config.storage.data_dir, e))?;
        let store = GymStoreBuilder::new(&db_path)
            .open()
            .map_err(|e| anyhow!("Failed to open database {}: {}", db_path.display(), e))?;
        let gym = Gym::new(
            Arc::new(store),
            Arc::new(GameTables::standard()),
            config.schedule.calendar()?,
        )
        .with_admins(config.bot.admins.iter().copied());
        Ok(Self {
            config,
            gym: Arc::new(gym),
        })
    }

    pub fn gym(&self) -> Arc<Gym> {
        self.gym.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Serve until the incoming stream ends or Ctrl-C. Replies and notifications go to
    /// `outbox`; the transport drains its receiver.
    pub async fn run(&self, mut incoming: mpsc::UnboundedReceiver<IncomingMessage>, outbox: Outbox) -> Result<()> {
        info!("{} started ({} players)", self.config.bot.name, self.gym.store().player_count());
        if self.config.bot.token().is_none() {
            warn!(
                "{} is not set; only the console transport is available",
                self.config.bot.token_env
            );
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let jobs = JobScheduler::new(self.gym.clone(), Arc::new(outbox.clone()), self.config.schedule.clone())
            .spawn(shutdown_rx);
        let processor = Arc::new(CommandProcessor::new(self.gym.clone(), outbox, &self.config.bot));

        loop {
            tokio::select! {
                msg = incoming.recv() => match msg {
                    Some(msg) => {
                        let processor = processor.clone();
                        tokio::spawn(async move {
                            if let Err(e) = processor.handle(msg).await {
                                warn!("reply dropped: {}", e);
                            }
                        });
                    }
                    None => {
                        info!("incoming stream closed");
                        break;
                    }
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("received Ctrl-C, shutting down");
                    break;
                }
            }
        }

        let _ = shutdown_tx.send(true);
        for job in jobs {
            if let Err(e) = job.await {
                error!("scheduled job ended abnormally: {}", e);
            }
        }
        self.gym
            .store()
            .flush()
            .map_err(|e| anyhow!("Failed to flush database: {}", e))?;
        info!("{} stopped", self.config.bot.name);
        Ok(())
    }

    pub fn status(&self, now: DateTime<Utc>) -> Result<StatusReport> {
        let mode = self
            .gym
            .inspection_mode(now)
            .map_err(|e| anyhow!("Failed to read inspection mode: {}", e))?;
        let clans = self
            .gym
            .store()
            .list_clans()
            .map_err(|e| anyhow!("Failed to list clans: {}", e))?
            .len();
        Ok(StatusReport {
            name: self.config.bot.name.clone(),
            players: self.gym.store().player_count(),
            clans,
            local_day: self.gym.today(now),
            inspection_time: mode.is_active_at(now),
            inspection_time_ends: mode.ends_at.filter(|_| mode.is_active_at(now)),
        })
    }

    pub async fn show_status(&self) -> Result<()> {
        let report = self.status(Utc::now())?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }
}
