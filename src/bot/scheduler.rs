//! Background jobs: the daily counter reset at local midnight, the daily hall payout a few
//! minutes later, and the periodic sweep of expired protection windows.
//!
//! Each job is its own tokio task sleeping until its next wake time. Wake times are computed
//! from the wall clock in the configured local offset, so a restart simply re-arms the
//! timers; the jobs themselves are idempotent per local day. Sending `true` on the shutdown
//! channel stops every loop at its next wake-up or immediately if sleeping.

use std::sync::Arc;

use chrono::Utc;
use log::{debug, error, info};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::bot::format::render_payout_notice;
use crate::config::ScheduleConfig;
use crate::gym::Gym;
use crate::notify::{notify_best_effort, Notifier};

/// Minutes after local midnight at which the counter reset runs.
const RESET_MINUTES_AFTER_MIDNIGHT: u32 = 0;

pub struct JobScheduler {
    gym: Arc<Gym>,
    notifier: Arc<dyn Notifier>,
    config: ScheduleConfig,
}

impl JobScheduler {
    pub fn new(gym: Arc<Gym>, notifier: Arc<dyn Notifier>, config: ScheduleConfig) -> Self {
        Self {
            gym,
            notifier,
            config,
        }
    }

    /// Start all job loops. Returns no handles when scheduling is disabled.
    pub fn spawn(&self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        if !self.config.enabled {
            info!("scheduled jobs disabled");
            return Vec::new();
        }
        vec![
            tokio::spawn(daily_reset_loop(self.gym.clone(), shutdown.clone())),
            tokio::spawn(daily_payout_loop(
                self.gym.clone(),
                self.notifier.clone(),
                self.config.payout_offset_minutes,
                shutdown.clone(),
            )),
            tokio::spawn(protection_sweep_loop(
                self.gym.clone(),
                self.config.sweep_interval(),
                shutdown,
            )),
        ]
    }
}

/// Sleep for `duration` unless shutdown is signalled first. Returns false on shutdown.
async fn sleep_or_shutdown(duration: std::time::Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return false;
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        changed = shutdown.changed() => match changed {
            Ok(()) => !*shutdown.borrow(),
            // Sender dropped with the server.
            Err(_) => false,
        },
    }
}

/// Time from now until the next local wall-clock `minutes_after_midnight`.
fn until_next_daily(gym: &Gym, minutes_after_midnight: u32) -> std::time::Duration {
    let now = Utc::now();
    let next = gym.calendar().next_daily(now, minutes_after_midnight);
    (next - now).to_std().unwrap_or_default()
}

async fn daily_reset_loop(gym: Arc<Gym>, mut shutdown: watch::Receiver<bool>) {
    loop {
        let wait = until_next_daily(&gym, RESET_MINUTES_AFTER_MIDNIGHT);
        debug!("next counter reset in {:?}", wait);
        if !sleep_or_shutdown(wait, &mut shutdown).await {
            break;
        }
        let job_gym = gym.clone();
        match tokio::task::spawn_blocking(move || job_gym.reset_daily_counters(Utc::now())).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => error!("daily counter reset failed: {}", e),
            Err(e) => error!("daily counter reset task panicked: {}", e),
        }
    }
    debug!("counter reset loop stopped");
}

async fn daily_payout_loop(
    gym: Arc<Gym>,
    notifier: Arc<dyn Notifier>,
    payout_offset_minutes: u32,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let wait = until_next_daily(&gym, payout_offset_minutes);
        debug!("next hall payout in {:?}", wait);
        if !sleep_or_shutdown(wait, &mut shutdown).await {
            break;
        }
        let job_gym = gym.clone();
        match tokio::task::spawn_blocking(move || job_gym.run_daily_payout(Utc::now())).await {
            Ok(Ok(summary)) => {
                for receipt in &summary.receipts {
                    notify_best_effort(notifier.as_ref(), receipt.user_id, &render_payout_notice(receipt));
                }
            }
            Ok(Err(e)) => error!("daily payout failed: {}", e),
            Err(e) => error!("daily payout task panicked: {}", e),
        }
    }
    debug!("payout loop stopped");
}

async fn protection_sweep_loop(gym: Arc<Gym>, every: std::time::Duration, mut shutdown: watch::Receiver<bool>) {
    while sleep_or_shutdown(every, &mut shutdown).await {
        let job_gym = gym.clone();
        match tokio::task::spawn_blocking(move || job_gym.sweep_expired_protections(Utc::now())).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => error!("protection sweep failed: {}", e),
            Err(e) => error!("protection sweep task panicked: {}", e),
        }
    }
    debug!("protection sweep loop stopped");
}
