//! Personal coach: a purchasable ladder that pays out on an hourly training session.

use chrono::{DateTime, Duration, Utc};
use log::info;
use rand::Rng;

use crate::gym::errors::GymError;
use crate::gym::service::Gym;
use crate::gym::types::{TransactionReason, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrainingReward {
    Coins(i64),
    Halls(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingOutcome {
    pub coach_level: u8,
    pub reward: TrainingReward,
    pub balance: i64,
    pub halls: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoachUpgrade {
    pub level: u8,
    pub name: &'static str,
    pub price: i64,
    pub balance: i64,
}

impl Gym {
    pub fn upgrade_coach(&self, user_id: UserId, now: DateTime<Utc>) -> Result<CoachUpgrade, GymError> {
        let _guard = self.store().lock_ledger()?;
        let mut player = self.active_player(user_id, now)?;
        let next = self
            .tables()
            .coaches
            .get(&player.coach_level.saturating_add(1))
            .ok_or_else(|| GymError::Rule("Your coach is already at the top level.".to_string()))?
            .clone();
        let tx = self.debit(&mut player, next.price, TransactionReason::CoachUpgrade, None, now)?;
        player.coach_level = next.level;
        let upgrade = CoachUpgrade {
            level: next.level,
            name: next.name,
            price: next.price,
            balance: player.balance,
        };
        self.commit(player, [tx], now)?;
        info!("player {} hired coach level {}", user_id, next.level);
        Ok(upgrade)
    }

    /// One training session. With the level's bonus chance the coach lands extra halls,
    /// otherwise pays coins from the level's income range.
    pub fn train<R: Rng + ?Sized>(&self, user_id: UserId, now: DateTime<Utc>, rng: &mut R) -> Result<TrainingOutcome, GymError> {
        let _guard = self.store().lock_ledger()?;
        let mut player = self.active_player(user_id, now)?;
        if player.coach_level == 0 {
            return Err(GymError::Rule("Hire a coach first.".to_string()));
        }
        let coach = self.tables().coach(player.coach_level)?.clone();
        if let Some(last) = player.last_training {
            let ready_at = last + Duration::minutes(self.tables().training_cooldown_minutes);
            if ready_at > now {
                return Err(GymError::OnCooldown {
                    remaining: ready_at - now,
                });
            }
        }
        player.last_training = Some(now);

        let mut entries = Vec::new();
        let reward = if rng.gen_range(1..=100u8) <= coach.bonus_chance {
            player.halls += coach.bonus_halls;
            TrainingReward::Halls(coach.bonus_halls)
        } else {
            let coins = rng.gen_range(coach.min_income..=coach.max_income);
            player.total_earned += coins;
            entries.push(self.credit(&mut player, coins, TransactionReason::Training, None, now)?);
            TrainingReward::Coins(coins)
        };
        let outcome = TrainingOutcome {
            coach_level: coach.level,
            reward,
            balance: player.balance,
            halls: player.halls,
        };
        self.commit(player, entries, now)?;
        Ok(outcome)
    }
}
