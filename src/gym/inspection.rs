//! Inspections: one player sends an inspector to close another player's fitness halls.
//!
//! Contract:
//! - The attacker needs the inspector tier, must not target themselves or a clanmate, and is
//!   bounded by the mode's daily quota and cooldown.
//! - An active protection window may block the inspection (never during inspection time,
//!   never against inspector tiers above the protection's reach).
//! - Damage is clamped to the target's halls; the target is paid compensation per closed hall.
//! - A blocked inspection still consumes the attempt and starts the cooldown.

use chrono::{DateTime, Duration, Utc};
use log::info;
use rand::Rng;

use crate::gym::errors::GymError;
use crate::gym::service::Gym;
use crate::gym::tables::{InspectorTier, ModeSettings, ProtectionTier};
use crate::gym::types::{InspectionStats, TransactionReason, UserId};

/// Tier 1 is a coin flip between 0 and 1; every other tier draws uniformly from its range.
pub fn roll_damage<R: Rng + ?Sized>(tier: &InspectorTier, rng: &mut R) -> u32 {
    if tier.level == 1 {
        if rng.gen_bool(0.5) {
            1
        } else {
            0
        }
    } else {
        rng.gen_range(tier.min_damage..=tier.max_damage)
    }
}

/// Roll the target's protection against an inspector of `inspector_level`.
pub fn protection_blocks<R: Rng + ?Sized>(
    protection: &ProtectionTier,
    inspector_level: u8,
    inspection_time: bool,
    rng: &mut R,
) -> bool {
    if inspection_time || inspector_level > protection.max_inspector_level {
        return false;
    }
    rng.gen_range(1..=100u8) <= protection.chance
}

/// Validated inspection, ready to be resolved after the "inspection in progress" pause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectionPlan {
    pub attacker_id: UserId,
    pub target_id: UserId,
    pub target_name: String,
    pub tier: u8,
    pub inspection_time: bool,
    pub settings: ModeSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectionOutcome {
    pub attacker_id: UserId,
    pub attacker_name: String,
    pub target_id: UserId,
    pub target_name: String,
    pub tier: u8,
    /// Protection level that stopped the inspector, if any.
    pub blocked_by: Option<u8>,
    pub rolled: u32,
    pub damage: u32,
    pub compensation: i64,
    pub halls_left: u32,
    pub inspection_time: bool,
    pub inspections_today: u32,
    pub daily_limit: u32,
    pub cooldown_minutes: i64,
}

impl InspectionOutcome {
    pub fn blocked(&self) -> bool {
        self.blocked_by.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectorPurchase {
    pub tier: u8,
    pub price: i64,
    pub balance: i64,
}

impl Gym {
    pub fn buy_inspector(&self, user_id: UserId, tier: u8, now: DateTime<Utc>) -> Result<InspectorPurchase, GymError> {
        let info = self.tables().inspector(tier)?.clone();
        let _guard = self.store().lock_ledger()?;
        let mut player = self.active_player(user_id, now)?;
        let mut arsenal = self.store().get_arsenal(user_id)?;
        if arsenal.inspectors.contains(&tier) {
            return Err(GymError::AlreadyOwned {
                kind: "inspector",
                level: tier,
            });
        }
        let tx = self.debit(&mut player, info.price, TransactionReason::InspectorPurchase, None, now)?;
        arsenal.inspectors.insert(tier);
        let purchase = InspectorPurchase {
            tier,
            price: info.price,
            balance: player.balance,
        };
        self.store().put_arsenal(arsenal)?;
        self.commit(player, [tx], now)?;
        info!("player {} bought inspector level {}", user_id, tier);
        Ok(purchase)
    }

    /// Check every precondition without mutating anything.
    pub fn prepare_inspection(
        &self,
        attacker_id: UserId,
        target_id: UserId,
        tier: u8,
        now: DateTime<Utc>,
    ) -> Result<InspectionPlan, GymError> {
        if attacker_id == target_id {
            return Err(GymError::SelfTarget);
        }
        self.tables().inspector(tier)?;
        let attacker = self.active_player(attacker_id, now)?;
        let arsenal = self.store().get_arsenal(attacker_id)?;
        if !arsenal.inspectors.contains(&tier) {
            return Err(GymError::NotOwned {
                kind: "inspector",
                level: tier,
            });
        }
        let target = self.store().get_player(target_id)?;
        if attacker.clan_id.is_some() && attacker.clan_id == target.clan_id {
            return Err(GymError::SameClan);
        }

        let inspection_time = self.inspection_mode(now)?.is_active_at(now);
        let settings = self.tables().mode(inspection_time);
        let stats = self.store().get_stats(attacker_id)?;
        if stats.inspections_today.value_on(self.today(now)) >= settings.daily_limit {
            return Err(GymError::QuotaExceeded {
                limit: settings.daily_limit,
            });
        }
        if let Some(last) = stats.last_inspection {
            let ready_at = last + Duration::minutes(settings.cooldown_minutes);
            if ready_at > now {
                return Err(GymError::OnCooldown {
                    remaining: ready_at - now,
                });
            }
        }

        Ok(InspectionPlan {
            attacker_id,
            target_id,
            target_name: target.name,
            tier,
            inspection_time,
            settings,
        })
    }

    /// Re-validate under the ledger lock and apply the inspection.
    pub fn resolve_inspection<R: Rng + ?Sized>(
        &self,
        attacker_id: UserId,
        target_id: UserId,
        tier: u8,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<InspectionOutcome, GymError> {
        let _guard = self.store().lock_ledger()?;
        let plan = self.prepare_inspection(attacker_id, target_id, tier, now)?;
        let inspector = self.tables().inspector(tier)?.clone();
        let today = self.today(now);

        let attacker = self.store().get_player(attacker_id)?;
        let mut target = self.store().get_player(target_id)?;
        let mut attacker_stats = self.store().get_stats(attacker_id)?;
        let mut target_stats = self.store().get_stats(target_id)?;

        let mut blocked_by = None;
        if let Some(window) = self.active_protection_locked(target_id, now)? {
            let protection = self.tables().protection(window.level)?;
            if protection_blocks(protection, tier, plan.inspection_time, rng) {
                blocked_by = Some(window.level);
            }
        }

        attacker_stats.attempts += 1;
        attacker_stats.inspections_today.add(today, 1);
        attacker_stats.last_inspection = Some(now);
        target_stats.times_inspected += 1;

        let (rolled, damage, compensation) = if blocked_by.is_some() {
            attacker_stats.failures += 1;
            target_stats.blocked += 1;
            (0, 0, 0)
        } else {
            let rolled = roll_damage(&inspector, rng);
            let damage = rolled.min(target.halls);
            let compensation = damage as i64 * plan.settings.compensation_per_hall;
            attacker_stats.successes += 1;
            attacker_stats.halls_closed += damage as u64;
            target_stats.halls_lost += damage as u64;
            target_stats.compensation_received += compensation;
            (rolled, damage, compensation)
        };

        let inspections_today = attacker_stats.inspections_today.value_on(today);
        let target_name = target.name.clone();
        let halls_left = target.halls - damage;
        let compensation_tx = if damage > 0 {
            target.halls = halls_left;
            Some(self.credit(
                &mut target,
                compensation,
                TransactionReason::InspectionCompensation,
                Some(attacker_id),
                now,
            )?)
        } else {
            None
        };
        self.store().put_stats(attacker_stats)?;
        self.store().put_stats(target_stats)?;
        if let Some(tx) = compensation_tx {
            self.commit(target, [tx], now)?;
        }

        let outcome = InspectionOutcome {
            attacker_id,
            attacker_name: attacker.name,
            target_id,
            target_name,
            tier,
            blocked_by,
            rolled,
            damage,
            compensation,
            halls_left,
            inspection_time: plan.inspection_time,
            inspections_today,
            daily_limit: plan.settings.daily_limit,
            cooldown_minutes: plan.settings.cooldown_minutes,
        };
        info!(
            "inspection {} -> {} tier {}: {}",
            attacker_id,
            target_id,
            tier,
            match outcome.blocked_by {
                Some(level) => format!("blocked by protection {}", level),
                None => format!("closed {} of rolled {}", damage, rolled),
            }
        );
        Ok(outcome)
    }

    /// Validate and resolve in one step (no pause).
    pub fn inspect<R: Rng + ?Sized>(
        &self,
        attacker_id: UserId,
        target_id: UserId,
        tier: u8,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<InspectionOutcome, GymError> {
        self.resolve_inspection(attacker_id, target_id, tier, now, rng)
    }

    pub fn inspection_stats(&self, user_id: UserId) -> Result<InspectionStats, GymError> {
        self.store().get_stats(user_id)
    }
}
