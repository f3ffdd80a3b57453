//! Protection tiers: unlocked once, then activated into a single timed window per player.
//!
//! Window lifecycle: none -> active (activation) -> expired (noticed lazily on read or by
//! the periodic sweep) -> none. Activating while a window is running replaces it; durations
//! never stack.

use chrono::{DateTime, Duration, Utc};
use log::{debug, info};

use crate::gym::errors::GymError;
use crate::gym::service::Gym;
use crate::gym::types::{ActiveProtection, TransactionReason, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectionPurchase {
    pub tier: u8,
    pub price: i64,
    pub balance: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectionActivation {
    pub window: ActiveProtection,
    pub price: i64,
    pub balance: i64,
    /// Window that was cut short by this activation.
    pub replaced: Option<ActiveProtection>,
}

impl Gym {
    pub fn buy_protection(&self, user_id: UserId, tier: u8, now: DateTime<Utc>) -> Result<ProtectionPurchase, GymError> {
        let info = self.tables().protection(tier)?.clone();
        let _guard = self.store().lock_ledger()?;
        let mut player = self.active_player(user_id, now)?;
        let mut arsenal = self.store().get_arsenal(user_id)?;
        if arsenal.protections.contains(&tier) {
            return Err(GymError::AlreadyOwned {
                kind: "protection",
                level: tier,
            });
        }
        let tx = self.debit(&mut player, info.price, TransactionReason::ProtectionPurchase, None, now)?;
        arsenal.protections.insert(tier);
        let purchase = ProtectionPurchase {
            tier,
            price: info.price,
            balance: player.balance,
        };
        self.store().put_arsenal(arsenal)?;
        self.commit(player, [tx], now)?;
        info!("player {} unlocked protection level {}", user_id, tier);
        Ok(purchase)
    }

    /// Charge the tier price and open a fresh window, replacing any running one.
    pub fn activate_protection(&self, user_id: UserId, tier: u8, now: DateTime<Utc>) -> Result<ProtectionActivation, GymError> {
        let info = self.tables().protection(tier)?.clone();
        let _guard = self.store().lock_ledger()?;
        let mut player = self.active_player(user_id, now)?;
        let mut arsenal = self.store().get_arsenal(user_id)?;
        if !arsenal.protections.contains(&tier) {
            return Err(GymError::NotOwned {
                kind: "protection",
                level: tier,
            });
        }
        let tx = self.debit(&mut player, info.price, TransactionReason::ProtectionActivation, None, now)?;

        let window = ActiveProtection {
            level: tier,
            activated_at: now,
            expires_at: now + Duration::minutes(info.duration_minutes),
        };
        let replaced = arsenal
            .active_protection
            .replace(window)
            .filter(|old| old.is_active_at(now));
        let mut stats = self.store().get_stats(user_id)?;
        stats.protection_spent += info.price;

        let activation = ProtectionActivation {
            window,
            price: info.price,
            balance: player.balance,
            replaced,
        };
        self.store().put_arsenal(arsenal)?;
        self.store().put_stats(stats)?;
        self.commit(player, [tx], now)?;
        info!(
            "player {} activated protection {} until {}",
            user_id, tier, window.expires_at
        );
        Ok(activation)
    }

    /// The player's unexpired window, clearing a stale one on the way.
    pub fn active_protection(&self, user_id: UserId, now: DateTime<Utc>) -> Result<Option<ActiveProtection>, GymError> {
        let _guard = self.store().lock_ledger()?;
        self.active_protection_locked(user_id, now)
    }

    /// Same as [`Gym::active_protection`] for callers already holding the ledger lock.
    pub(crate) fn active_protection_locked(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<ActiveProtection>, GymError> {
        let mut arsenal = self.store().get_arsenal(user_id)?;
        match arsenal.active_protection {
            Some(window) if window.is_active_at(now) => Ok(Some(window)),
            Some(_) => {
                arsenal.active_protection = None;
                self.store().put_arsenal(arsenal)?;
                debug!("protection window of {} expired", user_id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Clear every expired window. Returns how many were cleared.
    pub fn sweep_expired_protections(&self, now: DateTime<Utc>) -> Result<usize, GymError> {
        let _guard = self.store().lock_ledger()?;
        let mut cleared = 0;
        for mut arsenal in self.store().list_arsenals()? {
            if matches!(arsenal.active_protection, Some(window) if !window.is_active_at(now)) {
                arsenal.active_protection = None;
                self.store().put_arsenal(arsenal)?;
                cleared += 1;
            }
        }
        if cleared > 0 {
            info!("cleared {} expired protection windows", cleared);
        }
        Ok(cleared)
    }
}
