//! Administrative operations. Every action is appended to the admin log.

use chrono::{DateTime, Duration, Utc};
use log::{info, warn};

use crate::gym::errors::GymError;
use crate::gym::service::Gym;
use crate::gym::types::{AdminAction, BanInfo, InspectionMode, PlayerRecord, TransactionReason, UserId};

pub const MAX_MODE_HOURS: i64 = 24 * 7;
/// Longest timed ban; anything longer should be permanent.
pub const MAX_BAN_HOURS: i64 = 24 * 365;

impl Gym {
    pub(crate) fn require_admin(&self, admin_id: UserId, now: DateTime<Utc>) -> Result<PlayerRecord, GymError> {
        let admin = self.active_player(admin_id, now)?;
        if !self.is_admin(&admin) {
            warn!(target: "security", "non-admin {} attempted an admin action", admin_id);
            return Err(GymError::PermissionDenied("administrators only".to_string()));
        }
        Ok(admin)
    }

    pub(crate) fn log_admin(
        &self,
        admin_id: UserId,
        action: &str,
        target: Option<UserId>,
        details: String,
        now: DateTime<Utc>,
    ) -> Result<(), GymError> {
        info!(target: "security", "admin {} {} {:?}: {}", admin_id, action, target, details);
        self.store().append_admin_action(AdminAction {
            admin_id,
            action: action.to_string(),
            target,
            details,
            timestamp: now,
        })
    }

    /// Switch inspection time on for `hours`, or off when `hours` is `None`.
    pub fn set_inspection_mode(
        &self,
        admin_id: UserId,
        hours: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<InspectionMode, GymError> {
        self.require_admin(admin_id, now)?;
        let mode = match hours {
            Some(h) if !(1..=MAX_MODE_HOURS).contains(&h) => {
                return Err(GymError::Invalid(format!(
                    "Duration must be 1-{} hours.",
                    MAX_MODE_HOURS
                )));
            }
            Some(h) => InspectionMode {
                active: true,
                ends_at: Some(now + Duration::hours(h)),
                set_by: Some(admin_id),
                updated_at: Some(now),
            },
            None => InspectionMode {
                active: false,
                ends_at: None,
                set_by: Some(admin_id),
                updated_at: Some(now),
            },
        };
        self.store().put_inspection_mode(&mode)?;
        let details = match mode.ends_at {
            Some(end) => format!("on until {}", end),
            None => "off".to_string(),
        };
        self.log_admin(admin_id, "inspection_mode", None, details, now)?;
        Ok(mode)
    }

    pub fn grant_coins(&self, admin_id: UserId, target_id: UserId, amount: i64, now: DateTime<Utc>) -> Result<PlayerRecord, GymError> {
        if amount == 0 {
            return Err(GymError::Invalid("Amount must not be zero.".to_string()));
        }
        self.require_admin(admin_id, now)?;
        let _guard = self.store().lock_ledger()?;
        let mut target = self.store().get_player(target_id)?;
        if matches!(target.balance.checked_add(amount), Some(b) if b < 0) {
            return Err(GymError::InsufficientFunds {
                need: -amount,
                have: target.balance,
            });
        }
        let tx = self.credit(&mut target, amount, TransactionReason::AdminGrant, Some(admin_id), now)?;
        self.commit(target.clone(), [tx], now)?;
        self.log_admin(admin_id, "grant", Some(target_id), format!("{:+}", amount), now)?;
        Ok(target)
    }

    pub fn set_halls(&self, admin_id: UserId, target_id: UserId, halls: u32, now: DateTime<Utc>) -> Result<PlayerRecord, GymError> {
        self.require_admin(admin_id, now)?;
        let _guard = self.store().lock_ledger()?;
        let mut target = self.store().get_player(target_id)?;
        let before = target.halls;
        target.halls = halls;
        self.save_player(target.clone(), now)?;
        self.log_admin(admin_id, "set_halls", Some(target_id), format!("{} -> {}", before, halls), now)?;
        Ok(target)
    }

    pub fn ban_player(
        &self,
        admin_id: UserId,
        target_id: UserId,
        hours: Option<i64>,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<BanInfo, GymError> {
        if admin_id == target_id {
            return Err(GymError::SelfTarget);
        }
        if matches!(hours, Some(h) if !(1..=MAX_BAN_HOURS).contains(&h)) {
            return Err(GymError::Invalid(format!(
                "Ban duration must be 1-{} hours.",
                MAX_BAN_HOURS
            )));
        }
        self.require_admin(admin_id, now)?;
        let _guard = self.store().lock_ledger()?;
        let mut target = self.store().get_player(target_id)?;
        let reason = if reason.trim().is_empty() {
            "no reason given".to_string()
        } else {
            reason.trim().to_string()
        };
        let ban = BanInfo {
            reason,
            banned_by: admin_id,
            banned_at: now,
            until: hours.map(|h| now + Duration::hours(h)),
        };
        target.ban = Some(ban.clone());
        self.save_player(target, now)?;
        self.log_admin(admin_id, "ban", Some(target_id), ban.reason.clone(), now)?;
        Ok(ban)
    }

    pub fn unban_player(&self, admin_id: UserId, target_id: UserId, now: DateTime<Utc>) -> Result<(), GymError> {
        self.require_admin(admin_id, now)?;
        let _guard = self.store().lock_ledger()?;
        let mut target = self.store().get_player(target_id)?;
        if target.active_ban(now).is_none() {
            return Err(GymError::Rule("That player is not banned.".to_string()));
        }
        target.ban = None;
        self.save_player(target, now)?;
        self.log_admin(admin_id, "unban", Some(target_id), String::new(), now)
    }
}
