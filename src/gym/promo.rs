use chrono::{DateTime, Utc};
use log::info;

use crate::gym::errors::GymError;
use crate::gym::service::Gym;
use crate::gym::types::{PromoCode, TransactionReason, UserId, PROMO_SCHEMA_VERSION};

pub const PROMO_MAX_CHARS: usize = 32;

pub fn normalize_code(raw: &str) -> Result<String, GymError> {
    let code = raw.trim().to_uppercase();
    if code.is_empty()
        || code.chars().count() > PROMO_MAX_CHARS
        || !code.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-')
    {
        return Err(GymError::Invalid("Invalid promo code.".to_string()));
    }
    Ok(code)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromoRedemption {
    pub code: String,
    pub reward: i64,
    pub balance: i64,
    pub uses_left: u32,
}

impl Gym {
    pub fn create_promo(
        &self,
        admin_id: UserId,
        code: &str,
        reward: i64,
        uses: u32,
        now: DateTime<Utc>,
    ) -> Result<PromoCode, GymError> {
        let code = normalize_code(code)?;
        if reward <= 0 || uses == 0 {
            return Err(GymError::Invalid("Reward and uses must be positive.".to_string()));
        }
        self.require_admin(admin_id, now)?;
        let _guard = self.store().lock_ledger()?;
        if self.store().get_promo(&code)?.is_some() {
            return Err(GymError::Rule(format!("Promo code {} already exists.", code)));
        }
        let promo = PromoCode {
            code: code.clone(),
            reward,
            uses_total: uses,
            uses_left: uses,
            active: true,
            created_by: admin_id,
            created_at: now,
            schema_version: PROMO_SCHEMA_VERSION,
        };
        self.store().put_promo(promo.clone())?;
        self.log_admin(admin_id, "promo_create", None, format!("{} reward {} x{}", code, reward, uses), now)?;
        Ok(promo)
    }

    pub fn redeem_promo(&self, user_id: UserId, code: &str, now: DateTime<Utc>) -> Result<PromoRedemption, GymError> {
        let code = normalize_code(code)?;
        let _guard = self.store().lock_ledger()?;
        let mut player = self.active_player(user_id, now)?;
        let mut promo = self
            .store()
            .get_promo(&code)?
            .filter(|p| p.active)
            .ok_or_else(|| GymError::Rule("Promo code not found or no longer active.".to_string()))?;
        if promo.uses_left == 0 {
            return Err(GymError::Rule("This promo code has been used up.".to_string()));
        }
        if self.store().promo_redeemed_by(&code, user_id)? {
            return Err(GymError::Rule("You have already used this promo code.".to_string()));
        }

        promo.uses_left -= 1;
        if promo.uses_left == 0 {
            promo.active = false;
        }
        let tx = self.credit(
            &mut player,
            promo.reward,
            TransactionReason::PromoReward { code: code.clone() },
            None,
            now,
        )?;
        let redemption = PromoRedemption {
            code: code.clone(),
            reward: promo.reward,
            balance: player.balance,
            uses_left: promo.uses_left,
        };
        self.store().put_promo(promo)?;
        self.store().mark_promo_redeemed(&code, user_id)?;
        self.commit(player, [tx], now)?;
        info!("player {} redeemed promo {}", user_id, code);
        Ok(redemption)
    }
}
