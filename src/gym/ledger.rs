//! Player ledger operations: profile, renaming, lifting, dumbbell upgrades, fitness halls,
//! transfers, transaction history and leaderboards.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::info;

use crate::gym::errors::GymError;
use crate::gym::service::Gym;
use crate::gym::tables::DumbbellLevel;
use crate::gym::types::{
    ArsenalRecord, ClanRecord, ClanRole, CurrencyTransaction, InspectionStats, PlayerRecord,
    TopKind, TransactionReason, TreasuryLogEntry, TreasuryOp, UserId,
};

pub const NAME_MIN_CHARS: usize = 3;
pub const NAME_MAX_CHARS: usize = 20;

#[derive(Debug, Clone)]
pub struct Profile {
    pub player: PlayerRecord,
    pub dumbbell: DumbbellLevel,
    pub arsenal: ArsenalRecord,
    pub stats: InspectionStats,
    pub clan: Option<(ClanRecord, ClanRole)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiftOutcome {
    pub income: i64,
    pub clan_bonus: i64,
    pub power_gained: i64,
    pub balance: i64,
    pub total_lifts: u64,
    /// Tag and amount credited to the player's clan treasury.
    pub clan_credit: Option<(String, i64)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumbbellUpgrade {
    pub level: u8,
    pub name: String,
    pub price: i64,
    pub balance: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HallPurchase {
    pub count: u32,
    pub price: i64,
    pub halls: u32,
    pub bought_today: u32,
    pub remaining_today: u32,
    pub balance: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomeSummary {
    pub halls: u32,
    pub daily_income: i64,
    pub total_received: i64,
    pub last_paid_day: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub from: UserId,
    pub to: UserId,
    pub target_name: String,
    pub amount: i64,
    pub commission: i64,
    pub received: i64,
    pub sender_balance: i64,
}

/// Letters, digits, space, `-` and `_`, trimmed, no doubled spaces.
pub fn validate_player_name(raw: &str) -> Result<String, GymError> {
    let name = raw.trim();
    let len = name.chars().count();
    if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&len) {
        return Err(GymError::Invalid(format!(
            "Name must be {}-{} characters long.",
            NAME_MIN_CHARS, NAME_MAX_CHARS
        )));
    }
    if name.contains("  ") {
        return Err(GymError::Invalid("Name cannot contain double spaces.".to_string()));
    }
    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == ' ' || c == '-' || c == '_')
    {
        return Err(GymError::Invalid(
            "Name may only use letters, digits, spaces, '-' and '_'.".to_string(),
        ));
    }
    Ok(name.to_string())
}

impl Gym {
    pub fn profile(&self, user_id: UserId) -> Result<Profile, GymError> {
        let player = self.store().get_player(user_id)?;
        let dumbbell = self.tables().dumbbell(player.dumbbell_level)?.clone();
        let arsenal = self.store().get_arsenal(user_id)?;
        let stats = self.store().get_stats(user_id)?;
        let clan = match player.clan_id {
            Some(clan_id) => {
                let clan = self.store().get_clan(clan_id)?;
                let role = self
                    .store()
                    .get_member(clan_id, user_id)?
                    .map(|m| m.role)
                    .unwrap_or(ClanRole::Member);
                Some((clan, role))
            }
            None => None,
        };
        Ok(Profile {
            player,
            dumbbell,
            arsenal,
            stats,
            clan,
        })
    }

    pub fn rename(&self, user_id: UserId, raw: &str, now: DateTime<Utc>) -> Result<String, GymError> {
        let name = validate_player_name(raw)?;
        let _guard = self.store().lock_ledger()?;
        let mut player = self.active_player(user_id, now)?;
        player.name = name.clone();
        self.save_player(player, now)?;
        Ok(name)
    }

    /// One dumbbell lift: pays the level income plus the clan bonus and feeds the clan
    /// treasury.
    pub fn lift(&self, user_id: UserId, now: DateTime<Utc>) -> Result<LiftOutcome, GymError> {
        let _guard = self.store().lock_ledger()?;
        let mut player = self.active_player(user_id, now)?;
        if let Some(last) = player.last_lift {
            let ready_at = last + Duration::seconds(self.tables().lift_cooldown_secs);
            if ready_at > now {
                return Err(GymError::OnCooldown {
                    remaining: ready_at - now,
                });
            }
        }

        let dumbbell = self.tables().dumbbell(player.dumbbell_level)?;
        let base = player.custom_income.unwrap_or(dumbbell.income_per_lift);
        let power_gained = dumbbell.power_per_lift;

        let mut clan_bonus = 0;
        let mut clan_credit = None;
        if let Some(clan_id) = player.clan_id {
            let mut clan = self.store().get_clan(clan_id)?;
            let bonuses = self.tables().clans.bonuses(clan.level);
            clan_bonus = bonuses.player_lift_bonus;
            clan.treasury += bonuses.lift_bonus_coins;
            clan.total_income += bonuses.lift_bonus_coins;
            self.store().append_treasury_log(TreasuryLogEntry {
                clan_id,
                user_id: Some(user_id),
                op: TreasuryOp::LiftIncome,
                amount: bonuses.lift_bonus_coins,
                reason: format!("lift by {} (clan level {})", user_id, clan.level),
                timestamp: now,
            })?;
            clan_credit = Some((clan.tag.clone(), bonuses.lift_bonus_coins));
            self.store().put_clan(clan)?;
        }

        let income = base + clan_bonus;
        player.power += power_gained;
        player.total_lifts += 1;
        player.total_earned += income;
        player.last_lift = Some(now);
        let tx = self.credit(&mut player, income, TransactionReason::Lift, None, now)?;
        let outcome = LiftOutcome {
            income,
            clan_bonus,
            power_gained,
            balance: player.balance,
            total_lifts: player.total_lifts,
            clan_credit,
        };
        self.commit(player, [tx], now)?;
        Ok(outcome)
    }

    pub fn upgrade_dumbbell(&self, user_id: UserId, now: DateTime<Utc>) -> Result<DumbbellUpgrade, GymError> {
        let _guard = self.store().lock_ledger()?;
        let mut player = self.active_player(user_id, now)?;
        let next_level = player.dumbbell_level.saturating_add(1);
        let next = self
            .tables()
            .dumbbells
            .get(&next_level)
            .ok_or_else(|| GymError::Rule("Your dumbbell is already at the maximum level.".to_string()))?
            .clone();
        let tx = self.debit(&mut player, next.price, TransactionReason::DumbbellUpgrade, None, now)?;
        player.dumbbell_level = next.level;
        let upgrade = DumbbellUpgrade {
            level: next.level,
            name: next.name.clone(),
            price: next.price,
            balance: player.balance,
        };
        self.commit(player, [tx], now)?;
        info!("player {} upgraded dumbbell to {}", user_id, next.level);
        Ok(upgrade)
    }

    pub fn buy_halls(&self, user_id: UserId, count: u32, now: DateTime<Utc>) -> Result<HallPurchase, GymError> {
        if count == 0 {
            return Err(GymError::Invalid("Hall count must be at least 1.".to_string()));
        }
        let rules = self.tables().halls;
        let today = self.today(now);
        let _guard = self.store().lock_ledger()?;
        let mut player = self.active_player(user_id, now)?;

        let bought_today = player.hall_purchases.value_on(today);
        let remaining = rules.daily_purchase_limit.saturating_sub(bought_today);
        if remaining == 0 {
            return Err(GymError::QuotaExceeded {
                limit: rules.daily_purchase_limit,
            });
        }
        if count > remaining {
            return Err(GymError::Rule(format!(
                "You can buy only {} more halls today (limit {}).",
                remaining, rules.daily_purchase_limit
            )));
        }

        let price = rules.price_for(count);
        let tx = self.debit(&mut player, price, TransactionReason::HallPurchase, None, now)?;
        player.halls += count;
        player.hall_purchases.add(today, count);
        let purchase = HallPurchase {
            count,
            price,
            halls: player.halls,
            bought_today: player.hall_purchases.value_on(today),
            remaining_today: rules
                .daily_purchase_limit
                .saturating_sub(player.hall_purchases.value_on(today)),
            balance: player.balance,
        };
        self.commit(player, [tx], now)?;
        Ok(purchase)
    }

    pub fn income_summary(&self, user_id: UserId) -> Result<IncomeSummary, GymError> {
        let player = self.store().get_player(user_id)?;
        Ok(IncomeSummary {
            halls: player.halls,
            daily_income: player.halls as i64 * self.tables().halls.daily_income,
            total_received: player.income_received,
            last_paid_day: player.last_paid_day,
        })
    }

    /// Move coins between players. The commission is burned; the target receives the rest.
    pub fn transfer(&self, from: UserId, to: UserId, amount: i64, now: DateTime<Utc>) -> Result<TransferReceipt, GymError> {
        let rules = self.tables().transfer;
        if amount <= 0 {
            return Err(GymError::Invalid("Amount must be positive.".to_string()));
        }
        if amount < rules.min_amount {
            return Err(GymError::Invalid(format!(
                "Minimum transfer is {} coins.",
                rules.min_amount
            )));
        }
        if from == to {
            return Err(GymError::SelfTarget);
        }
        let commission = rules
            .commission_for(amount)
            .ok_or_else(|| GymError::Invalid("Amount is too large.".to_string()))?;
        let received = amount - commission;

        let _guard = self.store().lock_ledger()?;
        let mut sender = self.active_player(from, now)?;
        let mut target = self.store().get_player(to)?;
        if target.active_ban(now).is_some() {
            return Err(GymError::Rule("That player is banned and cannot receive coins.".to_string()));
        }

        let out = self.debit(
            &mut sender,
            amount,
            TransactionReason::TransferOut { commission },
            Some(to),
            now,
        )?;
        let inbound = self.credit(&mut target, received, TransactionReason::TransferIn, Some(from), now)?;

        let receipt = TransferReceipt {
            from,
            to,
            target_name: target.name.clone(),
            amount,
            commission,
            received,
            sender_balance: sender.balance,
        };
        self.commit(sender, [out], now)?;
        self.commit(target, [inbound], now)?;
        info!(
            "transfer {} -> {}: {} (fee {})",
            from, to, amount, commission
        );
        Ok(receipt)
    }

    pub fn recent_transactions(&self, user_id: UserId, limit: usize) -> Result<Vec<CurrencyTransaction>, GymError> {
        self.store().recent_transactions(user_id, limit)
    }

    /// Leaderboard of unbanned players; ties go to the lower user id.
    pub fn top(&self, kind: TopKind, limit: usize, now: DateTime<Utc>) -> Result<Vec<PlayerRecord>, GymError> {
        let mut players: Vec<PlayerRecord> = self
            .store()
            .list_players()?
            .into_iter()
            .filter(|p| p.active_ban(now).is_none())
            .collect();
        players.sort_by(|a, b| {
            kind.score(b)
                .cmp(&kind.score(a))
                .then(a.user_id.cmp(&b.user_id))
        });
        players.truncate(limit);
        Ok(players)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_validated() {
        assert_eq!(validate_player_name("  Iron Mike ").ok().as_deref(), Some("Iron Mike"));
        assert!(validate_player_name("ab").is_err());
        assert!(validate_player_name("two  spaces").is_err());
        assert!(validate_player_name("bad!name").is_err());
        assert!(validate_player_name("Качок_2000").is_ok());
    }
}
