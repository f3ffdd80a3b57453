//! Daily jobs run by the scheduler: the fitness hall payout and the inspection counter reset.
//!
//! Both are idempotent per local day. The payout stamps `last_paid_day` on every player it
//! pays, so a restart right after midnight never pays twice; the reset stamps today's date on
//! every counter it zeroes.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use log::{info, warn};

use crate::gym::daily::is_stale;
use crate::gym::errors::GymError;
use crate::gym::service::Gym;
use crate::gym::types::{ClanId, TransactionReason, TreasuryLogEntry, TreasuryOp, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutReceipt {
    pub user_id: UserId,
    pub halls: u32,
    pub amount: i64,
    pub balance: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutSummary {
    pub day: NaiveDate,
    pub receipts: Vec<PayoutReceipt>,
    pub already_paid: usize,
    pub total_paid: i64,
    /// Treasury credits per clan from members' halls.
    pub clan_credits: BTreeMap<ClanId, i64>,
}

impl Gym {
    /// Pay `halls x daily rate` to every player owning halls who has not been paid today.
    pub fn run_daily_payout(&self, now: DateTime<Utc>) -> Result<PayoutSummary, GymError> {
        let today = self.today(now);
        let rate = self.tables().halls.daily_income;
        let _guard = self.store().lock_ledger()?;

        let mut summary = PayoutSummary {
            day: today,
            receipts: Vec::new(),
            already_paid: 0,
            total_paid: 0,
            clan_credits: BTreeMap::new(),
        };
        let mut clan_halls: BTreeMap<ClanId, u64> = BTreeMap::new();

        for mut player in self.store().list_players()? {
            if player.halls == 0 {
                continue;
            }
            if !is_stale(player.last_paid_day, today) {
                summary.already_paid += 1;
                continue;
            }
            let amount = player.halls as i64 * rate;
            player.income_received += amount;
            player.last_paid_day = Some(today);
            if let Some(clan_id) = player.clan_id {
                *clan_halls.entry(clan_id).or_default() += player.halls as u64;
            }
            let tx = self.credit(&mut player, amount, TransactionReason::HallIncome, None, now)?;
            summary.receipts.push(PayoutReceipt {
                user_id: player.user_id,
                halls: player.halls,
                amount,
                balance: player.balance,
            });
            summary.total_paid += amount;
            // Payout is not player activity; keep last_active untouched.
            self.store().put_player(player)?;
            self.store().record_transaction(tx)?;
        }

        for (clan_id, halls) in clan_halls {
            let mut clan = match self.store().get_clan(clan_id) {
                Ok(clan) => clan,
                Err(GymError::ClanNotFound(_)) => {
                    warn!("payout: clan {} is gone, skipping its hall income", clan_id);
                    continue;
                }
                Err(e) => return Err(e),
            };
            let credit = halls as i64 * self.clan_bonuses(clan.level).hall_income_bonus;
            clan.treasury += credit;
            clan.total_income += credit;
            self.store().append_treasury_log(TreasuryLogEntry {
                clan_id,
                user_id: None,
                op: TreasuryOp::HallIncome,
                amount: credit,
                reason: format!("daily income from {} member halls", halls),
                timestamp: now,
            })?;
            self.store().put_clan(clan)?;
            summary.clan_credits.insert(clan_id, credit);
        }

        self.store().flush()?;
        info!(
            "daily payout for {}: {} players paid {} coins, {} already paid",
            today,
            summary.receipts.len(),
            summary.total_paid,
            summary.already_paid
        );
        Ok(summary)
    }

    /// Zero every inspections-today counter left over from a previous day. Returns how many
    /// records were rewritten.
    pub fn reset_daily_counters(&self, now: DateTime<Utc>) -> Result<usize, GymError> {
        let today = self.today(now);
        let _guard = self.store().lock_ledger()?;
        let mut reset = 0;
        for mut stats in self.store().list_stats()? {
            // Counters already stamped today are live; zeroing them would undo today's attempts.
            if !is_stale(stats.inspections_today.day, today) {
                continue;
            }
            stats.inspections_today.reset(today);
            self.store().put_stats(stats)?;
            reset += 1;
        }
        self.store().flush()?;
        info!("daily inspection counters reset for {} ({} records)", today, reset);
        Ok(reset)
    }
}
