use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info};
use uuid::Uuid;

use crate::gym::daily::LocalCalendar;
use crate::gym::errors::GymError;
use crate::gym::storage::GymStore;
use crate::gym::tables::GameTables;
use crate::gym::types::{CurrencyTransaction, InspectionMode, PlayerRecord, TransactionReason, UserId};

/// Entry point to every gym operation.
///
/// Holds the store, the compiled-in balance tables and the local calendar. Operations are
/// spread over the `ledger`, `inspection`, `protection`, `clan`, `coach`, `promo`, `admin` and
/// `jobs` modules as separate `impl Gym` blocks. Every operation takes `now` explicitly so the
/// same code runs under the scheduler, the chat handlers and the tests.
pub struct Gym {
    store: Arc<GymStore>,
    tables: Arc<GameTables>,
    calendar: LocalCalendar,
    admins: BTreeSet<UserId>,
}

impl Gym {
    pub fn new(store: Arc<GymStore>, tables: Arc<GameTables>, calendar: LocalCalendar) -> Self {
        Self {
            store,
            tables,
            calendar,
            admins: BTreeSet::new(),
        }
    }

    /// Bootstrap administrators that don't need `admin_level` set on their record.
    pub fn with_admins(mut self, admins: impl IntoIterator<Item = UserId>) -> Self {
        self.admins.extend(admins);
        self
    }

    pub fn store(&self) -> &GymStore {
        &self.store
    }

    pub fn tables(&self) -> &GameTables {
        &self.tables
    }

    pub fn calendar(&self) -> LocalCalendar {
        self.calendar
    }

    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        self.calendar.today(now)
    }

    /// Fetch a player, creating the record on first contact.
    pub fn ensure_player(&self, user_id: UserId, name: &str, now: DateTime<Utc>) -> Result<PlayerRecord, GymError> {
        if let Some(player) = self.store.find_player(user_id)? {
            return Ok(player);
        }
        let _guard = self.store.lock_ledger()?;
        // Another task may have registered the player while we waited.
        if let Some(player) = self.store.find_player(user_id)? {
            return Ok(player);
        }
        let player = PlayerRecord::new(user_id, name, self.tables.starting_balance, now);
        self.store.put_player(player.clone())?;
        info!("registered player {} ({})", user_id, name);
        Ok(player)
    }

    pub fn player(&self, user_id: UserId) -> Result<PlayerRecord, GymError> {
        self.store.get_player(user_id)
    }

    /// Fetch a player that is allowed to act right now.
    pub(crate) fn active_player(&self, user_id: UserId, now: DateTime<Utc>) -> Result<PlayerRecord, GymError> {
        let player = self.store.get_player(user_id)?;
        if let Some(ban) = player.active_ban(now) {
            return Err(GymError::Banned {
                reason: ban.reason.clone(),
            });
        }
        Ok(player)
    }

    pub fn is_admin(&self, player: &PlayerRecord) -> bool {
        player.admin_level > 0 || self.admins.contains(&player.user_id)
    }

    /// Current inspection-time mode. An expired window is switched off on read.
    pub fn inspection_mode(&self, now: DateTime<Utc>) -> Result<InspectionMode, GymError> {
        let mode = self.store.get_inspection_mode()?;
        if mode.active && !mode.is_active_at(now) {
            let expired = InspectionMode {
                active: false,
                ends_at: None,
                set_by: mode.set_by,
                updated_at: Some(now),
            };
            self.store.put_inspection_mode(&expired)?;
            info!("inspection time ended");
            return Ok(expired);
        }
        Ok(mode)
    }

    pub(crate) fn credit(
        &self,
        player: &mut PlayerRecord,
        amount: i64,
        reason: TransactionReason,
        counterparty: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<CurrencyTransaction, GymError> {
        player.balance = player
            .balance
            .checked_add(amount)
            .ok_or_else(|| GymError::Invalid("That would overflow the balance.".to_string()))?;
        Ok(Self::entry(player, amount, reason, counterparty, now))
    }

    /// Take `amount` from the player or fail without touching the record.
    pub(crate) fn debit(
        &self,
        player: &mut PlayerRecord,
        amount: i64,
        reason: TransactionReason,
        counterparty: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<CurrencyTransaction, GymError> {
        if player.balance < amount {
            return Err(GymError::InsufficientFunds {
                need: amount,
                have: player.balance,
            });
        }
        player.balance -= amount;
        player.total_spent += amount;
        Ok(Self::entry(player, -amount, reason, counterparty, now))
    }

    fn entry(
        player: &PlayerRecord,
        amount: i64,
        reason: TransactionReason,
        counterparty: Option<UserId>,
        now: DateTime<Utc>,
    ) -> CurrencyTransaction {
        let description = match counterparty {
            Some(other) => format!("{} [id{}]", reason.label(), other),
            None => reason.label(),
        };
        CurrencyTransaction {
            id: Uuid::new_v4().to_string(),
            timestamp: now,
            user_id: player.user_id,
            amount,
            balance_after: player.balance,
            reason,
            counterparty,
            description,
        }
    }

    pub(crate) fn save_player(&self, mut player: PlayerRecord, now: DateTime<Utc>) -> Result<(), GymError> {
        player.touch(now);
        self.store.put_player(player)
    }

    /// Persist a mutated player and then its audit entries.
    pub(crate) fn commit(
        &self,
        player: PlayerRecord,
        entries: impl IntoIterator<Item = CurrencyTransaction>,
        now: DateTime<Utc>,
    ) -> Result<(), GymError> {
        self.save_player(player, now)?;
        for tx in entries {
            debug!(
                "ledger {}: {:+} ({})",
                tx.user_id,
                tx.amount,
                tx.reason.label()
            );
            self.store.record_transaction(tx)?;
        }
        Ok(())
    }
}
