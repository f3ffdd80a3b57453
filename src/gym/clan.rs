//! Clans: membership with roles, a shared treasury with an append-only log, and level-based
//! bonuses (see [`crate::gym::tables::ClanRules::bonuses`]).

use chrono::{DateTime, Utc};
use log::info;

use crate::gym::errors::GymError;
use crate::gym::service::Gym;
use crate::gym::tables::ClanBonuses;
use crate::gym::types::{
    ClanMember, ClanRecord, ClanRole, PlayerRecord, TransactionReason, TreasuryLogEntry,
    TreasuryOp, UserId, CLAN_SCHEMA_VERSION, MEMBER_SCHEMA_VERSION,
};

pub const TAG_MIN_CHARS: usize = 2;
pub const TAG_MAX_CHARS: usize = 5;
pub const CLAN_NAME_MIN_CHARS: usize = 3;
pub const CLAN_NAME_MAX_CHARS: usize = 24;

#[derive(Debug, Clone)]
pub struct ClanInfo {
    pub clan: ClanRecord,
    pub owner_name: String,
    pub member_count: usize,
    pub bonuses: ClanBonuses,
}

#[derive(Debug, Clone)]
pub struct ClanRosterEntry {
    pub member: ClanMember,
    pub name: String,
    pub power: i64,
}

pub fn validate_tag(raw: &str) -> Result<String, GymError> {
    let tag = raw.trim().to_ascii_uppercase();
    let len = tag.chars().count();
    if !(TAG_MIN_CHARS..=TAG_MAX_CHARS).contains(&len) || !tag.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(GymError::Invalid(format!(
            "Clan tag must be {}-{} latin letters or digits.",
            TAG_MIN_CHARS, TAG_MAX_CHARS
        )));
    }
    Ok(tag)
}

pub fn validate_clan_name(raw: &str) -> Result<String, GymError> {
    let name = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let len = name.chars().count();
    if !(CLAN_NAME_MIN_CHARS..=CLAN_NAME_MAX_CHARS).contains(&len) {
        return Err(GymError::Invalid(format!(
            "Clan name must be {}-{} characters long.",
            CLAN_NAME_MIN_CHARS, CLAN_NAME_MAX_CHARS
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == ' ' || c == '-' || c == '_')
    {
        return Err(GymError::Invalid(
            "Clan name may only use letters, digits, spaces, '-' and '_'.".to_string(),
        ));
    }
    Ok(name)
}

fn not_in_clan() -> GymError {
    GymError::Rule("You are not in a clan.".to_string())
}

impl Gym {
    /// Player, clan and membership row of a clan member.
    fn membership(&self, user_id: UserId, now: DateTime<Utc>) -> Result<(PlayerRecord, ClanRecord, ClanMember), GymError> {
        let player = self.active_player(user_id, now)?;
        let clan_id = player.clan_id.ok_or_else(not_in_clan)?;
        let clan = self.store().get_clan(clan_id)?;
        let member = self
            .store()
            .get_member(clan_id, user_id)?
            .ok_or_else(not_in_clan)?;
        Ok((player, clan, member))
    }

    fn require_manager(member: &ClanMember) -> Result<(), GymError> {
        if member.role.can_manage() {
            Ok(())
        } else {
            Err(GymError::PermissionDenied(
                "only the clan owner or an officer can do that".to_string(),
            ))
        }
    }

    fn log_treasury(
        &self,
        clan: &ClanRecord,
        user_id: Option<UserId>,
        op: TreasuryOp,
        amount: i64,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<(), GymError> {
        self.store().append_treasury_log(TreasuryLogEntry {
            clan_id: clan.id,
            user_id,
            op,
            amount,
            reason,
            timestamp: now,
        })
    }

    pub fn clan_bonuses(&self, level: u8) -> ClanBonuses {
        self.tables().clans.bonuses(level)
    }

    pub fn create_clan(&self, owner_id: UserId, tag: &str, name: &str, now: DateTime<Utc>) -> Result<ClanRecord, GymError> {
        let tag = validate_tag(tag)?;
        let name = validate_clan_name(name)?;
        let cost = self.tables().clans.create_cost;
        let _guard = self.store().lock_ledger()?;
        let mut owner = self.active_player(owner_id, now)?;
        if owner.clan_id.is_some() {
            return Err(GymError::Rule("Leave your current clan first.".to_string()));
        }
        if self.store().find_clan_by_tag(&tag)?.is_some() {
            return Err(GymError::Rule(format!("Tag [{}] is already taken.", tag)));
        }
        if self.store().clan_name_taken(&name)? {
            return Err(GymError::Rule(format!("Clan name \"{}\" is already taken.", name)));
        }
        let tx = self.debit(&mut owner, cost, TransactionReason::ClanCreate, None, now)?;

        let clan = ClanRecord {
            id: self.store().next_clan_id()?,
            tag,
            name,
            owner_id,
            level: 1,
            treasury: 0,
            total_income: 0,
            description: String::new(),
            open: true,
            created_at: now,
            schema_version: CLAN_SCHEMA_VERSION,
        };
        owner.clan_id = Some(clan.id);
        self.store().put_clan(clan.clone())?;
        self.store().put_member(ClanMember {
            clan_id: clan.id,
            user_id: owner_id,
            role: ClanRole::Owner,
            contribution: 0,
            joined_at: now,
            schema_version: MEMBER_SCHEMA_VERSION,
        })?;
        self.commit(owner, [tx], now)?;
        info!("clan [{}] {} founded by {}", clan.tag, clan.name, owner_id);
        Ok(clan)
    }

    pub fn join_clan(&self, user_id: UserId, tag: &str, now: DateTime<Utc>) -> Result<ClanRecord, GymError> {
        let tag = validate_tag(tag)?;
        let _guard = self.store().lock_ledger()?;
        let mut player = self.active_player(user_id, now)?;
        if player.clan_id.is_some() {
            return Err(GymError::Rule("You are already in a clan.".to_string()));
        }
        let clan = self
            .store()
            .find_clan_by_tag(&tag)?
            .ok_or_else(|| GymError::ClanNotFound(tag.clone()))?;
        if !clan.open {
            return Err(GymError::Rule("This clan is closed to new members.".to_string()));
        }
        let limit = self.clan_bonuses(clan.level).member_limit;
        if self.store().member_count(clan.id) >= limit as usize {
            return Err(GymError::Rule(format!("Clan is full ({} members).", limit)));
        }
        self.store().put_member(ClanMember {
            clan_id: clan.id,
            user_id,
            role: ClanRole::Member,
            contribution: 0,
            joined_at: now,
            schema_version: MEMBER_SCHEMA_VERSION,
        })?;
        player.clan_id = Some(clan.id);
        self.save_player(player, now)?;
        info!("player {} joined clan [{}]", user_id, clan.tag);
        Ok(clan)
    }

    pub fn leave_clan(&self, user_id: UserId, now: DateTime<Utc>) -> Result<ClanRecord, GymError> {
        let _guard = self.store().lock_ledger()?;
        let (mut player, clan, member) = self.membership(user_id, now)?;
        if member.role == ClanRole::Owner {
            return Err(GymError::Rule(
                "The owner cannot leave. Disband the clan instead.".to_string(),
            ));
        }
        self.store().remove_member(clan.id, user_id)?;
        player.clan_id = None;
        self.save_player(player, now)?;
        info!("player {} left clan [{}]", user_id, clan.tag);
        Ok(clan)
    }

    pub fn kick_member(&self, actor_id: UserId, target_id: UserId, now: DateTime<Utc>) -> Result<ClanRecord, GymError> {
        if actor_id == target_id {
            return Err(GymError::SelfTarget);
        }
        let _guard = self.store().lock_ledger()?;
        let (_, clan, actor) = self.membership(actor_id, now)?;
        Self::require_manager(&actor)?;
        let target = self
            .store()
            .get_member(clan.id, target_id)?
            .ok_or_else(|| GymError::Rule("That player is not in your clan.".to_string()))?;
        // Officers may only remove plain members.
        if target.role <= actor.role {
            return Err(GymError::PermissionDenied(format!(
                "cannot kick a clan {}",
                target.role.label()
            )));
        }
        self.store().remove_member(clan.id, target_id)?;
        let mut player = self.store().get_player(target_id)?;
        player.clan_id = None;
        self.save_player(player, now)?;
        info!("player {} kicked {} from clan [{}]", actor_id, target_id, clan.tag);
        Ok(clan)
    }

    /// Owner-only promotion to officer or demotion to member.
    pub fn set_clan_role(
        &self,
        actor_id: UserId,
        target_id: UserId,
        role: ClanRole,
        now: DateTime<Utc>,
    ) -> Result<ClanMember, GymError> {
        if role == ClanRole::Owner {
            return Err(GymError::Invalid("Ownership cannot be assigned this way.".to_string()));
        }
        if actor_id == target_id {
            return Err(GymError::SelfTarget);
        }
        let _guard = self.store().lock_ledger()?;
        let (_, clan, actor) = self.membership(actor_id, now)?;
        if actor.role != ClanRole::Owner {
            return Err(GymError::PermissionDenied("only the clan owner can change roles".to_string()));
        }
        let mut target = self
            .store()
            .get_member(clan.id, target_id)?
            .ok_or_else(|| GymError::Rule("That player is not in your clan.".to_string()))?;
        if target.role == role {
            return Err(GymError::Rule(format!("That player is already a {}.", role.label())));
        }
        target.role = role;
        self.store().put_member(target.clone())?;
        Ok(target)
    }

    /// Delete the clan. The treasury is lost; members become clanless.
    pub fn disband_clan(&self, actor_id: UserId, now: DateTime<Utc>) -> Result<ClanRecord, GymError> {
        let _guard = self.store().lock_ledger()?;
        let (_, clan, actor) = self.membership(actor_id, now)?;
        if actor.role != ClanRole::Owner {
            return Err(GymError::PermissionDenied("only the clan owner can disband it".to_string()));
        }
        for member in self.store().list_members(clan.id)? {
            if let Some(mut player) = self.store().find_player(member.user_id)? {
                player.clan_id = None;
                self.save_player(player, now)?;
            }
        }
        self.store().delete_clan(&clan)?;
        info!("clan [{}] disbanded by {} (treasury {})", clan.tag, actor_id, clan.treasury);
        Ok(clan)
    }

    pub fn deposit_to_clan(&self, user_id: UserId, amount: i64, now: DateTime<Utc>) -> Result<ClanRecord, GymError> {
        if amount <= 0 {
            return Err(GymError::Invalid("Amount must be positive.".to_string()));
        }
        let _guard = self.store().lock_ledger()?;
        let (mut player, mut clan, mut member) = self.membership(user_id, now)?;
        let tx = self.debit(&mut player, amount, TransactionReason::ClanDeposit, None, now)?;
        clan.treasury += amount;
        member.contribution += amount;
        self.log_treasury(&clan, Some(user_id), TreasuryOp::Deposit, amount, format!("deposit by {}", player.name), now)?;
        self.store().put_clan(clan.clone())?;
        self.store().put_member(member)?;
        self.commit(player, [tx], now)?;
        Ok(clan)
    }

    pub fn withdraw_from_clan(&self, user_id: UserId, amount: i64, now: DateTime<Utc>) -> Result<ClanRecord, GymError> {
        if amount <= 0 {
            return Err(GymError::Invalid("Amount must be positive.".to_string()));
        }
        let _guard = self.store().lock_ledger()?;
        let (mut player, mut clan, member) = self.membership(user_id, now)?;
        Self::require_manager(&member)?;
        if clan.treasury < amount {
            return Err(GymError::InsufficientFunds {
                need: amount,
                have: clan.treasury,
            });
        }
        let tx = self.credit(&mut player, amount, TransactionReason::ClanWithdraw, None, now)?;
        clan.treasury -= amount;
        self.log_treasury(&clan, Some(user_id), TreasuryOp::Withdraw, -amount, format!("withdrawal by {}", player.name), now)?;
        self.store().put_clan(clan.clone())?;
        self.commit(player, [tx], now)?;
        info!("player {} withdrew {} from clan [{}]", user_id, amount, clan.tag);
        Ok(clan)
    }

    /// Raise the clan level by one, paid from the treasury.
    pub fn upgrade_clan(&self, user_id: UserId, now: DateTime<Utc>) -> Result<(ClanRecord, i64), GymError> {
        let rules = self.tables().clans;
        let _guard = self.store().lock_ledger()?;
        let (_, mut clan, member) = self.membership(user_id, now)?;
        Self::require_manager(&member)?;
        if clan.level >= rules.max_level {
            return Err(GymError::Rule("The clan is already at the maximum level.".to_string()));
        }
        let cost = rules.upgrade_cost(clan.level);
        if clan.treasury < cost {
            return Err(GymError::InsufficientFunds {
                need: cost,
                have: clan.treasury,
            });
        }
        clan.treasury -= cost;
        clan.level += 1;
        self.log_treasury(&clan, Some(user_id), TreasuryOp::Upgrade, -cost, format!("upgrade to level {}", clan.level), now)?;
        self.store().put_clan(clan.clone())?;
        info!("clan [{}] reached level {}", clan.tag, clan.level);
        Ok((clan, cost))
    }

    /// The player's clan and membership row, if any.
    pub fn clan_of(&self, user_id: UserId) -> Result<Option<(ClanRecord, ClanMember)>, GymError> {
        let player = self.store().get_player(user_id)?;
        let Some(clan_id) = player.clan_id else {
            return Ok(None);
        };
        let clan = self.store().get_clan(clan_id)?;
        Ok(self.store().get_member(clan_id, user_id)?.map(|m| (clan, m)))
    }

    pub fn clan_info(&self, tag: &str) -> Result<ClanInfo, GymError> {
        let tag = validate_tag(tag)?;
        let clan = self
            .store()
            .find_clan_by_tag(&tag)?
            .ok_or(GymError::ClanNotFound(tag))?;
        self.describe_clan(clan)
    }

    pub fn describe_clan(&self, clan: ClanRecord) -> Result<ClanInfo, GymError> {
        let owner_name = self
            .store()
            .find_player(clan.owner_id)?
            .map(|p| p.name)
            .unwrap_or_else(|| format!("id{}", clan.owner_id));
        Ok(ClanInfo {
            member_count: self.store().member_count(clan.id),
            bonuses: self.clan_bonuses(clan.level),
            owner_name,
            clan,
        })
    }

    /// Members ordered by role, then contribution.
    pub fn clan_roster(&self, clan_id: u64) -> Result<Vec<ClanRosterEntry>, GymError> {
        let mut roster = Vec::new();
        for member in self.store().list_members(clan_id)? {
            let (name, power) = match self.store().find_player(member.user_id)? {
                Some(p) => (p.name, p.power),
                None => (format!("id{}", member.user_id), 0),
            };
            roster.push(ClanRosterEntry { member, name, power });
        }
        roster.sort_by(|a, b| {
            a.member
                .role
                .cmp(&b.member.role)
                .then(b.member.contribution.cmp(&a.member.contribution))
        });
        Ok(roster)
    }

    pub fn clan_top(&self, limit: usize) -> Result<Vec<ClanRecord>, GymError> {
        let mut clans = self.store().list_clans()?;
        clans.sort_by(|a, b| {
            b.level
                .cmp(&a.level)
                .then(b.treasury.cmp(&a.treasury))
                .then(a.id.cmp(&b.id))
        });
        clans.truncate(limit);
        Ok(clans)
    }

    pub fn clan_treasury_log(&self, user_id: UserId, limit: usize) -> Result<Vec<TreasuryLogEntry>, GymError> {
        let (clan, _) = self.clan_of(user_id)?.ok_or_else(not_in_clan)?;
        self.store().treasury_log(clan.id, limit)
    }
}
