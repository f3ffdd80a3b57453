use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::gym::daily::DailyCounter;

/// Platform user id (positive for people).
pub type UserId = i64;
pub type ClanId = u64;

pub const PLAYER_SCHEMA_VERSION: u8 = 1;
pub const ARSENAL_SCHEMA_VERSION: u8 = 1;
pub const STATS_SCHEMA_VERSION: u8 = 1;
pub const CLAN_SCHEMA_VERSION: u8 = 1;
pub const MEMBER_SCHEMA_VERSION: u8 = 1;
pub const PROMO_SCHEMA_VERSION: u8 = 1;

// ============================================================================
// Players
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BanInfo {
    pub reason: String,
    pub banned_by: UserId,
    pub banned_at: DateTime<Utc>,
    /// `None` means permanent.
    pub until: Option<DateTime<Utc>>,
}

impl BanInfo {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.until.map_or(true, |until| until > now)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerRecord {
    pub user_id: UserId,
    pub name: String,
    pub balance: i64,
    pub power: i64,
    pub dumbbell_level: u8,
    /// Admin override for per-lift income.
    pub custom_income: Option<i64>,
    pub total_lifts: u64,
    pub total_earned: i64,
    pub total_spent: i64,
    pub last_lift: Option<DateTime<Utc>>,
    pub halls: u32,
    pub hall_purchases: DailyCounter,
    pub income_received: i64,
    pub last_paid_day: Option<NaiveDate>,
    pub coach_level: u8,
    pub last_training: Option<DateTime<Utc>>,
    pub clan_id: Option<ClanId>,
    pub admin_level: u8,
    pub ban: Option<BanInfo>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub schema_version: u8,
}

impl PlayerRecord {
    pub fn new(user_id: UserId, name: &str, starting_balance: i64, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            name: name.to_string(),
            balance: starting_balance,
            power: 0,
            dumbbell_level: 1,
            custom_income: None,
            total_lifts: 0,
            total_earned: 0,
            total_spent: 0,
            last_lift: None,
            halls: 0,
            hall_purchases: DailyCounter::default(),
            income_received: 0,
            last_paid_day: None,
            coach_level: 0,
            last_training: None,
            clan_id: None,
            admin_level: 0,
            ban: None,
            created_at: now,
            last_active: now,
            schema_version: PLAYER_SCHEMA_VERSION,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_active = now;
    }

    pub fn active_ban(&self, now: DateTime<Utc>) -> Option<&BanInfo> {
        self.ban.as_ref().filter(|ban| ban.is_active(now))
    }
}

// ============================================================================
// Inspectors & protections
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActiveProtection {
    pub level: u8,
    pub activated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ActiveProtection {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }
}

/// Owned inspector/protection tiers and the single active protection window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArsenalRecord {
    pub user_id: UserId,
    pub inspectors: BTreeSet<u8>,
    pub protections: BTreeSet<u8>,
    pub active_protection: Option<ActiveProtection>,
    pub schema_version: u8,
}

impl ArsenalRecord {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            inspectors: BTreeSet::new(),
            protections: BTreeSet::new(),
            active_protection: None,
            schema_version: ARSENAL_SCHEMA_VERSION,
        }
    }
}

/// Rolling inspection counters, both as attacker and as target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InspectionStats {
    pub user_id: UserId,
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub halls_closed: u64,
    pub inspections_today: DailyCounter,
    pub last_inspection: Option<DateTime<Utc>>,
    pub times_inspected: u64,
    pub halls_lost: u64,
    pub compensation_received: i64,
    pub blocked: u64,
    pub protection_spent: i64,
    pub schema_version: u8,
}

impl InspectionStats {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            attempts: 0,
            successes: 0,
            failures: 0,
            halls_closed: 0,
            inspections_today: DailyCounter::default(),
            last_inspection: None,
            times_inspected: 0,
            halls_lost: 0,
            compensation_received: 0,
            blocked: 0,
            protection_spent: 0,
            schema_version: STATS_SCHEMA_VERSION,
        }
    }
}

/// Global inspection-time toggle. Expires lazily once `ends_at` has passed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InspectionMode {
    pub active: bool,
    pub ends_at: Option<DateTime<Utc>>,
    pub set_by: Option<UserId>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl InspectionMode {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.active && self.ends_at.map_or(true, |end| end > now)
    }
}

// ============================================================================
// Clans
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum ClanRole {
    Owner,
    Officer,
    Member,
}

impl ClanRole {
    pub fn can_manage(&self) -> bool {
        matches!(self, ClanRole::Owner | ClanRole::Officer)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ClanRole::Owner => "owner",
            ClanRole::Officer => "officer",
            ClanRole::Member => "member",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClanRecord {
    pub id: ClanId,
    pub tag: String,
    pub name: String,
    pub owner_id: UserId,
    pub level: u8,
    pub treasury: i64,
    pub total_income: i64,
    pub description: String,
    pub open: bool,
    pub created_at: DateTime<Utc>,
    pub schema_version: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClanMember {
    pub clan_id: ClanId,
    pub user_id: UserId,
    pub role: ClanRole,
    pub contribution: i64,
    pub joined_at: DateTime<Utc>,
    pub schema_version: u8,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TreasuryOp {
    Deposit,
    Withdraw,
    LiftIncome,
    HallIncome,
    Upgrade,
}

/// Append-only audit entry for a treasury change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TreasuryLogEntry {
    pub clan_id: ClanId,
    /// `None` for system credits (payout job).
    pub user_id: Option<UserId>,
    pub op: TreasuryOp,
    pub amount: i64,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Currency audit
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CurrencyTransaction {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: UserId,
    /// Signed: negative for debits.
    pub amount: i64,
    pub balance_after: i64,
    pub reason: TransactionReason,
    pub counterparty: Option<UserId>,
    /// Human-readable line shown in the player's history.
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum TransactionReason {
    Lift,
    DumbbellUpgrade,
    HallPurchase,
    HallIncome,
    InspectorPurchase,
    ProtectionPurchase,
    ProtectionActivation,
    InspectionCompensation,
    TransferOut { commission: i64 },
    TransferIn,
    Training,
    CoachUpgrade,
    ClanCreate,
    ClanDeposit,
    ClanWithdraw,
    PromoReward { code: String },
    AdminGrant,
}

impl TransactionReason {
    pub fn label(&self) -> String {
        match self {
            TransactionReason::Lift => "lift".to_string(),
            TransactionReason::DumbbellUpgrade => "dumbbell upgrade".to_string(),
            TransactionReason::HallPurchase => "hall purchase".to_string(),
            TransactionReason::HallIncome => "hall income".to_string(),
            TransactionReason::InspectorPurchase => "inspector purchase".to_string(),
            TransactionReason::ProtectionPurchase => "protection purchase".to_string(),
            TransactionReason::ProtectionActivation => "protection activation".to_string(),
            TransactionReason::InspectionCompensation => "inspection compensation".to_string(),
            TransactionReason::TransferOut { commission } => {
                format!("transfer sent (fee {})", commission)
            }
            TransactionReason::TransferIn => "transfer received".to_string(),
            TransactionReason::Training => "training".to_string(),
            TransactionReason::CoachUpgrade => "coach upgrade".to_string(),
            TransactionReason::ClanCreate => "clan founded".to_string(),
            TransactionReason::ClanDeposit => "clan deposit".to_string(),
            TransactionReason::ClanWithdraw => "clan withdrawal".to_string(),
            TransactionReason::PromoReward { code } => format!("promo {}", code),
            TransactionReason::AdminGrant => "admin grant".to_string(),
        }
    }
}

// ============================================================================
// Promo codes & admin audit
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromoCode {
    pub code: String,
    pub reward: i64,
    pub uses_total: u32,
    pub uses_left: u32,
    pub active: bool,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub schema_version: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdminAction {
    pub admin_id: UserId,
    pub action: String,
    pub target: Option<UserId>,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

/// Leaderboard ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopKind {
    Balance,
    Lifts,
    Power,
    Halls,
}

impl TopKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "balance" | "coins" | "money" => Some(TopKind::Balance),
            "lifts" | "lift" => Some(TopKind::Lifts),
            "power" | "strength" => Some(TopKind::Power),
            "halls" | "hall" | "gyms" => Some(TopKind::Halls),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TopKind::Balance => "balance",
            TopKind::Lifts => "lifts",
            TopKind::Power => "power",
            TopKind::Halls => "halls",
        }
    }

    pub fn score(&self, player: &PlayerRecord) -> i64 {
        match self {
            TopKind::Balance => player.balance,
            TopKind::Lifts => player.total_lifts as i64,
            TopKind::Power => player.power,
            TopKind::Halls => player.halls as i64,
        }
    }
}
