//! Gym Legend game core: the player ledger, inspectors and protections, clans, coaches,
//! promo codes, admin tools and the daily jobs, all persisted in Sled.
//!
//! Everything here is transport-agnostic. The chat layer in [`crate::bot`] parses commands,
//! calls into [`Gym`] and renders the returned outcome structs; the scheduler calls the
//! daily jobs. Every mutating operation serializes on the store's ledger lock, so balance
//! and hall changes are never lost to interleaved commands.

pub mod admin;
pub mod clan;
pub mod coach;
pub mod daily;
pub mod errors;
pub mod inspection;
pub mod jobs;
pub mod ledger;
pub mod promo;
pub mod protection;
pub mod service;
pub mod storage;
pub mod tables;
pub mod types;

pub use admin::{MAX_BAN_HOURS, MAX_MODE_HOURS};
pub use clan::{validate_clan_name, validate_tag, ClanInfo, ClanRosterEntry};
pub use coach::{CoachUpgrade, TrainingOutcome, TrainingReward};
pub use daily::{is_stale, DailyCounter, LocalCalendar};
pub use errors::{format_wait, ErrorKind, GymError};
pub use inspection::{
    protection_blocks, roll_damage, InspectionOutcome, InspectionPlan, InspectorPurchase,
};
pub use jobs::{PayoutReceipt, PayoutSummary};
pub use ledger::{
    validate_player_name, DumbbellUpgrade, HallPurchase, IncomeSummary, LiftOutcome, Profile,
    TransferReceipt,
};
pub use promo::{normalize_code, PromoRedemption};
pub use protection::{ProtectionActivation, ProtectionPurchase};
pub use service::Gym;
pub use storage::{GymStore, GymStoreBuilder};
pub use tables::{
    ClanBonuses, ClanRules, CoachLevel, DumbbellLevel, GameTables, HallRules, InspectorTier,
    ModeSettings, ProtectionTier, TransferRules,
};
pub use types::*;
