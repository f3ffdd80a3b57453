use chrono::Duration;
use thiserror::Error;

/// Coarse classification used at the chat boundary to decide how a failure is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input. Nothing was mutated.
    Validation,
    /// A game rule rejected the action. Nothing was mutated.
    BusinessRule,
    /// Persistence or runtime failure. Must be logged, never shown verbatim.
    Storage,
}

/// Errors that can arise while running gym operations or touching the store.
#[derive(Debug, Error)]
pub enum GymError {
    /// Wrapper around sled's error type.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Wrapper around bincode serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Wrapper around IO errors (directory creation, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Returned when deserializing a record with an unexpected schema version.
    #[error("schema mismatch for {entity}: expected {expected}, got {found}")]
    SchemaMismatch {
        entity: &'static str,
        expected: u8,
        found: u8,
    },

    /// Poisoned ledger lock or another unexpected condition.
    #[error("internal error: {0}")]
    Internal(String),

    /// Malformed or out-of-range argument.
    #[error("invalid input: {0}")]
    Invalid(String),

    /// Tier or level number not present in the game tables.
    #[error("unknown {kind} level {level}")]
    UnknownLevel { kind: &'static str, level: u8 },

    /// The actor tried to target themselves.
    #[error("cannot target yourself")]
    SelfTarget,

    #[error("player {0} not found")]
    PlayerNotFound(i64),

    #[error("clan not found: {0}")]
    ClanNotFound(String),

    #[error("insufficient funds: need {need}, have {have}")]
    InsufficientFunds { need: i64, have: i64 },

    #[error("on cooldown for another {}s", remaining.num_seconds())]
    OnCooldown { remaining: Duration },

    #[error("daily limit of {limit} reached")]
    QuotaExceeded { limit: u32 },

    #[error("{kind} level {level} is not owned")]
    NotOwned { kind: &'static str, level: u8 },

    #[error("{kind} level {level} is already owned")]
    AlreadyOwned { kind: &'static str, level: u8 },

    #[error("both players are in the same clan")]
    SameClan,

    #[error("player is banned")]
    Banned { reason: String },

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Generic rule violation carrying a player-facing explanation.
    #[error("rule violation: {0}")]
    Rule(String),
}

impl GymError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GymError::Sled(_)
            | GymError::Bincode(_)
            | GymError::Io(_)
            | GymError::SchemaMismatch { .. }
            | GymError::Internal(_) => ErrorKind::Storage,
            GymError::Invalid(_) | GymError::UnknownLevel { .. } | GymError::SelfTarget => {
                ErrorKind::Validation
            }
            _ => ErrorKind::BusinessRule,
        }
    }

    /// Text safe to show the player. Storage failures collapse to a generic message.
    pub fn user_message(&self) -> String {
        match self {
            GymError::Invalid(msg) | GymError::Rule(msg) => msg.clone(),
            GymError::UnknownLevel { kind, level } => format!("There is no {} level {}.", kind, level),
            GymError::SelfTarget => "You cannot do that to yourself.".to_string(),
            GymError::PlayerNotFound(_) => "Player not found.".to_string(),
            GymError::ClanNotFound(_) => "Clan not found.".to_string(),
            GymError::InsufficientFunds { need, have } => {
                format!("Not enough coins: need {}, you have {}.", need, have)
            }
            GymError::OnCooldown { remaining } => {
                format!("Too early. Try again in {}.", format_wait(*remaining))
            }
            GymError::QuotaExceeded { limit } => {
                format!("Daily limit reached ({} per day). Come back tomorrow.", limit)
            }
            GymError::NotOwned { kind, level } => {
                format!("You don't own {} level {}. Buy it first.", kind, level)
            }
            GymError::AlreadyOwned { kind, level } => {
                format!("You already own {} level {}.", kind, level)
            }
            GymError::SameClan => "You cannot inspect a member of your own clan.".to_string(),
            GymError::Banned { reason } => format!("You are banned: {}", reason),
            GymError::PermissionDenied(msg) => format!("Not allowed: {}", msg),
            _ => "An error occurred, please try again later.".to_string(),
        }
    }
}

/// Compact "1h 5m" / "3m 20s" / "12s" rendering of a wait.
pub fn format_wait(remaining: Duration) -> String {
    let secs = remaining.num_seconds().max(1);
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_partition_variants() {
        assert_eq!(GymError::SelfTarget.kind(), ErrorKind::Validation);
        assert_eq!(
            GymError::InsufficientFunds { need: 5, have: 1 }.kind(),
            ErrorKind::BusinessRule
        );
        assert_eq!(GymError::Internal("x".into()).kind(), ErrorKind::Storage);
    }

    #[test]
    fn storage_errors_hide_details() {
        let err = GymError::Internal("ledger lock poisoned".into());
        assert!(!err.user_message().contains("poisoned"));
    }

    #[test]
    fn cooldown_message_rounds_up() {
        let err = GymError::OnCooldown {
            remaining: Duration::milliseconds(300),
        };
        assert!(err.user_message().contains("1s"));
    }
}
