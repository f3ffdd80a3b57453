//! Direct-message notifications to players who did not issue the current command
//! (inspection targets, transfer receivers, payout receipts).
//!
//! Delivery is best-effort: callers go through [`notify_best_effort`], which logs and swallows
//! failures so a lost notification never fails the operation that produced it.

use log::warn;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::gym::types::UserId;
use crate::logutil::escape_log;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification channel closed")]
    Closed,
    #[error("delivery to {0} rejected: {1}")]
    Rejected(UserId, String),
}

pub trait Notifier: Send + Sync {
    fn notify(&self, user_id: UserId, text: &str) -> Result<(), NotifyError>;
}

/// A message leaving the bot, either a reply in the conversation or a direct notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub peer_id: UserId,
    pub text: String,
    pub direct: bool,
}

/// Channel-backed outbox drained by the transport.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<Outgoing>,
}

impl Outbox {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outgoing>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn reply(&self, peer_id: UserId, text: impl Into<String>) -> Result<(), NotifyError> {
        self.tx
            .send(Outgoing {
                peer_id,
                text: text.into(),
                direct: false,
            })
            .map_err(|_| NotifyError::Closed)
    }
}

impl Notifier for Outbox {
    fn notify(&self, user_id: UserId, text: &str) -> Result<(), NotifyError> {
        self.tx
            .send(Outgoing {
                peer_id: user_id,
                text: text.to_string(),
                direct: true,
            })
            .map_err(|_| NotifyError::Closed)
    }
}

/// Send and forget. Returns whether the notifier accepted the message.
pub fn notify_best_effort(notifier: &dyn Notifier, user_id: UserId, text: &str) -> bool {
    match notifier.notify(user_id, text) {
        Ok(()) => true,
        Err(e) => {
            warn!(
                "notification to {} dropped: {} ({})",
                user_id,
                e,
                escape_log(text)
            );
            false
        }
    }
}
