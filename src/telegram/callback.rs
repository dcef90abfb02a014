//! Inline button payloads
//!
//! Button data is decoded exactly once, at the boundary, into
//! [`CallbackAction`]. Handlers pattern-match on the enum and never split
//! strings themselves. Payloads stay well under the platform's 64-byte limit.

use crate::telegram::traits::{ChannelId, UserId};
use std::fmt;

/// Action carried by an inline button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    /// Pick a channel in the registration wizard
    Register { channel: ChannelId },
    /// Approve a pending registration for `hours`
    Approve {
        channel: ChannelId,
        applicant: UserId,
        hours: u64,
    },
    /// Reject a pending registration
    Reject { channel: ChannelId, applicant: UserId },
    /// Open the settings-edit wizard
    EditSettings { channel: ChannelId },
    /// Open the add-admin wizard
    AddAdmin { channel: ChannelId },
}

/// Payload that does not decode to a known action
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Malformed callback payload: {0}")]
pub struct MalformedCallback(pub String);

impl CallbackAction {
    pub fn encode(&self) -> String {
        self.to_string()
    }

    pub fn decode(data: &str) -> Result<Self, MalformedCallback> {
        let malformed = || MalformedCallback(data.to_string());
        let parts: Vec<&str> = data.split(':').collect();

        let channel = |i: usize| -> Result<ChannelId, MalformedCallback> {
            parts
                .get(i)
                .and_then(|p| p.parse::<i64>().ok())
                .map(ChannelId)
                .ok_or_else(malformed)
        };
        let user = |i: usize| -> Result<UserId, MalformedCallback> {
            parts
                .get(i)
                .and_then(|p| p.parse::<i64>().ok())
                .map(UserId)
                .ok_or_else(malformed)
        };

        let action = match (parts.first().copied(), parts.len()) {
            (Some("reg"), 2) => CallbackAction::Register { channel: channel(1)? },
            (Some("ok"), 4) => CallbackAction::Approve {
                channel: channel(1)?,
                applicant: user(2)?,
                hours: parts[3].parse().map_err(|_| malformed())?,
            },
            (Some("no"), 3) => CallbackAction::Reject {
                channel: channel(1)?,
                applicant: user(2)?,
            },
            (Some("set"), 2) => CallbackAction::EditSettings { channel: channel(1)? },
            (Some("adm"), 2) => CallbackAction::AddAdmin { channel: channel(1)? },
            _ => return Err(malformed()),
        };
        Ok(action)
    }
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackAction::Register { channel } => write!(f, "reg:{}", channel),
            CallbackAction::Approve {
                channel,
                applicant,
                hours,
            } => write!(f, "ok:{}:{}:{}", channel, applicant, hours),
            CallbackAction::Reject { channel, applicant } => {
                write!(f, "no:{}:{}", channel, applicant)
            }
            CallbackAction::EditSettings { channel } => write!(f, "set:{}", channel),
            CallbackAction::AddAdmin { channel } => write!(f, "adm:{}", channel),
        }
    }
}
