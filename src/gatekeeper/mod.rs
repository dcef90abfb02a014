//! Gatekeeper module: Access Grant Lifecycle
//!
//! - Authorization: global vs per-channel admins
//! - Authority: registration, approval, rejection, revocation, purge
//! - Channels: provisioning and settings changes committed by the wizards
//! - Removal: ban-then-unban with retry
//! - Sweeper: continuous expiry enforcement

pub mod authority;
pub mod authorization;
pub mod channels;
pub mod removal;
pub mod sweeper;

#[cfg(test)]
mod proptests;

pub use authority::{AccessPolicy, GrantAuthority, MAX_DURATION_HOURS};
pub use authorization::{accessible_channels, is_channel_admin, is_global_admin};
pub use sweeper::{ExpirationSweeper, SweepReport};

use crate::store::StoreError;
use crate::telegram::traits::ChannelId;

/// Lifecycle errors.
///
/// Everything except `Persistence` is a precondition violation: the request
/// is answered with [`AccessError::user_message`] and no state changes.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("Actor lacks admin rights for this channel")]
    Unauthorized,

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Applicant already holds a grant for this channel")]
    AlreadyMember,

    #[error("Applicant already has a pending request for this channel")]
    AlreadyPending,

    #[error("No pending request for this applicant")]
    NotPending,

    #[error("Applicant holds no grant for this channel")]
    NotMember,

    #[error("Duration {hours}h outside [{min}h, {max}h]")]
    InvalidDuration { hours: u64, min: u64, max: u64 },

    #[error("Channel not found: {0}")]
    ChannelNotFound(ChannelId),

    #[error("Channel already exists: {0}")]
    ChannelExists(ChannelId),

    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
}

/// Lifecycle result type.
pub type AccessResult<T> = Result<T, AccessError>;

impl AccessError {
    /// Text shown to the actor who triggered the error
    pub fn user_message(&self) -> String {
        match self {
            AccessError::Unauthorized => "❌ Access denied.".to_string(),
            AccessError::Validation(reason) => format!("❌ {}", reason),
            AccessError::AlreadyMember => "✅ You are already a member of this channel.".to_string(),
            AccessError::AlreadyPending => {
                "⏳ Your registration is already waiting for an administrator's validation."
                    .to_string()
            }
            AccessError::NotPending => "❌ This user is no longer pending.".to_string(),
            AccessError::NotMember => "❌ Member not found.".to_string(),
            AccessError::InvalidDuration { min, max, .. } => {
                format!("❌ Duration must be between {}h and {}h.", min, max)
            }
            AccessError::ChannelNotFound(id) => format!("❌ Unknown channel {}.", id),
            AccessError::ChannelExists(id) => format!("❌ Channel {} is already registered.", id),
            AccessError::Persistence(_) => {
                "⚠️ Could not save the change, please try again later.".to_string()
            }
        }
    }
}
