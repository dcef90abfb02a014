//! Persisted document model
//!
//! The whole bot state is one document: channels (with their admins, grants
//! and pending requests) plus the global admin set. Conversation state is
//! never part of it.

use crate::telegram::traits::{ChannelId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Current document schema version
pub const DOCUMENT_VERSION: u32 = 1;

/// Data an applicant declares in the registration form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantProfile {
    pub name: String,
    pub surname: String,
    pub country: String,
}

impl ApplicantProfile {
    /// "Surname Name" as shown to admins and in announcements
    pub fn display_name(&self) -> String {
        format!("{} {}", self.surname, self.name)
    }
}

/// A submitted, not-yet-decided registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    #[serde(flatten)]
    pub profile: ApplicantProfile,
    pub registered_at: i64,
}

/// Active, time-bounded membership
///
/// `expires_at` is cached but always equals `join_time + duration`;
/// deserialization rejects records where it does not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GrantRecord")]
pub struct Grant {
    #[serde(flatten)]
    profile: ApplicantProfile,
    join_time: i64,
    duration: u64,
    expires_at: i64,
}

#[derive(Deserialize)]
struct GrantRecord {
    #[serde(flatten)]
    profile: ApplicantProfile,
    join_time: i64,
    duration: u64,
    expires_at: i64,
}

impl TryFrom<GrantRecord> for Grant {
    type Error = String;

    fn try_from(record: GrantRecord) -> Result<Self, Self::Error> {
        if i64::try_from(record.duration).is_err() {
            return Err(format!("grant duration {} is out of range", record.duration));
        }
        let grant = Grant::new(record.profile, record.join_time, record.duration);
        if grant.expires_at != record.expires_at {
            return Err(format!(
                "grant expires_at {} does not match join_time {} + duration {}",
                record.expires_at, record.join_time, record.duration
            ));
        }
        Ok(grant)
    }
}

impl Grant {
    pub fn new(profile: ApplicantProfile, join_time: i64, duration: u64) -> Self {
        Self {
            profile,
            join_time,
            duration,
            expires_at: i64::try_from(duration)
                .map_or(i64::MAX, |secs| join_time.saturating_add(secs)),
        }
    }

    pub fn profile(&self) -> &ApplicantProfile {
        &self.profile
    }

    pub fn join_time(&self) -> i64 {
        self.join_time
    }

    /// Granted duration in seconds
    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }

    /// Seconds until expiry (negative once expired)
    pub fn remaining(&self, now: i64) -> i64 {
        self.expires_at.saturating_sub(now)
    }
}

/// Access-controlled channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    pub link: String,
    /// Channel-scoped admins, in insertion order, no duplicates
    #[serde(default)]
    pub admins: Vec<UserId>,
    #[serde(default)]
    pub members: BTreeMap<UserId, Grant>,
    #[serde(default)]
    pub pending: BTreeMap<UserId, PendingRequest>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Channel {
    pub fn new(id: ChannelId, name: String, link: String, now: i64) -> Self {
        Self {
            id,
            name,
            link,
            admins: Vec::new(),
            members: BTreeMap::new(),
            pending: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_admin(&self, user: UserId) -> bool {
        self.admins.contains(&user)
    }

    /// Append an admin; returns false if already listed
    pub fn add_admin(&mut self, user: UserId) -> bool {
        if self.has_admin(user) {
            return false;
        }
        self.admins.push(user);
        true
    }

    pub fn touch(&mut self, now: i64) {
        self.updated_at = now;
    }
}

/// Top-level persisted document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub global_admins: BTreeSet<UserId>,
    #[serde(default)]
    pub channels: BTreeMap<ChannelId, Channel>,
}

fn default_version() -> u32 {
    DOCUMENT_VERSION
}

impl Default for Document {
    fn default() -> Self {
        Self {
            version: DOCUMENT_VERSION,
            global_admins: BTreeSet::new(),
            channels: BTreeMap::new(),
        }
    }
}

impl Document {
    pub fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.get(&id)
    }

    pub fn channel_mut(&mut self, id: ChannelId) -> Option<&mut Channel> {
        self.channels.get_mut(&id)
    }

    pub fn member_count(&self) -> usize {
        self.channels.values().map(|c| c.members.len()).sum()
    }

    pub fn pending_count(&self) -> usize {
        self.channels.values().map(|c| c.pending.len()).sum()
    }

    /// Move a channel record to a new key
    ///
    /// Returns false (and changes nothing) if `from` is missing or `to` is taken.
    pub fn rekey_channel(&mut self, from: ChannelId, to: ChannelId) -> bool {
        if from == to {
            return self.channels.contains_key(&from);
        }
        if self.channels.contains_key(&to) {
            return false;
        }
        match self.channels.remove(&from) {
            Some(mut channel) => {
                channel.id = to;
                self.channels.insert(to, channel);
                true
            }
            None => false,
        }
    }
}
