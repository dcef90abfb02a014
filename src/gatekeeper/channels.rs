//! Channel provisioning and settings
//!
//! Commit side of the admin wizards. Authorization is re-checked against
//! the document at commit time, since rights may have changed while the
//! wizard was open.

use super::authorization::{is_channel_admin, is_global_admin};
use super::{AccessError, AccessResult};
use crate::store::{Channel, Store};
use crate::telegram::traits::{ChannelId, UserId};
use tracing::info;

/// Collected answers of the provisioning wizard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDraft {
    pub id: ChannelId,
    pub name: String,
    pub link: String,
    pub admin: UserId,
}

/// Collected answers of the settings wizard; `None` keeps the current value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsChange {
    pub name: Option<String>,
    pub link: Option<String>,
    pub id: Option<ChannelId>,
}

impl SettingsChange {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.link.is_none() && self.id.is_none()
    }
}

/// Create a channel with its first admin (global admins only)
pub async fn provision_channel(
    store: &Store,
    actor: UserId,
    draft: ChannelDraft,
    now: i64,
) -> AccessResult<Channel> {
    let channel = store
        .mutate(|doc| {
            if !is_global_admin(doc, actor) {
                return Err(AccessError::Unauthorized);
            }
            if doc.channels.contains_key(&draft.id) {
                return Err(AccessError::ChannelExists(draft.id));
            }

            let mut channel = Channel::new(draft.id, draft.name, draft.link, now);
            channel.add_admin(draft.admin);
            doc.channels.insert(channel.id, channel.clone());
            Ok(channel)
        })
        .await?;

    info!(channel = %channel.id, actor = %actor, admin = %draft.admin, "Channel provisioned");
    Ok(channel)
}

/// Apply a settings change, moving the record when the id changes
pub async fn apply_settings(
    store: &Store,
    actor: UserId,
    channel_id: ChannelId,
    change: SettingsChange,
    now: i64,
) -> AccessResult<Channel> {
    let channel = store
        .mutate(|doc| {
            if !is_channel_admin(doc, actor, channel_id) {
                return Err(AccessError::Unauthorized);
            }
            if doc.channel(channel_id).is_none() {
                return Err(AccessError::ChannelNotFound(channel_id));
            }

            let mut target = channel_id;
            if let Some(new_id) = change.id {
                if !doc.rekey_channel(channel_id, new_id) {
                    return Err(AccessError::ChannelExists(new_id));
                }
                target = new_id;
            }

            let channel = doc
                .channel_mut(target)
                .ok_or(AccessError::ChannelNotFound(target))?;
            if let Some(name) = change.name {
                channel.name = name;
            }
            if let Some(link) = change.link {
                channel.link = link;
            }
            channel.touch(now);
            Ok(channel.clone())
        })
        .await?;

    info!(channel = %channel_id, new_id = %channel.id, actor = %actor, "Channel settings updated");
    Ok(channel)
}

/// Append a channel admin
pub async fn add_channel_admin(
    store: &Store,
    actor: UserId,
    channel_id: ChannelId,
    new_admin: UserId,
    now: i64,
) -> AccessResult<Channel> {
    let channel = store
        .mutate(|doc| {
            if !is_channel_admin(doc, actor, channel_id) {
                return Err(AccessError::Unauthorized);
            }
            let channel = doc
                .channel_mut(channel_id)
                .ok_or(AccessError::ChannelNotFound(channel_id))?;
            if !channel.add_admin(new_admin) {
                return Err(AccessError::Validation(format!(
                    "User {} is already an admin of this channel.",
                    new_admin
                )));
            }
            channel.touch(now);
            Ok(channel.clone())
        })
        .await?;

    info!(channel = %channel_id, actor = %actor, admin = %new_admin, "Channel admin added");
    Ok(channel)
}
