//! Admin authorization
//!
//! Global admins administer every channel; channel admins only the channels
//! listing them. Pure functions over a loaded document.

use crate::store::Document;
use crate::telegram::traits::{ChannelId, UserId};
use std::collections::BTreeSet;

pub fn is_global_admin(document: &Document, actor: UserId) -> bool {
    document.global_admins.contains(&actor)
}

/// True for global admins and for admins listed on the channel
pub fn is_channel_admin(document: &Document, actor: UserId, channel: ChannelId) -> bool {
    if is_global_admin(document, actor) {
        return true;
    }
    document
        .channel(channel)
        .map(|c| c.has_admin(actor))
        .unwrap_or(false)
}

/// Channels the actor may administer
pub fn accessible_channels(document: &Document, actor: UserId) -> BTreeSet<ChannelId> {
    if is_global_admin(document, actor) {
        return document.channels.keys().copied().collect();
    }
    document
        .channels
        .values()
        .filter(|c| c.has_admin(actor))
        .map(|c| c.id)
        .collect()
}

/// Everyone who should hear about a channel's registrations
///
/// Channel admins first (in list order), then global admins not already listed.
pub fn channel_notification_targets(document: &Document, channel: ChannelId) -> Vec<UserId> {
    let mut targets: Vec<UserId> = document
        .channel(channel)
        .map(|c| c.admins.clone())
        .unwrap_or_default();
    for admin in &document.global_admins {
        if !targets.contains(admin) {
            targets.push(*admin);
        }
    }
    targets
}
