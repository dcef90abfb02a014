//! User-facing message templates
//!
//! Every text the bot sends is built here so handlers stay focused on
//! control flow.

use crate::store::{ApplicantProfile, Channel, Grant, PendingRequest};
use crate::telegram::traits::{ChannelId, UserId};
use chrono::{DateTime, Utc};

/// Bot API limit on one text message, in UTF-16 code units
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Split a long text into messages of at most `limit` UTF-16 units.
///
/// Cuts prefer a blank line in the second half of the window, then a line
/// break, and only split inside a line when a single line is over the limit.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = text;
    while let Some(max) = fitting_prefix(rest, limit) {
        let head = &rest[..max];
        let cut = head
            .rfind("\n\n")
            .filter(|&i| i > max / 2)
            .or_else(|| head.rfind('\n'))
            .filter(|&i| i > 0)
            .unwrap_or(max);
        let chunk = rest[..cut].trim_end();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        rest = rest[cut..].trim_start_matches('\n');
    }
    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

/// Byte length of the longest prefix within `limit`, or `None` if all of
/// `text` fits
fn fitting_prefix(text: &str, limit: usize) -> Option<usize> {
    let mut units = 0;
    for (index, c) in text.char_indices() {
        units += c.len_utf16();
        if units > limit {
            // Always make progress, even with a zero limit
            return Some(if index == 0 { c.len_utf8() } else { index });
        }
    }
    None
}

/// Human-readable remaining time: "2d 3h", "5h 10m", "42m" or "expired"
pub fn format_time_remaining(seconds: i64) -> String {
    if seconds <= 0 {
        return "expired".to_string();
    }
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;

    if hours >= 24 {
        let days = hours / 24;
        let rest = hours % 24;
        if rest > 0 {
            format!("{}d {}h", days, rest)
        } else {
            format!("{}d", days)
        }
    } else if hours > 0 {
        if minutes > 0 {
            format!("{}h {}m", hours, minutes)
        } else {
            format!("{}h", hours)
        }
    } else {
        format!("{}m", minutes)
    }
}

/// "dd/mm/YYYY HH:MM UTC"
pub fn format_timestamp(unix: i64) -> String {
    DateTime::<Utc>::from_timestamp(unix, 0)
        .map(|dt| dt.format("%d/%m/%Y %H:%M UTC").to_string())
        .unwrap_or_else(|| unix.to_string())
}

pub fn msg_new_registration(
    channel: &Channel,
    applicant: UserId,
    request: &PendingRequest,
) -> String {
    format!(
        "🆕 New registration for {}\n\n\
         👤 Name: {}\n\
         👤 Surname: {}\n\
         🌍 Country: {}\n\
         🆔 ID: {}\n\n\
         Choose an access duration:",
        channel.name,
        request.profile.name,
        request.profile.surname,
        request.profile.country,
        applicant
    )
}

pub fn msg_registration_submitted(channel: &Channel, profile: &ApplicantProfile) -> String {
    format!(
        "✅ Registration complete for {}!\n\n\
         👤 {}\n\
         🌍 {}\n\n\
         ⏳ Waiting for an administrator to validate your access. \
         You will receive a message as soon as it is approved.",
        channel.name,
        profile.display_name(),
        profile.country
    )
}

pub fn msg_access_granted(channel: &Channel, grant: &Grant, hours: u64, single_use: bool) -> String {
    let link_note = if single_use {
        "\n\n⚠️ This link is personal, single-use, and expires with your access."
    } else {
        ""
    };
    format!(
        "🎉 Congratulations! Your access has been approved.\n\n\
         📢 Channel: {}\n\
         ⏳ Duration: {} hour(s)\n\
         📅 Expires: {}{}",
        channel.name,
        hours,
        format_timestamp(grant.expires_at()),
        link_note
    )
}

pub fn msg_added_directly(channel: &Channel, grant: &Grant, hours: u64) -> String {
    format!(
        "🎉 Congratulations! You have been added to {}.\n\n\
         ⏳ Duration: {} hour(s)\n\
         📅 Expires: {}",
        channel.name,
        hours,
        format_timestamp(grant.expires_at())
    )
}

pub fn msg_member_announcement(profile: &ApplicantProfile, hours: u64) -> String {
    format!(
        "👋 New member!\n\n👤 {}\n🌍 {}\n⏳ Access: {}h",
        profile.display_name(),
        profile.country,
        hours
    )
}

pub fn msg_admin_approved(profile: &ApplicantProfile, applicant: UserId, grant: &Grant, hours: u64) -> String {
    format!(
        "✅ Member approved!\n\n👤 {}\n🆔 {}\n⏳ {}h\n📅 {}",
        profile.display_name(),
        applicant,
        hours,
        format_timestamp(grant.expires_at())
    )
}

pub fn msg_registration_rejected(channel_name: &str) -> String {
    format!(
        "❌ Your registration for {} was rejected.\n\n\
         Contact an administrator for more information.",
        channel_name
    )
}

pub fn msg_access_revoked(channel_name: &str) -> String {
    format!("⚠️ Your access to '{}' has been revoked.", channel_name)
}

pub fn msg_channel_purged(channel_name: &str) -> String {
    format!("⚠️ The channel '{}' has been purged.", channel_name)
}

pub fn msg_access_expired(channel_name: &str) -> String {
    format!(
        "⏰ Your access to '{}' has expired.\n\nContact an administrator to renew it.",
        channel_name
    )
}

pub fn msg_member_list(channel: &Channel, now: i64) -> String {
    if channel.members.is_empty() {
        return format!("📋 {}: no members.", channel.name);
    }

    let mut text = format!("📋 Members - {}\n\n", channel.name);
    for (user, grant) in &channel.members {
        let remaining = grant.remaining(now);
        let status = if remaining > 0 { "🟢" } else { "🔴" };
        text.push_str(&format!(
            "{} {}\n   🆔 {} | 🌍 {}\n   ⏳ {}\n\n",
            status,
            grant.profile().display_name(),
            user,
            grant.profile().country,
            format_time_remaining(remaining)
        ));
    }
    text.trim_end().to_string()
}

pub fn msg_pending_list(channel: &Channel) -> String {
    if channel.pending.is_empty() {
        return format!("⏳ {}: no pending registrations.", channel.name);
    }

    let mut text = format!("⏳ Pending - {}\n\n", channel.name);
    for (user, request) in &channel.pending {
        text.push_str(&format!(
            "• {} ({}) 🆔 {} - since {}\n",
            request.profile.display_name(),
            request.profile.country,
            user,
            format_timestamp(request.registered_at)
        ));
    }
    text.trim_end().to_string()
}

pub fn msg_channel_info(channel: &Channel) -> String {
    format!(
        "📋 Channel information\n\n\
         🏷️ Name: {}\n\
         🆔 ID: {}\n\
         🔗 Link: {}\n\
         👮 Admins: {}\n\
         👥 Members: {}\n\
         ⏳ Pending: {}\n\
         🕐 Updated: {}",
        channel.name,
        channel.id,
        channel.link,
        channel.admins.len(),
        channel.members.len(),
        channel.pending.len(),
        format_timestamp(channel.updated_at)
    )
}

pub fn msg_member_status(channel: &Channel, grant: &Grant, now: i64) -> String {
    format!(
        "✅ {}: member\n   ⏳ Time left: {}\n   🔗 {}",
        channel.name,
        format_time_remaining(grant.remaining(now)),
        channel.link
    )
}

pub fn msg_already_member(channel_name: &str, grant: &Grant, now: i64) -> String {
    format!(
        "✅ You are already a member of {}.\n\n⏳ Time left: {}\n📅 Expires: {}",
        channel_name,
        format_time_remaining(grant.remaining(now)),
        format_timestamp(grant.expires_at())
    )
}

pub fn msg_channel_list(channels: &[&Channel]) -> String {
    if channels.is_empty() {
        return "📋 You do not administer any channel.".to_string();
    }
    let mut text = "📋 Your channels\n\n".to_string();
    for channel in channels {
        text.push_str(&format!(
            "• {} 🆔 {} - {} member(s), {} pending\n",
            channel.name,
            channel.id,
            channel.members.len(),
            channel.pending.len()
        ));
    }
    text.trim_end().to_string()
}

pub fn msg_channel_created(channel: &Channel) -> String {
    format!("✅ Channel created!\n\n{}", msg_channel_info(channel))
}

pub fn msg_settings_updated(channel: &Channel) -> String {
    format!("✅ Settings saved!\n\n{}", msg_channel_info(channel))
}

pub fn msg_admin_added(channel: &Channel, admin: UserId) -> String {
    format!("✅ User {} is now an admin of {}.", admin, channel.name)
}

pub fn msg_now_admin(channel: &Channel) -> String {
    format!(
        "👮 You are now an admin of {}.\n\nSend /help to see the admin commands.",
        channel.name
    )
}

pub fn msg_admin_rejected(applicant: UserId) -> String {
    format!("❌ Registration of user {} rejected.", applicant)
}

pub fn msg_member_removed(profile: &ApplicantProfile, member: UserId) -> String {
    format!("✅ {} ({}) removed.", profile.display_name(), member)
}

pub fn msg_purge_done(channel_name: &str, removed: usize) -> String {
    format!("🧹 {}: {} member(s) removed.", channel_name, removed)
}

pub fn msg_no_access() -> String {
    "ℹ️ You have no active access. Send /start to register.".to_string()
}

pub fn msg_pending_status(channel: &Channel) -> String {
    format!("⏳ {}: waiting for validation", channel.name)
}

pub fn msg_unknown_channel(channel: ChannelId) -> String {
    format!("❌ Unknown channel {}.", channel)
}

pub fn msg_help(is_admin: bool) -> String {
    if is_admin {
        "📖 Commands\n\n\
         User:\n\
         • /start [channel] - Register for a channel\n\
         • /status - Your memberships and time left\n\
         • /cancel - Abort the current form\n\n\
         Admin:\n\
         • /channels - Channels you administer\n\
         • /info [channel] - Channel information\n\
         • /list [channel] - Members and time left\n\
         • /pending [channel] - Pending registrations\n\
         • /approve <channel> <user> <duration> - Approve (e.g. 36h, 7d)\n\
         • /reject <channel> <user> - Reject a registration\n\
         • /remove [channel] <user> - Revoke a member\n\
         • /purge [channel] - Remove every member\n\
         • /settings [channel] - Edit name, link or id\n\
         • /addadmin [channel] - Add a channel admin\n\
         • /newchannel - Register a new channel (global admins)\n\n\
         Approvals can also be done with the buttons in registration notifications."
            .to_string()
    } else {
        "📖 Help\n\n\
         • /start - Register for a private channel\n\
         • /status - Your memberships and time left\n\
         • /cancel - Abort the current form\n\n\
         Fill in the form and wait for an administrator's approval."
            .to_string()
    }
}
