//! Grant Authority
//!
//! Owns the lifecycle transitions:
//!
//! ```text
//! form completed ──submit──▶ PendingRequest ──approve──▶ Grant ──revoke/purge/expiry──▶ (gone)
//!                                   │
//!                                   └──reject──▶ (gone)
//! ```
//!
//! Every transition commits to the store first; platform calls happen
//! afterwards and never roll the store back. The store is the record of
//! authority, platform failures are logged for an operator to fix.

use super::authorization::{channel_notification_targets, is_channel_admin};
use super::removal::{notify_best_effort, remove_from_channel, revoke_access};
use super::{AccessError, AccessResult};
use crate::clock::Clock;
use crate::store::{ApplicantProfile, Channel, Grant, PendingRequest, Store};
use crate::telegram::callback::CallbackAction;
use crate::telegram::messages::{
    msg_access_granted, msg_access_revoked, msg_added_directly, msg_channel_purged,
    msg_member_announcement, msg_new_registration, msg_registration_rejected,
};
use crate::telegram::traits::{
    Button, ChannelId, GatewayError, Keyboard, MessagingGateway, UserId,
};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Upper bound on any configured grant length, ten years
pub const MAX_DURATION_HOURS: u64 = 24 * 365 * 10;

/// Grant duration bounds and approval presets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    pub min_duration_hours: u64,
    pub max_duration_hours: u64,
    /// Durations offered as one-tap approval buttons
    pub approval_presets: Vec<u64>,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            min_duration_hours: 1,
            max_duration_hours: 750,
            approval_presets: vec![24, 48, 168],
        }
    }
}

impl AccessPolicy {
    pub fn check_duration(&self, hours: u64) -> AccessResult<()> {
        self.duration_secs(hours).map(|_| ())
    }

    /// Validated grant length in seconds
    pub fn duration_secs(&self, hours: u64) -> AccessResult<u64> {
        let invalid = || AccessError::InvalidDuration {
            hours,
            min: self.min_duration_hours,
            max: self.max_duration_hours,
        };
        if hours < self.min_duration_hours
            || hours > self.max_duration_hours
            || hours > MAX_DURATION_HOURS
        {
            return Err(invalid());
        }
        hours.checked_mul(3600).ok_or_else(invalid)
    }

    /// Approve buttons for every in-range preset, then a reject button
    pub fn approval_keyboard(&self, channel: ChannelId, applicant: UserId) -> Keyboard {
        let mut buttons: Vec<Button> = self
            .approval_presets
            .iter()
            .copied()
            .filter(|h| self.check_duration(*h).is_ok())
            .map(|hours| {
                Button::callback(
                    format!("✅ Approve {}", preset_label(hours)),
                    CallbackAction::Approve {
                        channel,
                        applicant,
                        hours,
                    }
                    .encode(),
                )
            })
            .collect();
        buttons.push(Button::callback(
            "❌ Reject",
            CallbackAction::Reject { channel, applicant }.encode(),
        ));
        Keyboard::column(buttons)
    }
}

fn preset_label(hours: u64) -> String {
    if hours > 48 && hours % 24 == 0 {
        format!("{}d ({}h)", hours / 24, hours)
    } else {
        format!("{}h", hours)
    }
}

/// Lifecycle authority over grants and pending requests
pub struct GrantAuthority<G: MessagingGateway> {
    store: Arc<Store>,
    gateway: G,
    clock: Arc<dyn Clock>,
    policy: AccessPolicy,
}

impl<G: MessagingGateway> GrantAuthority<G> {
    pub fn new(store: Arc<Store>, gateway: G, clock: Arc<dyn Clock>, policy: AccessPolicy) -> Self {
        Self {
            store,
            gateway,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Record a completed registration form and alert the channel's admins.
    pub async fn submit_registration(
        &self,
        actor: UserId,
        channel_id: ChannelId,
        profile: ApplicantProfile,
    ) -> AccessResult<PendingRequest> {
        let now = self.clock.now();

        let (request, channel, targets) = self
            .store
            .mutate(|doc| {
                let channel = doc
                    .channel_mut(channel_id)
                    .ok_or(AccessError::ChannelNotFound(channel_id))?;
                if channel.members.contains_key(&actor) {
                    return Err(AccessError::AlreadyMember);
                }
                if channel.pending.contains_key(&actor) {
                    return Err(AccessError::AlreadyPending);
                }

                let request = PendingRequest {
                    profile,
                    registered_at: now,
                };
                channel.pending.insert(actor, request.clone());
                let channel = channel.clone();

                let targets = channel_notification_targets(doc, channel_id);
                Ok((request, channel, targets))
            })
            .await?;

        info!(channel = %channel_id, applicant = %actor, "Registration submitted");

        let text = msg_new_registration(&channel, actor, &request);
        let keyboard = self.policy.approval_keyboard(channel_id, actor);
        let sends = targets.iter().map(|admin| {
            let gateway = self.gateway.clone();
            let text = text.clone();
            let keyboard = keyboard.clone();
            let admin = *admin;
            async move {
                if let Err(e) = gateway.send(admin.into(), &text, Some(&keyboard)).await {
                    warn!(admin = %admin, error = %e, "Failed to notify admin of registration");
                }
            }
        });
        join_all(sends).await;

        Ok(request)
    }

    /// Promote a pending request to a grant lasting `hours`.
    ///
    /// Platform delivery (direct add, invite link, announcement) is
    /// best-effort; the returned grant is committed regardless.
    pub async fn approve(
        &self,
        admin: UserId,
        channel_id: ChannelId,
        applicant: UserId,
        hours: u64,
    ) -> AccessResult<Grant> {
        let now = self.clock.now();

        let (grant, channel) = self
            .store
            .mutate(|doc| {
                if !is_channel_admin(doc, admin, channel_id) {
                    return Err(AccessError::Unauthorized);
                }
                let duration = self.policy.duration_secs(hours)?;

                let channel = doc
                    .channel_mut(channel_id)
                    .ok_or(AccessError::ChannelNotFound(channel_id))?;
                let request = channel
                    .pending
                    .remove(&applicant)
                    .ok_or(AccessError::NotPending)?;

                let grant = Grant::new(request.profile, now, duration);
                channel.members.insert(applicant, grant.clone());
                channel.touch(now);
                Ok((grant, channel.clone()))
            })
            .await?;

        info!(
            channel = %channel_id,
            applicant = %applicant,
            admin = %admin,
            hours,
            expires_at = grant.expires_at(),
            "Access granted"
        );

        self.deliver_access(&channel, applicant, &grant, hours).await;

        notify_best_effort(
            &self.gateway,
            channel_id,
            &msg_member_announcement(grant.profile(), hours),
        )
        .await;

        Ok(grant)
    }

    /// Get the applicant into the channel: direct add when the platform
    /// allows it, otherwise a single-use link, otherwise the static link.
    async fn deliver_access(&self, channel: &Channel, applicant: UserId, grant: &Grant, hours: u64) {
        match self.gateway.invite_member(channel.id, applicant).await {
            Ok(()) => {
                notify_best_effort(
                    &self.gateway,
                    applicant,
                    &msg_added_directly(channel, grant, hours),
                )
                .await;
                return;
            }
            Err(GatewayError::PrivacyRestricted(_)) => {
                debug!(channel = %channel.id, applicant = %applicant, "Direct add not allowed, sending link");
            }
            Err(e) => {
                warn!(channel = %channel.id, applicant = %applicant, error = %e, "Direct add failed, sending link");
            }
        }

        let (link, single_use) = match self
            .gateway
            .create_invite_link(channel.id, true, Some(grant.expires_at()))
            .await
        {
            Ok(link) => (link, true),
            Err(e) => {
                warn!(
                    channel = %channel.id,
                    error = %e,
                    "Could not create single-use invite link, falling back to channel link"
                );
                (channel.link.clone(), false)
            }
        };

        let keyboard = Keyboard::single(Button::url("🔗 Join the channel", link));
        if let Err(e) = self
            .gateway
            .send(
                applicant.into(),
                &msg_access_granted(channel, grant, hours, single_use),
                Some(&keyboard),
            )
            .await
        {
            warn!(applicant = %applicant, error = %e, "Failed to send access link");
        }
    }

    /// Drop a pending request.
    ///
    /// Idempotent: returns `false` when there was nothing to reject.
    pub async fn reject(
        &self,
        admin: UserId,
        channel_id: ChannelId,
        applicant: UserId,
    ) -> AccessResult<bool> {
        let (removed, channel_name) = self
            .store
            .mutate_if_changed(|doc| {
                if !is_channel_admin(doc, admin, channel_id) {
                    return Err(AccessError::Unauthorized);
                }
                let channel = doc
                    .channel_mut(channel_id)
                    .ok_or(AccessError::ChannelNotFound(channel_id))?;
                let removed = channel.pending.remove(&applicant).is_some();
                Ok(((removed, channel.name.clone()), removed))
            })
            .await?;

        if removed {
            info!(channel = %channel_id, applicant = %applicant, admin = %admin, "Registration rejected");
            notify_best_effort(
                &self.gateway,
                applicant,
                &msg_registration_rejected(&channel_name),
            )
            .await;
        }
        Ok(removed)
    }

    /// Manually remove a member and return the grant they held.
    pub async fn revoke(
        &self,
        admin: UserId,
        channel_id: ChannelId,
        member: UserId,
    ) -> AccessResult<Grant> {
        let now = self.clock.now();

        let (grant, channel_name) = self
            .store
            .mutate(|doc| {
                if !is_channel_admin(doc, admin, channel_id) {
                    return Err(AccessError::Unauthorized);
                }
                let channel = doc
                    .channel_mut(channel_id)
                    .ok_or(AccessError::ChannelNotFound(channel_id))?;
                let grant = channel
                    .members
                    .remove(&member)
                    .ok_or(AccessError::NotMember)?;
                channel.touch(now);
                Ok((grant, channel.name.clone()))
            })
            .await?;

        info!(channel = %channel_id, member = %member, admin = %admin, "Access revoked");

        // Told even when removal failed; the grant is gone either way
        if let Err(e) = remove_from_channel(&self.gateway, channel_id, member).await {
            warn!(
                channel = %channel_id,
                member = %member,
                error = %e,
                "Revoked grant but channel removal failed"
            );
        }
        notify_best_effort(&self.gateway, member, &msg_access_revoked(&channel_name)).await;

        Ok(grant)
    }

    /// Remove every grant except those held by global admins.
    ///
    /// Returns how many grants were removed from the store. Platform
    /// failures for individual members are logged and skipped.
    pub async fn purge(&self, admin: UserId, channel_id: ChannelId) -> AccessResult<usize> {
        let now = self.clock.now();

        let (removed, channel_name) = self
            .store
            .mutate_if_changed(|doc| {
                if !is_channel_admin(doc, admin, channel_id) {
                    return Err(AccessError::Unauthorized);
                }
                let global_admins = doc.global_admins.clone();
                let channel = doc
                    .channel_mut(channel_id)
                    .ok_or(AccessError::ChannelNotFound(channel_id))?;

                let removed: Vec<UserId> = channel
                    .members
                    .keys()
                    .copied()
                    .filter(|user| !global_admins.contains(user))
                    .collect();
                for user in &removed {
                    channel.members.remove(user);
                }

                let changed = !removed.is_empty();
                if changed {
                    channel.touch(now);
                }
                Ok(((removed, channel.name.clone()), changed))
            })
            .await?;

        let notice = msg_channel_purged(&channel_name);
        let mut failures = 0usize;
        for user in &removed {
            if revoke_access(&self.gateway, channel_id, *user, &notice)
                .await
                .is_err()
            {
                failures += 1;
            }
        }

        info!(
            channel = %channel_id,
            admin = %admin,
            removed = removed.len(),
            platform_failures = failures,
            "Channel purged"
        );
        Ok(removed.len())
    }
}
