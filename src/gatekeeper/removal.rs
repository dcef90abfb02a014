//! Membership Removal
//!
//! Revocation on the platform is a ban immediately followed by an unban:
//! the member loses current access without a permanent ban, so a later
//! re-approval still works.
//!
//! Removal process:
//! 1. Ban from the channel (with retry)
//! 2. Unban (with retry)
//! 3. Notify the member (best-effort)

use crate::telegram::retry::{is_gateway_error_retryable, retry_with_backoff};
use crate::telegram::traits::{ChannelId, ChatId, GatewayResult, MessagingGateway, UserId};
use tracing::{debug, warn};

/// Remove a user's current membership without leaving a ban behind.
pub async fn remove_from_channel<G>(gateway: &G, channel: ChannelId, user: UserId) -> GatewayResult<()>
where
    G: MessagingGateway,
{
    retry_with_backoff(
        || {
            let gateway = gateway.clone();
            async move { gateway.ban_member(channel, user).await }
        },
        is_gateway_error_retryable,
    )
    .await?;

    retry_with_backoff(
        || {
            let gateway = gateway.clone();
            async move { gateway.unban_member(channel, user).await }
        },
        is_gateway_error_retryable,
    )
    .await?;

    debug!(channel = %channel, user = %user, "Member removed from channel");
    Ok(())
}

/// Send a message, logging and swallowing any failure.
///
/// Returns whether the message was delivered.
pub async fn notify_best_effort<G>(gateway: &G, chat: impl Into<ChatId>, text: &str) -> bool
where
    G: MessagingGateway,
{
    let chat = chat.into();
    match gateway.send(chat, text, None).await {
        Ok(_) => true,
        Err(e) => {
            warn!(chat = %chat, error = %e, "Best-effort notification failed");
            false
        }
    }
}

/// Revoke platform access and tell the member why.
///
/// Platform failures are logged and returned; notification failures are
/// swallowed.
pub async fn revoke_access<G>(
    gateway: &G,
    channel: ChannelId,
    user: UserId,
    notice: &str,
) -> GatewayResult<()>
where
    G: MessagingGateway,
{
    if let Err(e) = remove_from_channel(gateway, channel, user).await {
        warn!(channel = %channel, user = %user, error = %e, "Failed to remove member from channel");
        return Err(e);
    }

    notify_best_effort(gateway, user, notice).await;
    Ok(())
}
