//! Expiration Sweeper
//!
//! Periodic reconciliation of grants against the clock. Each tick:
//! 1. Load one snapshot of the document
//! 2. Ban+unban and notify every member whose grant has expired
//! 3. Write back once, removing only grants that were actually revoked
//!
//! A member whose removal failed on the platform keeps their grant and is
//! retried on the next tick. Failures the platform will keep returning, such
//! as missing rights, are logged at error level for an operator. Grants are only removed when the stored record
//! still carries the `expires_at` seen in the snapshot, so a concurrent
//! revoke-and-reapprove is never undone.

use super::removal::revoke_access;
use crate::clock::Clock;
use crate::store::{Store, StoreError};
use crate::telegram::messages::msg_access_expired;
use crate::telegram::retry::is_gateway_error_retryable;
use crate::telegram::traits::{ChannelId, MessagingGateway, UserId};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Outcome of one sweep tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Expired grants found in the snapshot
    pub expired: usize,
    /// Grants removed from the store
    pub removed: usize,
    /// Members left in place because the platform call failed
    pub failed: usize,
    /// Of `failed`, those the platform refused outright
    pub refused: usize,
}

pub struct ExpirationSweeper<G: MessagingGateway> {
    store: Arc<Store>,
    gateway: G,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl<G: MessagingGateway> ExpirationSweeper<G> {
    pub fn new(store: Arc<Store>, gateway: G, clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self {
            store,
            gateway,
            clock,
            interval,
        }
    }

    /// Sweep forever at the configured period.
    ///
    /// Tick failures are logged; the loop never exits on its own.
    pub async fn run(&self) {
        info!(interval = ?self.interval, "Expiration sweeper started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.sweep_once().await {
                Ok(report) if report.expired > 0 => {
                    info!(
                        expired = report.expired,
                        removed = report.removed,
                        failed = report.failed,
                        refused = report.refused,
                        "Sweep completed"
                    );
                }
                Ok(_) => debug!("Sweep completed, nothing expired"),
                Err(e) => error!(error = %e, "Sweep failed"),
            }
        }
    }

    /// Run a single sweep tick.
    pub async fn sweep_once(&self) -> Result<SweepReport, StoreError> {
        let now = self.clock.now();
        let snapshot = self.store.load().await?;

        let expired: Vec<(ChannelId, String, UserId, i64)> = snapshot
            .channels
            .values()
            .flat_map(|channel| {
                channel
                    .members
                    .iter()
                    .filter(|(_, grant)| grant.is_expired(now))
                    .map(|(user, grant)| (channel.id, channel.name.clone(), *user, grant.expires_at()))
            })
            .collect();

        let mut report = SweepReport {
            expired: expired.len(),
            ..Default::default()
        };
        if expired.is_empty() {
            return Ok(report);
        }

        let mut revoked = Vec::with_capacity(expired.len());
        for (channel, name, user, expires_at) in expired {
            match revoke_access(&self.gateway, channel, user, &msg_access_expired(&name)).await {
                Ok(()) => {
                    info!(channel = %channel, user = %user, expires_at, "Expired access revoked");
                    revoked.push((channel, user, expires_at));
                }
                Err(e) => {
                    report.failed += 1;
                    if !is_gateway_error_retryable(&e) {
                        report.refused += 1;
                        error!(
                            channel = %channel,
                            user = %user,
                            expires_at,
                            error = %e,
                            "Platform refused to remove expired member; needs operator action"
                        );
                    }
                }
            }
        }

        report.removed = self
            .store
            .mutate_if_changed(|doc| {
                let mut removed = 0usize;
                for (channel_id, user, expires_at) in &revoked {
                    let Some(channel) = doc.channel_mut(*channel_id) else {
                        continue;
                    };
                    let unchanged = channel
                        .members
                        .get(user)
                        .is_some_and(|grant| grant.expires_at() == *expires_at);
                    if unchanged {
                        channel.members.remove(user);
                        removed += 1;
                    }
                }
                Ok::<_, StoreError>((removed, removed > 0))
            })
            .await?;

        Ok(report)
    }
}
