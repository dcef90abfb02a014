//! Gateway retry with exponential backoff.
//!
//! Membership mutations (ban/unban) are retried on transient failures so a
//! flaky connection does not leave a revoked member inside the channel.
//! Retries are few and short: the sweeper and admin handlers must not stall
//! for long on a single member.

use super::traits::GatewayError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Maximum retry attempts before giving up.
const MAX_RETRIES: u32 = 3;

/// Maximum backoff duration.
const MAX_BACKOFF_SECS: u64 = 30;

/// Retry a gateway operation with exponential backoff.
///
/// - Backoff: 2^n seconds (1, 2, 4), or the platform's `retry_after` hint
///   when rate limited
/// - Cap: `MAX_BACKOFF_SECS`
/// - Only errors accepted by `is_retryable` are retried
pub async fn retry_with_backoff<F, Fut, T>(
    mut operation: F,
    is_retryable: fn(&GatewayError) -> bool,
) -> Result<T, GatewayError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(err) => {
                if !is_retryable(&err) || attempt >= MAX_RETRIES {
                    return Err(err);
                }

                let backoff_secs = match &err {
                    GatewayError::RateLimited { retry_after } => *retry_after,
                    _ => 2u64.pow(attempt),
                }
                .min(MAX_BACKOFF_SECS);

                warn!(
                    attempt = attempt + 1,
                    backoff_secs,
                    error = %err,
                    "Gateway call failed, retrying"
                );

                sleep(Duration::from_secs(backoff_secs)).await;
                attempt += 1;
            }
        }
    }
}

/// Transient errors worth retrying: network failures and rate limits.
pub fn is_gateway_error_retryable(err: &GatewayError) -> bool {
    matches!(
        err,
        GatewayError::Network(_) | GatewayError::RateLimited { .. }
    )
}
