//! Timegate - Time-Limited Channel Access Bot
//!
//! A Telegram bot that admits users to private channels for an
//! admin-approved duration and revokes access when it runs out.
//!
//! Key principles:
//! - Admins approve every registration; nothing is granted automatically
//! - Every grant carries an expiry; the sweeper enforces it
//! - One JSON document is the source of truth, rewritten atomically
//! - Wizard state is ephemeral and never persisted

pub mod clock;
pub mod gatekeeper;
pub mod keepalive;
pub mod store;
pub mod telegram;
