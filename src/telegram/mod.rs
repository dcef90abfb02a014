//! Telegram Integration Module
//!
//! Implements the access bot over the Telegram Bot API:
//! - Gateway trait with HTTPS and mock implementations
//! - Command parsing and callback payload codec
//! - Ephemeral registration and admin wizards
//! - User-facing message templates

pub mod bot;
pub mod callback;
pub mod client;
pub mod commands;
pub mod conversation;
pub mod duration_parse;
pub mod messages;
pub mod mock;
pub mod retry;
pub mod traits;

pub use bot::AccessBot;
pub use callback::CallbackAction;
pub use client::BotApiClient;
pub use conversation::ConversationEngine;
pub use mock::MockGateway;
pub use traits::{
    ChannelId, ChatId, GatewayError, GatewayResult, MessagingGateway, UserId,
};
