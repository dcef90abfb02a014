//! Messaging Gateway Trait Abstractions
//!
//! These traits enable full test coverage via MockGateway. The production
//! implementation is `BotApiClient` (Telegram Bot API over HTTPS).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Telegram user identifier
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub i64);

/// Telegram channel identifier (supergroups/channels start with -100)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ChannelId(pub i64);

/// Any chat a message can be sent to (private chat with a user or a channel)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<UserId> for ChatId {
    fn from(user: UserId) -> Self {
        ChatId(user.0)
    }
}

impl From<ChannelId> for ChatId {
    fn from(channel: ChannelId) -> Self {
        ChatId(channel.0)
    }
}

/// Handle to a message the bot sent, used for later edits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHandle {
    pub chat: ChatId,
    pub message_id: i64,
}

/// Inline keyboard button
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Button {
    /// Button that sends an encoded `CallbackAction` back to the bot
    Callback { label: String, data: String },
    /// Button that opens a URL (invite links)
    Url { label: String, url: String },
}

impl Button {
    pub fn callback(label: impl Into<String>, data: impl Into<String>) -> Self {
        Button::Callback {
            label: label.into(),
            data: data.into(),
        }
    }

    pub fn url(label: impl Into<String>, url: impl Into<String>) -> Self {
        Button::Url {
            label: label.into(),
            url: url.into(),
        }
    }
}

/// Rows of inline buttons
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    /// One button per row
    pub fn column(buttons: Vec<Button>) -> Self {
        Self {
            rows: buttons.into_iter().map(|b| vec![b]).collect(),
        }
    }

    pub fn single(button: Button) -> Self {
        Self {
            rows: vec![vec![button]],
        }
    }
}

/// Inbound platform event
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Text message in a private chat with the bot
    Message {
        sender: UserId,
        chat: ChatId,
        text: String,
    },
    /// Inline button press
    Callback {
        id: String,
        sender: UserId,
        message: Option<MessageHandle>,
        data: String,
    },
}

impl Update {
    pub fn sender(&self) -> UserId {
        match self {
            Update::Message { sender, .. } | Update::Callback { sender, .. } => *sender,
        }
    }
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Messaging gateway errors
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("API error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("Platform forbids adding user {0} directly")]
    PrivacyRestricted(UserId),

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

/// Messaging platform abstraction
///
/// Every call is a network request bounded by the implementation's own
/// timeout. Callers must not hold the store lock across these calls.
#[async_trait]
pub trait MessagingGateway: Clone + Send + Sync + 'static {
    /// Send a text message, optionally with inline buttons
    async fn send(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> GatewayResult<MessageHandle>;

    /// Replace the text (and buttons) of a previously sent message
    async fn edit(
        &self,
        handle: &MessageHandle,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> GatewayResult<()>;

    /// Create an invite link for a channel
    ///
    /// `single_use` limits the link to one join; `expires_at` is a unix
    /// timestamp after which the link stops working.
    async fn create_invite_link(
        &self,
        channel: ChannelId,
        single_use: bool,
        expires_at: Option<i64>,
    ) -> GatewayResult<String>;

    /// Add a user to a channel directly
    ///
    /// Fails with `PrivacyRestricted` when the platform forbids it.
    async fn invite_member(&self, channel: ChannelId, user: UserId) -> GatewayResult<()>;

    /// Ban a member (removes current membership)
    async fn ban_member(&self, channel: ChannelId, user: UserId) -> GatewayResult<()>;

    /// Lift a ban so the user may join again later
    async fn unban_member(&self, channel: ChannelId, user: UserId) -> GatewayResult<()>;

    /// Acknowledge a button press
    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> GatewayResult<()>;

    /// Fetch the next batch of inbound updates (long poll)
    async fn receive_updates(&self) -> GatewayResult<Vec<Update>>;
}
