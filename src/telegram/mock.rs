//! Mock Messaging Gateway for Testing
//!
//! Records every outbound call and lets tests inject failures, so the
//! lifecycle and the sweeper can be exercised without the real platform.

use super::traits::*;
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

/// Mock gateway for testing
#[derive(Clone, Default)]
pub struct MockGateway {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    sent_messages: Vec<SentMessage>,
    edits: Vec<(MessageHandle, String)>,
    invite_links: Vec<(ChannelId, bool, Option<i64>)>,
    direct_invites: Vec<(ChannelId, UserId)>,
    bans: Vec<(ChannelId, UserId)>,
    unbans: Vec<(ChannelId, UserId)>,
    answered_callbacks: Vec<String>,
    incoming: VecDeque<Update>,
    next_message_id: i64,
    next_link_id: u64,
    allow_direct_invite: bool,
    fail_invite_links: bool,
    fail_bans_for: HashSet<UserId>,
    disconnect_bans_for: HashSet<UserId>,
    fail_sends_to: HashSet<ChatId>,
}

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub chat: ChatId,
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

impl MockGateway {
    /// Create new mock gateway
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an inbound update for `receive_updates`
    pub fn push_update(&self, update: Update) {
        self.state.lock().unwrap().incoming.push_back(update);
    }

    /// Get sent messages for assertions
    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.state.lock().unwrap().sent_messages.clone()
    }

    /// Texts sent to one chat
    pub fn messages_to(&self, chat: impl Into<ChatId>) -> Vec<String> {
        let chat = chat.into();
        self.state
            .lock()
            .unwrap()
            .sent_messages
            .iter()
            .filter(|m| m.chat == chat)
            .map(|m| m.text.clone())
            .collect()
    }

    /// Most recent message sent to a chat
    pub fn last_message_to(&self, chat: impl Into<ChatId>) -> Option<SentMessage> {
        let chat = chat.into();
        self.state
            .lock()
            .unwrap()
            .sent_messages
            .iter()
            .rev()
            .find(|m| m.chat == chat)
            .cloned()
    }

    pub fn edits(&self) -> Vec<(MessageHandle, String)> {
        self.state.lock().unwrap().edits.clone()
    }

    pub fn invite_links(&self) -> Vec<(ChannelId, bool, Option<i64>)> {
        self.state.lock().unwrap().invite_links.clone()
    }

    pub fn direct_invites(&self) -> Vec<(ChannelId, UserId)> {
        self.state.lock().unwrap().direct_invites.clone()
    }

    pub fn bans(&self) -> Vec<(ChannelId, UserId)> {
        self.state.lock().unwrap().bans.clone()
    }

    pub fn unbans(&self) -> Vec<(ChannelId, UserId)> {
        self.state.lock().unwrap().unbans.clone()
    }

    pub fn answered_callbacks(&self) -> Vec<String> {
        self.state.lock().unwrap().answered_callbacks.clone()
    }

    /// Allow `invite_member` to succeed (default: `PrivacyRestricted`)
    pub fn set_allow_direct_invite(&self, allow: bool) {
        self.state.lock().unwrap().allow_direct_invite = allow;
    }

    /// Make `create_invite_link` fail
    pub fn set_fail_invite_links(&self, fail: bool) {
        self.state.lock().unwrap().fail_invite_links = fail;
    }

    /// Make ban calls for this user fail with a non-retryable API error
    pub fn fail_bans_for(&self, user: UserId) {
        self.state.lock().unwrap().fail_bans_for.insert(user);
    }

    /// Make bans of this user fail with a network error
    pub fn disconnect_bans_for(&self, user: UserId) {
        self.state.lock().unwrap().disconnect_bans_for.insert(user);
    }

    /// Make sends to this chat fail
    pub fn fail_sends_to(&self, chat: impl Into<ChatId>) {
        self.state.lock().unwrap().fail_sends_to.insert(chat.into());
    }

    /// Clear all state
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        *state = MockState::default();
    }
}

#[async_trait]
impl MessagingGateway for MockGateway {
    async fn send(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> GatewayResult<MessageHandle> {
        let mut state = self.state.lock().unwrap();
        if state.fail_sends_to.contains(&chat) {
            return Err(GatewayError::Api {
                code: 403,
                description: "Forbidden: bot was blocked by the user".to_string(),
            });
        }

        state.next_message_id += 1;
        let handle = MessageHandle {
            chat,
            message_id: state.next_message_id,
        };
        state.sent_messages.push(SentMessage {
            chat,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(handle)
    }

    async fn edit(
        &self,
        handle: &MessageHandle,
        text: &str,
        _keyboard: Option<&Keyboard>,
    ) -> GatewayResult<()> {
        let mut state = self.state.lock().unwrap();
        state.edits.push((handle.clone(), text.to_string()));
        Ok(())
    }

    async fn create_invite_link(
        &self,
        channel: ChannelId,
        single_use: bool,
        expires_at: Option<i64>,
    ) -> GatewayResult<String> {
        let mut state = self.state.lock().unwrap();
        if state.fail_invite_links {
            return Err(GatewayError::Api {
                code: 400,
                description: "Bad Request: not enough rights to manage invite links"
                    .to_string(),
            });
        }

        state.next_link_id += 1;
        state.invite_links.push((channel, single_use, expires_at));
        Ok(format!("https://t.me/+mock{}", state.next_link_id))
    }

    async fn invite_member(&self, channel: ChannelId, user: UserId) -> GatewayResult<()> {
        let mut state = self.state.lock().unwrap();
        if !state.allow_direct_invite {
            return Err(GatewayError::PrivacyRestricted(user));
        }
        state.direct_invites.push((channel, user));
        Ok(())
    }

    async fn ban_member(&self, channel: ChannelId, user: UserId) -> GatewayResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.disconnect_bans_for.contains(&user) {
            return Err(GatewayError::Network("connection reset".to_string()));
        }
        if state.fail_bans_for.contains(&user) {
            return Err(GatewayError::Api {
                code: 400,
                description: "Bad Request: not enough rights to restrict/unrestrict chat member"
                    .to_string(),
            });
        }
        state.bans.push((channel, user));
        Ok(())
    }

    async fn unban_member(&self, channel: ChannelId, user: UserId) -> GatewayResult<()> {
        let mut state = self.state.lock().unwrap();
        state.unbans.push((channel, user));
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, _text: Option<&str>) -> GatewayResult<()> {
        let mut state = self.state.lock().unwrap();
        state.answered_callbacks.push(callback_id.to_string());
        Ok(())
    }

    async fn receive_updates(&self) -> GatewayResult<Vec<Update>> {
        let mut state = self.state.lock().unwrap();
        Ok(state.incoming.drain(..).collect())
    }
}
