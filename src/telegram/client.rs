//! Telegram Bot API client
//!
//! [`MessagingGateway`] implementation over the HTTPS Bot API. Every method
//! is a JSON POST to `<api_url>/bot<token>/<method>`; updates are received by
//! long polling `getUpdates`.
//!
//! The Bot API cannot add a user to a channel, so `invite_member` always
//! reports `PrivacyRestricted` and callers fall back to invite links.

use super::traits::*;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Timeout for ordinary calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Margin on top of the long-poll timeout for `getUpdates`
const POLL_MARGIN: Duration = Duration::from_secs(10);

/// Bot API gateway
#[derive(Clone)]
pub struct BotApiClient {
    http: reqwest::Client,
    base_url: String,
    poll_timeout_secs: u64,
    /// Next update id to request; shared between clones
    offset: Arc<AtomicI64>,
}

impl BotApiClient {
    pub fn new(api_url: &str, token: &str, poll_timeout_secs: u64) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("timegate/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        info!(api_url = %api_url, poll_timeout_secs, "Bot API client initialized");

        Self {
            http,
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
            poll_timeout_secs,
            offset: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Bot username, used to check the token at startup
    pub async fn get_me(&self) -> GatewayResult<String> {
        let me: RawUser = self.call("getMe", json!({}), None).await?;
        Ok(me.username.unwrap_or_else(|| me.id.to_string()))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: Value,
        timeout: Option<Duration>,
    ) -> GatewayResult<T> {
        let mut request = self
            .http
            .post(format!("{}/{}", self.base_url, method))
            .json(&body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.without_url().to_string()))?;
        let status = response.status().as_u16() as i64;

        let payload: ApiResponse<T> = response.json().await.map_err(|e| {
            if e.is_decode() {
                GatewayError::Decode(e.to_string())
            } else {
                GatewayError::Network(e.without_url().to_string())
            }
        })?;

        debug!(method, status, ok = payload.ok, "Bot API call");
        payload.into_result(status)
    }
}

#[async_trait]
impl MessagingGateway for BotApiClient {
    async fn send(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> GatewayResult<MessageHandle> {
        let mut body = json!({
            "chat_id": chat.0,
            "text": text,
            "disable_web_page_preview": true,
        });
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = reply_markup(keyboard);
        }

        let message: RawMessage = self.call("sendMessage", body, None).await?;
        Ok(MessageHandle {
            chat,
            message_id: message.message_id,
        })
    }

    async fn edit(
        &self,
        handle: &MessageHandle,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> GatewayResult<()> {
        let mut body = json!({
            "chat_id": handle.chat.0,
            "message_id": handle.message_id,
            "text": text,
        });
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = reply_markup(keyboard);
        }

        // Result is the edited Message, or `true` for inline messages
        let _: Value = self.call("editMessageText", body, None).await?;
        Ok(())
    }

    async fn create_invite_link(
        &self,
        channel: ChannelId,
        single_use: bool,
        expires_at: Option<i64>,
    ) -> GatewayResult<String> {
        let mut body = json!({ "chat_id": channel.0 });
        if single_use {
            body["member_limit"] = json!(1);
        }
        if let Some(expires_at) = expires_at {
            body["expire_date"] = json!(expires_at);
        }

        let link: RawInviteLink = self.call("createChatInviteLink", body, None).await?;
        Ok(link.invite_link)
    }

    async fn invite_member(&self, _channel: ChannelId, user: UserId) -> GatewayResult<()> {
        Err(GatewayError::PrivacyRestricted(user))
    }

    async fn ban_member(&self, channel: ChannelId, user: UserId) -> GatewayResult<()> {
        let _: bool = self
            .call(
                "banChatMember",
                json!({ "chat_id": channel.0, "user_id": user.0 }),
                None,
            )
            .await?;
        Ok(())
    }

    async fn unban_member(&self, channel: ChannelId, user: UserId) -> GatewayResult<()> {
        let _: bool = self
            .call(
                "unbanChatMember",
                json!({ "chat_id": channel.0, "user_id": user.0, "only_if_banned": true }),
                None,
            )
            .await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> GatewayResult<()> {
        let mut body = json!({ "callback_query_id": callback_id });
        if let Some(text) = text {
            body["text"] = json!(text);
        }
        let _: bool = self.call("answerCallbackQuery", body, None).await?;
        Ok(())
    }

    async fn receive_updates(&self) -> GatewayResult<Vec<Update>> {
        let body = json!({
            "offset": self.offset.load(Ordering::SeqCst),
            "timeout": self.poll_timeout_secs,
            "allowed_updates": ["message", "callback_query"],
        });
        let timeout = Duration::from_secs(self.poll_timeout_secs) + POLL_MARGIN;

        let raw: Vec<RawUpdate> = self.call("getUpdates", body, Some(timeout)).await?;
        let (updates, next_offset) = convert_updates(raw);
        if let Some(next) = next_offset {
            self.offset.fetch_max(next, Ordering::SeqCst);
        }
        Ok(updates)
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

impl<T> ApiResponse<T> {
    fn into_result(self, status: i64) -> GatewayResult<T> {
        if self.ok {
            return self
                .result
                .ok_or_else(|| GatewayError::Decode("response without result".to_string()));
        }
        if let Some(retry_after) = self.parameters.and_then(|p| p.retry_after) {
            return Err(GatewayError::RateLimited { retry_after });
        }
        Err(GatewayError::Api {
            code: self.error_code.unwrap_or(status),
            description: self.description.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: i64,
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawChat {
    id: i64,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    message_id: i64,
    from: Option<RawUser>,
    chat: RawChat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCallbackQuery {
    id: String,
    from: RawUser,
    message: Option<RawMessage>,
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawUpdate {
    update_id: i64,
    message: Option<RawMessage>,
    callback_query: Option<RawCallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct RawInviteLink {
    invite_link: String,
}

#[derive(Debug, Serialize)]
struct RawButton<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    callback_data: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
}

fn reply_markup(keyboard: &Keyboard) -> Value {
    let rows: Vec<Vec<RawButton<'_>>> = keyboard
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|button| match button {
                    Button::Callback { label, data } => RawButton {
                        text: label.as_str(),
                        callback_data: Some(data.as_str()),
                        url: None,
                    },
                    Button::Url { label, url } => RawButton {
                        text: label.as_str(),
                        callback_data: None,
                        url: Some(url.as_str()),
                    },
                })
                .collect()
        })
        .collect();
    json!({ "inline_keyboard": rows })
}

/// Keep private text messages and button presses; return the next offset.
fn convert_updates(raw: Vec<RawUpdate>) -> (Vec<Update>, Option<i64>) {
    let next_offset = raw.iter().map(|u| u.update_id + 1).max();

    let updates = raw
        .into_iter()
        .filter_map(|update| {
            if let Some(query) = update.callback_query {
                return Some(Update::Callback {
                    id: query.id,
                    sender: UserId(query.from.id),
                    message: query.message.map(|m| MessageHandle {
                        chat: ChatId(m.chat.id),
                        message_id: m.message_id,
                    }),
                    data: query.data.unwrap_or_default(),
                });
            }

            let message = update.message?;
            if message.chat.kind != "private" {
                return None;
            }
            Some(Update::Message {
                sender: UserId(message.from?.id),
                chat: ChatId(message.chat.id),
                text: message.text?,
            })
        })
        .collect();

    (updates, next_offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_updates() {
        let raw: Vec<RawUpdate> = serde_json::from_str(
            r#"[
                {"update_id": 10, "message": {"message_id": 1, "from": {"id": 42, "is_bot": false, "first_name": "A"},
                    "chat": {"id": 42, "type": "private"}, "date": 0, "text": "/start"}},
                {"update_id": 11, "message": {"message_id": 2, "from": {"id": 43, "is_bot": false, "first_name": "B"},
                    "chat": {"id": -1001, "type": "channel"}, "date": 0, "text": "hello"}},
                {"update_id": 12, "message": {"message_id": 3, "from": {"id": 44, "is_bot": false, "first_name": "C"},
                    "chat": {"id": 44, "type": "private"}, "date": 0}},
                {"update_id": 13, "callback_query": {"id": "cb1", "from": {"id": 7, "is_bot": false, "first_name": "D"},
                    "message": {"message_id": 9, "chat": {"id": 7, "type": "private"}, "date": 0},
                    "chat_instance": "x", "data": "no:-1001:42"}}
            ]"#,
        )
        .unwrap();

        let (updates, next) = convert_updates(raw);
        assert_eq!(next, Some(14));
        assert_eq!(
            updates,
            vec![
                Update::Message {
                    sender: UserId(42),
                    chat: ChatId(42),
                    text: "/start".to_string(),
                },
                Update::Callback {
                    id: "cb1".to_string(),
                    sender: UserId(7),
                    message: Some(MessageHandle {
                        chat: ChatId(7),
                        message_id: 9,
                    }),
                    data: "no:-1001:42".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_empty_batch_keeps_offset() {
        let (updates, next) = convert_updates(vec![]);
        assert!(updates.is_empty());
        assert_eq!(next, None);
    }

    #[test]
    fn test_rate_limit_mapping() {
        let response: ApiResponse<bool> = serde_json::from_str(
            r#"{"ok": false, "error_code": 429, "description": "Too Many Requests: retry after 5",
                "parameters": {"retry_after": 5}}"#,
        )
        .unwrap();
        assert!(matches!(
            response.into_result(429),
            Err(GatewayError::RateLimited { retry_after: 5 })
        ));
    }

    #[test]
    fn test_api_error_mapping() {
        let response: ApiResponse<bool> = serde_json::from_str(
            r#"{"ok": false, "error_code": 403, "description": "Forbidden: bot was blocked by the user"}"#,
        )
        .unwrap();
        match response.into_result(403) {
            Err(GatewayError::Api { code, description }) => {
                assert_eq!(code, 403);
                assert!(description.contains("blocked"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_reply_markup_shape() {
        let keyboard = Keyboard::column(vec![
            Button::callback("✅ Approve 24h", "ok:-1001:42:24"),
            Button::url("🔗 Join", "https://t.me/+abc"),
        ]);
        let markup = reply_markup(&keyboard);
        assert_eq!(
            markup,
            json!({
                "inline_keyboard": [
                    [{"text": "✅ Approve 24h", "callback_data": "ok:-1001:42:24"}],
                    [{"text": "🔗 Join", "url": "https://t.me/+abc"}]
                ]
            })
        );
    }

    #[tokio::test]
    async fn test_invite_member_is_privacy_restricted() {
        let client = BotApiClient::new(DEFAULT_API_URL, "0:test", 1);
        assert!(matches!(
            client.invite_member(ChannelId(-1001), UserId(5)).await,
            Err(GatewayError::PrivacyRestricted(UserId(5)))
        ));
    }
}
