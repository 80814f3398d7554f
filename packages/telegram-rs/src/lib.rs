// Minimal Telegram Bot API client: just the methods the membership bot calls.
// https://core.telegram.org/bots/api

pub mod models;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;

pub use crate::models::{
    ApiResponse, CallbackQuery, Chat, ChatInviteLink, Message, ReplyMarkup, Update, User,
};

const API_BASE: &str = "https://api.telegram.org";

/// Deadline for a single Bot API call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("request to Telegram failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram returned an error ({code}): {description}")]
    Api { code: i32, description: String },

    #[error("Telegram response had no result")]
    EmptyResult,
}

#[derive(Debug, Clone)]
pub struct TelegramOptions {
    pub token: String,
    /// Overrides the API host, used for local Bot API servers.
    pub base_url: Option<String>,
    /// Deadline for each call. Long polls get their poll timeout on top of it.
    pub request_timeout: Duration,
}

impl TelegramOptions {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            base_url: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TelegramService {
    options: TelegramOptions,
    client: Client,
}

impl TelegramService {
    pub fn new(options: TelegramOptions) -> Result<Self, TelegramError> {
        let client = Client::builder().timeout(options.request_timeout).build()?;

        Ok(Self { options, client })
    }

    fn method_url(&self, method: &str) -> String {
        let base = self.options.base_url.as_deref().unwrap_or(API_BASE);
        format!("{}/bot{}/{}", base, self.options.token, method)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: Value) -> Result<T, TelegramError> {
        self.call_within(method, body, self.options.request_timeout).await
    }

    async fn call_within<T: DeserializeOwned>(
        &self,
        method: &str,
        body: Value,
        timeout: Duration,
    ) -> Result<T, TelegramError> {
        let response = self
            .client
            .post(self.method_url(method))
            .timeout(timeout)
            .json(&body)
            .send()
            .await?;

        let envelope = response.json::<ApiResponse<T>>().await?;
        if !envelope.ok {
            return Err(TelegramError::Api {
                code: envelope.error_code.unwrap_or_default(),
                description: envelope.description.unwrap_or_default(),
            });
        }

        envelope.result.ok_or(TelegramError::EmptyResult)
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<&ReplyMarkup>,
    ) -> Result<Message, TelegramError> {
        let mut body = json!({ "chat_id": chat_id, "text": text });
        if let Some(markup) = reply_markup {
            body["reply_markup"] = serde_json::to_value(markup).unwrap_or(Value::Null);
        }
        self.call("sendMessage", body).await
    }

    pub async fn forward_message(
        &self,
        chat_id: i64,
        from_chat_id: i64,
        message_id: i64,
    ) -> Result<Message, TelegramError> {
        self.call(
            "forwardMessage",
            json!({
                "chat_id": chat_id,
                "from_chat_id": from_chat_id,
                "message_id": message_id,
            }),
        )
        .await
    }

    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<Value, TelegramError> {
        self.call(
            "editMessageText",
            json!({ "chat_id": chat_id, "message_id": message_id, "text": text }),
        )
        .await
    }

    pub async fn answer_callback_query(&self, callback_query_id: &str) -> Result<bool, TelegramError> {
        self.call(
            "answerCallbackQuery",
            json!({ "callback_query_id": callback_query_id }),
        )
        .await
    }

    pub async fn ban_chat_member(&self, chat_id: i64, user_id: i64) -> Result<bool, TelegramError> {
        self.call(
            "banChatMember",
            json!({ "chat_id": chat_id, "user_id": user_id }),
        )
        .await
    }

    pub async fn unban_chat_member(&self, chat_id: i64, user_id: i64) -> Result<bool, TelegramError> {
        self.call(
            "unbanChatMember",
            json!({ "chat_id": chat_id, "user_id": user_id, "only_if_banned": true }),
        )
        .await
    }

    /// Create an invite link usable by `member_limit` users until `expire_date` (unix seconds).
    pub async fn create_chat_invite_link(
        &self,
        chat_id: i64,
        member_limit: i64,
        expire_date: i64,
    ) -> Result<ChatInviteLink, TelegramError> {
        self.call(
            "createChatInviteLink",
            json!({
                "chat_id": chat_id,
                "member_limit": member_limit,
                "expire_date": expire_date,
            }),
        )
        .await
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        let mut body = json!({
            "timeout": timeout_secs,
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }
        // Telegram holds the request open for up to `timeout_secs`
        let deadline = Duration::from_secs(timeout_secs) + self.options.request_timeout;
        self.call_within("getUpdates", body, deadline).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_url_uses_custom_base() {
        let service = TelegramService::new(TelegramOptions {
            base_url: Some("http://localhost:8081".to_string()),
            ..TelegramOptions::new("123:abc")
        })
        .unwrap();

        assert_eq!(
            service.method_url("getMe"),
            "http://localhost:8081/bot123:abc/getMe"
        );
    }

    /// Accepts connections and never answers.
    async fn silent_server() -> (String, tokio::task::JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                open.push(stream);
            }
        });
        (format!("http://{}", addr), handle)
    }

    fn service_for(base_url: String, request_timeout: Duration) -> TelegramService {
        TelegramService::new(TelegramOptions {
            base_url: Some(base_url),
            request_timeout,
            ..TelegramOptions::new("123:abc")
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_stalled_call_times_out() {
        let (base_url, server) = silent_server().await;
        let service = service_for(base_url, Duration::from_millis(200));

        let started = std::time::Instant::now();
        let err = service.send_message(42, "hello", None).await.unwrap_err();

        match err {
            TelegramError::Http(e) => assert!(e.is_timeout()),
            other => panic!("expected timeout, got {:?}", other),
        }
        assert!(started.elapsed() < Duration::from_secs(5));
        server.abort();
    }

    #[tokio::test]
    async fn test_long_poll_waits_past_request_timeout() {
        let (base_url, server) = silent_server().await;
        let service = service_for(base_url, Duration::from_millis(200));

        let started = std::time::Instant::now();
        let err = service.get_updates(None, 1).await.unwrap_err();

        assert!(matches!(err, TelegramError::Http(ref e) if e.is_timeout()));
        assert!(started.elapsed() >= Duration::from_secs(1));
        server.abort();
    }

    #[test]
    fn test_default_options() {
        let options = TelegramOptions::new("t");

        assert_eq!(options.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert!(options.base_url.is_none());
    }

    #[test]
    fn test_error_envelope_deserializes() {
        let raw = r#"{"ok": false, "error_code": 403, "description": "Forbidden: bot was blocked by the user"}"#;
        let envelope: ApiResponse<Message> = serde_json::from_str(raw).unwrap();

        assert!(!envelope.ok);
        assert_eq!(envelope.error_code, Some(403));
        assert!(envelope.result.is_none());
    }
}
