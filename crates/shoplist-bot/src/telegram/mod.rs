use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shoplist_core::config::Config;

use crate::commands::TelegramCommandSpec;

mod types;

pub use types::{
    CallbackQuery, InlineKeyboardButton, InlineKeyboardMarkup, Message, Update, User,
};

const TELEGRAM_API_URL: &str = "https://api.telegram.org";
const PHOTO_FILE_NAME: &str = "image.png";
/// Upper bound for a single API call; long polls get it on top of their wait.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct TelegramSettings {
    pub bot_token: String,
    /// Empty serves everyone.
    pub allowlist_user_ids: HashSet<i64>,
    pub poll_timeout: Duration,
    pub debug_tokens: bool,
}

impl TelegramSettings {
    /// # Errors
    /// Fails when no bot token is configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let bot_token = config.telegram.resolve_bot_token()?;
        let allowlist_user_ids: HashSet<i64> =
            config.telegram.allowlist_user_ids.iter().copied().collect();

        Ok(Self {
            bot_token,
            allowlist_user_ids,
            poll_timeout: config.telegram.poll_timeout(),
            debug_tokens: config.telegram.debug_tokens,
        })
    }
}

#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    request_timeout: Duration,
}

impl TelegramClient {
    pub fn new(token: String) -> Self {
        Self::with_base_url(token, TELEGRAM_API_URL)
    }

    pub fn with_base_url(token: String, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            request_timeout: REQUEST_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout: Duration,
    ) -> Result<Vec<Update>> {
        let request = GetUpdatesRequest {
            offset,
            timeout: timeout.as_secs(),
            allowed_updates: Some(vec!["message", "callback_query"]),
        };
        self.post_within("getUpdates", &request, timeout + self.request_timeout).await
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<Message> {
        let request = SendMessageRequest {
            chat_id,
            text,
            reply_markup,
        };
        self.post("sendMessage", &request).await
    }

    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        reply_markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<()> {
        let request = EditMessageTextRequest {
            chat_id,
            message_id,
            text,
            reply_markup,
        };
        // Telegram answers with the edited message, or `true` for inline ones.
        let _: serde_json::Value = self.post("editMessageText", &request).await?;
        Ok(())
    }

    pub async fn answer_callback_query(&self, callback_query_id: &str) -> Result<()> {
        let request = AnswerCallbackQueryRequest { callback_query_id };
        let _: bool = self.post("answerCallbackQuery", &request).await?;
        Ok(())
    }

    pub async fn send_photo(&self, chat_id: i64, image: Vec<u8>) -> Result<()> {
        let part = reqwest::multipart::Part::bytes(image).file_name(PHOTO_FILE_NAME);
        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .part("photo", part);

        let response = self
            .http
            .post(self.method_url("sendPhoto"))
            .timeout(self.request_timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|err| anyhow!("Telegram photo upload failed: {}", describe(&err)))?;
        let _: Message = decode(response).await?;
        Ok(())
    }

    pub async fn set_my_commands(&self, commands: &[TelegramCommandSpec]) -> Result<()> {
        let request = SetMyCommandsRequest { commands };
        let _: bool = self.post("setMyCommands", &request).await?;
        Ok(())
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, method: &str, body: &B) -> Result<T> {
        self.post_within(method, body, self.request_timeout).await
    }

    async fn post_within<T: DeserializeOwned, B: Serialize>(
        &self,
        method: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<T> {
        let response = self
            .http
            .post(self.method_url(method))
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|err| anyhow!("Telegram {method} request failed: {}", describe(&err)))?;
        decode(response).await
    }
}

/// Summarizes a transport error without its URL, which embeds the bot token.
fn describe(err: &reqwest::Error) -> &'static str {
    if err.is_timeout() {
        "timed out"
    } else if err.is_connect() {
        "connection failed"
    } else if err.is_decode() {
        "invalid response body"
    } else {
        "network error"
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let payload: TelegramResponse<T> = response
        .json()
        .await
        .map_err(|err| anyhow!("Failed to decode Telegram response: {}", describe(&err)))?;

    if !payload.ok {
        let description = payload
            .description
            .unwrap_or_else(|| "Telegram API error".to_string());
        bail!("{}", description);
    }

    payload
        .result
        .ok_or_else(|| anyhow!("Telegram response without result"))
}

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct GetUpdatesRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    allowed_updates: Option<Vec<&'static str>>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a InlineKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
struct EditMessageTextRequest<'a> {
    chat_id: i64,
    message_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a InlineKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
struct AnswerCallbackQueryRequest<'a> {
    callback_query_id: &'a str,
}

#[derive(Debug, Serialize)]
struct SetMyCommandsRequest<'a> {
    commands: &'a [TelegramCommandSpec],
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn can_bind_localhost() -> bool {
        std::net::TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn client(server: &MockServer) -> TelegramClient {
        TelegramClient::with_base_url("T0KEN".to_string(), server.uri())
    }

    #[tokio::test]
    async fn get_updates_parses_messages_and_callbacks() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botT0KEN/getUpdates"))
            .and(body_partial_json(json!({
                "offset": 5,
                "allowed_updates": ["message", "callback_query"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [
                    {
                        "update_id": 5,
                        "message": {
                            "message_id": 1,
                            "chat": { "id": 10, "type": "private" },
                            "from": { "id": 1, "is_bot": false, "username": "ann" },
                            "text": "hi"
                        }
                    },
                    {
                        "update_id": 6,
                        "callback_query": {
                            "id": "cb1",
                            "from": { "id": 1, "is_bot": false },
                            "data": "firstpage_start"
                        }
                    }
                ]
            })))
            .mount(&server)
            .await;

        let updates = client(&server)
            .get_updates(Some(5), Duration::from_secs(0))
            .await
            .unwrap();

        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].message.as_ref().unwrap().text.as_deref(), Some("hi"));
        assert_eq!(updates[0].sender().unwrap().username.as_deref(), Some("ann"));
        let query = updates[1].callback_query.as_ref().unwrap();
        assert_eq!(query.data.as_deref(), Some("firstpage_start"));
        assert_eq!(updates[1].sender().unwrap().id, 1);
    }

    #[tokio::test]
    async fn send_message_carries_inline_keyboard() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botT0KEN/sendMessage"))
            .and(body_partial_json(json!({
                "chat_id": 10,
                "text": "Menu",
                "reply_markup": {
                    "inline_keyboard": [[{ "text": "Calendar", "callback_data": "calendar_start" }]]
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": { "message_id": 77, "chat": { "id": 10 } }
            })))
            .mount(&server)
            .await;

        let markup = InlineKeyboardMarkup {
            inline_keyboard: vec![vec![InlineKeyboardButton {
                text: "Calendar".to_string(),
                callback_data: "calendar_start".to_string(),
            }]],
        };
        let sent = client(&server)
            .send_message(10, "Menu", Some(&markup))
            .await
            .unwrap();
        assert_eq!(sent.message_id, 77);
    }

    #[tokio::test]
    async fn api_error_description_is_reported() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botT0KEN/editMessageText"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "description": "Bad Request: message is not modified"
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .edit_message_text(10, 77, "Menu", None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("message is not modified"));
    }

    #[tokio::test]
    async fn transport_errors_do_not_leak_the_token() {
        let client = TelegramClient::with_base_url("S3CRET".to_string(), "http://127.0.0.1:1");
        let err = client.answer_callback_query("cb").await.unwrap_err();
        assert!(!err.to_string().contains("S3CRET"));
    }

    #[tokio::test]
    async fn stalled_api_call_times_out() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botT0KEN/answerCallbackQuery"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "ok": true, "result": true }))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .with_request_timeout(Duration::from_millis(200))
            .answer_callback_query("cb")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn long_poll_waits_beyond_the_request_timeout() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botT0KEN/getUpdates"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "ok": true, "result": [] }))
                    .set_delay(Duration::from_millis(400)),
            )
            .mount(&server)
            .await;

        let updates = client(&server)
            .with_request_timeout(Duration::from_millis(200))
            .get_updates(None, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(updates.is_empty());
    }

    #[tokio::test]
    async fn send_photo_uses_multipart_upload() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botT0KEN/sendPhoto"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": { "message_id": 78, "chat": { "id": 10 } }
            })))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).send_photo(10, vec![1, 2, 3]).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let content_type = requests[0]
            .headers
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(content_type.starts_with("multipart/form-data"));
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains("name=\"chat_id\""));
        assert!(body.contains("filename=\"image.png\""));
    }
}
