//! Minimal Telegram Bot API client.
//!
//! Covers the four methods the bot needs: getMe, deleteWebhook,
//! getUpdates (long polling) and sendMessage.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Extra slack on top of the long-poll timeout before the HTTP client gives up
const HTTP_TIMEOUT_MARGIN: Duration = Duration::from_secs(10);

/// sendMessage rejects texts longer than this
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Telegram transport errors
#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    /// Another process is polling with the same token
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Telegram API error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("HTTP error: {0}")]
    Http(#[source] reqwest::Error),

    #[error("Invalid response from Telegram: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<reqwest::Error> for TelegramError {
    fn from(e: reqwest::Error) -> Self {
        // Request URLs embed the bot token
        TelegramError::Http(e.without_url())
    }
}

/// Envelope around every Bot API result
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<i64>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Serialize)]
struct GetUpdates {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

#[derive(Serialize)]
struct DeleteWebhook {
    drop_pending_updates: bool,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

#[derive(Serialize)]
struct NoParams {}

/// HTTP client bound to one bot token
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
}

impl TelegramClient {
    /// Create a client for `token`; `poll_timeout` bounds getUpdates requests
    pub fn new(api_url: &str, token: &str, poll_timeout: Duration) -> Result<Self, TelegramError> {
        let http = reqwest::Client::builder()
            .timeout(poll_timeout + HTTP_TIMEOUT_MARGIN)
            .build()?;

        Ok(TelegramClient {
            http,
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
        })
    }

    async fn call<P, T>(&self, method: &str, params: &P) -> Result<T, TelegramError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(format!("{}/{}", self.base_url, method))
            .json(params)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        decode_response(method, status, &body)
    }

    /// Identify the bot behind the token
    pub async fn get_me(&self) -> Result<User, TelegramError> {
        self.call("getMe", &NoParams {}).await
    }

    /// Switch to polling mode, optionally discarding queued updates
    pub async fn delete_webhook(&self, drop_pending_updates: bool) -> Result<bool, TelegramError> {
        self.call(
            "deleteWebhook",
            &DeleteWebhook {
                drop_pending_updates,
            },
        )
        .await
    }

    /// Long-poll for updates after `offset`
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        self.call(
            "getUpdates",
            &GetUpdates {
                offset,
                timeout: timeout_secs,
                allowed_updates: ["message"],
            },
        )
        .await
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<Message, TelegramError> {
        self.call("sendMessage", &SendMessage { chat_id, text }).await
    }
}

/// Split `text` into pieces of at most `limit` characters
/// Breaks at line boundaries where possible; a single overlong line is cut
/// by character count.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split('\n') {
        let line_len = line.chars().count();
        let separator = usize::from(!current.is_empty());

        if current_len + separator + line_len <= limit {
            if separator == 1 {
                current.push('\n');
            }
            current.push_str(line);
            current_len += separator + line_len;
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        let mut chars = line.chars().peekable();
        while chars.peek().is_some() {
            let piece: String = chars.by_ref().take(limit).collect();
            let piece_len = piece.chars().count();
            if piece_len == limit && chars.peek().is_some() {
                chunks.push(piece);
            } else {
                current = piece;
                current_len = piece_len;
            }
        }
    }

    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }

    chunks
}

fn decode_response<T: DeserializeOwned>(
    method: &str,
    status: StatusCode,
    body: &[u8],
) -> Result<T, TelegramError> {
    let response: ApiResponse<T> = match serde_json::from_slice(body) {
        Ok(response) => response,
        Err(_) if status == StatusCode::CONFLICT => {
            return Err(TelegramError::Conflict(format!("{} returned 409", method)));
        }
        Err(e) => return Err(e.into()),
    };

    let code = response
        .error_code
        .unwrap_or_else(|| i64::from(status.as_u16()));

    match response.result {
        Some(result) if response.ok => Ok(result),
        _ => {
            let description = response
                .description
                .unwrap_or_else(|| format!("{} failed", method));
            if code == i64::from(StatusCode::CONFLICT.as_u16()) {
                Err(TelegramError::Conflict(description))
            } else {
                Err(TelegramError::Api { code, description })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_updates() {
        let body = br#"{
            "ok": true,
            "result": [
                {
                    "update_id": 42,
                    "message": {
                        "message_id": 7,
                        "date": 1700000000,
                        "chat": {"id": -1001, "type": "group"},
                        "from": {"id": 5, "is_bot": false, "first_name": "Ada"},
                        "text": "/add Alice 1990-05-12"
                    }
                },
                {"update_id": 43, "edited_message": {"message_id": 8}}
            ]
        }"#;

        let updates: Vec<Update> = decode_response("getUpdates", StatusCode::OK, body).unwrap();

        assert_eq!(updates.len(), 2);
        let message = updates[0].message.as_ref().unwrap();
        assert_eq!(message.chat.id, -1001);
        assert_eq!(message.from.as_ref().unwrap().first_name, "Ada");
        assert_eq!(message.text.as_deref(), Some("/add Alice 1990-05-12"));
        assert!(updates[1].message.is_none());
    }

    #[test]
    fn test_decode_conflict() {
        let body = br#"{"ok": false, "error_code": 409, "description": "Conflict: terminated by other getUpdates request"}"#;

        let err = decode_response::<Vec<Update>>("getUpdates", StatusCode::CONFLICT, body)
            .unwrap_err();

        assert!(matches!(err, TelegramError::Conflict(ref d) if d.contains("other getUpdates")));
    }

    #[test]
    fn test_decode_api_error() {
        let body = br#"{"ok": false, "error_code": 401, "description": "Unauthorized"}"#;

        let err = decode_response::<User>("getMe", StatusCode::UNAUTHORIZED, body).unwrap_err();

        assert!(matches!(err, TelegramError::Api { code: 401, .. }));
    }

    #[test]
    fn test_decode_non_json_conflict() {
        let err = decode_response::<Vec<Update>>("getUpdates", StatusCode::CONFLICT, b"<html>")
            .unwrap_err();

        assert!(matches!(err, TelegramError::Conflict(_)));
    }

    #[test]
    fn test_split_short_message_is_untouched() {
        assert_eq!(split_message("Saved birthdays:\nAlice : 1990-05-12", 4096).len(), 1);
        assert_eq!(split_message("", 4096), vec![String::new()]);
    }

    #[test]
    fn test_split_at_line_boundaries() {
        let chunks = split_message("aaaa\nbbbb\ncccc", 9);
        assert_eq!(chunks, vec!["aaaa\nbbbb", "cccc"]);
    }

    #[test]
    fn test_split_overlong_line() {
        let chunks = split_message("head\nabcdefghij", 4);
        assert_eq!(chunks, vec!["head", "abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_split_long_listing_fits_limit() {
        let mut text = String::from("Saved birthdays:");
        for i in 0..400 {
            text.push_str(&format!("\nperson-{i} : 2000-01-01"));
        }

        let chunks = split_message(&text, MAX_MESSAGE_CHARS);

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= MAX_MESSAGE_CHARS));
        assert_eq!(chunks.join("\n"), text);
    }

    #[test]
    fn test_get_updates_params() {
        let params = GetUpdates {
            offset: None,
            timeout: 30,
            allowed_updates: ["message"],
        };
        assert_eq!(
            serde_json::to_string(&params).unwrap(),
            r#"{"timeout":30,"allowed_updates":["message"]}"#
        );
    }
}
