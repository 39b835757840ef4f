//! Telegram Bot API adapter.
//!
//! Long-polls for updates and sends replies: text with inline buttons, and
//! media re-sent by file id (nothing is uploaded, the files already live on
//! Telegram's side).

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::Messenger;
use crate::core::OptionButton;
use crate::domain::{MediaKind, MediaRef};

/// Telegram Bot API client
pub struct TelegramClient {
    /// Bot token
    bot_token: String,
    /// HTTP client
    client: reqwest::Client,
}

/// Response from Telegram API
#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

/// Message result from sendMessage/sendVideo/sendDocument
#[derive(Debug, Deserialize)]
struct MessageResult {
    message_id: i64,
}

/// One incoming update
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub channel_post: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileRef {
    pub file_id: String,
}

/// The subset of a message the bot looks at
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub from: Option<User>,
    /// Set for channel posts and anonymous admins
    pub sender_chat: Option<Chat>,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub video: Option<FileRef>,
    pub document: Option<FileRef>,
}

impl Message {
    /// Attached video, or document when there is no video
    pub fn media(&self) -> Option<MediaRef> {
        if let Some(video) = &self.video {
            return Some(MediaRef::video(video.file_id.clone()));
        }
        self.document
            .as_ref()
            .map(|doc| MediaRef::document(doc.file_id.clone()))
    }

    /// Who sent this: the user, else the chat posting on its own behalf
    pub fn sender_id(&self) -> Option<i64> {
        self.from
            .as_ref()
            .map(|u| u.id)
            .or_else(|| self.sender_chat.as_ref().map(|c| c.id))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

impl TelegramClient {
    /// Create a new Telegram client
    pub fn new(bot_token: String) -> Self {
        Self {
            bot_token,
            client: reqwest::Client::new(),
        }
    }

    /// Build API URL
    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{}", self.bot_token, method)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
        timeout: Option<Duration>,
    ) -> Result<T> {
        let mut request = self.client.post(self.api_url(method)).json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to call Telegram {}", method))?;

        let result: TelegramResponse<T> = response
            .json()
            .await
            .context("Failed to parse Telegram response")?;

        if !result.ok {
            anyhow::bail!(
                "Telegram API error: {}",
                result.description.unwrap_or_default()
            );
        }

        result
            .result
            .with_context(|| format!("Telegram {} returned no result", method))
    }

    /// Long-poll for updates after `offset`
    pub async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>> {
        let body = serde_json::json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message", "channel_post", "callback_query"],
        });
        // HTTP timeout must outlast the server-side long poll
        let timeout = Duration::from_secs(timeout_secs + 10);
        self.call("getUpdates", &body, Some(timeout)).await
    }

    /// Send a text message, optionally with one inline button per row
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        buttons: &[OptionButton],
    ) -> Result<i64> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if !buttons.is_empty() {
            body["reply_markup"] = inline_keyboard(buttons);
        }

        let message: MessageResult = self.call("sendMessage", &body, None).await?;
        Ok(message.message_id)
    }

    /// Re-send stored media by file id
    pub async fn send_file(&self, chat_id: i64, media: &MediaRef, caption: &str) -> Result<i64> {
        let (method, field) = match media.kind {
            MediaKind::Video => ("sendVideo", "video"),
            MediaKind::Document => ("sendDocument", "document"),
        };

        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "caption": caption,
        });
        body[field] = serde_json::Value::String(media.file_id.clone());

        let message: MessageResult = self.call(method, &body, None).await?;
        Ok(message.message_id)
    }

    /// Acknowledge a button press so the client stops its spinner
    pub async fn answer_callback_query(&self, callback_id: &str) -> Result<()> {
        let body = serde_json::json!({ "callback_query_id": callback_id });
        let _: bool = self.call("answerCallbackQuery", &body, None).await?;
        Ok(())
    }
}

fn inline_keyboard(buttons: &[OptionButton]) -> serde_json::Value {
    let rows: Vec<_> = buttons
        .iter()
        .map(|b| {
            serde_json::json!([{
                "text": b.label,
                "callback_data": b.token.as_str(),
            }])
        })
        .collect();
    serde_json::json!({ "inline_keyboard": rows })
}

#[async_trait]
impl Messenger for TelegramClient {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send_text(&self, chat_id: i64, text: &str, buttons: &[OptionButton]) -> Result<()> {
        self.send_message(chat_id, text, buttons).await.map(|_| ())
    }

    async fn send_media(&self, chat_id: i64, media: &MediaRef, caption: &str) -> Result<()> {
        self.send_file(chat_id, media, caption).await.map(|_| ())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<()> {
        self.answer_callback_query(callback_id).await
    }
}
