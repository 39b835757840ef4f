//! Adapter interfaces for the messaging transport.
//!
//! The bot core only talks to the outside world through [`Messenger`];
//! [`TelegramClient`] is the production implementation.

pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;

use crate::core::OptionButton;
use crate::domain::MediaRef;

// Re-export the Telegram adapter
pub use telegram::{TelegramClient, Update};

/// Outbound side of the messaging transport
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Human-readable transport name
    fn name(&self) -> &str;

    /// Send text, with one button per option when `buttons` is non-empty
    async fn send_text(&self, chat_id: i64, text: &str, buttons: &[OptionButton]) -> Result<()>;

    /// Deliver a stored media item
    async fn send_media(&self, chat_id: i64, media: &MediaRef, caption: &str) -> Result<()>;

    /// Acknowledge a button press
    async fn answer_callback(&self, callback_id: &str) -> Result<()>;
}
