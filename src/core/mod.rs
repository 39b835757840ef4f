//! Core bot logic.
//!
//! This module contains:
//! - QueryResolver: Path resolution against the catalog
//! - CallbackDispatcher: Continuation tokens for disambiguation menus
//! - BotService: Update routing and reply rendering

pub mod callback;
pub mod resolver;
pub mod service;

// Re-export commonly used types
pub use callback::{
    CallbackDispatcher, CallbackOutcome, CallbackToken, OptionButton, TokenError, MAX_TOKEN_LEN,
};
pub use resolver::{resolve_in, Disambiguation, QueryResolver, Resolution};
pub use service::{media_caption, BotService, Delivery};
