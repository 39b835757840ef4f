//! Bot service: routes transport updates to ingestion, queries and
//! callbacks, and renders the results through a [`Messenger`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::callback::{CallbackDispatcher, CallbackOutcome};
use super::resolver::{Disambiguation, QueryResolver, Resolution};
use crate::adapters::telegram::{CallbackQuery, Message, TelegramClient, Update};
use crate::adapters::Messenger;
use crate::domain::{CatalogPath, ChildKey, MediaRef};
use crate::ingest::{IngestEvent, IngestionPipeline};
use crate::library::Catalog;

pub const WELCOME_TEXT: &str = "✨ WELCOME TO REELSHELF ✨\n\n\
🚀 Fast Episode Delivery\n\
🎬 Multi Quality Available\n\
📚 Auto Updated Library\n\n\
🔍 Usage:\n\
/start series_s01\n\
/start series_s01_ep3\n\
/start series_s01_720p\n\
/get angel next door | s01 | ep03";

pub const NOT_FOUND_TEXT: &str = "❌ Not found.";
pub const EXPIRED_TEXT: &str = "⚠️ No longer available. Send the query again.";

/// Background media delivery started by a handled update
pub type Delivery = JoinHandle<()>;

/// Ties the catalog flows to a messaging transport
pub struct BotService {
    pipeline: IngestionPipeline,
    resolver: QueryResolver,
    dispatcher: CallbackDispatcher,
    messenger: Arc<dyn Messenger>,
    footer: Option<String>,
}

impl BotService {
    pub fn new(catalog: Arc<Catalog>, messenger: Arc<dyn Messenger>) -> Self {
        let resolver = QueryResolver::new(catalog.clone());
        Self {
            pipeline: IngestionPipeline::new(catalog),
            dispatcher: CallbackDispatcher::new(resolver.clone()),
            resolver,
            messenger,
            footer: None,
        }
    }

    /// Only accept uploads from this sender
    pub fn with_owner(mut self, owner_id: Option<i64>) -> Self {
        self.pipeline = self.pipeline.with_owner(owner_id);
        self
    }

    /// Line appended to every delivered media caption
    pub fn with_footer(mut self, footer: Option<String>) -> Self {
        self.footer = footer.filter(|f| !f.trim().is_empty());
        self
    }

    /// Route one update.
    ///
    /// Returns the media delivery task, if the update produced one. Callers
    /// that don't care may drop it; the task keeps running.
    pub async fn handle_update(&self, update: Update) -> Result<Option<Delivery>> {
        if let Some(query) = update.callback_query {
            return self.handle_callback(query).await;
        }

        match update.message.or(update.channel_post) {
            Some(message) => self.handle_message(message).await,
            None => {
                debug!(update_id = update.update_id, "Ignoring update without payload");
                Ok(None)
            }
        }
    }

    async fn handle_message(&self, message: Message) -> Result<Option<Delivery>> {
        if let Some(media) = message.media() {
            let event = IngestEvent {
                sender: message.sender_id(),
                caption: message.caption.clone(),
                media: Some(media),
            };
            self.ingest(event).await;
            return Ok(None);
        }

        let Some(text) = message.text.as_deref() else {
            debug!(message_id = message.message_id, "Ignoring message without text or media");
            return Ok(None);
        };

        match parse_command(text) {
            Some(("start" | "get", "")) => {
                self.messenger
                    .send_text(message.chat.id, WELCOME_TEXT, &[])
                    .await?;
                Ok(None)
            }
            Some(("start" | "get", query)) => self.answer_query(message.chat.id, query).await,
            _ => {
                debug!(message_id = message.message_id, "Ignoring non-command text");
                Ok(None)
            }
        }
    }

    async fn ingest(&self, event: IngestEvent) {
        // Outcomes and failures are logged by the pipeline and the catalog
        if let Err(e) = self.pipeline.ingest(event).await {
            debug!(error = %e, "Ingestion did not complete cleanly");
        }
    }

    async fn handle_callback(&self, query: CallbackQuery) -> Result<Option<Delivery>> {
        if let Err(e) = self.messenger.answer_callback(&query.id).await {
            warn!(error = %e, "Failed to acknowledge callback");
        }

        let chat_id = query
            .message
            .as_ref()
            .map(|m| m.chat.id)
            .unwrap_or(query.from.id);

        let Some(data) = query.data.as_deref() else {
            debug!(callback_id = %query.id, "Callback without data");
            return Ok(None);
        };

        match self.dispatcher.dispatch(data) {
            CallbackOutcome::Resolved(resolution) => self.render(chat_id, resolution).await,
            CallbackOutcome::Expired(_) | CallbackOutcome::Invalid(_) => {
                self.messenger.send_text(chat_id, EXPIRED_TEXT, &[]).await?;
                Ok(None)
            }
        }
    }

    /// Resolve query text and reply to `chat_id`
    pub async fn answer_query(&self, chat_id: i64, query: &str) -> Result<Option<Delivery>> {
        let resolution = self.resolver.resolve(query);
        debug!(query = %query, found = !resolution.is_not_found(), "Resolved query");
        self.render(chat_id, resolution).await
    }

    async fn render(&self, chat_id: i64, resolution: Resolution) -> Result<Option<Delivery>> {
        match resolution {
            Resolution::Single { path, media } => {
                let caption = media_caption(&path, self.footer.as_deref());
                Ok(Some(self.deliver(chat_id, vec![(media, caption)])))
            }
            Resolution::Batch { path, items } => {
                let quality = path
                    .quality
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                self.messenger
                    .send_text(chat_id, &format!("🚀 Sending {} episodes...", quality), &[])
                    .await?;

                let sends = items
                    .into_iter()
                    .map(|(episode, media)| {
                        let caption = media_caption(
                            &path.clone().with_episode(episode),
                            self.footer.as_deref(),
                        );
                        (media, caption)
                    })
                    .collect();
                Ok(Some(self.deliver(chat_id, sends)))
            }
            Resolution::Disambiguate(menu) => {
                self.send_menu(chat_id, &menu).await?;
                Ok(None)
            }
            Resolution::NotFound => {
                self.messenger.send_text(chat_id, NOT_FOUND_TEXT, &[]).await?;
                Ok(None)
            }
        }
    }

    async fn send_menu(&self, chat_id: i64, menu: &Disambiguation) -> Result<()> {
        let prompt = menu_prompt(menu);
        match self.dispatcher.option_tokens(menu) {
            Ok(buttons) => self.messenger.send_text(chat_id, prompt, &buttons).await,
            Err(e) => {
                // Buttons can't carry this path; list commands instead
                debug!(path = %menu.path, error = %e, "Falling back to text menu");
                let mut text = String::from(prompt);
                for option in &menu.options {
                    text.push_str("\n/get ");
                    text.push_str(&menu.path.child(option).to_delimited());
                }
                self.messenger.send_text(chat_id, &text, &[]).await
            }
        }
    }

    /// Send media items in order on a background task
    fn deliver(&self, chat_id: i64, items: Vec<(MediaRef, String)>) -> Delivery {
        let messenger = self.messenger.clone();
        tokio::spawn(async move {
            for (media, caption) in items {
                if let Err(e) = messenger.send_media(chat_id, &media, &caption).await {
                    error!(
                        chat_id,
                        file = %media.fingerprint(),
                        error = %e,
                        "Media delivery failed"
                    );
                }
            }
        })
    }

    /// Long-poll the Bot API forever, one task per update
    pub async fn run_polling(self: Arc<Self>, client: Arc<TelegramClient>, timeout_secs: u64) -> Result<()> {
        info!(
            transport = self.messenger.name(),
            timeout_secs, "Polling for updates"
        );
        let mut offset: Option<i64> = None;

        loop {
            let updates = match client.get_updates(offset, timeout_secs).await {
                Ok(updates) => updates,
                Err(e) => {
                    error!(error = %e, "Failed to fetch updates");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    continue;
                }
            };

            for update in updates {
                offset = Some(update.update_id + 1);
                let service = self.clone();
                tokio::spawn(async move {
                    let update_id = update.update_id;
                    if let Err(e) = service.handle_update(update).await {
                        error!(update_id, error = %e, "Failed to handle update");
                    }
                });
            }
        }
    }
}

/// Split `/cmd@bot args` into `("cmd", "args")`
fn parse_command(text: &str) -> Option<(&str, &str)> {
    let text = text.trim();
    let rest = text.strip_prefix('/')?;
    let (command, args) = rest
        .split_once(char::is_whitespace)
        .unwrap_or((rest, ""));
    let command = command.split('@').next().unwrap_or(command);
    Some((command, args.trim()))
}

fn menu_prompt(menu: &Disambiguation) -> &'static str {
    match menu.options.first() {
        Some(ChildKey::Season(_)) => "📺 Choose Season:",
        Some(ChildKey::Episode(_)) => "🎞 Choose Episode:",
        _ => "🎬 Choose Quality:",
    }
}

/// Caption attached to delivered media
pub fn media_caption(path: &CatalogPath, footer: Option<&str>) -> String {
    let title = path.title.as_str().to_uppercase();
    let mut caption = match path.episode {
        Some(episode) => format!("✨ {} - EP {}", title, episode.number()),
        None => format!("✨ {}", title),
    };
    if let Some(quality) = &path.quality {
        caption.push_str(&format!("\n🎬 Quality: {}", quality));
    }
    if let Some(footer) = footer {
        caption.push('\n');
        caption.push_str(footer);
    }
    caption
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::QualityLabel;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("/start"), Some(("start", "")));
        assert_eq!(
            parse_command("/start@reelshelf_bot bleach_s01"),
            Some(("start", "bleach_s01"))
        );
        assert_eq!(
            parse_command("  /get angel next door | s01  "),
            Some(("get", "angel next door | s01"))
        );
        assert_eq!(parse_command("hello"), None);
    }

    #[test]
    fn test_media_caption() {
        let path = CatalogPath::parse_query("bleach_s01_ep03_720p").unwrap();
        assert_eq!(
            media_caption(&path, Some("💖 Powered by reelshelf")),
            "✨ BLEACH - EP 3\n🎬 Quality: 720p\n💖 Powered by reelshelf"
        );

        let movie = CatalogPath::parse_query("akira_1080p").unwrap();
        assert_eq!(media_caption(&movie, None), "✨ AKIRA\n🎬 Quality: 1080p");
    }

    #[test]
    fn test_fallback_command_reparses() {
        let path = CatalogPath::parse_query("bleach_s01_ep03")
            .unwrap()
            .with_quality(QualityLabel::parse("s2").unwrap());
        let query = path.to_delimited();
        assert_eq!(query, "bleach | s01 | ep03 | q:s2");
        assert_eq!(CatalogPath::parse_query(&query).unwrap(), path);
    }
}
