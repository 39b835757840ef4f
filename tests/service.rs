//! Bot Service Integration Tests
//!
//! Drives the update router with Telegram-shaped JSON and records what
//! would have been sent.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use reelshelf::adapters::{Messenger, Update};
use reelshelf::core::service::{EXPIRED_TEXT, NOT_FOUND_TEXT, WELCOME_TEXT};
use reelshelf::core::{BotService, OptionButton};
use reelshelf::domain::{CatalogTree, MediaRef};
use reelshelf::library::{Catalog, MemoryStore};

const OWNER: i64 = 777;
const USER_CHAT: i64 = 42;

#[derive(Debug, Clone, PartialEq)]
enum Sent {
    Text {
        chat_id: i64,
        text: String,
        buttons: Vec<OptionButton>,
    },
    Media {
        chat_id: i64,
        media: MediaRef,
        caption: String,
    },
    Answered(String),
}

#[derive(Default)]
struct RecordingMessenger {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingMessenger {
    fn take(&self) -> Vec<Sent> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send_text(&self, chat_id: i64, text: &str, buttons: &[OptionButton]) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Text {
            chat_id,
            text: text.to_string(),
            buttons: buttons.to_vec(),
        });
        Ok(())
    }

    async fn send_media(&self, chat_id: i64, media: &MediaRef, caption: &str) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Media {
            chat_id,
            media: media.clone(),
            caption: caption.to_string(),
        });
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push(Sent::Answered(callback_id.to_string()));
        Ok(())
    }
}

fn setup() -> (BotService, Arc<RecordingMessenger>, Arc<Catalog>) {
    let messenger = Arc::new(RecordingMessenger::default());
    let catalog = Arc::new(Catalog::with_tree(
        CatalogTree::new(),
        Arc::new(MemoryStore::new()),
    ));
    let service = BotService::new(catalog.clone(), messenger.clone())
        .with_owner(Some(OWNER))
        .with_footer(Some("💖 Powered by reelshelf".to_string()));
    (service, messenger, catalog)
}

fn upload(update_id: i64, sender: i64, caption: &str, file_id: &str) -> Update {
    serde_json::from_value(serde_json::json!({
        "update_id": update_id,
        "message": {
            "message_id": update_id,
            "chat": {"id": sender},
            "from": {"id": sender},
            "caption": caption,
            "video": {"file_id": file_id},
        }
    }))
    .unwrap()
}

fn command(update_id: i64, text: &str) -> Update {
    serde_json::from_value(serde_json::json!({
        "update_id": update_id,
        "message": {
            "message_id": update_id,
            "chat": {"id": USER_CHAT},
            "from": {"id": USER_CHAT},
            "text": text,
        }
    }))
    .unwrap()
}

fn press(update_id: i64, data: &str) -> Update {
    serde_json::from_value(serde_json::json!({
        "update_id": update_id,
        "callback_query": {
            "id": format!("cb{}", update_id),
            "from": {"id": USER_CHAT},
            "message": {"message_id": 1, "chat": {"id": USER_CHAT}},
            "data": data,
        }
    }))
    .unwrap()
}

async fn handle(service: &BotService, update: Update) {
    if let Some(delivery) = service.handle_update(update).await.unwrap() {
        delivery.await.unwrap();
    }
}

#[tokio::test]
async fn test_owner_upload_then_query_delivers_media() {
    let (service, messenger, catalog) = setup();

    handle(&service, upload(1, OWNER, "angel next door | s01 | ep03 | 1080p", "X")).await;
    assert_eq!(catalog.stats().leaves, 1);
    // Ingestion is silent
    assert!(messenger.take().is_empty());

    handle(&service, command(2, "/start angel_next_door_s01_ep03")).await;
    assert_eq!(
        messenger.take(),
        vec![Sent::Media {
            chat_id: USER_CHAT,
            media: MediaRef::video("X"),
            caption: "✨ ANGEL_NEXT_DOOR - EP 3\n🎬 Quality: 1080p\n💖 Powered by reelshelf"
                .to_string(),
        }]
    );
}

#[tokio::test]
async fn test_upload_from_stranger_is_ignored() {
    let (service, messenger, catalog) = setup();

    handle(&service, upload(1, 12345, "bleach | s01 | ep01 | 720p", "A")).await;

    assert_eq!(catalog.stats().leaves, 0);
    assert!(messenger.take().is_empty());
}

#[tokio::test]
async fn test_bare_start_shows_welcome() {
    let (service, messenger, _) = setup();

    handle(&service, command(1, "/start")).await;

    match messenger.take().as_slice() {
        [Sent::Text { text, buttons, .. }] => {
            assert_eq!(text, WELCOME_TEXT);
            assert!(buttons.is_empty());
        }
        other => panic!("Expected welcome text, got {:?}", other),
    }
}

#[tokio::test]
async fn test_quality_menu_then_button_press() {
    let (service, messenger, _) = setup();
    handle(&service, upload(1, OWNER, "angel next door | s01 | ep03 | 1080p", "X")).await;
    handle(&service, upload(2, OWNER, "angel next door | s01 | ep03 | 720p", "Y")).await;

    handle(&service, command(3, "/get angel_next_door_s01_ep03")).await;
    let buttons = match messenger.take().as_slice() {
        [Sent::Text { text, buttons, .. }] => {
            assert_eq!(text, "🎬 Choose Quality:");
            buttons.clone()
        }
        other => panic!("Expected quality menu, got {:?}", other),
    };
    let labels: Vec<_> = buttons.iter().map(|b| b.label.as_str()).collect();
    assert_eq!(labels, vec!["1080p", "720p"]);

    handle(&service, press(4, buttons[1].token.as_str())).await;
    match messenger.take().as_slice() {
        [Sent::Answered(id), Sent::Media { media, .. }] => {
            assert_eq!(id, "cb4");
            assert_eq!(*media, MediaRef::video("Y"));
        }
        other => panic!("Expected acknowledgement and media, got {:?}", other),
    }
}

#[tokio::test]
async fn test_season_batch_sends_in_episode_order() {
    let (service, messenger, _) = setup();
    for (i, ep) in [3, 1, 2].into_iter().enumerate() {
        handle(
            &service,
            upload(i as i64, OWNER, &format!("bleach | s01 | ep{} | 720p", ep), &format!("E{}", ep)),
        )
        .await;
    }

    handle(&service, command(10, "/start bleach_s01_720p")).await;

    let sent = messenger.take();
    assert!(matches!(&sent[0], Sent::Text { text, .. } if text == "🚀 Sending 720p episodes..."));
    let ids: Vec<_> = sent[1..]
        .iter()
        .map(|s| match s {
            Sent::Media { media, .. } => media.file_id.clone(),
            other => panic!("Expected media, got {:?}", other),
        })
        .collect();
    assert_eq!(ids, vec!["E1", "E2", "E3"]);
}

#[tokio::test]
async fn test_not_found_and_stale_buttons() {
    let (service, messenger, _) = setup();

    handle(&service, command(1, "/start unknown_title")).await;
    assert!(matches!(
        messenger.take().as_slice(),
        [Sent::Text { text, .. }] if text == NOT_FOUND_TEXT
    ));

    handle(&service, press(2, "garbage")).await;
    assert!(matches!(
        messenger.take().as_slice(),
        [Sent::Answered(_), Sent::Text { text, .. }] if text == EXPIRED_TEXT
    ));
}
