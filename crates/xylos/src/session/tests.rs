use std::sync::Arc;

use xylos_core::conversation::{Rejection, Role, Turn};
use xylos_core::format::FormatOptions;
use xylos_test_model::TestModelProvider;

use super::{HISTORY_KEY, THEME_KEY};
use crate::{
    FileStore, MemoryStore, RenderedTurn, SessionBuilder, Store, StoreError,
    Theme,
};

struct BrokenStore;

impl Store for BrokenStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(broken())
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(broken())
    }
}

fn broken() -> StoreError {
    StoreError::Io {
        path: "/unreadable/storage.json".into(),
        source: std::io::Error::other("disk on fire"),
    }
}

#[tokio::test]
async fn test_history_restored() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("storage.json");

    let mut model_provider = TestModelProvider::default();
    model_provider.add_text_response("Hi!");
    model_provider.add_text_response("Bye!");
    let session = SessionBuilder::with_model_provider(model_provider)
        .with_store(FileStore::new(&path))
        .build();
    session.send_message("hello").await.unwrap();
    session.send_message("bye").await.unwrap();
    assert_eq!(
        session.history(),
        vec![Turn::new(Role::User, "hello"), Turn::new(Role::User, "bye")]
    );

    let stored = FileStore::new(&path).get(HISTORY_KEY).unwrap().unwrap();
    assert_eq!(
        serde_json::from_str::<serde_json::Value>(&stored).unwrap(),
        serde_json::json!([
            { "role": "user", "content": "hello" },
            { "role": "user", "content": "bye" },
        ])
    );

    // The next session starts with an empty conversation, but keeps the
    // history of the previous one.
    let session =
        SessionBuilder::with_model_provider(TestModelProvider::default())
            .with_store(FileStore::new(&path))
            .build();
    assert!(session.conversation().turns().is_empty());
    assert_eq!(session.history().len(), 2);
}

#[tokio::test]
async fn test_rejected_message_not_recorded() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_text_response("Hi!");
    let session = SessionBuilder::with_model_provider(model_provider)
        .with_store(MemoryStore::new())
        .with_max_user_turns(1)
        .build();

    session.send_message("hello").await.unwrap();
    assert!(session.turn_limit_alert());
    assert_eq!(
        session.send_message("again").await,
        Err(Rejection::TurnLimitReached(1))
    );
    assert_eq!(session.send_message("").await, Err(Rejection::EmptyInput));
    assert_eq!(session.history().len(), 1);

    session.acknowledge_alert();
    assert!(!session.turn_limit_alert());
    assert!(!session.accepts_input());
}

#[test]
fn test_theme_persisted() {
    let store = Arc::new(MemoryStore::new());
    let session =
        SessionBuilder::with_model_provider(TestModelProvider::default())
            .with_store(Arc::clone(&store))
            .build();
    assert_eq!(session.theme(), Theme::Light);
    assert_eq!(session.toggle_theme(), Theme::Dark);
    assert_eq!(store.get(THEME_KEY).unwrap().as_deref(), Some("dark"));

    let session =
        SessionBuilder::with_model_provider(TestModelProvider::default())
            .with_store(Arc::clone(&store))
            .build();
    assert_eq!(session.theme(), Theme::Dark);
    session.set_theme(Theme::Light);
    assert_eq!(store.get(THEME_KEY).unwrap().as_deref(), Some("light"));
}

#[test]
fn test_malformed_values_fall_back() {
    let store = Arc::new(MemoryStore::new());
    store.set(THEME_KEY, "sepia").unwrap();
    store.set(HISTORY_KEY, "{not a list").unwrap();

    let session =
        SessionBuilder::with_model_provider(TestModelProvider::default())
            .with_store(store)
            .build();
    assert_eq!(session.theme(), Theme::Light);
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn test_broken_store_does_not_interrupt() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_text_response("Still here.");
    let session = SessionBuilder::with_model_provider(model_provider)
        .with_store(BrokenStore)
        .build();

    assert_eq!(session.toggle_theme(), Theme::Dark);
    let turn = session.send_message("hello").await.unwrap();
    assert_eq!(turn.content(), "Still here.");
    assert_eq!(session.history().len(), 1);
}

#[tokio::test]
async fn test_render() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_text_response("**Sure**\n- one\n- *two*");

    let session = SessionBuilder::with_model_provider(model_provider)
        .build();
    session.send_message("list <things>").await.unwrap();
    assert_eq!(
        session.render(),
        vec![
            RenderedTurn {
                role: Role::User,
                html: "list &lt;things&gt;".to_owned(),
            },
            RenderedTurn {
                role: Role::Assistant,
                html: "<strong>Sure</strong><li>• one</li>\
                       <li>• <em>two</em></li>"
                    .to_owned(),
            },
        ]
    );

    let session = SessionBuilder::with_model_provider({
        let mut model_provider = TestModelProvider::default();
        model_provider.add_text_response("*plain*");
        model_provider
    })
    .with_format_options(FormatOptions {
        italics: false,
        lists: true,
    })
    .build();
    session.send_message("hi").await.unwrap();
    assert_eq!(session.render()[1].html, "*plain*");
}

#[tokio::test]
async fn test_callbacks_still_invoked() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_text_response("pong");

    let turns = Arc::new(std::sync::Mutex::new(Vec::new()));
    let session = SessionBuilder::with_model_provider(model_provider)
        .on_turn({
            let turns = Arc::clone(&turns);
            move |turn| turns.lock().unwrap().push(turn.role())
        })
        .build();
    session.send_message("ping").await.unwrap();
    assert_eq!(*turns.lock().unwrap(), vec![Role::User, Role::Assistant]);
    assert_eq!(session.history(), vec![Turn::new(Role::User, "ping")]);
}
