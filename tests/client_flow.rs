use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::timeout;

use duochat::client::{ChatClient, ClientSettings};
use duochat::common::{ClientCommand, ClientEvent};
use duochat::store::{MemoryStore, RealtimeStore, StorePaths};

fn paths() -> StorePaths {
    StorePaths::new("t")
}

struct Harness {
    commands: mpsc::Sender<ClientCommand>,
    events: mpsc::Receiver<ClientEvent>,
}

impl Harness {
    async fn next_event(&mut self) -> ClientEvent {
        timeout(Duration::from_secs(2), self.events.recv())
            .await
            .expect("timed out waiting for a client event")
            .expect("client event channel closed")
    }

    async fn wait_for(&mut self, predicate: impl Fn(&ClientEvent) -> bool) -> ClientEvent {
        loop {
            let event = self.next_event().await;
            if predicate(&event) {
                return event;
            }
        }
    }

    async fn send(&self, command: ClientCommand) {
        self.commands
            .send(command)
            .await
            .expect("client command channel closed");
    }

    async fn expect_silence(&mut self, window: Duration) {
        if let Ok(Some(event)) = timeout(window, self.events.recv()).await {
            panic!("expected no further events, got {event:?}");
        }
    }
}

/// Spawns a client signed in as `user` against the shared store. The token
/// credential pins the identity so tests can seed documents for it.
fn spawn_client(store: &MemoryStore, user: &str) -> Harness {
    let (command_sender, command_receiver) = mpsc::channel(16);
    let (event_sender, event_receiver) = mpsc::channel(64);

    let settings = ClientSettings {
        paths: paths(),
        data_dir: std::env::temp_dir().join(format!("duochat-test-{}", uuid::Uuid::new_v4())),
        auth_token: Some(user.to_string()),
    };
    let client = ChatClient::new(
        Arc::new(store.clone()),
        settings,
        command_receiver,
        event_sender,
    );
    tokio::spawn(client.run());

    Harness {
        commands: command_sender,
        events: event_receiver,
    }
}

async fn seed_profile(store: &MemoryStore, user: &str, nickname: &str) {
    store
        .set_document(&paths().user(user), json!({ "nickname": nickname }), false)
        .await
        .unwrap();
}

async fn seed_message(store: &MemoryStore, sender: &str, receiver: &str, text: &str, ts: i64) {
    store
        .add_document(
            &paths().messages(),
            json!({
                "senderId": sender,
                "receiverId": receiver,
                "text": text,
                "timestamp": ts,
            }),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn new_identity_onboards_through_the_nickname_flow() {
    let store = MemoryStore::new();
    let mut harness = spawn_client(&store, "u1");

    harness
        .wait_for(|event| matches!(event, ClientEvent::IdentityReady { user_id } if user_id == "u1"))
        .await;
    harness
        .wait_for(|event| matches!(event, ClientEvent::NicknameRequired))
        .await;

    harness
        .send(ClientCommand::SetNickname("Alice".into()))
        .await;
    harness
        .wait_for(
            |event| matches!(event, ClientEvent::NicknameSaved { nickname } if nickname == "Alice"),
        )
        .await;
    harness
        .wait_for(|event| matches!(event, ClientEvent::RosterUpdated(_)))
        .await;

    let profile = store
        .get_document(&paths().user("u1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(profile.fields, json!({ "nickname": "Alice" }));
}

#[tokio::test]
async fn returning_identity_resumes_with_its_profile() {
    let store = MemoryStore::new();
    seed_profile(&store, "u1", "Alice").await;
    seed_message(&store, "u2", "u1", "hello", 500).await;
    seed_profile(&store, "u2", "Bob").await;

    let mut harness = spawn_client(&store, "u1");
    harness
        .wait_for(
            |event| matches!(event, ClientEvent::ProfileLoaded { nickname } if nickname == "Alice"),
        )
        .await;

    let roster = harness
        .wait_for(|event| matches!(event, ClientEvent::RosterUpdated(_)))
        .await;
    let ClientEvent::RosterUpdated(entries) = roster else {
        unreachable!();
    };
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].user_id, "u2");
    assert_eq!(entries[0].nickname, "Bob");
}

#[tokio::test]
async fn selection_is_inert_before_onboarding() {
    let store = MemoryStore::new();
    seed_message(&store, "u2", "u3", "unrelated", 100).await;

    let mut harness = spawn_client(&store, "u1");
    harness
        .wait_for(|event| matches!(event, ClientEvent::NicknameRequired))
        .await;

    harness
        .send(ClientCommand::SelectCorrespondent(Some("u2".into())))
        .await;
    harness
        .send(ClientCommand::SubmitMessage("too early".into()))
        .await;
    harness.send(ClientCommand::RefreshRoster).await;

    // The roster answer arrives, and nothing conversation-shaped does.
    harness
        .wait_for(|event| matches!(event, ClientEvent::RosterUpdated(_)))
        .await;
    harness.expect_silence(Duration::from_millis(200)).await;

    let messages = store.list_documents(&paths().messages()).await.unwrap();
    assert_eq!(messages.len(), 1, "the early submit must not have landed");
}

#[tokio::test]
async fn alice_sends_hi_to_bob() {
    let store = MemoryStore::new();
    seed_profile(&store, "u1", "Alice").await;
    seed_profile(&store, "u2", "Bob").await;
    seed_message(&store, "u2", "u1", "earlier", 500).await;

    let mut harness = spawn_client(&store, "u1");
    harness
        .wait_for(|event| matches!(event, ClientEvent::RosterUpdated(_)))
        .await;

    harness
        .send(ClientCommand::SelectCorrespondent(Some("u2".into())))
        .await;
    let initial = harness
        .wait_for(|event| matches!(event, ClientEvent::ConversationUpdated { .. }))
        .await;
    let ClientEvent::ConversationUpdated { messages, .. } = initial else {
        unreachable!();
    };
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].text, "earlier");

    harness
        .wait_for(|event| {
            matches!(event, ClientEvent::CorrespondentResolved { nickname, .. } if nickname == "Bob")
        })
        .await;

    harness.send(ClientCommand::SubmitMessage("hi".into())).await;
    let updated = harness
        .wait_for(|event| {
            matches!(event, ClientEvent::ConversationUpdated { messages, .. } if messages.len() == 2)
        })
        .await;
    let ClientEvent::ConversationUpdated { messages, .. } = updated else {
        unreachable!();
    };
    assert_eq!(messages[1].sender_id, "u1");
    assert_eq!(messages[1].receiver_id, "u2");
    assert_eq!(messages[1].text, "hi");
    assert!(messages[1].timestamp >= messages[0].timestamp);
}

#[tokio::test]
async fn duplicate_submissions_create_distinct_documents() {
    let store = MemoryStore::new();
    seed_profile(&store, "u1", "Alice").await;
    seed_profile(&store, "u2", "Bob").await;
    seed_message(&store, "u2", "u1", "earlier", 500).await;

    let mut harness = spawn_client(&store, "u1");
    harness
        .wait_for(|event| matches!(event, ClientEvent::RosterUpdated(_)))
        .await;
    harness
        .send(ClientCommand::SelectCorrespondent(Some("u2".into())))
        .await;

    harness
        .send(ClientCommand::SubmitMessage("again".into()))
        .await;
    harness
        .send(ClientCommand::SubmitMessage("again".into()))
        .await;

    let settled = harness
        .wait_for(|event| {
            matches!(event, ClientEvent::ConversationUpdated { messages, .. } if messages.len() == 3)
        })
        .await;
    let ClientEvent::ConversationUpdated { messages, .. } = settled else {
        unreachable!();
    };
    assert_eq!(messages[1].text, "again");
    assert_eq!(messages[2].text, "again");
    assert_ne!(messages[1].id, messages[2].id);
}

#[tokio::test]
async fn typing_indicator_tracks_the_correspondent_flag() {
    let store = MemoryStore::new();
    seed_profile(&store, "u1", "Alice").await;
    seed_profile(&store, "u2", "Bob").await;
    seed_message(&store, "u2", "u1", "earlier", 500).await;

    let mut harness = spawn_client(&store, "u1");
    harness
        .wait_for(|event| matches!(event, ClientEvent::RosterUpdated(_)))
        .await;
    harness
        .send(ClientCommand::SelectCorrespondent(Some("u2".into())))
        .await;
    harness
        .wait_for(|event| matches!(event, ClientEvent::TypingChanged(false)))
        .await;

    store
        .set_document(
            &paths().typing("u2"),
            json!({ "userId": "u2", "isTyping": true }),
            true,
        )
        .await
        .unwrap();
    harness
        .wait_for(|event| matches!(event, ClientEvent::TypingChanged(true)))
        .await;

    store
        .set_document(
            &paths().typing("u2"),
            json!({ "userId": "u2", "isTyping": false }),
            true,
        )
        .await
        .unwrap();
    // The flip back must not disturb the message list on the way.
    loop {
        match harness.next_event().await {
            ClientEvent::TypingChanged(false) => break,
            ClientEvent::ConversationUpdated { .. } => {
                panic!("typing flip must not touch the message list")
            }
            _ => {}
        }
    }
}

#[tokio::test]
async fn typing_record_owned_by_the_viewer_never_surfaces() {
    let store = MemoryStore::new();
    seed_profile(&store, "u1", "Alice").await;
    seed_profile(&store, "u2", "Bob").await;
    seed_message(&store, "u2", "u1", "earlier", 500).await;

    let mut harness = spawn_client(&store, "u1");
    harness
        .wait_for(|event| matches!(event, ClientEvent::RosterUpdated(_)))
        .await;
    harness
        .send(ClientCommand::SelectCorrespondent(Some("u2".into())))
        .await;
    harness
        .wait_for(|event| matches!(event, ClientEvent::TypingChanged(false)))
        .await;

    // A flag at the correspondent's path but owned by the viewer is
    // self-echo and must stay suppressed.
    store
        .set_document(
            &paths().typing("u2"),
            json!({ "userId": "u1", "isTyping": true }),
            false,
        )
        .await
        .unwrap();
    let event = harness
        .wait_for(|event| matches!(event, ClientEvent::TypingChanged(_)))
        .await;
    assert_eq!(event, ClientEvent::TypingChanged(false));
}

#[tokio::test]
async fn rapid_switch_leaves_no_residue_from_the_first_pick() {
    let store = MemoryStore::new();
    seed_profile(&store, "u1", "Alice").await;
    seed_profile(&store, "u2", "Bob").await;
    seed_profile(&store, "u3", "Carol").await;
    seed_message(&store, "u2", "u1", "from bob", 100).await;
    seed_message(&store, "u3", "u1", "from carol", 200).await;

    let mut harness = spawn_client(&store, "u1");
    harness
        .wait_for(|event| matches!(event, ClientEvent::RosterUpdated(_)))
        .await;

    harness
        .send(ClientCommand::SelectCorrespondent(Some("u2".into())))
        .await;
    harness
        .send(ClientCommand::SelectCorrespondent(Some("u3".into())))
        .await;

    let first_for_carol = harness
        .wait_for(|event| {
            matches!(event, ClientEvent::ConversationUpdated { correspondent, .. } if correspondent == "u3")
        })
        .await;
    let ClientEvent::ConversationUpdated { messages, .. } = first_for_carol else {
        unreachable!();
    };
    assert!(messages.iter().all(|m| m.sender_id == "u3" || m.receiver_id == "u3"));

    // Once Carol's view has landed, nothing from Bob's conversation may
    // follow.
    let residue = timeout(Duration::from_millis(200), async {
        loop {
            if let Some(ClientEvent::ConversationUpdated { correspondent, .. }) =
                harness.events.recv().await
            {
                if correspondent == "u2" {
                    return;
                }
            }
        }
    })
    .await;
    assert!(residue.is_err(), "stale conversation delivered after switch");
}

#[tokio::test]
async fn deselection_clears_the_conversation() {
    let store = MemoryStore::new();
    seed_profile(&store, "u1", "Alice").await;
    seed_profile(&store, "u2", "Bob").await;
    seed_message(&store, "u2", "u1", "earlier", 500).await;

    let mut harness = spawn_client(&store, "u1");
    harness
        .wait_for(|event| matches!(event, ClientEvent::RosterUpdated(_)))
        .await;
    harness
        .send(ClientCommand::SelectCorrespondent(Some("u2".into())))
        .await;
    harness
        .wait_for(|event| matches!(event, ClientEvent::ConversationUpdated { .. }))
        .await;

    harness.send(ClientCommand::SelectCorrespondent(None)).await;
    harness
        .wait_for(|event| matches!(event, ClientEvent::ConversationCleared))
        .await;

    // A message written after deselection must not produce a view update.
    seed_message(&store, "u2", "u1", "after teardown", 900).await;
    let update = timeout(Duration::from_millis(200), async {
        loop {
            if let Some(ClientEvent::ConversationUpdated { .. }) = harness.events.recv().await {
                return;
            }
        }
    })
    .await;
    assert!(update.is_err(), "subscription survived teardown");
}
