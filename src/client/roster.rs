use std::collections::BTreeSet;

use crate::common::{ChatMessage, RosterEntry, UserProfile, short_id};
use crate::store::{RealtimeStore, StoreError, StorePaths};

/// One-shot scan of the whole message collection: every identity that ever
/// sent or received a message, minus the viewer, resolved to a display
/// name. Deliberately not a live view; callers re-run it after onboarding,
/// nickname changes, and explicit refreshes only.
pub async fn build(
    store: &dyn RealtimeStore,
    paths: &StorePaths,
    viewer: &str,
) -> Result<Vec<RosterEntry>, StoreError> {
    let documents = store.list_documents(&paths.messages()).await?;

    let mut ids = BTreeSet::new();
    for document in &documents {
        match document.decode::<ChatMessage>() {
            Ok(message) => {
                ids.insert(message.sender_id);
                ids.insert(message.receiver_id);
            }
            Err(err) => log::debug!("Skipping unreadable message document: {err}"),
        }
    }
    ids.remove(viewer);

    let mut roster = Vec::with_capacity(ids.len());
    for user_id in ids {
        let nickname = resolve_nickname(store, paths, &user_id).await;
        roster.push(RosterEntry { user_id, nickname });
    }
    Ok(roster)
}

/// Profile lookup with the truncated-id fallback; lookup failures degrade to
/// the fallback too instead of surfacing.
pub async fn resolve_nickname(
    store: &dyn RealtimeStore,
    paths: &StorePaths,
    user_id: &str,
) -> String {
    match store.get_document(&paths.user(user_id)).await {
        Ok(Some(document)) => match document.decode::<UserProfile>() {
            Ok(profile) => profile.nickname,
            Err(err) => {
                log::warn!("Unreadable profile for {user_id}: {err}");
                short_id(user_id)
            }
        },
        Ok(None) => short_id(user_id),
        Err(err) => {
            log::warn!("Profile lookup failed for {user_id}: {err}");
            short_id(user_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::store::MemoryStore;

    use super::*;

    fn paths() -> StorePaths {
        StorePaths::new("t")
    }

    async fn seed_message(store: &MemoryStore, sender: &str, receiver: &str) {
        store
            .add_document(
                &paths().messages(),
                json!({
                    "senderId": sender,
                    "receiverId": receiver,
                    "text": "hello",
                    "timestamp": 1_000,
                }),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn collects_distinct_correspondents_without_self() {
        let store = MemoryStore::new();
        seed_message(&store, "u1", "u2").await;
        seed_message(&store, "u2", "u1").await;
        seed_message(&store, "u3", "u1").await;
        store
            .set_document(&paths().user("u2"), json!({"nickname": "Bob"}), false)
            .await
            .unwrap();

        let roster = build(&store, &paths(), "u1").await.unwrap();
        let entries: Vec<(&str, &str)> = roster
            .iter()
            .map(|entry| (entry.user_id.as_str(), entry.nickname.as_str()))
            .collect();
        assert_eq!(entries, [("u2", "Bob"), ("u3", "u3")]);
    }

    #[tokio::test]
    async fn truncates_long_ids_without_profile() {
        let store = MemoryStore::new();
        seed_message(&store, "abcdefghijklmnop", "u1").await;

        let roster = build(&store, &paths(), "u1").await.unwrap();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].nickname, "abcdefgh");
    }

    #[tokio::test]
    async fn empty_history_means_empty_roster() {
        let store = MemoryStore::new();
        let roster = build(&store, &paths(), "u1").await.unwrap();
        assert!(roster.is_empty());
    }
}
