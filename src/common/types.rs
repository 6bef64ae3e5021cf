use serde::{Deserialize, Serialize};

/// Stable identity issued by the store's auth endpoint. The session token is
/// persisted locally so the same device resolves to the same user id on the
/// next run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
    pub session: String,
}

/// A single direct message. The id is the document id, not a stored field;
/// the timestamp is sender-clock milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(skip)]
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub text: String,
    pub timestamp: i64,
}

/// Profile record at `users/{id}`. Absence means the identity never finished
/// onboarding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub nickname: String,
}

/// Last-write-wins composition flag at `typing/{id}`. Overwritten in place,
/// never appended, never expired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingSignal {
    pub user_id: String,
    pub is_typing: bool,
}

/// Sidebar entry, derived from message history rather than persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub user_id: String,
    pub nickname: String,
}

/// Display fallback when an identity has no profile record.
pub fn short_id(user_id: &str) -> String {
    user_id.chars().take(8).collect()
}
