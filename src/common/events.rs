use super::types::{ChatMessage, RosterEntry};

/// Events the chat client task pushes up to the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    IdentityReady {
        user_id: String,
    },
    /// Fire-once sign-in failed; all data operations stay disabled.
    AuthFailed {
        reason: String,
    },
    /// The identity already has a profile record.
    ProfileLoaded {
        nickname: String,
    },
    /// No profile record exists; the UI must collect a nickname.
    NicknameRequired,
    NicknameSaved {
        nickname: String,
    },
    RosterUpdated(Vec<RosterEntry>),
    /// Freshly derived view of the active conversation, sorted by timestamp.
    ConversationUpdated {
        correspondent: String,
        messages: Vec<ChatMessage>,
    },
    /// Display name for the selected correspondent.
    CorrespondentResolved {
        user_id: String,
        nickname: String,
    },
    TypingChanged(bool),
    /// The active conversation was deselected or replaced; all of its state
    /// is gone as of this event.
    ConversationCleared,
}
