use crate::common::{ChatMessage, ClientEvent, RosterEntry, short_id};

use super::theme::Theme;

/// Local UI state. Mutated only from client events and widget interactions,
/// all on the UI thread.
pub struct AppState {
    pub my_id: Option<String>,
    pub nickname: Option<String>,
    pub auth_error: Option<String>,
    pub needs_nickname: bool,
    pub nickname_input: String,
    pub roster: Vec<RosterEntry>,
    pub selected: Option<String>,
    pub correspondent_nickname: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub typing: bool,
    pub input_text: String,
    pub theme: Theme,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            my_id: None,
            nickname: None,
            auth_error: None,
            needs_nickname: false,
            nickname_input: String::new(),
            roster: Vec::new(),
            selected: None,
            correspondent_nickname: None,
            messages: Vec::new(),
            typing: false,
            input_text: String::new(),
            theme: Theme::default(),
        }
    }

    pub fn apply_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::IdentityReady { user_id } => self.my_id = Some(user_id),
            ClientEvent::AuthFailed { reason } => self.auth_error = Some(reason),
            ClientEvent::ProfileLoaded { nickname } => {
                self.nickname = Some(nickname);
                self.needs_nickname = false;
            }
            ClientEvent::NicknameRequired => self.needs_nickname = true,
            ClientEvent::NicknameSaved { nickname } => {
                self.nickname = Some(nickname);
                self.needs_nickname = false;
            }
            ClientEvent::RosterUpdated(entries) => self.roster = entries,
            ClientEvent::ConversationUpdated {
                correspondent,
                messages,
            } => {
                // Guard against a snapshot that raced a selection change.
                if self.selected.as_deref() == Some(correspondent.as_str()) {
                    self.messages = messages;
                }
            }
            ClientEvent::CorrespondentResolved { user_id, nickname } => {
                if self.selected.as_deref() == Some(user_id.as_str()) {
                    self.correspondent_nickname = Some(nickname);
                }
            }
            ClientEvent::TypingChanged(typing) => self.typing = typing,
            ClientEvent::ConversationCleared => {
                self.messages.clear();
                self.typing = false;
            }
        }
    }

    /// Clears conversation state the moment a new correspondent is picked so
    /// nothing from the previous one survives the switch window.
    pub fn begin_selection(&mut self, user_id: &str) {
        self.selected = Some(user_id.to_string());
        self.messages.clear();
        self.typing = false;
        self.correspondent_nickname = self
            .roster
            .iter()
            .find(|entry| entry.user_id == user_id)
            .map(|entry| entry.nickname.clone());
    }

    pub fn onboarded(&self) -> bool {
        self.nickname.is_some()
    }

    pub fn conversation_title(&self) -> Option<String> {
        self.correspondent_nickname
            .clone()
            .or_else(|| self.selected.as_deref().map(short_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_conversation_updates_are_ignored() {
        let mut state = AppState::new();
        state.roster = vec![RosterEntry {
            user_id: "u2".into(),
            nickname: "Bob".into(),
        }];
        state.begin_selection("u2");

        state.apply_event(ClientEvent::ConversationUpdated {
            correspondent: "u3".into(),
            messages: vec![ChatMessage {
                id: "m1".into(),
                sender_id: "u3".into(),
                receiver_id: "u1".into(),
                text: "stale".into(),
                timestamp: 1,
            }],
        });
        assert!(state.messages.is_empty());

        state.apply_event(ClientEvent::ConversationUpdated {
            correspondent: "u2".into(),
            messages: Vec::new(),
        });
        assert!(state.messages.is_empty());
        assert_eq!(state.conversation_title().as_deref(), Some("Bob"));
    }

    #[test]
    fn selection_resets_conversation_state() {
        let mut state = AppState::new();
        state.typing = true;
        state.messages.push(ChatMessage {
            id: "m1".into(),
            sender_id: "u2".into(),
            receiver_id: "u1".into(),
            text: "old".into(),
            timestamp: 1,
        });

        state.begin_selection("u3");
        assert!(state.messages.is_empty());
        assert!(!state.typing);
        assert_eq!(state.conversation_title().as_deref(), Some("u3"));
    }
}
