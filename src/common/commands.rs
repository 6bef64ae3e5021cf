/// Commands the UI sends down to the chat client task.
#[derive(Debug, Clone)]
pub enum ClientCommand {
    /// Persist the nickname for the current identity, creating the profile
    /// record if this is first onboarding.
    SetNickname(String),
    /// Switch the active conversation. `None` deselects and tears down the
    /// live subscriptions.
    SelectCorrespondent(Option<String>),
    /// Send a message to the selected correspondent.
    SubmitMessage(String),
    /// Emitted on empty/non-empty transitions of the input buffer.
    SetTyping(bool),
    /// Rebuild the sidebar roster from message history.
    RefreshRoster,
}
