pub mod commands;
pub mod events;
pub mod types;

pub use commands::ClientCommand;
pub use events::ClientEvent;
pub use types::{ChatMessage, Identity, RosterEntry, TypingSignal, UserProfile, short_id};
