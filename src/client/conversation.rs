use crate::common::{ChatMessage, TypingSignal};

/// Derives the two-party view from the full message collection: keep the
/// messages exchanged between `viewer` and `correspondent` in either
/// direction, oldest first. The sort is stable, so duplicate timestamps keep
/// their snapshot order.
pub fn conversation_view(
    all: &[ChatMessage],
    viewer: &str,
    correspondent: &str,
) -> Vec<ChatMessage> {
    let mut view: Vec<ChatMessage> = all
        .iter()
        .filter(|message| {
            (message.sender_id == viewer && message.receiver_id == correspondent)
                || (message.sender_id == correspondent && message.receiver_id == viewer)
        })
        .cloned()
        .collect();
    view.sort_by_key(|message| message.timestamp);
    view
}

/// The indicator shows only for a live flag owned by someone other than the
/// viewer. A crashed composer can leave its flag set forever; the record
/// carries no timestamp, so there is nothing to expire against.
pub fn typing_indicator(signal: Option<&TypingSignal>, viewer: &str) -> bool {
    signal.is_some_and(|signal| signal.is_typing && signal.user_id != viewer)
}
