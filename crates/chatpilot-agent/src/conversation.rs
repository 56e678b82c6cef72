//! Conversation window management.

use chatpilot_llm::Message;

/// Keep the last `max_turns` messages.
///
/// A leading tool message would answer a call that is no longer in view, so
/// those are dropped from the front after truncation. `max_turns == 0`
/// disables trimming.
pub fn trim_conversation(messages: Vec<Message>, max_turns: usize) -> Vec<Message> {
    if max_turns == 0 {
        return messages;
    }
    let start = messages.len().saturating_sub(max_turns);
    let mut window = messages.into_iter().skip(start).peekable();
    while window.next_if(Message::is_tool).is_some() {}
    window.collect()
}
