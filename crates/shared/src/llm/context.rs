use crate::models::{ChatMessage, Message, Role};

use super::prompts::system_prompt;

/// Most recent stored entries forwarded with each request.
pub const HISTORY_WINDOW: usize = 10;

/// Builds the outbound message list for one turn.
///
/// `history` is the log as it stood before the new user entry was appended,
/// so the new input is only ever sent once, as the trailing `user` message.
/// The result always has `1 + min(HISTORY_WINDOW, history.len()) + 1` entries.
pub fn assemble_messages(history: &[Message], reference_text: &str, input: &str) -> Vec<ChatMessage> {
    let window_start = history.len().saturating_sub(HISTORY_WINDOW);
    let window = &history[window_start..];

    let mut messages = Vec::with_capacity(window.len() + 2);
    messages.push(ChatMessage::new(Role::System, system_prompt(reference_text)));
    messages.extend(window.iter().map(ChatMessage::from));
    messages.push(ChatMessage::new(Role::User, input));
    messages
}
