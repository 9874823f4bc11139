//! What part of a conversation reaches the model runtime.
//!
//! Two deterministic policies run before every generation:
//!
//! - **Truncation** keeps only the most recent `k` messages, where `k` comes
//!   from the model's [`ModelClass`](crate::registry::ModelClass). Older
//!   messages are dropped outright.
//! - **Images** are forwarded only from the latest user message, and only
//!   the first one, downsized. Every other image becomes a text placeholder.

pub mod images;

use tracing::warn;

use crate::config::HistoryConfig;
use crate::registry::ModelCapabilities;
use crate::types::{ChatTurn, Message, MessageRole};

/// The last `limit` messages, in their original order.
pub fn truncate(messages: &[Message], limit: usize) -> &[Message] {
    let start = messages.len().saturating_sub(limit);
    &messages[start..]
}

/// Build the turns handed to the runtime from a conversation's history.
///
/// `messages` must not include the assistant placeholder being generated.
pub fn build_turns(
    messages: &[Message],
    model: &ModelCapabilities,
    config: &HistoryConfig,
) -> Vec<ChatTurn> {
    let window = truncate(messages, model.class.history_limit(config));
    let latest_user = window
        .iter()
        .rposition(|message| message.role == MessageRole::User);

    window
        .iter()
        .enumerate()
        .map(|(index, message)| {
            let forward_image = model.supports_images && Some(index) == latest_user;
            build_turn(message, forward_image, config)
        })
        .collect()
}

fn build_turn(message: &Message, forward_image: bool, config: &HistoryConfig) -> ChatTurn {
    let mut turn = ChatTurn::text(message.role, message.content.clone());
    if !message.has_images() {
        return turn;
    }

    if forward_image {
        if let Some(first) = message.attachments.iter().find(|a| a.is_image()) {
            match images::downsize(first, config.max_image_dimension) {
                Ok(image) => turn.images.push(image),
                Err(e) => warn!("Dropping undecodable image on message {}: {}", message.id, e),
            }
        }
    }

    if turn.images.is_empty() {
        append_line(&mut turn.text, &config.image_placeholder);
    } else if turn.text.trim().is_empty() {
        turn.text = config.default_image_prompt.clone();
    }
    turn
}

fn append_line(text: &mut String, line: &str) {
    if !text.trim().is_empty() {
        text.push('\n');
    } else {
        text.clear();
    }
    text.push_str(line);
}
