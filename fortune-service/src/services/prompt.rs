//! Prompt assembly for the fortune-reading persona.

use crate::models::{ChatMessage, FortuneLot};

/// Number of prior turns forwarded to the model.
pub const HISTORY_WINDOW: usize = 10;

/// Render the system prompt for a conversation about `lot`.
pub fn build_prompt(lot: &FortuneLot) -> String {
    format!(
        "You are a kind and experienced temple interpreter of Guan Yin fortune lots. \
A visitor has just drawn the lot below and wants to talk about it.

Lot: {number} ({level}) {title}
Poem:
{poem}
Story: {story}
Meaning: {meaning}
Explanation: {explanation}

Guidelines:
- Ground every answer in this lot's poem, meaning and explanation.
- Relate the lot to the visitor's own question and circumstances.
- Be warm and encouraging, and offer practical suggestions.
- Do not make absolute predictions about health, law or money; suggest professional help where it matters.
- Keep answers concise, and reply in the language the visitor writes in.",
        number = lot.number,
        level = lot.level,
        title = lot.title,
        poem = lot.poem,
        story = if lot.story.is_empty() { "-" } else { lot.story.as_str() },
        meaning = lot.meaning,
        explanation = lot.explanation,
    )
}

/// System prompt, then the most recent [`HISTORY_WINDOW`] history entries,
/// then the new user message.
pub fn build_messages(
    lot: &FortuneLot,
    history: &[ChatMessage],
    message: &str,
) -> Vec<ChatMessage> {
    let recent = &history[history.len().saturating_sub(HISTORY_WINDOW)..];

    let mut messages = Vec::with_capacity(recent.len() + 2);
    messages.push(ChatMessage::system(build_prompt(lot)));
    messages.extend_from_slice(recent);
    messages.push(ChatMessage::user(message));
    messages
}
