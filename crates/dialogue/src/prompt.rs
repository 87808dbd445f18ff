//! Turns a reply request into chat-completion messages.
//!
//! ## Layout
//!
//! - **System**: the participant's own prompt, or [`DEFAULT_SYSTEM_PROMPT`]
//! - **User**: dialogue context, topic hint, auxiliary hint, then the message being answered

use crate::participant::Participant;
use crate::topics::Topic;

/// Role of a message, one-to-one with OpenAI Chat Completions `role` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A single chat-completion message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Used when a participant was registered without its own system prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly participant in a group chat with other bots. \
Answer in plain text without Markdown, in two or three sentences, and keep the conversation moving.";

/// Prepended to the auxiliary's prompt when it is invited to break a loop or a lull.
pub const AUXILIARY_HINT: &str = "The conversation has stalled. Bring in a fresh fact, recent news, \
or a new angle found through web search, and hand the discussion back to the others.";

/// Everything a [`crate::ReplyGenerator`] needs to produce one reply.
#[derive(Debug, Clone)]
pub struct ReplyRequest {
    pub chat_id: i64,
    pub participant: Participant,
    /// Output of [`crate::DialogueCoordinator::build_context`].
    pub context: String,
    /// The message being answered.
    pub incoming: String,
    pub incoming_from: String,
    pub topics: Vec<Topic>,
    /// True when the auxiliary is speaking because it was invited, not because of turn order.
    pub intervention: bool,
}

/// System message followed by one user message.
pub fn build_messages(request: &ReplyRequest) -> Vec<ChatMessage> {
    let system = request
        .participant
        .system_prompt
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);

    let mut sections: Vec<String> = Vec::new();
    if !request.context.is_empty() {
        sections.push(request.context.clone());
    }
    if !request.topics.is_empty() {
        let topics = request
            .topics
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        sections.push(format!(
            "Topics touched so far: {}. Consider steering somewhere new.",
            topics
        ));
    }
    if request.intervention {
        sections.push(AUXILIARY_HINT.to_string());
    }
    sections.push(format!(
        "You are {}. Reply to {}: {}",
        request.participant.display_name, request.incoming_from, request.incoming
    ));

    vec![
        ChatMessage::system(system),
        ChatMessage::user(sections.join("\n\n")),
    ]
}
