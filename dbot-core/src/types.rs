//! Core types: user, chat, message, handler response, and Handler trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Sender identity. `is_bot` distinguishes other dialogue bots from humans in the group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub is_bot: bool,
    pub username: Option<String>,
    pub first_name: Option<String>,
}

impl User {
    /// Best human-readable label: first name, then username, then the numeric id.
    pub fn display_name(&self) -> String {
        self.first_name
            .clone()
            .or_else(|| self.username.clone())
            .unwrap_or_else(|| self.id.to_string())
    }
}

/// Chat (group or private) identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub chat_type: String,
}

/// A single text message observed in a chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub user: User,
    pub chat: Chat,
    pub content: String,
}

/// Handler result. `Reply(text)` carries the text that was sent so `after()` can see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerResponse {
    /// Stop processing; no response body.
    Stop,
    /// The message was deliberately not answered.
    Ignore,
    /// A reply was produced and sent.
    Reply(String),
}

/// Converts a transport-specific user type to core [`User`].
pub trait ToCoreUser: Send + Sync {
    fn to_core(&self) -> User;
}

/// Converts a transport-specific message type to core [`Message`].
pub trait ToCoreMessage: Send + Sync {
    fn to_core(&self) -> Message;
}

/// Message handler with optional before / handle / after phases.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Runs before `handle`. Return false to skip the message.
    async fn before(&self, _message: &Message) -> crate::error::Result<bool> {
        Ok(true)
    }
    async fn handle(&self, message: &Message) -> crate::error::Result<HandlerResponse>;
    /// Runs after `handle` with its response.
    async fn after(
        &self,
        _message: &Message,
        _response: &HandlerResponse,
    ) -> crate::error::Result<()> {
        Ok(())
    }
}

/// Runs one handler through its three phases. Returns `Stop` when `before` declines.
pub async fn run_handler(handler: &dyn Handler, message: &Message) -> crate::error::Result<HandlerResponse> {
    if !handler.before(message).await? {
        return Ok(HandlerResponse::Stop);
    }
    let response = handler.handle(message).await?;
    handler.after(message, &response).await?;
    Ok(response)
}
