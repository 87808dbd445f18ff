//! Message transport abstraction.
//!
//! [`Bot`] is transport-agnostic; the Telegram implementation lives in `dbot-telegram`.

use crate::error::Result;
use crate::types::Chat;
use async_trait::async_trait;

/// Delivers text into a chat on behalf of one bot identity.
#[async_trait]
pub trait Bot: Send + Sync {
    /// Sends a text message to the given chat.
    async fn send_message(&self, chat: &Chat, text: &str) -> Result<()>;
}
