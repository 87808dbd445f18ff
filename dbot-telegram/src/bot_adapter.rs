//! Wraps teloxide::Bot and implements [`dbot_core::Bot`].

use async_trait::async_trait;
use dbot_core::{Bot as CoreBot, Chat, DbotError, Result};
use teloxide::{prelude::*, types::ChatId};
use tracing::error;

/// One Telegram bot identity sending through the Bot API.
pub struct TelegramBotAdapter {
    bot: teloxide::Bot,
}

impl TelegramBotAdapter {
    pub fn new(bot: teloxide::Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl CoreBot for TelegramBotAdapter {
    async fn send_message(&self, chat: &Chat, text: &str) -> Result<()> {
        self.bot
            .send_message(ChatId(chat.id), text.to_string())
            .await
            .map_err(|e| {
                error!(chat_id = chat.id, error = %e, "Telegram send failed");
                DbotError::Bot(e.to_string())
            })?;
        Ok(())
    }
}
