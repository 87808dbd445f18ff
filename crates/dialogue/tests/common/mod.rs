//! Shared fixtures for dialogue integration tests.

pub mod mock_bot;

use chrono::{DateTime, TimeZone, Utc};
use dbot_core::{Chat, Message, User};

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
}

/// A group message from `user_id`.
pub fn group_message(chat_id: i64, user_id: i64, name: &str, is_bot: bool, content: &str) -> Message {
    Message {
        id: format!("{}-{}", user_id, content.len()),
        user: User {
            id: user_id,
            is_bot,
            username: Some(name.to_lowercase()),
            first_name: Some(name.to_string()),
        },
        chat: Chat {
            id: chat_id,
            chat_type: "supergroup".to_string(),
        },
        content: content.to_string(),
    }
}
