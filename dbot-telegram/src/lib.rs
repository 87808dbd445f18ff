//! # dbot-telegram
//!
//! Telegram layer for the dialogue bots: teloxide adapters, [`dbot_core::Bot`] implementation,
//! multi-bot config, and the runner that polls every bot against one shared coordinator.

mod adapters;
mod bot_adapter;
mod config;
mod runner;

pub use adapters::{TelegramMessageWrapper, TelegramUserWrapper};
pub use bot_adapter::TelegramBotAdapter;
pub use config::{BotSpec, DialogueBotsConfig, DEFAULT_LOG_FILE, DEFAULT_ROLE};
pub use runner::{run_dialogue_bots, BotFleet, FleetMember};
