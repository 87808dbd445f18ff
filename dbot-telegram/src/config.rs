//! Multi-bot Telegram config loaded from the environment.
//!
//! Bots are numbered: `TELEGRAM_BOT_TOKEN`, `TELEGRAM_BOT_TOKEN2`, `TELEGRAM_BOT_TOKEN3`, ...
//! Per-bot settings use the same suffix (`BOT_NAME`, `BOT_NAME2`, ...). Scanning stops at the
//! first missing token.

use anyhow::{bail, Context, Result};
use dialogue::mask_token;
use std::env;

pub const DEFAULT_LOG_FILE: &str = "logs/dbot-dialogue.log";
pub const DEFAULT_ROLE: &str = "chat";

/// One bot identity to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotSpec {
    pub token: String,
    /// Display name; None means the Telegram first name from `get_me`.
    pub name: Option<String>,
    /// Role descriptor; containing "perplexity" makes the bot the web-search auxiliary.
    pub role: String,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
}

/// All bots plus the shared Telegram settings.
#[derive(Debug, Clone)]
pub struct DialogueBotsConfig {
    pub bots: Vec<BotSpec>,
    /// Chats the bots may talk in; empty allows every chat.
    pub group_ids: Vec<i64>,
    pub telegram_api_url: Option<String>,
    pub log_file: String,
}

fn suffix(n: usize) -> String {
    if n == 1 {
        String::new()
    } else {
        n.to_string()
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_group_ids(raw: &str) -> Result<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .with_context(|| format!("Invalid chat id in TELEGRAM_GROUP_IDS: {}", s))
        })
        .collect()
}

impl DialogueBotsConfig {
    pub fn from_env() -> Result<Self> {
        let mut bots: Vec<BotSpec> = Vec::new();
        for n in 1.. {
            let sfx = suffix(n);
            let Some(token) = non_empty(&format!("TELEGRAM_BOT_TOKEN{}", sfx)) else {
                break;
            };
            if bots.iter().any(|b| b.token == token) {
                continue;
            }
            bots.push(BotSpec {
                token,
                name: non_empty(&format!("BOT_NAME{}", sfx)),
                role: non_empty(&format!("BOT_ROLE{}", sfx))
                    .unwrap_or_else(|| DEFAULT_ROLE.to_string()),
                model: non_empty(&format!("BOT_MODEL{}", sfx)),
                system_prompt: non_empty(&format!("BOT_SYSTEM_PROMPT{}", sfx)),
            });
        }

        let group_ids = match non_empty("TELEGRAM_GROUP_IDS") {
            Some(raw) => parse_group_ids(&raw)?,
            None => Vec::new(),
        };
        let telegram_api_url =
            non_empty("TELEGRAM_API_URL").or_else(|| non_empty("TELOXIDE_API_URL"));
        let log_file = non_empty("LOG_FILE").unwrap_or_else(|| DEFAULT_LOG_FILE.to_string());

        Ok(Self {
            bots,
            group_ids,
            telegram_api_url,
            log_file,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.bots.is_empty() {
            bail!("No bots configured: set TELEGRAM_BOT_TOKEN (and TELEGRAM_BOT_TOKEN2, ...)");
        }
        if let Some(ref url) = self.telegram_api_url {
            reqwest::Url::parse(url)
                .with_context(|| format!("Invalid TELEGRAM_API_URL: {}", url))?;
        }
        Ok(())
    }

    /// True when bots may take part in `chat_id`.
    pub fn allows_chat(&self, chat_id: i64) -> bool {
        self.group_ids.is_empty() || self.group_ids.contains(&chat_id)
    }

    /// Human-readable summary with tokens masked.
    pub fn describe(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .bots
            .iter()
            .enumerate()
            .map(|(i, bot)| {
                format!(
                    "bot {}: token={} name={} role={} model={}",
                    i + 1,
                    mask_token(&bot.token),
                    bot.name.as_deref().unwrap_or("(from Telegram)"),
                    bot.role,
                    bot.model.as_deref().unwrap_or("(default)"),
                )
            })
            .collect();
        lines.push(if self.group_ids.is_empty() {
            "groups: all".to_string()
        } else {
            format!("groups: {:?}", self.group_ids)
        });
        lines.push(format!(
            "telegram api: {}",
            self.telegram_api_url.as_deref().unwrap_or("(default)")
        ));
        lines.push(format!("log file: {}", self.log_file));
        lines
    }
}
