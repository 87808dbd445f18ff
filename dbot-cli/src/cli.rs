//! CLI parser and config loading.

use anyhow::Result;
use clap::{Parser, Subcommand};
use dbot_telegram::{BotSpec, DialogueBotsConfig, DEFAULT_ROLE};
use dialogue::{mask_token, DialogueConfig, LlmSettings};

#[derive(Parser)]
#[command(name = "dbot-dialogue")]
#[command(about = "Several Telegram bots holding one paced group conversation", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start every configured bot (config from env; token overrides TELEGRAM_BOT_TOKEN).
    Run {
        #[arg(short, long)]
        token: Option<String>,
    },
    /// Print the resolved configuration with secrets masked.
    CheckConfig,
}

/// Everything `run` needs, loaded from the environment.
pub struct Settings {
    pub dialogue: DialogueConfig,
    pub llm: LlmSettings,
    pub bots: DialogueBotsConfig,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.dialogue.validate()?;
        self.bots.validate()
    }

    pub fn describe(&self) -> Vec<String> {
        let mut lines = self.bots.describe();
        lines.push(format!(
            "llm: base_url={} model={} api_key={}",
            self.llm.base_url,
            self.llm.default_model,
            mask_token(&self.llm.api_key)
        ));
        lines.push(format!(
            "dialogue: message_timeout={}s max_history={} auxiliary_cooldown={}s pacing_retry={}",
            self.dialogue.message_timeout.as_secs(),
            self.dialogue.max_history,
            self.dialogue.auxiliary_cooldown.as_secs(),
            self.dialogue.pacing_retry
        ));
        lines
    }
}

/// Load all settings from the environment. `token` replaces the first bot's token.
pub fn load_settings(token: Option<String>) -> Result<Settings> {
    let mut bots = DialogueBotsConfig::from_env()?;
    if let Some(token) = token {
        match bots.bots.first_mut() {
            Some(first) => first.token = token,
            None => bots.bots.push(BotSpec {
                token,
                name: None,
                role: DEFAULT_ROLE.to_string(),
                model: None,
                system_prompt: None,
            }),
        }
    }
    Ok(Settings {
        dialogue: DialogueConfig::from_env()?,
        llm: LlmSettings::from_env()?,
        bots,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    fn test_parse_commands() {
        let cli = Cli::try_parse_from(["dbot-dialogue", "run", "--token", "1:abc"]).unwrap();
        assert!(matches!(cli.command, Commands::Run { token: Some(ref t) } if t == "1:abc"));

        let cli = Cli::try_parse_from(["dbot-dialogue", "check-config"]).unwrap();
        assert!(matches!(cli.command, Commands::CheckConfig));

        assert!(Cli::try_parse_from(["dbot-dialogue", "load"]).is_err());
    }

    /// **Test: a CLI token replaces the first bot's token, or becomes the only bot.**
    #[test]
    #[serial]
    fn test_token_override() {
        env::remove_var("TELEGRAM_BOT_TOKEN");
        env::remove_var("TELEGRAM_BOT_TOKEN2");
        env::set_var("OPENAI_API_KEY", "sk-test-key-1234567890");

        let settings = load_settings(Some("9:override".to_string())).unwrap();
        assert_eq!(settings.bots.bots.len(), 1);
        assert_eq!(settings.bots.bots[0].token, "9:override");
        assert!(settings.validate().is_ok());

        env::set_var("TELEGRAM_BOT_TOKEN", "1:first");
        env::set_var("TELEGRAM_BOT_TOKEN2", "2:second");
        let settings = load_settings(Some("9:override".to_string())).unwrap();
        let tokens: Vec<_> = settings.bots.bots.iter().map(|b| b.token.as_str()).collect();
        assert_eq!(tokens, vec!["9:override", "2:second"]);

        let described = settings.describe().join("\n");
        assert!(described.contains("sk-test***7890"));
        assert!(!described.contains("sk-test-key-1234567890"));

        env::remove_var("TELEGRAM_BOT_TOKEN");
        env::remove_var("TELEGRAM_BOT_TOKEN2");
        env::remove_var("OPENAI_API_KEY");
    }
}
