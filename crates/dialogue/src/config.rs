//! Dialogue tunables. Defaults match the production pacing; every value can be overridden from env.

use anyhow::Result;
use std::env;
use std::time::Duration;

/// Pacing and heuristic thresholds for the [`crate::DialogueCoordinator`].
#[derive(Debug, Clone, PartialEq)]
pub struct DialogueConfig {
    /// Minimum gap before a participant answers the previous speaker (DIALOGUE_MESSAGE_TIMEOUT_SECS).
    pub message_timeout: Duration,
    /// Share of `message_timeout` a third party must wait before joining an exchange.
    pub third_party_factor: f64,
    /// Turns kept per chat (DIALOGUE_MAX_HISTORY).
    pub max_history: usize,
    /// Minimum gap between two auxiliary interventions (DIALOGUE_AUXILIARY_COOLDOWN_SECS).
    pub auxiliary_cooldown: Duration,
    /// Turns required before the auxiliary may be invited (DIALOGUE_MIN_MESSAGES_BEFORE).
    pub min_messages_before: usize,
    /// Turns rendered by `build_context` (DIALOGUE_CONTEXT_WINDOW).
    pub context_window: usize,
    /// The instruction block is prepended once the rendered window holds more turns than this.
    pub context_instruction_threshold: usize,
    /// Turns inspected by the loop detector (DIALOGUE_LOOP_WINDOW).
    pub loop_window: usize,
    /// Below this many turns the loop detector never fires.
    pub loop_min_history: usize,
    /// Turns shorter than this many characters count as low-effort (DIALOGUE_STAGNATION_MAX_CHARS).
    pub stagnation_max_chars: usize,
    /// Number of trailing turns that must all be short (DIALOGUE_STAGNATION_WINDOW).
    pub stagnation_window: usize,
    /// Turns inspected by topic extraction.
    pub topic_window: usize,
    /// Display name recorded for speakers that were never registered.
    pub unknown_speaker_name: String,
    /// Whether a handler re-evaluates once after a pacing refusal (DIALOGUE_PACING_RETRY).
    pub pacing_retry: bool,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            message_timeout: Duration::from_secs(180),
            third_party_factor: 0.8,
            max_history: 15,
            auxiliary_cooldown: Duration::from_secs(180),
            min_messages_before: 2,
            context_window: 10,
            context_instruction_threshold: 3,
            loop_window: 4,
            loop_min_history: 3,
            stagnation_max_chars: 50,
            stagnation_window: 3,
            topic_window: 5,
            unknown_speaker_name: "Bot".to_string(),
            pacing_retry: true,
        }
    }
}

impl DialogueConfig {
    /// Load from environment variables; unset or unparsable values fall back to defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            message_timeout: env_secs("DIALOGUE_MESSAGE_TIMEOUT_SECS")
                .unwrap_or(defaults.message_timeout),
            max_history: env_parse("DIALOGUE_MAX_HISTORY").unwrap_or(defaults.max_history),
            auxiliary_cooldown: env_secs("DIALOGUE_AUXILIARY_COOLDOWN_SECS")
                .unwrap_or(defaults.auxiliary_cooldown),
            min_messages_before: env_parse("DIALOGUE_MIN_MESSAGES_BEFORE")
                .unwrap_or(defaults.min_messages_before),
            context_window: env_parse("DIALOGUE_CONTEXT_WINDOW")
                .unwrap_or(defaults.context_window),
            loop_window: env_parse("DIALOGUE_LOOP_WINDOW").unwrap_or(defaults.loop_window),
            stagnation_max_chars: env_parse("DIALOGUE_STAGNATION_MAX_CHARS")
                .unwrap_or(defaults.stagnation_max_chars),
            stagnation_window: env_parse("DIALOGUE_STAGNATION_WINDOW")
                .unwrap_or(defaults.stagnation_window),
            pacing_retry: env_parse("DIALOGUE_PACING_RETRY").unwrap_or(defaults.pacing_retry),
            ..defaults
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects windows that would make the heuristics meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.max_history == 0 {
            anyhow::bail!("DIALOGUE_MAX_HISTORY must be greater than 0");
        }
        if self.context_window == 0 {
            anyhow::bail!("DIALOGUE_CONTEXT_WINDOW must be greater than 0");
        }
        if self.loop_window == 0 {
            anyhow::bail!("DIALOGUE_LOOP_WINDOW must be greater than 0");
        }
        if self.stagnation_window == 0 {
            anyhow::bail!("DIALOGUE_STAGNATION_WINDOW must be greater than 0");
        }
        if !(0.0..=1.0).contains(&self.third_party_factor) {
            anyhow::bail!(
                "third_party_factor must be within 0..=1, got {}",
                self.third_party_factor
            );
        }
        Ok(())
    }

    /// Gap a third party has to wait, in seconds.
    pub fn third_party_timeout_secs(&self) -> f64 {
        self.message_timeout.as_secs_f64() * self.third_party_factor
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_secs(key: &str) -> Option<Duration> {
    env_parse::<u64>(key).map(Duration::from_secs)
}
