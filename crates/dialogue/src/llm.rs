//! Reply generation seam and its OpenAI-compatible implementation.
//!
//! Any endpoint speaking the Chat Completions protocol works (OpenAI, OpenRouter, Groq,
//! Cerebras) by pointing `OPENAI_BASE_URL` at it.

use anyhow::{Context, Result};
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use std::env;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::prompt::{build_messages, ChatMessage, MessageRole, ReplyRequest};

/// Produces the text a participant will send.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(&self, request: &ReplyRequest) -> Result<String>;
}

/// Masks an API key for logs: first 7 chars + "***" + last 4. Keys of 11 chars or fewer become "***".
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 11 {
        return "***".to_string();
    }
    let head: String = chars[..7].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}***{}", head, tail)
}

/// Connection settings for the chat-completion endpoint.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: String,
    pub base_url: String,
    /// Used for participants registered without a model.
    pub default_model: String,
    /// Used for participants registered without a system prompt.
    pub system_prompt: Option<String>,
}

impl LlmSettings {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";
    pub const DEFAULT_MODEL: &'static str = "gpt-4o-mini";

    /// Load from OPENAI_API_KEY (required), OPENAI_BASE_URL, MODEL and LLM_SYSTEM_PROMPT.
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("OPENAI_API_KEY").context("OPENAI_API_KEY not set")?;
        let base_url =
            env::var("OPENAI_BASE_URL").unwrap_or_else(|_| Self::DEFAULT_BASE_URL.to_string());
        let default_model = env::var("MODEL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| Self::DEFAULT_MODEL.to_string());
        let system_prompt = env::var("LLM_SYSTEM_PROMPT")
            .ok()
            .filter(|s| !s.trim().is_empty());
        Ok(Self {
            api_key,
            base_url,
            default_model,
            system_prompt,
        })
    }
}

fn to_openai(msg: &ChatMessage) -> Result<ChatCompletionRequestMessage> {
    let content = msg.content.clone();
    let openai_msg: ChatCompletionRequestMessage = match msg.role {
        MessageRole::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(content)
            .build()?
            .into(),
        MessageRole::User => ChatCompletionRequestUserMessageArgs::default()
            .content(content)
            .build()?
            .into(),
        MessageRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(content)
            .build()?
            .into(),
    };
    Ok(openai_msg)
}

/// [`ReplyGenerator`] backed by async-openai.
#[derive(Clone)]
pub struct OpenAiReplyGenerator {
    client: Arc<Client<OpenAIConfig>>,
    default_model: String,
    masked_key: String,
}

impl OpenAiReplyGenerator {
    pub fn new(settings: &LlmSettings) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(settings.api_key.clone())
            .with_api_base(settings.base_url.clone());
        Self {
            client: Arc::new(Client::with_config(config)),
            default_model: settings.default_model.clone(),
            masked_key: mask_token(&settings.api_key),
        }
    }

    fn model_for<'a>(&'a self, request: &'a ReplyRequest) -> &'a str {
        request
            .participant
            .model
            .as_deref()
            .unwrap_or(&self.default_model)
    }
}

#[async_trait]
impl ReplyGenerator for OpenAiReplyGenerator {
    #[instrument(skip(self, request), fields(chat_id = request.chat_id, participant = %request.participant.id))]
    async fn generate(&self, request: &ReplyRequest) -> Result<String> {
        let model = self.model_for(request);
        let messages = build_messages(request)
            .iter()
            .map(to_openai)
            .collect::<Result<Vec<_>>>()?;

        info!(
            model = %model,
            message_count = messages.len(),
            api_key = %self.masked_key,
            "Chat completion request"
        );

        let completion = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(messages)
            .build()?;
        let response = self.client.chat().create(completion).await?;

        if let Some(ref usage) = response.usage {
            info!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "Chat completion usage"
            );
        }

        let Some(choice) = response.choices.first() else {
            anyhow::bail!("No choices in chat completion response");
        };
        Ok(choice
            .message
            .content
            .clone()
            .unwrap_or_default()
            .trim()
            .to_string())
    }
}
