//! Runs every configured bot against one shared [`DialogueCoordinator`].
//!
//! Each bot gets its own teloxide REPL. Telegram never delivers one bot's messages to another
//! bot, so a reply sent by one member of the fleet is relayed to the other members as if they
//! had observed it in the chat.

use anyhow::{Context, Result};
use chrono::Utc;
use dbot_core::{
    run_handler, Chat, Handler, HandlerResponse, Message, SystemClock, ToCoreMessage, ToCoreUser,
    User,
};
use dialogue::{
    mask_token, DialogueCoordinator, DialogueHandler, Participant, ParticipantId, ReplyGenerator,
};
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{debug, error, info, instrument};

use crate::adapters::{TelegramMessageWrapper, TelegramUserWrapper};
use crate::bot_adapter::TelegramBotAdapter;
use crate::config::DialogueBotsConfig;

/// One bot identity and the handler answering on its behalf.
pub struct FleetMember {
    pub user: User,
    pub handler: Arc<dyn Handler>,
}

/// All bots taking part in the dialogue.
pub struct BotFleet {
    members: Vec<FleetMember>,
}

impl BotFleet {
    pub fn new(members: Vec<FleetMember>) -> Arc<Self> {
        Arc::new(Self { members })
    }

    /// Hands a message observed by member `index` to its handler on a separate task.
    pub fn deliver(self: &Arc<Self>, index: usize, message: Message) -> tokio::task::JoinHandle<()> {
        let fleet = Arc::clone(self);
        tokio::spawn(async move { fleet.process(index, message).await })
    }

    async fn process(self: Arc<Self>, index: usize, message: Message) {
        let Some(member) = self.members.get(index) else {
            error!(index, "No fleet member at index");
            return;
        };
        debug!(
            bot_id = member.user.id,
            chat_id = message.chat.id,
            message_id = %message.id,
            "Processing message"
        );
        match run_handler(member.handler.as_ref(), &message).await {
            Ok(HandlerResponse::Reply(text)) => self.relay(index, &message.chat, text),
            Ok(response) => {
                debug!(bot_id = member.user.id, response = ?response, "No reply");
            }
            Err(e) => {
                error!(
                    bot_id = member.user.id,
                    chat_id = message.chat.id,
                    error = %e,
                    "Dialogue handler failed"
                );
            }
        }
    }

    /// Shows the reply member `from` just sent to every other member.
    fn relay(self: &Arc<Self>, from: usize, chat: &Chat, text: String) {
        let Some(speaker) = self.members.get(from) else {
            return;
        };
        let relayed = Message {
            id: format!("relay-{}-{}", speaker.user.id, Utc::now().timestamp_millis()),
            user: speaker.user.clone(),
            chat: chat.clone(),
            content: text,
        };
        for index in (0..self.members.len()).filter(|&i| i != from) {
            self.deliver(index, relayed.clone());
        }
    }
}

fn build_teloxide_bot(token: &str, api_url: Option<&str>) -> Result<teloxide::Bot> {
    let bot = teloxide::Bot::new(token);
    match api_url {
        Some(url) => {
            let url = reqwest::Url::parse(url)
                .with_context(|| format!("Invalid TELEGRAM_API_URL: {}", url))?;
            Ok(bot.set_api_url(url))
        }
        None => Ok(bot),
    }
}

/// Starts every configured bot and polls until all REPLs stop.
///
/// Each bot is registered with `coordinator` under its Telegram user id. Bots without a
/// system prompt of their own use `default_system_prompt`.
#[instrument(skip_all, fields(bots = config.bots.len()))]
pub async fn run_dialogue_bots(
    config: &DialogueBotsConfig,
    coordinator: Arc<DialogueCoordinator>,
    generator: Arc<dyn ReplyGenerator>,
    default_system_prompt: Option<String>,
) -> Result<()> {
    config.validate()?;

    let mut members = Vec::with_capacity(config.bots.len());
    let mut teloxide_bots = Vec::with_capacity(config.bots.len());
    for spec in &config.bots {
        let bot = build_teloxide_bot(&spec.token, config.telegram_api_url.as_deref())?;
        let me = bot
            .get_me()
            .await
            .with_context(|| format!("get_me failed for bot token {}", mask_token(&spec.token)))?;
        let user = TelegramUserWrapper(&me.user).to_core();
        let name = spec.name.clone().unwrap_or_else(|| user.display_name());

        let mut participant = Participant::new(user.id, name, &spec.role);
        if let Some(ref model) = spec.model {
            participant = participant.with_model(model.clone());
        }
        if let Some(prompt) = spec
            .system_prompt
            .clone()
            .or_else(|| default_system_prompt.clone())
        {
            participant = participant.with_system_prompt(prompt);
        }
        info!(
            bot_id = user.id,
            username = ?user.username,
            name = %participant.display_name,
            role = ?participant.role,
            "Registering bot"
        );
        coordinator.register_participant(participant);

        let handler = DialogueHandler::new(
            ParticipantId::from(user.id),
            coordinator.clone(),
            Arc::new(TelegramBotAdapter::new(bot.clone())),
            generator.clone(),
            Arc::new(SystemClock),
        );
        members.push(FleetMember {
            user,
            handler: Arc::new(handler),
        });
        teloxide_bots.push(bot);
    }

    let fleet = BotFleet::new(members);
    let config = Arc::new(config.clone());
    info!("Dialogue bots started");

    let repls = teloxide_bots
        .into_iter()
        .enumerate()
        .map(|(index, bot)| run_repl(bot, index, fleet.clone(), config.clone()));
    futures::future::join_all(repls).await;

    Ok(())
}

/// Polls one bot and delivers allowed messages to its fleet member.
async fn run_repl(
    bot: teloxide::Bot,
    index: usize,
    fleet: Arc<BotFleet>,
    config: Arc<DialogueBotsConfig>,
) {
    teloxide::repl(bot, move |_bot: Bot, msg: teloxide::types::Message| {
        let fleet = fleet.clone();
        let config = config.clone();

        async move {
            if !config.allows_chat(msg.chat.id.0) {
                debug!(chat_id = msg.chat.id.0, "Chat not in TELEGRAM_GROUP_IDS, ignoring");
                return Ok(());
            }
            let core_msg = TelegramMessageWrapper(&msg).to_core();
            info!(
                user_id = core_msg.user.id,
                chat_id = core_msg.chat.id,
                message_content = %core_msg.content,
                "Received message"
            );
            fleet.deliver(index, core_msg);
            Ok(())
        }
    })
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replies "pong" to humans and records everything it is shown.
    struct Echo {
        seen: Mutex<Vec<Message>>,
        reply_to_humans: bool,
    }

    impl Echo {
        fn new(reply_to_humans: bool) -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                reply_to_humans,
            })
        }

        fn seen(&self) -> Vec<Message> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Handler for Echo {
        async fn handle(&self, message: &Message) -> dbot_core::Result<HandlerResponse> {
            self.seen.lock().unwrap().push(message.clone());
            if self.reply_to_humans && !message.user.is_bot {
                return Ok(HandlerResponse::Reply("pong".to_string()));
            }
            Ok(HandlerResponse::Ignore)
        }
    }

    fn bot_user(id: i64, name: &str) -> User {
        User {
            id,
            is_bot: true,
            username: Some(name.to_lowercase()),
            first_name: Some(name.to_string()),
        }
    }

    fn human_message(chat_id: i64) -> Message {
        Message {
            id: "1".to_string(),
            user: User {
                id: 100,
                is_bot: false,
                username: None,
                first_name: Some("Ann".to_string()),
            },
            chat: Chat {
                id: chat_id,
                chat_type: "supergroup".to_string(),
            },
            content: "ping".to_string(),
        }
    }

    async fn wait_for<F: Fn() -> bool>(condition: F) {
        for _ in 0..100 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// **Test: a reply from one bot is relayed to the other bots, never back to itself.**
    ///
    /// **Setup:** fleet of Alice (replies to humans) and Bob (records only).
    /// **Action:** Alice observes a human "ping".
    /// **Expected:** Bob is shown Alice's "pong" as a bot message in the same chat; Alice sees only the ping.
    #[tokio::test]
    async fn test_reply_relayed_to_other_members() {
        let alice = Echo::new(true);
        let bob = Echo::new(false);
        let fleet = BotFleet::new(
            vec![
                FleetMember {
                    user: bot_user(1, "Alice"),
                    handler: alice.clone(),
                },
                FleetMember {
                    user: bot_user(2, "Bob"),
                    handler: bob.clone(),
                },
            ],
        );

        fleet.deliver(0, human_message(-42)).await.unwrap();
        wait_for(|| !bob.seen().is_empty()).await;

        let bob_seen = bob.seen();
        assert_eq!(bob_seen.len(), 1);
        assert_eq!(bob_seen[0].content, "pong");
        assert_eq!(bob_seen[0].user.id, 1);
        assert!(bob_seen[0].user.is_bot);
        assert_eq!(bob_seen[0].chat.id, -42);
        assert_eq!(alice.seen().len(), 1);
    }

    #[test]
    fn test_build_teloxide_bot_rejects_bad_url() {
        assert!(build_teloxide_bot("123:abc", Some("::nope")).is_err());
        assert!(build_teloxide_bot("123:abc", Some("http://localhost:8081")).is_ok());
        assert!(build_teloxide_bot("123:abc", None).is_ok());
    }
}
