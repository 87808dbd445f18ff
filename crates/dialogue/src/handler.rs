//! Per-bot message handler: gates each observed message through the coordinator, asks the
//! generator for a reply, claims the turn, and sends it.

use async_trait::async_trait;
use dbot_core::{Bot, Clock, DbotError, Handler, HandlerError, HandlerResponse, Message, Result};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

use crate::coordinator::{DialogueCoordinator, TurnGate};
use crate::llm::ReplyGenerator;
use crate::participant::{Participant, ParticipantId};
use crate::prompt::ReplyRequest;

/// Handler owned by one bot identity.
pub struct DialogueHandler {
    participant_id: ParticipantId,
    coordinator: Arc<DialogueCoordinator>,
    bot: Arc<dyn Bot>,
    generator: Arc<dyn ReplyGenerator>,
    clock: Arc<dyn Clock>,
    /// Delay before a refused message is evaluated once more; None disables the retry.
    pacing_retry: Option<Duration>,
    /// Chats with a retry already waiting. At most one per chat.
    pending_retries: Mutex<HashSet<i64>>,
}

/// Holds a chat's retry slot until dropped.
struct RetrySlot<'a> {
    pending: &'a Mutex<HashSet<i64>>,
    chat_id: i64,
}

impl<'a> RetrySlot<'a> {
    fn acquire(pending: &'a Mutex<HashSet<i64>>, chat_id: i64) -> Option<Self> {
        pending
            .lock()
            .insert(chat_id)
            .then(|| Self { pending, chat_id })
    }
}

impl Drop for RetrySlot<'_> {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.chat_id);
    }
}

impl DialogueHandler {
    pub fn new(
        participant_id: ParticipantId,
        coordinator: Arc<DialogueCoordinator>,
        bot: Arc<dyn Bot>,
        generator: Arc<dyn ReplyGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let pacing_retry = coordinator
            .config()
            .pacing_retry
            .then_some(coordinator.config().message_timeout);
        Self {
            participant_id,
            coordinator,
            bot,
            generator,
            clock,
            pacing_retry,
            pending_retries: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_pacing_retry(mut self, delay: Option<Duration>) -> Self {
        self.pacing_retry = delay;
        self
    }

    pub fn participant_id(&self) -> &ParticipantId {
        &self.participant_id
    }

    /// The rule this bot answers `sender` under.
    fn gate(&self, me: &Participant, sender: &ParticipantId) -> TurnGate {
        if me.role.is_auxiliary() {
            TurnGate::Intervene {
                min_messages_before: self.coordinator.config().min_messages_before,
            }
        } else if self.coordinator.participant(sender).is_some() {
            TurnGate::Respond {
                sender: sender.clone(),
            }
        } else {
            TurnGate::Floor {
                sender: sender.clone(),
            }
        }
    }

    fn admitted(&self, chat_id: i64, gate: &TurnGate) -> bool {
        self.coordinator
            .admits(chat_id, gate, &self.participant_id, self.clock.now())
    }

    /// Waits out the pacing delay once. False when no retry is configured, another retry
    /// for the chat is already waiting, or the gate still refuses afterwards.
    async fn retry_admission(&self, chat_id: i64, gate: &TurnGate) -> bool {
        let Some(delay) = self.pacing_retry else {
            return false;
        };
        let Some(_slot) = RetrySlot::acquire(&self.pending_retries, chat_id) else {
            debug!("Retry already pending for this chat");
            return false;
        };
        debug!(delay_secs = delay.as_secs(), "Not admitted, re-evaluating after delay");
        tokio::time::sleep(delay).await;
        self.admitted(chat_id, gate)
    }

    fn sender_name(&self, message: &Message, sender: &ParticipantId) -> String {
        self.coordinator
            .participant(sender)
            .map(|p| p.display_name)
            .unwrap_or_else(|| message.user.display_name())
    }
}

#[async_trait]
impl Handler for DialogueHandler {
    async fn before(&self, message: &Message) -> Result<bool> {
        if message.content.trim().is_empty() {
            debug!(chat_id = message.chat.id, "No text in message, skipping");
            return Ok(false);
        }
        Ok(ParticipantId::from(message.user.id) != self.participant_id)
    }

    #[instrument(skip(self, message), fields(participant = %self.participant_id, chat_id = message.chat.id))]
    async fn handle(&self, message: &Message) -> Result<HandlerResponse> {
        let Some(me) = self.coordinator.participant(&self.participant_id) else {
            return Err(HandlerError::UnknownParticipant(self.participant_id.to_string()).into());
        };
        let sender = ParticipantId::from(message.user.id);
        let chat_id = message.chat.id;
        let incoming_from = self.sender_name(message, &sender);

        if self.coordinator.participant(&sender).is_none() {
            self.coordinator.record_observed(
                chat_id,
                &message.id,
                &sender,
                &incoming_from,
                &message.content,
                self.clock.now(),
            );
        }

        let gate = self.gate(&me, &sender);

        if !self.admitted(chat_id, &gate) && !self.retry_admission(chat_id, &gate).await {
            return Ok(HandlerResponse::Ignore);
        }

        let request = ReplyRequest {
            chat_id,
            context: self.coordinator.build_context(chat_id, &incoming_from),
            topics: self.coordinator.extract_topics(chat_id),
            incoming: message.content.clone(),
            incoming_from,
            intervention: matches!(gate, TurnGate::Intervene { .. }),
            participant: me.clone(),
        };

        info!(gate = ?gate, "Generating reply");
        let reply = self.generator.generate(&request).await.map_err(|e| {
            error!(error = %e, "Reply generation failed");
            DbotError::Llm(e.to_string())
        })?;
        if reply.trim().is_empty() {
            return Err(HandlerError::EmptyReply.into());
        }

        // Another bot may have spoken while the model was generating.
        let claimed_at = self.clock.now();
        if !self
            .coordinator
            .claim_turn(chat_id, &gate, &self.participant_id, &reply, claimed_at)
        {
            info!("Turn taken by another participant during generation, dropping reply");
            return Ok(HandlerResponse::Ignore);
        }

        if let Err(e) = self.bot.send_message(&message.chat, &reply).await {
            self.coordinator
                .release_turn(chat_id, &self.participant_id, claimed_at);
            return Err(e);
        }
        info!(reply_len = reply.chars().count(), "Reply sent");

        Ok(HandlerResponse::Reply(reply))
    }
}
