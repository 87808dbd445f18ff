//! Turn-taking coordinator for several bots sharing group chats.
//!
//! The coordinator never sends anything. It answers "may this bot speak now?" and
//! "should the web-search bot step in?", and remembers who said what once a message
//! has actually been sent ([`DialogueCoordinator::record_turn`]).
//!
//! All state lives in memory for the lifetime of the process. Unknown chats are treated
//! as having no history, so every query is total.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use tracing::{debug, info, trace, warn};

use crate::config::DialogueConfig;
use crate::context::render_context;
use crate::looping::{detect_loop, is_stagnating};
use crate::participant::{Participant, ParticipantId, ParticipantRegistry, ParticipantRole};
use crate::state::{ChatDialogueState, Turn};
use crate::topics::{extract_topics, Topic};

/// Which rule admits a turn claimed through [`DialogueCoordinator::claim_turn`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnGate {
    /// Turn-taking answer to a registered participant (the `should_respond` rules).
    Respond { sender: ParticipantId },
    /// Answer to an observed speaker outside the registry. Admitted while that speaker still
    /// holds the floor, so only one bot answers each such message.
    Floor { sender: ParticipantId },
    /// Web-search intervention (the `should_auxiliary_intervene` rules); only the auxiliary
    /// itself is admitted.
    Intervene { min_messages_before: usize },
}

/// Similarity threshold callers pass to [`DialogueCoordinator::detect_looping`] by default.
pub const DEFAULT_MIN_SIMILARITY: f64 = 0.7;

fn elapsed_secs(now: DateTime<Utc>, then: DateTime<Utc>) -> f64 {
    (now - then).num_milliseconds() as f64 / 1000.0
}

/// Shared by every bot poller in the process, usually as `Arc<DialogueCoordinator>`.
pub struct DialogueCoordinator {
    config: DialogueConfig,
    registry: RwLock<ParticipantRegistry>,
    chats: Mutex<HashMap<i64, ChatDialogueState>>,
}

impl Default for DialogueCoordinator {
    fn default() -> Self {
        Self::new(DialogueConfig::default())
    }
}

impl DialogueCoordinator {
    pub fn new(config: DialogueConfig) -> Self {
        Self {
            config,
            registry: RwLock::new(ParticipantRegistry::new()),
            chats: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &DialogueConfig {
        &self.config
    }

    /// Registers a bot by display name and free-form role descriptor.
    pub fn register(
        &self,
        id: impl Into<ParticipantId>,
        display_name: impl Into<String>,
        role_descriptor: &str,
    ) {
        self.register_participant(Participant::new(id, display_name, role_descriptor));
    }

    /// Registers a fully described bot. An existing registration with the same id is replaced.
    pub fn register_participant(&self, participant: Participant) {
        info!(
            participant = %participant.id,
            name = %participant.display_name,
            role = ?participant.role,
            model = ?participant.model,
            "Registered dialogue participant"
        );
        let replaced = self.registry.write().insert(participant);
        if replaced {
            debug!("Participant registration replaced an earlier one");
        }
    }

    pub fn participant(&self, id: &ParticipantId) -> Option<Participant> {
        self.registry.read().get(id).cloned()
    }

    /// Every registered participant except `current`, in registration order.
    pub fn other_participants(&self, current: &ParticipantId) -> Vec<Participant> {
        self.registry.read().others(current).cloned().collect()
    }

    /// The first registered participant other than `current`.
    pub fn other_participant(&self, current: &ParticipantId) -> Option<Participant> {
        self.registry.read().others(current).next().cloned()
    }

    /// The web-search auxiliary, if exactly one is registered.
    pub fn auxiliary_participant(&self) -> Option<Participant> {
        let registry = self.registry.read();
        let mut auxiliaries = registry.auxiliaries();
        let first = auxiliaries.next()?;
        if auxiliaries.next().is_some() {
            warn!("More than one web-search auxiliary registered; auxiliary disabled");
            return None;
        }
        Some(first.clone())
    }

    /// Decides whether `candidate` may answer a message `sender` just posted in `chat_id`.
    ///
    /// 1. No recorded turn in the chat: yes.
    /// 2. `candidate` spoke last: no.
    /// 3. `sender` spoke last: yes once `message_timeout` has passed since that turn.
    /// 4. Someone else spoke last: yes once `third_party_factor * message_timeout` has passed.
    pub fn should_respond(
        &self,
        chat_id: i64,
        message_text: &str,
        sender: &ParticipantId,
        now: DateTime<Utc>,
        candidate: &ParticipantId,
    ) -> bool {
        let chats = self.chats.lock();
        self.respond_allowed(chat_id, chats.get(&chat_id), message_text, sender, now, candidate)
    }

    fn respond_allowed(
        &self,
        chat_id: i64,
        state: Option<&ChatDialogueState>,
        message_text: &str,
        sender: &ParticipantId,
        now: DateTime<Utc>,
        candidate: &ParticipantId,
    ) -> bool {
        let Some(last) = state.and_then(|state| state.last()) else {
            info!(chat_id, candidate = %candidate, "First message in chat, response allowed");
            return true;
        };

        if &last.speaker == candidate {
            debug!(chat_id, candidate = %candidate, "Candidate spoke last, not responding");
            return false;
        }

        let elapsed = elapsed_secs(now, last.at);

        if &last.speaker == sender {
            let timeout = self.config.message_timeout.as_secs_f64();
            if elapsed < timeout {
                info!(
                    chat_id,
                    candidate = %candidate,
                    elapsed_secs = elapsed,
                    timeout_secs = timeout,
                    message_len = message_text.chars().count(),
                    "Reply pacing not elapsed yet"
                );
                return false;
            }
            info!(chat_id, candidate = %candidate, elapsed_secs = elapsed, "Pacing elapsed, response allowed");
            return true;
        }

        let timeout = self.config.third_party_timeout_secs();
        if elapsed < timeout {
            info!(
                chat_id,
                candidate = %candidate,
                last_speaker = %last.speaker,
                elapsed_secs = elapsed,
                timeout_secs = timeout,
                "Too soon to join the exchange"
            );
            return false;
        }

        info!(chat_id, candidate = %candidate, "Response conditions met");
        true
    }

    /// Records a message that `speaker` has actually sent.
    pub fn record_turn(
        &self,
        chat_id: i64,
        speaker: &ParticipantId,
        message_text: &str,
        now: DateTime<Utc>,
    ) {
        let speaker_name = self.speaker_name(speaker);
        let mut chats = self.chats.lock();
        let state = chats.entry(chat_id).or_default();
        self.push_turn(chat_id, state, speaker, speaker_name, message_text, now);
    }

    fn speaker_name(&self, speaker: &ParticipantId) -> String {
        self.registry
            .read()
            .get(speaker)
            .map(|p| p.display_name.clone())
            .unwrap_or_else(|| self.config.unknown_speaker_name.clone())
    }

    fn push_turn(
        &self,
        chat_id: i64,
        state: &mut ChatDialogueState,
        speaker: &ParticipantId,
        speaker_name: String,
        message_text: &str,
        now: DateTime<Utc>,
    ) {
        state.push(
            Turn {
                speaker: speaker.clone(),
                speaker_name,
                text: message_text.to_string(),
                at: now,
            },
            self.config.max_history,
        );
        debug!(
            chat_id,
            speaker = %speaker,
            history_len = state.history().len(),
            "Turn recorded"
        );
    }

    /// Records a message from a speaker outside the registry (a human in the group).
    ///
    /// Every bot observes the same Telegram message, so `message_id` is remembered per chat and
    /// a repeated id is not recorded twice. Returns true when the turn was recorded.
    pub fn record_observed(
        &self,
        chat_id: i64,
        message_id: &str,
        speaker: &ParticipantId,
        speaker_name: &str,
        message_text: &str,
        now: DateTime<Utc>,
    ) -> bool {
        let mut chats = self.chats.lock();
        let state = chats.entry(chat_id).or_default();
        if !state.mark_observed(message_id) {
            trace!(chat_id, message_id, "Message already recorded by another poller");
            return false;
        }
        self.push_turn(
            chat_id,
            state,
            speaker,
            speaker_name.to_string(),
            message_text,
            now,
        );
        true
    }

    /// Evaluates `gate` for `candidate` without changing any state.
    pub fn admits(
        &self,
        chat_id: i64,
        gate: &TurnGate,
        candidate: &ParticipantId,
        now: DateTime<Utc>,
    ) -> bool {
        let auxiliary = self.gate_auxiliary(gate);
        let chats = self.chats.lock();
        self.gate_allows(chat_id, chats.get(&chat_id), gate, auxiliary.as_ref(), candidate, now)
    }

    /// Evaluates `gate` and, when it admits `candidate`, records `message_text` as
    /// `candidate`'s turn in the same critical section.
    ///
    /// Concurrent claims for one chat are serialized: of two pollers answering the same
    /// message, the second sees the first one's turn. Undo with [`Self::release_turn`] if
    /// the message could not be sent.
    pub fn claim_turn(
        &self,
        chat_id: i64,
        gate: &TurnGate,
        candidate: &ParticipantId,
        message_text: &str,
        now: DateTime<Utc>,
    ) -> bool {
        let auxiliary = self.gate_auxiliary(gate);
        let speaker_name = self.speaker_name(candidate);
        let mut chats = self.chats.lock();
        if !self.gate_allows(chat_id, chats.get(&chat_id), gate, auxiliary.as_ref(), candidate, now) {
            return false;
        }
        let state = chats.entry(chat_id).or_default();
        self.push_turn(chat_id, state, candidate, speaker_name, message_text, now);
        true
    }

    /// Withdraws a turn taken by [`Self::claim_turn`] if it is still the latest one.
    pub fn release_turn(&self, chat_id: i64, speaker: &ParticipantId, at: DateTime<Utc>) -> bool {
        let mut chats = self.chats.lock();
        let released = chats
            .get_mut(&chat_id)
            .map(|state| state.retract(speaker, at))
            .unwrap_or(false);
        if released {
            debug!(chat_id, speaker = %speaker, "Turn released");
        }
        released
    }

    fn gate_auxiliary(&self, gate: &TurnGate) -> Option<Participant> {
        match gate {
            TurnGate::Intervene { .. } => self.auxiliary_participant(),
            _ => None,
        }
    }

    fn gate_allows(
        &self,
        chat_id: i64,
        state: Option<&ChatDialogueState>,
        gate: &TurnGate,
        auxiliary: Option<&Participant>,
        candidate: &ParticipantId,
        now: DateTime<Utc>,
    ) -> bool {
        match gate {
            TurnGate::Respond { sender } => {
                self.respond_allowed(chat_id, state, "", sender, now, candidate)
            }
            TurnGate::Floor { sender } => {
                let open = state
                    .and_then(|state| state.last())
                    .map_or(true, |last| &last.speaker == sender);
                if !open {
                    debug!(chat_id, candidate = %candidate, "Observed message already answered");
                }
                open
            }
            TurnGate::Intervene {
                min_messages_before,
            } => match auxiliary {
                Some(auxiliary) if &auxiliary.id == candidate => self.intervention_allowed(
                    chat_id,
                    state,
                    auxiliary,
                    now,
                    *min_messages_before,
                ),
                _ => false,
            },
        }
    }

    /// Recent transcript rendered for a prompt; empty when the chat has no turns.
    pub fn build_context(&self, chat_id: i64, _other_participant_name: &str) -> String {
        let chats = self.chats.lock();
        chats
            .get(&chat_id)
            .map(|state| {
                render_context(
                    state,
                    self.config.context_window,
                    self.config.context_instruction_threshold,
                )
            })
            .unwrap_or_default()
    }

    /// True when the last few turns repeat each other. `min_similarity` is logged only;
    /// matching is exact.
    pub fn detect_looping(&self, chat_id: i64, min_similarity: f64) -> bool {
        trace!(chat_id, min_similarity, "Checking for dialogue loop");
        let chats = self.chats.lock();
        chats
            .get(&chat_id)
            .map(|state| self.looping(chat_id, state))
            .unwrap_or(false)
    }

    fn looping(&self, chat_id: i64, state: &ChatDialogueState) -> bool {
        match detect_loop(state, self.config.loop_window, self.config.loop_min_history) {
            Some(kind) => {
                warn!(chat_id, kind = ?kind, "Dialogue loop detected");
                true
            }
            None => false,
        }
    }

    /// Whether the web-search auxiliary should be invited into the chat now.
    ///
    /// Requires exactly one registered auxiliary, at least `min_messages_before` turns, and
    /// no auxiliary turn within `auxiliary_cooldown`. Then fires on a loop or on stagnation.
    pub fn should_auxiliary_intervene(
        &self,
        chat_id: i64,
        now: DateTime<Utc>,
        min_messages_before: usize,
    ) -> bool {
        let Some(auxiliary) = self.auxiliary_participant() else {
            return false;
        };
        let chats = self.chats.lock();
        self.intervention_allowed(chat_id, chats.get(&chat_id), &auxiliary, now, min_messages_before)
    }

    fn intervention_allowed(
        &self,
        chat_id: i64,
        state: Option<&ChatDialogueState>,
        auxiliary: &Participant,
        now: DateTime<Utc>,
        min_messages_before: usize,
    ) -> bool {
        let Some(state) = state else {
            return false;
        };
        if state.history().len() < min_messages_before {
            return false;
        }

        let last_auxiliary_turn = state
            .history()
            .iter()
            .rev()
            .find(|turn| turn.speaker_name == auxiliary.display_name);
        if let Some(turn) = last_auxiliary_turn {
            let elapsed = elapsed_secs(now, turn.at);
            if elapsed < self.config.auxiliary_cooldown.as_secs_f64() {
                debug!(chat_id, elapsed_secs = elapsed, "Auxiliary cooling down");
                return false;
            }
        }

        if self.looping(chat_id, state) {
            info!(chat_id, auxiliary = %auxiliary.display_name, "Auxiliary should intervene: loop");
            return true;
        }

        if is_stagnating(
            state,
            self.config.stagnation_window,
            self.config.stagnation_max_chars,
        ) {
            info!(
                chat_id,
                auxiliary = %auxiliary.display_name,
                "Auxiliary should intervene: short replies in a row"
            );
            return true;
        }

        false
    }

    /// Topics mentioned in the chat's recent turns.
    pub fn extract_topics(&self, chat_id: i64) -> Vec<Topic> {
        let chats = self.chats.lock();
        chats
            .get(&chat_id)
            .map(|state| extract_topics(state, self.config.topic_window))
            .unwrap_or_default()
    }

    /// Snapshot of the chat transcript, oldest first.
    pub fn history(&self, chat_id: i64) -> Vec<Turn> {
        let chats = self.chats.lock();
        chats
            .get(&chat_id)
            .map(|state| state.history().iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn last_speaker(&self, chat_id: i64) -> Option<ParticipantId> {
        let chats = self.chats.lock();
        chats
            .get(&chat_id)
            .and_then(|state| state.last())
            .map(|last| last.speaker.clone())
    }

    /// Role of a registered participant; unknown ids are treated as standard.
    pub fn role_of(&self, id: &ParticipantId) -> ParticipantRole {
        self.registry
            .read()
            .get(id)
            .map(|p| p.role)
            .unwrap_or(ParticipantRole::Standard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn id(s: &str) -> ParticipantId {
        ParticipantId::from(s)
    }

    #[test]
    fn test_third_party_uses_relaxed_threshold() {
        let coordinator = DialogueCoordinator::default();
        coordinator.register("a", "Alice", "chat");
        coordinator.register("b", "Bob", "chat");
        coordinator.register("c", "Carol", "chat");
        coordinator.record_turn(1, &id("a"), "Hello", t(0));

        // Carol answers Bob's relayed message while Alice spoke last: 144s threshold.
        assert!(!coordinator.should_respond(1, "x", &id("b"), t(143), &id("c")));
        assert!(coordinator.should_respond(1, "x", &id("b"), t(145), &id("c")));
        // Same sender path still needs the full 180s.
        assert!(!coordinator.should_respond(1, "x", &id("a"), t(144), &id("c")));
    }

    #[test]
    fn test_clock_going_backwards_counts_as_too_soon() {
        let coordinator = DialogueCoordinator::default();
        coordinator.record_turn(1, &id("a"), "Hello", t(100));
        assert!(!coordinator.should_respond(1, "Hello", &id("a"), t(0), &id("b")));
    }

    #[test]
    fn test_unregistered_speaker_gets_fallback_name() {
        let coordinator = DialogueCoordinator::default();
        coordinator.record_turn(1, &id("ghost"), "boo", t(0));
        let history = coordinator.history(1);
        assert_eq!(history[0].speaker_name, "Bot");
        assert_eq!(coordinator.last_speaker(1), Some(id("ghost")));
    }

    #[test]
    fn test_two_auxiliaries_disable_intervention() {
        let coordinator = DialogueCoordinator::default();
        coordinator.register("p1", "Perplexity", "perplexity");
        coordinator.register("p2", "Perplexity Two", "perplexity");
        for secs in 0..3 {
            coordinator.record_turn(1, &id("a"), "same", t(secs));
        }
        assert!(coordinator.auxiliary_participant().is_none());
        assert!(!coordinator.should_auxiliary_intervene(1, t(10), 2));
    }

    #[test]
    fn test_other_participants_in_registration_order() {
        let coordinator = DialogueCoordinator::default();
        coordinator.register("a", "Alice", "chat");
        coordinator.register("b", "Bob", "chat");
        coordinator.register("c", "Carol", "perplexity");

        let names: Vec<_> = coordinator
            .other_participants(&id("b"))
            .into_iter()
            .map(|p| p.display_name)
            .collect();
        assert_eq!(names, vec!["Alice", "Carol"]);
        assert_eq!(coordinator.other_participant(&id("a")).unwrap().display_name, "Bob");
        assert_eq!(coordinator.role_of(&id("c")), ParticipantRole::WebSearchAuxiliary);
        assert_eq!(coordinator.role_of(&id("zzz")), ParticipantRole::Standard);
    }

    #[test]
    fn test_claim_turn_serializes_competing_answers() {
        let coordinator = DialogueCoordinator::default();
        coordinator.register("a", "Alice", "chat");
        coordinator.register("b", "Bob", "chat");
        coordinator.register("c", "Carol", "chat");
        coordinator.record_turn(1, &id("a"), "Anyone?", t(0));

        let gate = TurnGate::Respond { sender: id("a") };
        // Both pass the check on their own...
        assert!(coordinator.admits(1, &gate, &id("b"), t(200)));
        assert!(coordinator.admits(1, &gate, &id("c"), t(200)));
        // ...but only the first claim wins.
        assert!(coordinator.claim_turn(1, &gate, &id("b"), "Me!", t(200)));
        assert!(!coordinator.claim_turn(1, &gate, &id("c"), "No, me!", t(200)));

        assert_eq!(coordinator.last_speaker(1), Some(id("b")));
        assert_eq!(coordinator.history(1).len(), 2);
    }

    #[test]
    fn test_release_turn_restores_previous_speaker() {
        let coordinator = DialogueCoordinator::default();
        coordinator.register("a", "Alice", "chat");
        coordinator.register("b", "Bob", "chat");
        coordinator.record_turn(1, &id("a"), "Hello", t(0));

        let gate = TurnGate::Respond { sender: id("a") };
        assert!(coordinator.claim_turn(1, &gate, &id("b"), "Hi", t(200)));
        assert!(!coordinator.release_turn(1, &id("b"), t(199)));
        assert!(coordinator.release_turn(1, &id("b"), t(200)));

        assert_eq!(coordinator.last_speaker(1), Some(id("a")));
        assert_eq!(coordinator.history(1).len(), 1);
        assert!(!coordinator.release_turn(2, &id("b"), t(200)));
    }

    #[test]
    fn test_observed_message_recorded_once_and_answered_once() {
        let coordinator = DialogueCoordinator::default();
        coordinator.register("a", "Alice", "chat");
        coordinator.register("b", "Bob", "chat");

        assert!(coordinator.record_observed(1, "m1", &id("100"), "Ann", "Hello bots", t(0)));
        assert!(!coordinator.record_observed(1, "m1", &id("100"), "Ann", "Hello bots", t(0)));
        assert_eq!(coordinator.history(1)[0].speaker_name, "Ann");
        assert_eq!(coordinator.last_speaker(1), Some(id("100")));

        let gate = TurnGate::Floor { sender: id("100") };
        assert!(coordinator.claim_turn(1, &gate, &id("a"), "Hi Ann", t(1)));
        assert!(!coordinator.claim_turn(1, &gate, &id("b"), "Hi Ann too", t(1)));
    }

    #[test]
    fn test_intervene_gate_only_admits_the_auxiliary() {
        let coordinator = DialogueCoordinator::default();
        coordinator.register("a", "Alice", "chat");
        coordinator.register("p", "Perplexity", "perplexity");
        for secs in 0..4 {
            coordinator.record_turn(1, &id("a"), "same again", t(secs));
        }

        let gate = TurnGate::Intervene {
            min_messages_before: 2,
        };
        assert!(!coordinator.admits(1, &gate, &id("a"), t(10)));
        assert!(coordinator.admits(1, &gate, &id("p"), t(10)));
        assert!(coordinator.claim_turn(1, &gate, &id("p"), "Here is something new", t(10)));
        // Cooldown applies to the next claim.
        assert!(!coordinator.admits(1, &gate, &id("p"), t(20)));
    }
}

