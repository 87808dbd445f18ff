//! Per-chat dialogue state: last speaker and the bounded transcript.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::participant::ParticipantId;

/// One recorded message in a chat transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: ParticipantId,
    pub speaker_name: String,
    pub text: String,
    pub at: DateTime<Utc>,
}

/// Who spoke last and when. Both always change together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastTurn {
    pub speaker: ParticipantId,
    pub at: DateTime<Utc>,
}

/// Message ids remembered per chat for de-duplicating observed messages.
const OBSERVED_IDS_KEPT: usize = 64;

/// State of one chat. Created on the first recorded turn.
#[derive(Debug, Clone, Default)]
pub struct ChatDialogueState {
    last: Option<LastTurn>,
    history: VecDeque<Turn>,
    observed: VecDeque<String>,
}

impl ChatDialogueState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&LastTurn> {
        self.last.as_ref()
    }

    pub fn history(&self) -> &VecDeque<Turn> {
        &self.history
    }

    /// Records `turn` as the latest message and trims the transcript to `max_history`, oldest first.
    pub fn push(&mut self, turn: Turn, max_history: usize) {
        self.last = Some(LastTurn {
            speaker: turn.speaker.clone(),
            at: turn.at,
        });
        self.history.push_back(turn);
        while self.history.len() > max_history {
            self.history.pop_front();
        }
    }

    /// Undoes the latest turn if it is `speaker`'s turn at `at`. `last` falls back to the
    /// previous turn; a turn already trimmed off the front is not restored.
    pub fn retract(&mut self, speaker: &ParticipantId, at: DateTime<Utc>) -> bool {
        let matches = self
            .history
            .back()
            .is_some_and(|turn| &turn.speaker == speaker && turn.at == at);
        if !matches {
            return false;
        }
        self.history.pop_back();
        self.last = self.history.back().map(|turn| LastTurn {
            speaker: turn.speaker.clone(),
            at: turn.at,
        });
        true
    }

    /// Remembers a transport message id. Returns false if it was already seen.
    pub fn mark_observed(&mut self, message_id: &str) -> bool {
        if self.observed.iter().any(|id| id == message_id) {
            return false;
        }
        self.observed.push_back(message_id.to_string());
        while self.observed.len() > OBSERVED_IDS_KEPT {
            self.observed.pop_front();
        }
        true
    }

    /// The most recent `n` turns (all of them if fewer), oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &Turn> {
        let skip = self.history.len().saturating_sub(n);
        self.history.iter().skip(skip)
    }
}
