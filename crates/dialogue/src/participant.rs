//! Participant identities and the registry the coordinator owns.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker that identifies the web-search auxiliary in a role descriptor (case-insensitive).
pub const AUXILIARY_ROLE_MARKER: &str = "perplexity";

/// Opaque identity token of a bot (or a relayed human sender).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ParticipantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<i64> for ParticipantId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

/// What a participant is for. Resolved once at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticipantRole {
    /// Regular conversational bot, subject to turn-taking.
    Standard,
    /// Web-search-capable bot, invited only on looping or stagnation.
    WebSearchAuxiliary,
}

impl ParticipantRole {
    /// Maps a free-form role descriptor to a role.
    pub fn from_descriptor(descriptor: &str) -> Self {
        if descriptor.to_lowercase().contains(AUXILIARY_ROLE_MARKER) {
            Self::WebSearchAuxiliary
        } else {
            Self::Standard
        }
    }

    pub fn is_auxiliary(self) -> bool {
        self == Self::WebSearchAuxiliary
    }
}

/// A registered bot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub display_name: String,
    pub role: ParticipantRole,
    /// LLM model this bot answers with; the generator default applies when absent.
    pub model: Option<String>,
    pub system_prompt: Option<String>,
}

impl Participant {
    pub fn new(
        id: impl Into<ParticipantId>,
        display_name: impl Into<String>,
        role_descriptor: &str,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            role: ParticipantRole::from_descriptor(role_descriptor),
            model: None,
            system_prompt: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

/// Registered participants in registration order. Re-registering an id replaces it in place.
#[derive(Debug, Default, Clone)]
pub struct ParticipantRegistry {
    participants: Vec<Participant>,
}

impl ParticipantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a participant. Returns true when an existing entry was replaced.
    pub fn insert(&mut self, participant: Participant) -> bool {
        match self.participants.iter_mut().find(|p| p.id == participant.id) {
            Some(existing) => {
                *existing = participant;
                true
            }
            None => {
                self.participants.push(participant);
                false
            }
        }
    }

    pub fn get(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.id == id)
    }

    /// Everyone except `current`. The iterator borrows only the registry.
    pub fn others(&self, current: &ParticipantId) -> impl Iterator<Item = &Participant> + '_ {
        let current = current.clone();
        self.participants.iter().filter(move |p| p.id != current)
    }

    pub fn auxiliaries(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter().filter(|p| p.role.is_auxiliary())
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}
