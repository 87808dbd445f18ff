//! # dialogue
//!
//! Turn-taking for several LLM bots sharing Telegram group chats.
//!
//! - [`DialogueCoordinator`]: decides who may speak next, detects loops, and invites the
//!   web-search auxiliary when the conversation stalls. In-memory, shared across pollers.
//! - [`DialogueHandler`]: one per bot; gates observed messages, generates, sends, records.
//! - [`ReplyGenerator`] / [`OpenAiReplyGenerator`]: the LLM seam.
//!
//! ```
//! use chrono::{Duration, Utc};
//! use dialogue::{DialogueCoordinator, ParticipantId};
//!
//! let coordinator = DialogueCoordinator::default();
//! coordinator.register("a", "Alice", "chat");
//! coordinator.register("b", "Bob", "perplexity-search");
//!
//! let (alice, bob) = (ParticipantId::from("a"), ParticipantId::from("b"));
//! let t0 = Utc::now();
//! coordinator.record_turn(1, &alice, "Hello!", t0);
//! assert!(!coordinator.should_respond(1, "Hello!", &alice, t0 + Duration::seconds(10), &bob));
//! assert!(coordinator.should_respond(1, "Hello!", &alice, t0 + Duration::seconds(181), &bob));
//! ```

pub mod config;
pub mod context;
pub mod coordinator;
pub mod handler;
pub mod llm;
pub mod looping;
pub mod participant;
pub mod prompt;
pub mod state;
pub mod topics;

pub use config::DialogueConfig;
pub use coordinator::{DialogueCoordinator, TurnGate, DEFAULT_MIN_SIMILARITY};
pub use handler::DialogueHandler;
pub use llm::{mask_token, LlmSettings, OpenAiReplyGenerator, ReplyGenerator};
pub use looping::LoopKind;
pub use participant::{Participant, ParticipantId, ParticipantRegistry, ParticipantRole};
pub use prompt::{build_messages, ChatMessage, MessageRole, ReplyRequest};
pub use state::{ChatDialogueState, LastTurn, Turn};
pub use topics::Topic;
