//! # dbot-core
//!
//! Core types and traits shared by the dialogue bots: [`Bot`] (message transport), [`Clock`],
//! [`Handler`], message and user types, errors, and tracing initialization. Transport-agnostic;
//! used by `dialogue` and `dbot-telegram`.

pub mod bot;
pub mod clock;
pub mod error;
pub mod logger;
pub mod types;

pub use bot::Bot;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{DbotError, HandlerError, Result};
pub use logger::init_tracing;
pub use types::{
    run_handler, Chat, Handler, HandlerResponse, Message, ToCoreMessage, ToCoreUser, User,
};
