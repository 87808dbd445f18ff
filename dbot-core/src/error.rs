//! Error types shared by the dialogue crates.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbotError {
    #[error("Bot error: {0}")]
    Bot(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),
}

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Unknown participant: {0}")]
    UnknownParticipant(String),

    #[error("Empty reply from generator")]
    EmptyReply,
}

pub type Result<T> = std::result::Result<T, DbotError>;
