//! Domain models for the fortune service.

pub mod chat;
pub mod lot;

pub use chat::{ChatMessage, ChatReply, ChatRequest, ChatRole, StatusReport};
pub use lot::FortuneLot;
