//! HTTP handlers for the fortune service.

pub mod chat;
pub mod health;
pub mod lots;
pub mod status;

pub use chat::{chat, chat_stream};
pub use health::health_check;
pub use lots::{draw_lot, get_lot};
pub use status::ollama_status;
