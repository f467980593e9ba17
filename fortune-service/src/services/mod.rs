pub mod chat;
pub mod lot_store;
pub mod prompt;
pub mod providers;

pub use chat::{ChatProxy, StreamEvent};
pub use lot_store::LotStore;
