//! Conversation history for ChatPilot.
//!
//! [`HistoryStore`] is the only shared mutable state the chat pipeline
//! touches. Implementations must allow concurrent reads and appends for
//! different sessions without one session's traffic corrupting another's,
//! and must keep per-session append order.
//!
//! The bundled [`InMemoryHistoryStore`] bounds memory with:
//! - LRU eviction once `max_sessions` is reached
//! - Optional idle TTL after which a session starts over empty
//!
//! # Example
//!
//! ```rust,ignore
//! use chatpilot_session::{HistoryStore, InMemoryHistoryStore, StoreConfig};
//!
//! let store = InMemoryHistoryStore::new(StoreConfig::default().with_max_sessions(1000));
//! store.add_message("s1", Message::user("hi")).await?;
//! ```

mod config;
mod error;
mod memory;
mod store;
mod ttl;

pub use config::StoreConfig;
pub use error::{Result, SessionError};
pub use memory::InMemoryHistoryStore;
pub use store::{HistoryStore, SharedHistoryStore};
