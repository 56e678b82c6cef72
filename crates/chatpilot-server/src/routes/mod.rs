//! HTTP routes.

mod chat;
mod health;

pub use chat::{ChatBody, SESSION_HEADER, chat_handler, chat_routes};
pub use health::{HealthResponse, health, health_routes};
