//! Quiz-playing chat bot for Telegram and VK
//!
//! A per-user finite-state conversation protocol implemented once and shared
//! by two independently-polled transport adapters, backed by a Redis
//! key-value store:
//!
//! - [`engine::QuizEngine`]: the conversation state machine
//!   (greeting → menu → awaiting answer), pure given the injected stores.
//! - [`storage`]: `QuestionStore` and `SessionStore` contracts with a
//!   Redis-backed implementation; at most one live question per user.
//! - [`platforms`]: Telegram and VK long-poll adapters mapping platform
//!   events onto the engine.
//! - [`parser`] + [`ingest`]: batch ingestion of the tagged quiz file format
//!   into the question store.

pub mod config;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod models;
pub mod parser;
pub mod platforms;
pub mod storage;

// Re-export main types for convenience
pub use config::Config;
pub use engine::{ChatState, QuizEngine, Step};
pub use error::{QuizError, Result};
pub use models::QuizQuestion;
pub use platforms::{TelegramBot, VkBot};
pub use storage::{MemoryStorage, QuestionStore, RedisStorage, SessionStore};
