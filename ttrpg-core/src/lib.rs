//! Session and conversation lifecycle for an AI-run tabletop RPG.
//!
//! This crate provides:
//! - An append-only transcript model with store-backed ordering
//! - A durable-store gateway with retry, in-memory and PostgREST backends
//! - A session manager enforcing exactly-one-active-session semantics
//! - A command interpreter for the interactive grammar
//! - A Gemini-backed Game Master behind a narrator seam
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use ttrpg_core::{Command, GameLoop, GeminiNarrator, MemoryStore, SessionManager};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sessions = SessionManager::new(Arc::new(MemoryStore::new()));
//!     let narrator = GeminiNarrator::from_env()?;
//!     let mut game = GameLoop::new(sessions, narrator);
//!
//!     game.dispatch(Command::New).await?;
//!     let reply = game.dispatch_line("I look around the tavern").await?;
//!     println!("{reply:?}");
//!     Ok(())
//! }
//! ```

pub mod command;
pub mod config;
pub mod dice;
pub mod narrator;
pub mod session;
pub mod store;
pub mod testing;
pub mod transcript;

// Primary public API
pub use command::{Command, CommandError, GameError, GameLoop, Reply, HELP_TEXT};
pub use config::{Config, ConfigError};
pub use dice::{roll_d20, DiceRoll};
pub use narrator::{GeminiNarrator, Narrator, NarratorConfig, NarratorError};
pub use session::{SessionError, SessionManager, SessionSummary};
pub use store::{CampaignStore, MemoryStore, RestStore, RetryPolicy, StoreError};
pub use transcript::{Message, Role, Session};
