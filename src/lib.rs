pub mod config;
pub mod connectors;
pub mod core;
pub mod error;
pub mod storage;
pub mod types;
pub mod utils;

pub use error::{BotError, ClaimConflict, Result, SessionError, SessionStage};
