//! mimic-bot - Discord relay bot backed by a single shared Meta AI session.
//!
//! The bot listens for messages that mention it (or reply to it), relays
//! them to a Meta AI session primed to roleplay as a configured persona,
//! and streams the response back into the chat as throttled message edits.
//!
//! ## Architecture
//!
//! ```text
//! Discord gateway → Dispatcher (rate limit, censorship) → SessionManager
//!                         ↓                                     ↓
//! User ←── message edits ←── ResponseStreamer ←── StreamChunk feed
//! ```
//!
//! Exactly one AI session exists process-wide. The `SessionManager` owns
//! it behind an exclusive lock, tracks error/refusal health, and restarts
//! it when it degrades or goes idle (see `watchdog`).

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod ai;
pub mod censor;
pub mod channels;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod persona;
pub mod ratelimit;
pub mod streamer;
pub mod watchdog;

// Re-export commonly used types
pub use ai::backend::{AiBackend, AiSession, ChunkStream};
pub use ai::manager::{SessionManager, SessionState};
pub use ai::meta::MetaAiBackend;
pub use ai::types::{Source, StreamChunk};
pub use censor::CensorList;
pub use channels::discord::DiscordChannel;
pub use channels::traits::{
    ChannelError, ChannelResult, ChatClient, InboundMessage, MessageRef, SendOptions,
};
pub use config::BotConfig;
pub use dispatch::Dispatcher;
pub use error::BotError;
pub use persona::{Persona, PersonaSource, RESTART_PROMPT};
pub use ratelimit::{Admission, RateLimiter};
pub use streamer::{Finalized, ResponseStreamer};
