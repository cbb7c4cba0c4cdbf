pub mod client;
pub mod error;
pub mod wire;

pub use client::LlmClient;
pub use error::LlmError;
pub use wire::{ChatMessage, ChatRole};

/// Canned safe fallback shown to the user when the LLM is unavailable
/// (spec §4.10).
pub const FALLBACK_REPLY: &str =
    "I'm having trouble right now — a human from the team will reach out soon.";
