//! Core logic of the Mitori patient-conversation trainer: personas, prompt
//! building, the chat-completion client, grading, speech forwarding and the
//! leaderboard. Nothing in this crate knows about HTTP routing.

pub mod conversation;
pub mod evaluation;
pub mod llm_client;
pub mod persona;
pub mod prompt;
pub mod ranking;
pub mod relay;
pub mod speech;
