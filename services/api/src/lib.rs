//! Mitori API Library Crate
//!
//! This library contains the web-facing half of the trainer: configuration,
//! the application state, the API handlers and routing. The `api` binary is a
//! thin wrapper around this library.

pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
