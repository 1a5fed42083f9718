//! Core domain + application logic for the Twin Lunch bot.
//!
//! This crate is intentionally framework-agnostic. Slack, SQLite and the secret
//! manager live behind ports (traits) implemented in adapter crates.

pub mod classifier;
pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod notifier;
pub mod pipeline;
pub mod registry;
pub mod router;
pub mod secrets;
pub mod security;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
