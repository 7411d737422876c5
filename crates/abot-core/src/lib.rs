//! Core dispatch layer for ability bots.
//!
//! This crate is intentionally framework-agnostic. Telegram lives behind the
//! messaging port (trait) implemented in the adapter crate; persistence lives
//! behind the store backend trait.

pub mod ability;
pub mod access;
pub mod backup;
pub mod bot;
pub mod builtins;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod flags;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod registry;
pub mod store;
pub mod update;

#[cfg(test)]
pub(crate) mod testkit;

pub use bot::AbilityBot;
pub use errors::{Error, Result};
