//! Core of the Susumi Pioneer launchpad bot.
//!
//! This crate is framework-agnostic. The Telegram transport lives behind the
//! messaging port (trait) implemented in the adapter crate; everything here can
//! be driven from tests with fakes and a manual clock.

pub mod clock;
pub mod config;
pub mod content;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod messaging;
pub mod pipeline;
pub mod security;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
