//! modwatch library crate.
//!
//! Watches CurseForge mods for new releases and announces them in Discord
//! channels, remembering what was announced in a SQLite ledger.

pub mod api;
pub mod catalog;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod notification;
pub mod scheduler;
pub mod utils;

pub use error::{Error, Result};
