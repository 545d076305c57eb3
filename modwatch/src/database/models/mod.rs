//! Database models for modwatch.
//!
//! These models map directly to the database schema.

pub mod release;

pub use release::*;
