//! Repository layer for database access.

pub mod release;

pub use release::*;
