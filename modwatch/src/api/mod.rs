//! Admin HTTP API.
//!
//! A small axum server exposing health and the privileged manual operations
//! (forced checks, test releases, ledger inspection).

pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;

pub use server::{ApiServer, ApiServerConfig, AppState};
