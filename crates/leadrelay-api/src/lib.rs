//! LeadRelay API - REST surface for the campaign engine
//!
//! Thin HTTP layer over the campaign manager: request parsing and
//! validation live here, all semantics live in leadrelay-core.

pub mod handlers;
pub mod routes;

pub use routes::{create_router, AppState};
