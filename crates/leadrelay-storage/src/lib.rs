//! LeadRelay Storage - Database access layer
//!
//! This crate provides the PostgreSQL pool, row models, and repositories
//! for campaigns, enrollments, scheduled messages, and the lead snapshot
//! queries used by the audience resolver.

pub mod db;
pub mod models;
pub mod repository;

pub use db::{Database, DatabasePool};
pub use models::*;
pub use repository::*;
