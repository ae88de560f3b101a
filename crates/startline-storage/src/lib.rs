//! Startline Storage - Database layer
//!
//! This crate provides the SQLite-backed storage layer for Startline:
//! triggers, schedules, campaigns, campaign events, fire counts, the
//! recent-fire recency index and the org asset registries.

pub mod db;
pub mod models;
pub mod repository;

pub use db::DatabasePool;
pub use models::*;
pub use repository::*;
