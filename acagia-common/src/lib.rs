//! # Acagia Common Library
//!
//! Shared code for the Acagia academy management service:
//! - Error and result types
//! - Configuration loading and root folder resolution
//! - Database initialization, schema and migrations
//! - Domain models (academies, members, ranks, attendance, events, payments)
//! - The rank promotion engine
//! - Academy-local clock helpers

pub mod config;
pub mod db;
pub mod error;
pub mod ranking;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
pub use ranking::{Direction, RankLadder, RankProgress, RankStep};
