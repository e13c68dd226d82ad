//! Database initialization and shared model vocabulary

pub mod init;
pub mod models;

pub use init::*;
pub use models::*;
