//! UUID utilities
//!
//! Primary keys are stored as TEXT columns holding hyphenated UUIDv4 strings.

use crate::{Error, Result};
use uuid::Uuid;

/// Generate a new UUIDv4
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

/// Parse a guid column value read back from the database
pub fn parse(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Internal(format!("Corrupt guid '{}': {}", s, e)))
}

/// Parse an optional guid column value
pub fn parse_opt(s: Option<String>) -> Result<Option<Uuid>> {
    s.as_deref().map(parse).transpose()
}
