//! Key and node-id validation
//!
//! Keys are Unicode strings with one rule: they must not be empty. Node ids
//! additionally become WAL file names on disk, so they must not contain
//! path separators or NUL bytes.

use crate::error::{Error, Result};

/// Validate a store key.
///
/// # Examples
///
/// ```
/// use capstan_core::validate_key;
///
/// assert!(validate_key("user:123").is_ok());
/// assert!(validate_key("日本語").is_ok());
/// assert!(validate_key("").is_err());
/// ```
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidKey("key cannot be empty".to_string()));
    }
    Ok(())
}

/// Validate a cluster node identifier.
///
/// Node ids name per-node WAL files (`<dir>/<id>.wal`), so beyond being
/// non-empty they must be safe as a single path component.
pub fn validate_node_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::config("node id cannot be empty"));
    }
    if id.contains(&['/', '\\', '\0'][..]) {
        return Err(Error::config(format!(
            "node id {id:?} cannot contain path separators or NUL"
        )));
    }
    Ok(())
}
