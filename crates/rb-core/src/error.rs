//! Error type for RotBlock operations that can fail.
//!
//! Metadata extraction is deliberately absent: missing data is `None`.

use crate::selector::SelectorError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid selector: {0}")]
    Selector(#[from] SelectorError),
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
    #[error("Malformed message: {0}")]
    Message(#[from] serde_json::Error),
    #[error("Not a supported page: {0}")]
    UnsupportedHost(String),
}
