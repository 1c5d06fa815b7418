// Centralized error types for the store and its persistence

use thiserror::Error;

/// Errors returned by the few store operations that can fail
#[derive(Error, Debug, PartialEq, Eq)]
pub enum StoreError {
    #[error("Unknown user: {0}")]
    UnknownUser(String),

    #[error("User already exists: {0}")]
    DuplicateUser(String),
}

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Failed to encode state: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode persisted state: {0}")]
    Decode(#[source] serde_json::Error),
}
