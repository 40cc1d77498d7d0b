// src/error.rs

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Errors surfaced by the trainer's public interface.
#[derive(Debug, Error)]
pub enum MasteryError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Content error: {0}")]
    Content(String),

    #[error("Config error: {0}")]
    Config(String),

    /// Requested content exists but the viewer may not open it yet.
    #[error("Locked: {0}")]
    Locked(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl From<serde_json::Error> for MasteryError {
    fn from(e: serde_json::Error) -> Self {
        MasteryError::Content(e.to_string())
    }
}

// Commands hand errors to the frontend as plain messages.
impl Serialize for MasteryError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

pub type MasteryResult<T> = Result<T, MasteryError>;
