//! Audit errors

use thiserror::Error;

/// Errors that can occur publishing audit events
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Audit IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Audit serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
