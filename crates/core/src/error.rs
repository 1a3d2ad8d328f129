// SPDX-License-Identifier: MIT

//! The fault taxonomy shared across crates: protocol, transport, handler,
//! loader, and resource faults, plus the fatal invariant-violation
//! category.

use thiserror::Error;

/// Whether a fault should retry the current transaction on the next pump
/// iteration, or abort the daemon outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Logged and retried; the cursor does not advance.
    Retryable,
    /// The daemon must exit; a supervisor is expected to restart it.
    Fatal,
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("protocol fault: {0}")]
    Protocol(String),

    #[error("transport fault: {0}")]
    Transport(String),

    #[error("handler fault in {handler}: {message}")]
    Handler { handler: String, message: String },

    #[error("loader fault: {0}")]
    Loader(String),

    #[error("resource fault: {0}")]
    Resource(String),

    #[error("fatal invariant violation: {0}")]
    Invariant(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    pub fn severity(&self) -> Severity {
        match self {
            CoreError::Protocol(_) | CoreError::Handler { .. } | CoreError::Loader(_) => {
                Severity::Retryable
            }
            CoreError::Transport(_)
            | CoreError::Resource(_)
            | CoreError::Invariant(_)
            | CoreError::Io(_)
            | CoreError::Json(_) => Severity::Fatal,
        }
    }
}
