// SPDX-License-Identifier: MIT

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("io error at {path}: {source}")]
    Io { path: std::path::PathBuf, #[source] source: std::io::Error },
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
