//! Error types for blitz-analyzer-core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Vendor API error: {0}")]
    Vendor(String),

    #[error("Replay schema error: {0}")]
    Schema(String),

    #[error("Cache error: {0}")]
    Cache(#[from] rusqlite::Error),

    #[error("Cache writer is gone: {0}")]
    CacheClosed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
