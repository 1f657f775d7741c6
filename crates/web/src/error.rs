//! Error types for the web application

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using the web application error
pub type WebResult<T> = std::result::Result<T, WebError>;

#[derive(Error, Debug)]
pub enum WebError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid application config {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("invalid artifact {path}: {reason}")]
    Artifact { path: PathBuf, reason: String },

    #[error("contextPath should be '/' or start with '/', but not end with '/', got: \"{0}\"")]
    InvalidContextPath(String),
}
