//! Error types for test environments
//!
//! Every process or filesystem failure is rendered as a fixed prefix naming
//! the operation, followed by the underlying cause.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Docker not available: {0}")]
    DockerUnavailable(String),

    #[error("failed to create temporary Docker image: {0}")]
    ImageBuild(String),

    #[error("error running Docker image: {0}")]
    ImageRun(String),

    #[error("failed to destroy Docker image: {0}")]
    ImageDestroy(String),

    #[error("failed to get git repository root: {0}")]
    RepositoryRoot(String),

    #[error("failed to stop server process: {0}")]
    ProcessStop(String),

    #[error("failed to delete server working dir(s):\n  {}", format_paths(.0))]
    BaseDirCleanup(Vec<PathBuf>),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("artifact not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("embedded server failed to start: {0}")]
    ServerStartup(String),

    #[error("server at {url} not ready after {attempts} attempt(s): {last}")]
    ServerHealthCheck {
        url: String,
        attempts: usize,
        last: String,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join("\n  ")
}

impl From<strcalc_web::WebError> for E2eError {
    fn from(e: strcalc_web::WebError) -> Self {
        match e {
            strcalc_web::WebError::InvalidContextPath(_) => E2eError::InvalidArgument(e.to_string()),
            strcalc_web::WebError::Io(io) => E2eError::Io(io),
            other => E2eError::ServerStartup(other.to_string()),
        }
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
