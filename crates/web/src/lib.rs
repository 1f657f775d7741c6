//! strcalc Web Application
//!
//! The application under test: the `/add` endpoint and the frontend assets,
//! mounted under a context path. Hosted in-process by the test harness or
//! inside a container by the `strcalc-web` binary.

pub mod artifact;
pub mod config;
pub mod context;
pub mod error;
pub mod server;
pub mod static_files;

pub use config::AppConfig;
pub use context::ContextPath;
pub use error::{WebError, WebResult};
pub use server::{AddEndpoint, Endpoint, WebApp};
pub use static_files::StaticFiles;

/// Port the application listens on inside its container image
pub const CONTAINER_PORT: u16 = 8080;

/// Directory holding the application's config source (`app.toml`)
pub const WEBAPP_CONFIG_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/webapp");

/// Directory holding the frontend assets
pub const WEBAPP_STATIC_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/webapp/static");
