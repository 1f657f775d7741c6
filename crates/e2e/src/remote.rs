//! Containerized test server
//!
//! [`RemoteTestServer`] builds the application image from the repository,
//! runs it with a freshly allocated host port published to the container
//! port, and tears both down again on [`stop`](RemoteTestServer::stop).
//!
//! ```text
//! Idle ──start──▶ Running { image, process, port, base_url } ──stop──▶ Idle
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};
use url::Url;

use crate::docker::{ContainerRuntime, Docker, ImageId, PortMapping};
use crate::error::{E2eError, E2eResult};
use crate::git::repository_root;
use crate::health::wait_until_ready;
use crate::port::pick_unused_port;
use crate::process::{ProcessRunner, RunningProcess};

/// Build file used when none is configured, relative to the repository root
pub const DEFAULT_BUILD_FILE: &str = "dockerfiles/Dockerfile.strcalc";

/// Optional readiness check run after the settle delay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readiness {
    /// Path appended to the base address
    pub path: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteServerConfig {
    /// Container build file, relative to the repository root
    pub build_file: PathBuf,

    /// Port the application listens on inside the container
    pub container_port: u16,

    /// Appended to `http://localhost:<port>` to form the base address
    pub base_path: String,

    pub readiness: Option<Readiness>,
}

impl Default for RemoteServerConfig {
    fn default() -> Self {
        Self {
            build_file: PathBuf::from(DEFAULT_BUILD_FILE),
            container_port: strcalc_web::CONTAINER_PORT,
            base_path: String::new(),
            readiness: None,
        }
    }
}

enum ServerState {
    Idle,
    Running {
        image: ImageId,
        process: Box<dyn RunningProcess>,
        port: u16,
        base_url: Url,
    },
}

/// The application running in a throwaway container
pub struct RemoteTestServer {
    docker: Docker,
    runner: Arc<dyn ProcessRunner>,
    config: RemoteServerConfig,
    start_dir: PathBuf,
    state: ServerState,
}

impl RemoteTestServer {
    pub fn new(runner: Arc<dyn ProcessRunner>, runtime: ContainerRuntime, config: RemoteServerConfig) -> Self {
        Self {
            docker: Docker::new(runner.clone(), runtime),
            runner,
            config,
            start_dir: PathBuf::from("."),
            state: ServerState::Idle,
        }
    }

    /// Directory the repository root is looked up from (default: the
    /// current directory)
    pub fn with_start_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.start_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn config(&self) -> &RemoteServerConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, ServerState::Running { .. })
    }

    pub fn base_url(&self) -> Option<&Url> {
        match &self.state {
            ServerState::Running { base_url, .. } => Some(base_url),
            ServerState::Idle => None,
        }
    }

    /// Host port published to the container, while running
    pub fn port(&self) -> Option<u16> {
        match &self.state {
            ServerState::Running { port, .. } => Some(*port),
            ServerState::Idle => None,
        }
    }

    /// Build and launch the container, returning its base address.
    ///
    /// Returns the existing address if already running. On failure the
    /// server stays idle, a launched container is stopped and any image
    /// built along the way is removed.
    ///
    /// The address is `http://localhost:<port>` followed by the configured
    /// base path. With an empty base path [`Url`] normalizes it to
    /// `http://localhost:<port>/`.
    pub async fn start(&mut self, settle: Duration) -> E2eResult<Url> {
        self.docker.assert_available().await?;

        if let ServerState::Running { base_url, .. } = &self.state {
            return Ok(base_url.clone());
        }

        let root = repository_root(self.runner.as_ref(), &self.start_dir).await?;
        let image = self.docker.build_image(&self.config.build_file, &root).await?;

        match self.launch(&image, settle).await {
            Ok((process, port, base_url)) => {
                info!("remote test server running at {}", base_url);
                self.state = ServerState::Running {
                    image,
                    process,
                    port,
                    base_url: base_url.clone(),
                };
                Ok(base_url)
            }
            Err(e) => {
                if let Err(cleanup) = self.docker.destroy_image(&image).await {
                    warn!("{}", cleanup);
                }
                Err(e)
            }
        }
    }

    async fn launch(&self, image: &ImageId, settle: Duration) -> E2eResult<(Box<dyn RunningProcess>, u16, Url)> {
        let port = pick_unused_port()?;
        let base_url = Url::parse(&format!("http://localhost:{}{}", port, self.config.base_path))
            .map_err(|e| E2eError::Config(format!("base path {:?}: {}", self.config.base_path, e)))?;
        let ready_check = match &self.config.readiness {
            Some(readiness) => Some((join_path(&base_url, &readiness.path)?, readiness.timeout)),
            None => None,
        };

        let mut process = self
            .docker
            .run_image(image, PortMapping::new(port, self.config.container_port))?;
        sleep(settle).await;

        // From here on the container exists, so every failure stops it first
        if let Some((url, timeout)) = ready_check {
            if let Err(e) = wait_until_ready(&url, timeout).await {
                if let Err(term) = process.terminate().await {
                    warn!("failed to stop container process: {}", term);
                }
                return Err(e);
            }
        }

        Ok((process, port, base_url))
    }

    /// Stop the container and remove its image. No-op when idle.
    ///
    /// Image removal is attempted even if stopping the process failed; the
    /// first error is returned.
    pub async fn stop(&mut self, settle: Duration) -> E2eResult<()> {
        let ServerState::Running { image, mut process, base_url, .. } =
            std::mem::replace(&mut self.state, ServerState::Idle)
        else {
            return Ok(());
        };

        info!("stopping remote test server at {}", base_url);
        let stopped = process
            .terminate()
            .await
            .map_err(|e| E2eError::ProcessStop(e.to_string()));
        sleep(settle).await;
        let destroyed = self.docker.destroy_image(&image).await;

        stopped.and(destroyed)
    }
}

fn join_path(base: &Url, path: &str) -> E2eResult<Url> {
    if !path.starts_with('/') {
        return Err(E2eError::Config(format!(
            "readiness path should begin with '/', got: {:?}",
            path
        )));
    }
    let joined = format!("{}{}", base.as_str().trim_end_matches('/'), path);
    Url::parse(&joined).map_err(|e| E2eError::Config(format!("readiness path {:?}: {}", path, e)))
}
