//! Container image builds and launches via the container runtime CLI.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{E2eError, E2eResult};
use crate::process::{run_checked, CommandSpec, ProcessRunner, RunningProcess};

/// Container runtime CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerRuntime {
    #[default]
    Docker,
    Podman,
}

impl ContainerRuntime {
    /// Get the CLI command name
    pub fn command(&self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Podman => "podman",
        }
    }
}

impl fmt::Display for ContainerRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command())
    }
}

impl FromStr for ContainerRuntime {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "docker" => Ok(Self::Docker),
            "podman" => Ok(Self::Podman),
            other => Err(E2eError::Config(format!("unknown container runtime: {}", other))),
        }
    }
}

/// Identifier of a locally built image
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageId(String);

impl ImageId {
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        let id = id.trim();
        if id.is_empty() {
            None
        } else {
            Some(Self(id.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Host port published to a container port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    pub host: u16,
    pub container: u16,
}

impl PortMapping {
    pub fn new(host: u16, container: u16) -> Self {
        Self { host, container }
    }
}

impl fmt::Display for PortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.container)
    }
}

/// Image builder and launcher backed by a container runtime CLI
#[derive(Clone)]
pub struct Docker {
    runner: Arc<dyn ProcessRunner>,
    runtime: ContainerRuntime,
}

impl fmt::Debug for Docker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Docker").field("runtime", &self.runtime).finish()
    }
}

impl Docker {
    pub fn new(runner: Arc<dyn ProcessRunner>, runtime: ContainerRuntime) -> Self {
        Self { runner, runtime }
    }

    pub fn runtime(&self) -> ContainerRuntime {
        self.runtime
    }

    fn command(&self) -> CommandSpec {
        CommandSpec::new(self.runtime.command())
    }

    /// Fail unless the runtime CLI is installed and its daemon answers
    pub async fn assert_available(&self) -> E2eResult<()> {
        let cmd = self.command().arg("info");
        run_checked(self.runner.as_ref(), &cmd, E2eError::DockerUnavailable).await?;
        debug!("{} is available", self.runtime);
        Ok(())
    }

    /// Build `build_file` with `context_dir` as the build context
    pub async fn build_image(&self, build_file: &Path, context_dir: &Path) -> E2eResult<ImageId> {
        info!("building image from {}", build_file.display());
        let cmd = self
            .command()
            .args(["build", "-q", "-f"])
            .arg(build_file.to_string_lossy())
            .arg(".")
            .current_dir(context_dir);

        let stdout = run_checked(self.runner.as_ref(), &cmd, E2eError::ImageBuild).await?;
        let image = ImageId::new(stdout)
            .ok_or_else(|| E2eError::ImageBuild("no image id in build output".to_string()))?;
        info!("built image {}", image);
        Ok(image)
    }

    /// Start a container from `image` in the background
    pub fn run_image(&self, image: &ImageId, ports: PortMapping) -> E2eResult<Box<dyn RunningProcess>> {
        let cmd = self
            .command()
            .args(["run", "--rm", "-p"])
            .arg(ports.to_string())
            .arg(image.as_str());

        info!("running image {} with ports {}", image, ports);
        self.runner
            .spawn(&cmd)
            .map_err(|e| E2eError::ImageRun(format!("{}: {}", cmd.program, e)))
    }

    pub async fn destroy_image(&self, image: &ImageId) -> E2eResult<()> {
        let cmd = self.command().arg("rmi").arg(image.as_str());
        run_checked(self.runner.as_ref(), &cmd, E2eError::ImageDestroy).await?;
        info!("removed image {}", image);
        Ok(())
    }
}
