//! Test environment configuration
//!
//! Loaded from `strcalc-e2e.toml` (or the file named by `STRCALC_E2E_CONFIG`)
//! when present, then overridden field by field from `STRCALC_E2E_*`
//! environment variables.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::docker::ContainerRuntime;
use crate::embedded::{BuildInputs, EmbeddedTestServer, DEFAULT_ARTIFACT_DIR, DEFAULT_SHUTDOWN_GRACE};
use crate::error::{E2eError, E2eResult};
use crate::process::{ProcessRunner, TokioProcessRunner};
use crate::remote::{Readiness, RemoteServerConfig, RemoteTestServer, DEFAULT_BUILD_FILE};

/// Config file looked up in the current directory
pub const DEFAULT_CONFIG_FILE: &str = "strcalc-e2e.toml";

/// Environment variable naming an alternative config file
pub const CONFIG_ENV: &str = "STRCALC_E2E_CONFIG";

const ENV_PREFIX: &str = "STRCALC_E2E_";

/// Test environment configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestEnvConfig {
    /// Container runtime CLI
    pub runtime: ContainerRuntime,

    /// Containerized server settings
    pub remote: RemoteConfig,

    /// In-process server settings
    pub embedded: EmbeddedConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Build file, relative to the repository root
    pub build_file: PathBuf,

    pub container_port: u16,

    /// Path appended to the container's base address
    pub base_path: String,

    /// Wait after launching before the server is considered up
    pub start_settle_ms: u64,

    /// Wait after stopping the container before removing its image
    pub stop_settle_ms: u64,

    /// Poll this path until it answers, after the settle delay
    pub readiness_path: Option<String>,

    pub readiness_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            build_file: PathBuf::from(DEFAULT_BUILD_FILE),
            container_port: strcalc_web::CONTAINER_PORT,
            base_path: String::new(),
            start_settle_ms: 2000,
            stop_settle_ms: 500,
            readiness_path: None,
            readiness_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddedConfig {
    pub context_path: String,

    /// Base directory; per-port default under `target/` when unset
    pub base_dir: Option<PathBuf>,

    pub artifact_dir: PathBuf,

    pub config_dir: PathBuf,
    pub resources_dir: PathBuf,
    pub assets_dir: PathBuf,

    pub shutdown_grace_ms: u64,
}

impl Default for EmbeddedConfig {
    fn default() -> Self {
        let inputs = BuildInputs::default();
        Self {
            context_path: strcalc_common::DEFAULT_CONTEXT_PATH.to_string(),
            base_dir: None,
            artifact_dir: PathBuf::from(DEFAULT_ARTIFACT_DIR),
            config_dir: inputs.config_dir,
            resources_dir: inputs.resources_dir,
            assets_dir: inputs.assets_dir,
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE.as_millis() as u64,
        }
    }
}

impl TestEnvConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> E2eResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| E2eError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Config file plus environment overrides
    pub fn from_env() -> E2eResult<Self> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let mut config = Self::load(Path::new(&path))?;
        config.apply_overrides(|key| std::env::var(format!("{}{}", ENV_PREFIX, key)).ok())?;
        Ok(config)
    }

    /// Override fields from `lookup`, keyed by the variable name without
    /// its `STRCALC_E2E_` prefix
    pub fn apply_overrides<F>(&mut self, lookup: F) -> E2eResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("RUNTIME") {
            self.runtime = v.parse()?;
        }
        if let Some(v) = lookup("BUILD_FILE") {
            self.remote.build_file = PathBuf::from(v);
        }
        if let Some(v) = lookup("CONTAINER_PORT") {
            self.remote.container_port = parse_number("CONTAINER_PORT", &v)?;
        }
        if let Some(v) = lookup("START_SETTLE_MS") {
            self.remote.start_settle_ms = parse_number("START_SETTLE_MS", &v)?;
        }
        if let Some(v) = lookup("STOP_SETTLE_MS") {
            self.remote.stop_settle_ms = parse_number("STOP_SETTLE_MS", &v)?;
        }
        if let Some(v) = lookup("READINESS_PATH") {
            self.remote.readiness_path = Some(v);
        }
        if let Some(v) = lookup("CONTEXT_PATH") {
            self.embedded.context_path = v;
        }
        if let Some(v) = lookup("BASE_DIR") {
            self.embedded.base_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("ARTIFACT_DIR") {
            self.embedded.artifact_dir = PathBuf::from(v);
        }
        Ok(())
    }

    pub fn start_settle(&self) -> Duration {
        Duration::from_millis(self.remote.start_settle_ms)
    }

    pub fn stop_settle(&self) -> Duration {
        Duration::from_millis(self.remote.stop_settle_ms)
    }

    pub fn remote_server_config(&self) -> RemoteServerConfig {
        RemoteServerConfig {
            build_file: self.remote.build_file.clone(),
            container_port: self.remote.container_port,
            base_path: self.remote.base_path.clone(),
            readiness: self.remote.readiness_path.as_ref().map(|path| Readiness {
                path: path.clone(),
                timeout: Duration::from_secs(self.remote.readiness_timeout_secs),
            }),
        }
    }

    pub fn build_inputs(&self) -> BuildInputs {
        BuildInputs {
            config_dir: self.embedded.config_dir.clone(),
            resources_dir: self.embedded.resources_dir.clone(),
            assets_dir: self.embedded.assets_dir.clone(),
        }
    }

    /// A containerized server driven by the real container runtime
    pub fn remote_server(&self) -> RemoteTestServer {
        let runner: Arc<dyn ProcessRunner> = Arc::new(TokioProcessRunner::default());
        RemoteTestServer::new(runner, self.runtime, self.remote_server_config())
    }

    /// An in-process server on `port`
    pub fn embedded_server(&self, port: u16) -> E2eResult<EmbeddedTestServer> {
        let server = EmbeddedTestServer::new(port, &self.embedded.context_path)?
            .with_artifact_dir(&self.embedded.artifact_dir)
            .with_static_dir(&self.embedded.assets_dir)
            .with_shutdown_grace(Duration::from_millis(self.embedded.shutdown_grace_ms));
        Ok(match &self.embedded.base_dir {
            Some(dir) => server.with_base_dir(dir),
            None => server,
        })
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> E2eResult<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| E2eError::Config(format!("{}{}={:?}: {}", ENV_PREFIX, key, value, e)))
}
