//! In-process test server
//!
//! [`EmbeddedTestServer`] hosts the strcalc web application on the caller's
//! tokio runtime. Each [`start`](EmbeddedTestServer::start) picks one of
//! three provisioning modes; all of them produce a [`HostedContext`] that a
//! single startup routine binds and serves:
//!
//! - [`Provisioning::BuildInputs`]: `app.toml` from the config source dir,
//!   backend resources layered over the frontend assets. Slow path.
//! - [`Provisioning::Handler`]: one caller-supplied handler, no config.
//!   Fast path for injecting a substitute calculator.
//! - [`Provisioning::Artifact`]: a packaged archive from the artifact dir,
//!   extracted into the base directory.
//!
//! The server owns a base directory that is created on start and removed,
//! contents first, on stop.

use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::routing::MethodRouter;
use strcalc_web::artifact::{self, DEFAULT_ARTIFACT_NAME};
use strcalc_web::{AppConfig, ContextPath, Endpoint, StaticFiles, WebApp};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;
use walkdir::WalkDir;

use crate::error::{E2eError, E2eResult};
use crate::port::pick_unused_port;

/// Parent of the per-port base directories
pub const DEFAULT_BASE_DIR_ROOT: &str = "target/test-server-basedir";

/// Where packaged artifacts are looked up
pub const DEFAULT_ARTIFACT_DIR: &str = "target/artifacts";

/// How long a stopping server may take before its task is aborted
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Subdirectory of the base dir an artifact is extracted into
const ARTIFACT_WORK_DIR: &str = "artifact";

/// Application inputs as laid out in the source tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInputs {
    /// Directory holding `app.toml`
    pub config_dir: PathBuf,

    /// Backend build resources; shadow same-named assets
    pub resources_dir: PathBuf,

    /// Frontend build output
    pub assets_dir: PathBuf,
}

impl Default for BuildInputs {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from(strcalc_web::WEBAPP_CONFIG_DIR),
            resources_dir: Path::new(strcalc_web::WEBAPP_CONFIG_DIR).join("resources"),
            assets_dir: PathBuf::from(strcalc_web::WEBAPP_STATIC_DIR),
        }
    }
}

/// A single handler mounted at `path` under the context root
pub struct HandlerSpec {
    path: String,
    name: String,
    router: MethodRouter,
}

impl HandlerSpec {
    pub fn new(path: impl Into<String>, router: MethodRouter) -> Self {
        let path = path.into();
        Self {
            name: path.clone(),
            path,
            router,
        }
    }

    pub fn endpoint<E: Endpoint>(endpoint: E) -> Self {
        let path = endpoint.path().to_string();
        let name = endpoint.name().to_string();
        Self {
            path,
            name,
            router: endpoint.into_method_router(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl std::fmt::Debug for HandlerSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerSpec")
            .field("path", &self.path)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// How to assemble the hosted application
#[derive(Debug)]
pub enum Provisioning {
    BuildInputs(BuildInputs),
    Handler(HandlerSpec),
    /// File name of an archive inside the artifact directory
    Artifact(String),
}

impl Provisioning {
    pub fn handler<E: Endpoint>(endpoint: E) -> Self {
        Self::Handler(HandlerSpec::endpoint(endpoint))
    }

    /// The default artifact produced by `strcalc-web package`
    pub fn default_artifact() -> Self {
        Self::Artifact(DEFAULT_ARTIFACT_NAME.to_string())
    }

    fn mode(&self) -> &'static str {
        match self {
            Self::BuildInputs(_) => "build inputs",
            Self::Handler(_) => "handler",
            Self::Artifact(_) => "artifact",
        }
    }
}

impl Default for Provisioning {
    fn default() -> Self {
        Self::BuildInputs(BuildInputs::default())
    }
}

/// An assembled application, ready to bind
pub struct HostedContext {
    app: WebApp,
    mode: &'static str,
}

enum ServerState {
    Idle,
    Running {
        shutdown: oneshot::Sender<()>,
        task: JoinHandle<std::io::Result<()>>,
        base_url: Url,
    },
}

/// The web application hosted on the current tokio runtime
pub struct EmbeddedTestServer {
    port: u16,
    context: ContextPath,
    base_dir: PathBuf,
    artifact_dir: PathBuf,
    static_dir: PathBuf,
    shutdown_grace: Duration,
    state: ServerState,
}

impl EmbeddedTestServer {
    /// A server for `port` under `context_path`.
    ///
    /// Fails with [`E2eError::InvalidArgument`] if the context path is not
    /// `/` or does not start with `/`, or ends with `/`.
    pub fn new(port: u16, context_path: &str) -> E2eResult<Self> {
        let context = ContextPath::parse(context_path)?;
        Ok(Self {
            port,
            context,
            base_dir: Path::new(DEFAULT_BASE_DIR_ROOT).join(format!("strcalc-{}", port)),
            artifact_dir: PathBuf::from(DEFAULT_ARTIFACT_DIR),
            static_dir: PathBuf::from(strcalc_web::WEBAPP_STATIC_DIR),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            state: ServerState::Idle,
        })
    }

    /// A server on a port picked by the OS
    pub fn on_unused_port(context_path: &str) -> E2eResult<Self> {
        Self::new(pick_unused_port()?, context_path)
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = dir.into();
        self
    }

    /// Assets attached in handler mode, when the directory exists
    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = dir.into();
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn context_path(&self) -> &ContextPath {
        &self.context
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
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

    /// Absolute address of `relative` under this server's context root.
    ///
    /// Works whether or not the server is running.
    pub fn resolve_endpoint(&self, relative: &str) -> E2eResult<Url> {
        if !relative.starts_with('/') {
            return Err(E2eError::InvalidArgument(format!(
                "endpoint path should begin with '/', got: \"{}\"",
                relative
            )));
        }
        self.url_for(&self.context.join(relative))
    }

    fn url_for(&self, path: &str) -> E2eResult<Url> {
        Url::parse(&format!("http://localhost:{}{}", self.port, path))
            .map_err(|e| E2eError::InvalidArgument(format!("invalid endpoint path \"{}\": {}", path, e)))
    }

    /// Assemble the application and start serving it.
    ///
    /// Returns the existing base address if already running. A failed start
    /// leaves the server idle with its base directory removed.
    pub async fn start(&mut self, provisioning: Provisioning) -> E2eResult<Url> {
        if let ServerState::Running { base_url, .. } = &self.state {
            return Ok(base_url.clone());
        }

        let base_url = self.url_for(self.context.prefix())?;
        std::fs::create_dir_all(&self.base_dir)?;
        match self.launch(provisioning, base_url.clone()).await {
            Ok(state) => {
                self.state = state;
                Ok(base_url)
            }
            Err(e) => {
                if let Err(cleanup) = remove_base_dir(&self.base_dir) {
                    warn!("{}", cleanup);
                }
                Err(e)
            }
        }
    }

    async fn launch(&self, provisioning: Provisioning, base_url: Url) -> E2eResult<ServerState> {
        let hosted = self.provision(provisioning)?;
        self.serve(hosted, base_url).await
    }

    fn provision(&self, provisioning: Provisioning) -> E2eResult<HostedContext> {
        let mode = provisioning.mode();
        debug!("provisioning {} from {}", self.context, mode);

        let app = match provisioning {
            Provisioning::BuildInputs(inputs) => {
                let config = AppConfig::load_from_dir(&inputs.config_dir)?;
                WebApp::from_config(
                    self.context.clone(),
                    &config,
                    vec![inputs.resources_dir, inputs.assets_dir],
                )
            }
            Provisioning::Handler(handler) => {
                if !handler.path.starts_with('/') {
                    return Err(E2eError::InvalidArgument(format!(
                        "handler path should begin with '/', got: \"{}\"",
                        handler.path
                    )));
                }
                debug!("registering {} at {}", handler.name, self.context.join(&handler.path));
                let app = WebApp::new(self.context.clone()).with_route(handler.path, handler.router);
                if self.static_dir.is_dir() {
                    app.with_static_files(StaticFiles::new(vec![self.static_dir.clone()]))
                } else {
                    app
                }
            }
            Provisioning::Artifact(name) => {
                let archive = self.artifact_dir.join(name);
                if !archive.is_file() {
                    return Err(E2eError::NotFound(archive));
                }
                let unpacked = artifact::unpack(&archive, &self.base_dir.join(ARTIFACT_WORK_DIR))?;
                let config = unpacked.config()?;
                WebApp::from_config(self.context.clone(), &config, vec![unpacked.static_dir()])
            }
        };

        Ok(HostedContext { app, mode })
    }

    async fn serve(&self, hosted: HostedContext, base_url: Url) -> E2eResult<ServerState> {
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", self.port))
            .await
            .map_err(|e| E2eError::ServerStartup(format!("bind 127.0.0.1:{}: {}", self.port, e)))?;

        let (shutdown, signal) = oneshot::channel::<()>();
        let task = tokio::spawn(strcalc_web::server::serve(listener, hosted.app, async move {
            // A dropped sender also means shut down
            let _ = signal.await;
        }));

        info!("embedded test server ({}) running at {}", hosted.mode, base_url);
        Ok(ServerState::Running {
            shutdown,
            task,
            base_url,
        })
    }

    /// Stop serving and delete the base directory. No-op when idle.
    ///
    /// Deletion continues past failures; every path that could not be
    /// removed is listed in the returned [`E2eError::BaseDirCleanup`].
    pub async fn stop(&mut self) -> E2eResult<()> {
        let ServerState::Running { shutdown, mut task, base_url } =
            std::mem::replace(&mut self.state, ServerState::Idle)
        else {
            return Ok(());
        };

        info!("stopping embedded test server at {}", base_url);
        let _ = shutdown.send(());

        // Idle keep-alive connections are not waited for past the grace period
        match tokio::time::timeout(self.shutdown_grace, &mut task).await {
            Ok(Ok(Ok(()))) => debug!("server task finished"),
            Ok(Ok(Err(e))) => warn!("server exited with error: {}", e),
            Ok(Err(e)) => warn!("server task failed: {}", e),
            Err(_) => {
                warn!(
                    "server did not shut down within {:?}, aborting",
                    self.shutdown_grace
                );
                task.abort();
                let _ = task.await;
            }
        }

        remove_base_dir(&self.base_dir)
    }
}

/// Delete `dir` deepest-first, collecting every path that resists
fn remove_base_dir(dir: &Path) -> E2eResult<()> {
    remove_tree(dir, |path, is_dir| {
        if is_dir {
            std::fs::remove_dir(path)
        } else {
            std::fs::remove_file(path)
        }
    })
}

/// Walk `dir` contents-first, handing each entry to `remove`. A failure is
/// recorded and the walk carries on, so one stuck file does not keep its
/// siblings around.
fn remove_tree<F>(dir: &Path, mut remove: F) -> E2eResult<()>
where
    F: FnMut(&Path, bool) -> std::io::Result<()>,
{
    if !dir.exists() {
        return Ok(());
    }

    let mut failed = Vec::new();
    for entry in WalkDir::new(dir).contents_first(true) {
        match entry {
            Ok(entry) => {
                let path = entry.path();
                if let Err(e) = remove(path, entry.file_type().is_dir()) {
                    debug!("failed to delete {}: {}", path.display(), e);
                    failed.push(path.to_path_buf());
                }
            }
            Err(e) => {
                let path = e.path().unwrap_or(dir).to_path_buf();
                debug!("failed to walk {}: {}", path.display(), e);
                failed.push(path);
            }
        }
    }

    if failed.is_empty() {
        debug!("deleted {}", dir.display());
        Ok(())
    } else {
        Err(E2eError::BaseDirCleanup(failed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_endpoint() {
        let server = EmbeddedTestServer::new(8080, "/strcalc").unwrap();
        assert_eq!(
            server.resolve_endpoint("/add").unwrap().as_str(),
            "http://localhost:8080/strcalc/add"
        );
    }

    #[test]
    fn test_resolve_endpoint_root_context() {
        let server = EmbeddedTestServer::new(8080, "/").unwrap();
        assert_eq!(
            server.resolve_endpoint("/add").unwrap().as_str(),
            "http://localhost:8080/add"
        );
    }

    #[test]
    fn test_resolve_endpoint_requires_leading_slash() {
        let server = EmbeddedTestServer::new(8080, "/strcalc").unwrap();
        let err = server.resolve_endpoint("add").unwrap_err();
        assert!(matches!(err, E2eError::InvalidArgument(_)));
        assert!(err.to_string().contains("should begin with '/'"));
        assert!(!server.base_dir().exists());
    }

    #[test]
    fn test_invalid_context_path() {
        for bad in ["add", "/strcalc/", ""] {
            let err = EmbeddedTestServer::new(8080, bad).err().unwrap();
            assert!(matches!(err, E2eError::InvalidArgument(_)), "{}", bad);
        }
    }

    #[test]
    fn test_default_base_dir_is_per_port() {
        let a = EmbeddedTestServer::new(4000, "/strcalc").unwrap();
        let b = EmbeddedTestServer::new(4001, "/strcalc").unwrap();
        assert_ne!(a.base_dir(), b.base_dir());
        assert!(a.base_dir().ends_with("strcalc-4000"));
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_noop() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().join("base");
        std::fs::create_dir_all(&base).unwrap();

        let mut server = EmbeddedTestServer::new(8080, "/strcalc").unwrap().with_base_dir(&base);
        server.stop().await.unwrap();
        // Never started, so the directory is left alone
        assert!(base.exists());
    }

    #[test]
    fn test_remove_base_dir() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().join("base");
        std::fs::create_dir_all(base.join("a/b")).unwrap();
        std::fs::write(base.join("a/b/file.txt"), "x").unwrap();
        std::fs::write(base.join("top.txt"), "y").unwrap();

        remove_base_dir(&base).unwrap();
        assert!(!base.exists());

        // Already gone
        remove_base_dir(&base).unwrap();
    }

    #[test]
    fn test_remove_tree_reports_every_failure() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().join("base");
        let locked = base.join("locked");
        std::fs::create_dir_all(&locked).unwrap();
        std::fs::write(locked.join("stuck.txt"), "x").unwrap();
        std::fs::write(locked.join("also-stuck.txt"), "x").unwrap();
        std::fs::write(base.join("loose.txt"), "y").unwrap();

        let err = remove_tree(&base, |path, is_dir| {
            if path.parent() == Some(locked.as_path()) {
                return Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
            }
            if is_dir {
                std::fs::remove_dir(path)
            } else {
                std::fs::remove_file(path)
            }
        })
        .unwrap_err();

        // Siblings of the stuck files are still removed
        assert!(!base.join("loose.txt").exists());
        match &err {
            E2eError::BaseDirCleanup(paths) => {
                assert_eq!(paths.len(), 4, "{:?}", paths);
                assert!(paths.contains(&locked.join("stuck.txt")));
                assert!(paths.contains(&locked.join("also-stuck.txt")));
                // Parents stay non-empty and fail in turn
                assert!(paths.contains(&locked));
                assert!(paths.contains(&base));
            }
            other => panic!("unexpected error: {}", other),
        }
        let msg = err.to_string();
        assert!(msg.starts_with("failed to delete server working dir(s):"));
        assert!(msg.contains("also-stuck.txt"));
    }

    #[tokio::test]
    async fn test_missing_artifact_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let port = pick_unused_port().unwrap();
        let mut server = EmbeddedTestServer::new(port, "/strcalc")
            .unwrap()
            .with_base_dir(tmp.path().join("base"))
            .with_artifact_dir(tmp.path().join("artifacts"));

        let err = server.start(Provisioning::default_artifact()).await.unwrap_err();
        match err {
            E2eError::NotFound(path) => assert!(path.ends_with("artifacts/strcalc.tar.gz")),
            other => panic!("unexpected error: {}", other),
        }
        assert!(!server.is_running());
        assert!(!tmp.path().join("base").exists());
    }
}
