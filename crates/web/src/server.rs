//! Web application router
//!
//! The application is a set of endpoints plus layered static assets, all
//! mounted under a [`ContextPath`]. Endpoints are registered at
//! `<context><endpoint>`; everything else inside the context falls through to
//! the static files, and anything outside it is a 404.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Json, Response},
    routing::{get, MethodRouter},
    Router,
};
use strcalc_common::{CalculatorRequest, CalculatorResponse, StringCalculator};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::context::ContextPath;
use crate::static_files::StaticFiles;

/// Body returned by `GET /add`
pub const ADD_PLACEHOLDER: &str = "placeholder for /add API endpoint";

/// A request handler that knows where it wants to be mounted.
pub trait Endpoint {
    /// Path relative to the context root; must begin with `/`
    fn path(&self) -> &str;

    /// Name used in logs
    fn name(&self) -> &str;

    fn into_method_router(self) -> MethodRouter;
}

/// The `/add` endpoint, backed by a [`StringCalculator`].
///
/// `GET` returns a plain-text placeholder, `POST` takes a JSON
/// [`CalculatorRequest`] and answers with a [`CalculatorResponse`].
#[derive(Debug, Clone)]
pub struct AddEndpoint {
    calculator: Arc<dyn StringCalculator>,
}

impl AddEndpoint {
    pub const PATH: &'static str = "/add";

    pub fn new(calculator: Arc<dyn StringCalculator>) -> Self {
        debug!(calculator = calculator.name(), "created AddEndpoint");
        Self { calculator }
    }

    pub fn calculator(&self) -> &Arc<dyn StringCalculator> {
        &self.calculator
    }
}

impl Endpoint for AddEndpoint {
    fn path(&self) -> &str {
        Self::PATH
    }

    fn name(&self) -> &str {
        "AddEndpoint"
    }

    fn into_method_router(self) -> MethodRouter {
        get(add_placeholder_handler)
            .post(add_handler)
            .with_state(self.calculator)
    }
}

async fn add_placeholder_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        ADD_PLACEHOLDER,
    )
}

async fn add_handler(
    State(calculator): State<Arc<dyn StringCalculator>>,
    body: Bytes,
) -> Response {
    let payload = match serde_json::from_slice::<CalculatorRequest>(&body) {
        Ok(request) => CalculatorResponse::evaluate(calculator.as_ref(), &request),
        Err(e) => CalculatorResponse::error(format!("invalid request body: {}", e)),
    };

    let status = if payload.is_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };
    (status, Json(payload)).into_response()
}

/// The hosted application, ready to be turned into a [`Router`]
pub struct WebApp {
    context: ContextPath,
    routes: Vec<(String, MethodRouter)>,
    static_files: Option<StaticFiles>,
}

impl WebApp {
    /// An application with no endpoints and no static files
    pub fn new(context: ContextPath) -> Self {
        Self {
            context,
            routes: Vec::new(),
            static_files: None,
        }
    }

    /// Wire the application the way its config describes: the configured
    /// calculator behind `/add`, and static files from `static_roots`.
    pub fn from_config(context: ContextPath, config: &AppConfig, static_roots: Vec<PathBuf>) -> Self {
        Self::new(context)
            .with_endpoint(AddEndpoint::new(config.calculator()))
            .with_static_files(StaticFiles::new(static_roots).with_index(config.index.clone()))
    }

    pub fn with_endpoint<E: Endpoint>(self, endpoint: E) -> Self {
        let path = endpoint.path().to_string();
        debug!("registering {} at {}", endpoint.name(), self.context.join(&path));
        self.with_route(path, endpoint.into_method_router())
    }

    /// Register a handler at `path` (relative to the context root)
    pub fn with_route(mut self, path: impl Into<String>, handler: MethodRouter) -> Self {
        self.routes.push((path.into(), handler));
        self
    }

    pub fn with_static_files(mut self, static_files: StaticFiles) -> Self {
        self.static_files = Some(static_files);
        self
    }

    pub fn context_path(&self) -> &ContextPath {
        &self.context
    }

    /// Create router
    pub fn into_router(self) -> Router {
        let mut router = Router::new();
        for (path, handler) in self.routes {
            router = router.route(&self.context.join(&path), handler);
        }

        let fallback = Arc::new(Fallback {
            context: self.context,
            static_files: self.static_files,
        });

        router
            .fallback(move |uri: Uri| {
                let fallback = fallback.clone();
                async move { fallback.handle(&uri).await }
            })
            .layer(TraceLayer::new_for_http())
    }
}

struct Fallback {
    context: ContextPath,
    static_files: Option<StaticFiles>,
}

impl Fallback {
    async fn handle(&self, uri: &Uri) -> Response {
        match (self.context.strip(uri.path()), &self.static_files) {
            (Some(path), Some(files)) => files.serve(path).await,
            _ => not_found_handler().await.into_response(),
        }
    }
}

async fn not_found_handler() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not found")
}

/// Serve `app` on an already-bound listener until `shutdown` resolves
pub async fn serve<F>(listener: tokio::net::TcpListener, app: WebApp, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!("strcalc starting on http://{}{}", addr, app.context_path().prefix());

    axum::serve(listener, app.into_router())
        .with_graceful_shutdown(shutdown)
        .await
}
