//! Router behavior for an application wired from its config

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tempfile::TempDir;
use tower::ServiceExt;

use strcalc_web::{AppConfig, ContextPath, WebApp};

fn fixture() -> TempDir {
    let tmp = TempDir::new().unwrap();
    std::fs::create_dir_all(tmp.path().join("config")).unwrap();
    std::fs::create_dir_all(tmp.path().join("static")).unwrap();
    std::fs::write(
        tmp.path().join("config").join("app.toml"),
        "calculator = \"prod\"\n",
    )
    .unwrap();
    std::fs::write(
        tmp.path().join("static").join("index.html"),
        "<h1>Hello, World!</h1>",
    )
    .unwrap();
    tmp
}

fn router(tmp: &TempDir) -> axum::Router {
    let config = AppConfig::load_from_dir(&tmp.path().join("config")).unwrap();
    WebApp::from_config(
        ContextPath::default(),
        &config,
        vec![tmp.path().join("static")],
    )
    .into_router()
}

async fn get(router: axum::Router, uri: &str) -> (StatusCode, Option<String>, String) {
    let resp = router
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn landing_page_is_served_with_and_without_trailing_slash() {
    let tmp = fixture();

    for uri in ["/strcalc", "/strcalc/", "/strcalc/index.html"] {
        let (status, content_type, body) = get(router(&tmp), uri).await;
        assert_eq!(status, StatusCode::OK, "GET {}", uri);
        assert_eq!(content_type.as_deref(), Some("text/html"));
        assert!(body.contains("Hello, World!"));
    }
}

#[tokio::test]
async fn configured_calculator_backs_add() {
    let tmp = fixture();
    let resp = router(&tmp)
        .oneshot(
            Request::post("/strcalc/add")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"numbers":"40,2"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let payload: strcalc_common::CalculatorResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(payload.result, 42);
    assert!(payload.error.is_none());
}

#[tokio::test]
async fn unknown_asset_is_404() {
    let tmp = fixture();
    let (status, _, _) = get(router(&tmp), "/strcalc/missing.js").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[test]
fn shipped_webapp_config_loads() {
    let config = AppConfig::load_from_dir(std::path::Path::new(strcalc_web::WEBAPP_CONFIG_DIR)).unwrap();
    assert_eq!(config.index, "index.html");
    assert!(std::path::Path::new(strcalc_web::WEBAPP_STATIC_DIR)
        .join("index.html")
        .is_file());
}
