//! Static file serving
//!
//! Files are looked up in an ordered list of roots; the first root that has
//! the file wins, so backend build resources can shadow frontend assets.
//! Each hit is read fully into memory, so no file handle outlives the
//! request and the roots can be deleted as soon as the server stops.

use std::path::{Component, Path, PathBuf};

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

/// Static file handler
#[derive(Debug, Clone)]
pub struct StaticFiles {
    roots: Vec<PathBuf>,
    index: String,
}

impl StaticFiles {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        for root in &roots {
            if !root.is_dir() {
                tracing::debug!("static root {} does not exist, skipping", root.display());
            }
        }
        Self {
            roots,
            index: "index.html".to_string(),
        }
    }

    /// Serve `index` for directory requests
    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = index.into();
        self
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Find the file backing an application-relative request path.
    ///
    /// Paths that try to climb out of a root resolve to nothing.
    pub fn resolve(&self, path: &str) -> Option<PathBuf> {
        let relative = sanitize(path)?;
        let relative = if relative.as_os_str().is_empty() || path.ends_with('/') {
            relative.join(&self.index)
        } else {
            relative
        };

        self.roots
            .iter()
            .map(|root| root.join(&relative))
            .find(|candidate| candidate.is_file())
    }

    /// Serve a static file
    pub async fn serve(&self, path: &str) -> Response {
        let Some(full_path) = self.resolve(path) else {
            return (StatusCode::NOT_FOUND, "Not found").into_response();
        };

        match tokio::fs::read(&full_path).await {
            Ok(bytes) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, guess_content_type(&full_path))],
                bytes,
            )
                .into_response(),
            Err(e) => {
                tracing::warn!("failed to read {}: {}", full_path.display(), e);
                (StatusCode::NOT_FOUND, "Not found").into_response()
            }
        }
    }
}

fn sanitize(path: &str) -> Option<PathBuf> {
    let mut clean = PathBuf::new();
    for component in Path::new(path.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(clean)
}

fn guess_content_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_first_root_wins() {
        let resources = TempDir::new().unwrap();
        let assets = TempDir::new().unwrap();
        write(resources.path(), "app.js", "resources");
        write(assets.path(), "app.js", "assets");
        write(assets.path(), "style.css", "assets");

        let files = StaticFiles::new(vec![resources.path().into(), assets.path().into()]);
        assert_eq!(files.resolve("/app.js").unwrap(), resources.path().join("app.js"));
        assert_eq!(files.resolve("/style.css").unwrap(), assets.path().join("style.css"));
    }

    #[test]
    fn test_directory_requests_get_index() {
        let assets = TempDir::new().unwrap();
        write(assets.path(), "index.html", "<h1>Hello, World!</h1>");
        write(assets.path(), "docs/index.html", "docs");

        let files = StaticFiles::new(vec![assets.path().into()]);
        assert_eq!(files.resolve("/").unwrap(), assets.path().join("index.html"));
        assert_eq!(files.resolve("/docs/").unwrap(), assets.path().join("docs/index.html"));
    }

    #[test]
    fn test_traversal_rejected() {
        let outer = TempDir::new().unwrap();
        write(outer.path(), "secret.txt", "nope");
        let root = outer.path().join("root");
        std::fs::create_dir_all(&root).unwrap();

        let files = StaticFiles::new(vec![root]);
        assert!(files.resolve("/../secret.txt").is_none());
    }

    #[test]
    fn test_missing_roots_are_skipped() {
        let files = StaticFiles::new(vec![PathBuf::from("/nonexistent/strcalc/assets")]);
        assert!(files.resolve("/index.html").is_none());
    }

    #[test]
    fn test_content_types() {
        assert_eq!(guess_content_type(Path::new("index.html")), "text/html");
        assert_eq!(guess_content_type(Path::new("style.css")), "text/css");
        assert_eq!(guess_content_type(Path::new("blob")), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_serve_missing_is_404() {
        let assets = TempDir::new().unwrap();
        let files = StaticFiles::new(vec![assets.path().into()]);
        let resp = files.serve("/missing.js").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
