//! Context path: the URL prefix the application is served under

use std::fmt;
use std::str::FromStr;

use crate::error::{WebError, WebResult};

/// A validated context path: `/`, or a path starting with `/` that does
/// not end with `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextPath(String);

impl ContextPath {
    pub fn parse(path: &str) -> WebResult<Self> {
        if path != "/" && (!path.starts_with('/') || path.ends_with('/')) {
            return Err(WebError::InvalidContextPath(path.to_string()));
        }
        Ok(Self(path.to_string()))
    }

    pub fn root() -> Self {
        Self("/".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Prefix to put in front of a `/`-rooted endpoint path.
    ///
    /// Empty for the root context so joined paths never start with `//`.
    pub fn prefix(&self) -> &str {
        if self.is_root() {
            ""
        } else {
            &self.0
        }
    }

    /// Join an endpoint path (which must begin with `/`) onto this context
    pub fn join(&self, endpoint: &str) -> String {
        format!("{}{}", self.prefix(), endpoint)
    }

    /// Strip this context from a request path, returning the path relative
    /// to the application (always `/`-rooted), or `None` if the request is
    /// outside the context.
    pub fn strip<'a>(&self, request_path: &'a str) -> Option<&'a str> {
        if self.is_root() {
            return Some(request_path);
        }
        match request_path.strip_prefix(self.0.as_str()) {
            Some("") => Some("/"),
            Some(rest) if rest.starts_with('/') => Some(rest),
            _ => None,
        }
    }
}

impl Default for ContextPath {
    fn default() -> Self {
        Self(strcalc_common::DEFAULT_CONTEXT_PATH.to_string())
    }
}

impl fmt::Display for ContextPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContextPath {
    type Err = WebError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
