//! Application configuration
//!
//! `app.toml` lives in the application's config source directory (and at the
//! root of a packaged artifact). It decides which calculator implementation
//! the `/add` endpoint is wired to.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strcalc_common::{CalculatorKind, StringCalculator};

use crate::error::{WebError, WebResult};

/// File name of the application config inside a config directory
pub const APP_CONFIG_FILE: &str = "app.toml";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Calculator implementation backing `/add`
    pub calculator: CalculatorKind,

    /// File served for the application's landing page
    pub index: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            calculator: CalculatorKind::default(),
            index: "index.html".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> WebResult<Self> {
        if !path.exists() {
            tracing::debug!("no application config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| WebError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Load `app.toml` from a config source directory
    pub fn load_from_dir(dir: &Path) -> WebResult<Self> {
        Self::load(&Self::path_in(dir))
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> WebResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| WebError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(APP_CONFIG_FILE)
    }

    /// Resolve the calculator implementation this config selects
    pub fn calculator(&self) -> Arc<dyn StringCalculator> {
        let calculator = self.calculator.build();
        tracing::info!(calculator = calculator.name(), "wired calculator");
        calculator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_config_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = AppConfig::load_from_dir(tmp.path()).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.calculator, CalculatorKind::Temporary);
    }

    #[test]
    fn test_load_selects_calculator() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(APP_CONFIG_FILE), "calculator = \"prod\"\n").unwrap();

        let config = AppConfig::load_from_dir(tmp.path()).unwrap();
        assert_eq!(config.calculator, CalculatorKind::Prod);
        assert_eq!(config.index, "index.html");
        assert_eq!(config.calculator().add("1,2").unwrap(), 3);
    }

    #[test]
    fn test_invalid_config_names_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(APP_CONFIG_FILE);
        std::fs::write(&path, "calculator = \"weld\"\n").unwrap();

        let err = AppConfig::load(&path).unwrap_err();
        assert!(matches!(err, WebError::Config { .. }));
        assert!(err.to_string().contains("app.toml"));
    }

    #[test]
    fn test_save_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join(APP_CONFIG_FILE);
        let config = AppConfig {
            calculator: CalculatorKind::Prod,
            index: "home.html".to_string(),
        };
        config.save(&path).unwrap();
        assert_eq!(AppConfig::load(&path).unwrap(), config);
    }
}
