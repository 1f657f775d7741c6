//! strcalc Common Library
//!
//! The calculator contract consumed by the web application, its two
//! implementations, and the JSON payloads exchanged on the `/add` endpoint.

pub mod calculator;
pub mod error;
pub mod types;

pub use calculator::{CalculatorKind, ProdStringCalculator, StringCalculator, TemporaryStringCalculator};
pub use error::{CalculatorError, Result};
pub use types::{CalculatorRequest, CalculatorResponse};

/// strcalc version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Context path the application is served under by default
pub const DEFAULT_CONTEXT_PATH: &str = "/strcalc";
