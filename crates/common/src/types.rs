//! Payloads exchanged on the `/add` endpoint

use serde::{Deserialize, Serialize};

use crate::calculator::StringCalculator;

/// Request body for `POST /add`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculatorRequest {
    pub numbers: String,
}

impl CalculatorRequest {
    pub fn new(numbers: impl Into<String>) -> Self {
        Self {
            numbers: numbers.into(),
        }
    }
}

/// Response body for `POST /add`.
///
/// `error` is only serialized when the calculator rejected the input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculatorResponse {
    #[serde(default)]
    pub result: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CalculatorResponse {
    pub fn ok(result: i64) -> Self {
        Self {
            result,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            result: 0,
            error: Some(message.into()),
        }
    }

    /// Run `request` through `calculator` and wrap the outcome
    pub fn evaluate(calculator: &dyn StringCalculator, request: &CalculatorRequest) -> Self {
        match calculator.add(&request.numbers) {
            Ok(result) => Self::ok(result),
            Err(e) => {
                tracing::debug!(calculator = calculator.name(), "add rejected: {}", e);
                Self::error(e.to_string())
            }
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
