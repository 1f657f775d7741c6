//! String calculator implementations
//!
//! The web application only sees the [`StringCalculator`] trait. Which
//! implementation backs it is decided at startup from [`CalculatorKind`],
//! or supplied directly by a test that wants a specific behavior.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{CalculatorError, Result};

/// Adds up to two comma-separated integers.
pub trait StringCalculator: Send + Sync + fmt::Debug {
    /// Sum the numbers in `numbers`, or classify why that isn't possible.
    fn add(&self, numbers: &str) -> Result<i64>;

    /// Short implementation name, used in logs.
    fn name(&self) -> &'static str;
}

/// The real calculator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProdStringCalculator;

impl StringCalculator for ProdStringCalculator {
    fn add(&self, numbers: &str) -> Result<i64> {
        if numbers.is_empty() {
            return Ok(0);
        }

        let parts: Vec<&str> = numbers.split(',').collect();
        if parts.len() > 2 {
            return Err(CalculatorError::TooManyNumbers(parts.len()));
        }

        let mut sum: i64 = 0;
        for part in parts {
            let value: i64 = part
                .trim()
                .parse()
                .map_err(|_| CalculatorError::InvalidNumber(part.to_string()))?;
            sum = sum
                .checked_add(value)
                .ok_or_else(|| CalculatorError::Overflow(numbers.to_string()))?;
        }
        Ok(sum)
    }

    fn name(&self) -> &'static str {
        "ProdStringCalculator"
    }
}

/// Placeholder wired in until the real calculator ships; rejects every input.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemporaryStringCalculator;

impl StringCalculator for TemporaryStringCalculator {
    fn add(&self, numbers: &str) -> Result<i64> {
        Err(CalculatorError::Temporary(numbers.to_string()))
    }

    fn name(&self) -> &'static str {
        "TemporaryStringCalculator"
    }
}

/// Calculator implementation selectable from application config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalculatorKind {
    Prod,
    #[default]
    Temporary,
}

impl CalculatorKind {
    /// Construct the implementation this kind names
    pub fn build(self) -> Arc<dyn StringCalculator> {
        match self {
            Self::Prod => Arc::new(ProdStringCalculator),
            Self::Temporary => Arc::new(TemporaryStringCalculator),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prod => "prod",
            Self::Temporary => "temporary",
        }
    }
}

impl fmt::Display for CalculatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CalculatorKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prod" => Ok(Self::Prod),
            "temporary" => Ok(Self::Temporary),
            other => Err(format!(
                "unknown calculator \"{}\" (expected \"prod\" or \"temporary\")",
                other
            )),
        }
    }
}
