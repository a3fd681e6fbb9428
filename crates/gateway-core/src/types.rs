//! Validated domain types.

use crate::error::GatewayError;
use serde::{Deserialize, Serialize};

/// Temperature used when the caller does not send one
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Sampling temperature in `[0.0, 2.0]`
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct Temperature(f32);

impl Temperature {
    /// Lowest accepted value
    pub const MIN: f32 = 0.0;
    /// Highest accepted value
    pub const MAX: f32 = 2.0;

    /// Create a validated temperature
    ///
    /// # Errors
    /// Returns a validation error when the value is NaN or outside `[0.0, 2.0]`
    pub fn new(value: f32) -> Result<Self, GatewayError> {
        if value.is_nan() || !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(GatewayError::validation(
                format!("temperature must be between 0.0 and 2.0, got {value}"),
                Some("temperature".to_string()),
                "invalid_temperature",
            ));
        }
        Ok(Self(value))
    }

    /// Raw value
    #[must_use]
    pub fn value(self) -> f32 {
        self.0
    }
}

impl Default for Temperature {
    fn default() -> Self {
        Self(DEFAULT_TEMPERATURE)
    }
}

impl TryFrom<f32> for Temperature {
    type Error = GatewayError;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Temperature> for f32 {
    fn from(t: Temperature) -> Self {
        t.0
    }
}

/// Model name with any provider prefix removed: the text after the last `/`,
/// or the whole id when it has none.
///
/// ```
/// use gateway_core::bare_model_name;
/// assert_eq!(bare_model_name("ollama/deepseek-r1:14b"), "deepseek-r1:14b");
/// assert_eq!(bare_model_name("openrouter/openai/gpt-4o"), "gpt-4o");
/// assert_eq!(bare_model_name("gpt-4"), "gpt-4");
/// ```
#[must_use]
pub fn bare_model_name(model_id: &str) -> &str {
    model_id.rsplit('/').next().unwrap_or(model_id)
}
