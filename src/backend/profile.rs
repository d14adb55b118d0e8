//! Backend configuration profile

use crate::error::{BackendError, RetryPolicyError};
use crate::retry::RetryPolicy;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Configuration for one named backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend id; filled from the table key when omitted
    #[serde(default)]
    pub id: String,

    /// Factory type, e.g. "csv" or "rest"
    #[serde(rename = "type")]
    pub backend_type: String,

    /// Per-attempt timeout for components that don't set their own
    #[serde(default = "default_timeout_seconds")]
    pub default_timeout_seconds: f64,

    /// Attempt budget for components that don't set `retries`
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(default = "default_retry_backoff_seconds")]
    pub retry_backoff_seconds: f64,

    #[serde(default = "default_retry_backoff_multiplier")]
    pub retry_backoff_multiplier: f64,

    #[serde(default = "default_max_backoff_seconds")]
    pub max_backoff_seconds: f64,

    /// Backend-specific settings (file paths, base URLs, headers)
    #[serde(default)]
    pub options: Map<String, Value>,

    #[serde(default)]
    pub metadata: Map<String, Value>,
}

fn default_timeout_seconds() -> f64 {
    30.0
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_backoff_seconds() -> f64 {
    1.5
}

fn default_retry_backoff_multiplier() -> f64 {
    1.0
}

fn default_max_backoff_seconds() -> f64 {
    30.0
}

impl BackendConfig {
    pub fn new(id: impl Into<String>, backend_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            backend_type: backend_type.into(),
            default_timeout_seconds: default_timeout_seconds(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_seconds: default_retry_backoff_seconds(),
            retry_backoff_multiplier: default_retry_backoff_multiplier(),
            max_backoff_seconds: default_max_backoff_seconds(),
            options: Map::new(),
            metadata: Map::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.default_timeout_seconds).unwrap_or(Duration::MAX)
    }

    /// Retry policy for a component on this backend.
    ///
    /// `attempts` overrides the backend budget; zero is raised to one attempt.
    pub fn retry_policy(&self, attempts: Option<u32>) -> Result<RetryPolicy, RetryPolicyError> {
        let attempts = attempts.unwrap_or(self.retry_attempts).max(1);
        RetryPolicy::new(
            attempts,
            self.retry_backoff_seconds,
            self.retry_backoff_multiplier,
            self.max_backoff_seconds,
        )
    }

    /// Deserialize `options` into a backend-specific settings struct.
    pub fn options<T: DeserializeOwned>(&self) -> Result<T, BackendError> {
        serde_json::from_value(Value::Object(self.options.clone())).map_err(|e| {
            BackendError::Initialization(format!("Invalid options for backend '{}': {}", self.id, e))
        })
    }

    /// Validate backend configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.backend_type.trim().is_empty() {
            return Err("Backend type cannot be empty".to_string());
        }
        if !(self.default_timeout_seconds > 0.0) {
            return Err(format!(
                "default_timeout_seconds must be positive (got {})",
                self.default_timeout_seconds
            ));
        }
        self.retry_policy(None).map_err(|e| e.to_string())?;
        Ok(())
    }
}
