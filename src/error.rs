//! Error types for the QueryHub report execution engine.
//!
//! Errors are split by how far they travel: `ReportError` aborts a whole
//! `execute_report` call, `ComponentError` is recorded on a single component
//! outcome and never crosses the fan-out boundary, and `ReleaseError` is
//! collected during shutdown.

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by backend clients and backend handle factories
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Backend execution failed: {0}")]
    Execution(String),

    #[error("Backend initialization failed: {0}")]
    Initialization(String),

    #[error("Backend not configured: {0}")]
    NotConfigured(String),

    #[error("Unsupported backend type '{backend_type}' (registered: {registered})")]
    UnknownBackendType {
        backend_type: String,
        registered: String,
    },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Backend I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by component renderers
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Renderer for type '{0}' not registered")]
    UnknownRenderer(String),

    #[error("Invalid render options: {0}")]
    InvalidOptions(String),

    #[error("Template rendering failed: {0}")]
    Template(String),
}

/// Classification of a terminal component error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentErrorKind {
    Backend,
    Timeout,
    Rendering,
    Resource,
    Configuration,
}

impl fmt::Display for ComponentErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ComponentErrorKind::Backend => "backend",
            ComponentErrorKind::Timeout => "timeout",
            ComponentErrorKind::Rendering => "rendering",
            ComponentErrorKind::Resource => "resource",
            ComponentErrorKind::Configuration => "configuration",
        };
        f.write_str(label)
    }
}

/// Terminal error for one component run, surfaced as data on its outcome
#[derive(Debug, Error)]
pub enum ComponentError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Component '{component_id}' timed out after {:.2}s", timeout.as_secs_f64())]
    Timeout {
        component_id: String,
        timeout: Duration,
    },

    #[error("Failed to render component '{component_id}': {source}")]
    Rendering {
        component_id: String,
        #[source]
        source: RenderError,
    },

    #[error("No handle available for backend '{backend_id}': {source}")]
    Resource {
        backend_id: String,
        #[source]
        source: BackendError,
    },

    #[error("Invalid retry settings for component '{component_id}': {source}")]
    Configuration {
        component_id: String,
        #[source]
        source: RetryPolicyError,
    },
}

impl ComponentError {
    pub fn kind(&self) -> ComponentErrorKind {
        match self {
            ComponentError::Backend(_) => ComponentErrorKind::Backend,
            ComponentError::Timeout { .. } => ComponentErrorKind::Timeout,
            ComponentError::Rendering { .. } => ComponentErrorKind::Rendering,
            ComponentError::Resource { .. } => ComponentErrorKind::Resource,
            ComponentError::Configuration { .. } => ComponentErrorKind::Configuration,
        }
    }

    /// Only plain backend failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ComponentError::Backend(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ComponentError::Timeout { .. })
    }
}

/// Fatal errors that abort a report run or executor construction
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Report '{0}' not found")]
    ReportNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Report template error: {0}")]
    Template(String),

    #[error("Report executor has been shut down")]
    ShutDown,

    #[error(transparent)]
    Release(#[from] ReleaseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for ReportError {
    fn from(err: config::ConfigError) -> Self {
        ReportError::Config(err.to_string())
    }
}

/// Invalid retry policy parameters
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RetryPolicyError {
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("backoff_seconds must be non-negative (got {0})")]
    NegativeBackoff(f64),

    #[error("backoff_multiplier must be non-negative (got {0})")]
    NegativeMultiplier(f64),

    #[error("max_backoff_seconds must be non-negative (got {0})")]
    NegativeMaxBackoff(f64),
}

impl From<RetryPolicyError> for ReportError {
    fn from(err: RetryPolicyError) -> Self {
        ReportError::Config(err.to_string())
    }
}

/// A resource that could not be released during shutdown
#[derive(Debug, Clone, Error)]
#[error("Failed to release '{resource}': {message}")]
pub struct ReleaseError {
    pub resource: String,
    pub message: String,
}

impl ReleaseError {
    pub fn new(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            message: message.into(),
        }
    }
}
