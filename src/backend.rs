//! Backend Abstraction
//!
//! A backend is a named, configured data source that executes component
//! queries. Handles are created by a [`BackendFactory`] looked up by backend
//! type, cached per backend id by the provider resolver, and closed once at
//! shutdown.

use crate::error::BackendError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

pub mod csv;
pub mod profile;
pub mod resolver;
pub mod rest;

pub use profile::BackendConfig;
pub use resolver::ProviderResolver;

/// Data returned by a backend query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub data: Value,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl QueryResult {
    pub fn new(data: Value) -> Self {
        Self {
            data,
            metadata: Map::new(),
            content_type: None,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Number of rows when the data is an array.
    pub fn row_count(&self) -> Option<usize> {
        self.data.as_array().map(Vec::len)
    }
}

/// Client for one configured backend
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Run a query and return its data
    async fn execute(&self, query: &Value) -> Result<QueryResult, BackendError>;

    /// Release connections or other held state
    async fn close(&self) -> Result<(), BackendError> {
        Ok(())
    }

    /// Backend type name, e.g. "csv"
    fn backend_type(&self) -> &str;
}

/// Creates backend clients from configuration
///
/// Creation may connect or authenticate, so it is async; the pool runs it at
/// most once per backend id at a time.
#[async_trait]
pub trait BackendFactory: Send + Sync {
    async fn create(&self, config: &BackendConfig) -> Result<Arc<dyn BackendClient>, BackendError>;
}

#[async_trait]
impl<F> BackendFactory for F
where
    F: Fn(&BackendConfig) -> Result<Arc<dyn BackendClient>, BackendError> + Send + Sync,
{
    async fn create(&self, config: &BackendConfig) -> Result<Arc<dyn BackendClient>, BackendError> {
        self(config)
    }
}

/// Backend factories keyed by backend type
#[derive(Clone, Default)]
pub struct BackendRegistry {
    factories: BTreeMap<String, Arc<dyn BackendFactory>>,
}

impl BackendRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `csv` and `rest` backends
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("csv", Arc::new(csv::CsvBackendFactory));
        registry.register("rest", Arc::new(rest::RestBackendFactory));
        registry
    }

    /// Register or replace the factory for a backend type
    pub fn register(&mut self, backend_type: impl Into<String>, factory: Arc<dyn BackendFactory>) {
        self.factories.insert(backend_type.into(), factory);
    }

    pub fn contains(&self, backend_type: &str) -> bool {
        self.factories.contains_key(backend_type)
    }

    /// Registered backend types, sorted
    pub fn backend_types(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Create a client for the given configuration
    pub async fn create(&self, config: &BackendConfig) -> Result<Arc<dyn BackendClient>, BackendError> {
        let factory = self.factories.get(&config.backend_type).ok_or_else(|| {
            BackendError::UnknownBackendType {
                backend_type: config.backend_type.clone(),
                registered: self.backend_types().join(", "),
            }
        })?;
        factory.create(config).await
    }
}
