//! Shared test utilities for integration tests
//!
//! A scripted backend whose behavior is driven by the component query, plus a
//! factory that counts how many handles were created.

use async_trait::async_trait;
use parking_lot::Mutex;
use queryhub::backend::BackendFactory;
use queryhub::render::{HtmlReportEngine, RendererRegistry};
use queryhub::{
    BackendClient, BackendConfig, BackendError, BackendRegistry, QueryHubConfig, QueryResult,
    ReportDefinition, ReportExecutor,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Backend driven by query fields:
///
/// - `key`: identifies the call sequence for `fail_times`
/// - `fail_times`: number of leading calls that fail
/// - `delay_ms`: sleep before answering
/// - `value`: data returned on success (defaults to `{"value": key}`)
#[derive(Default)]
pub struct ScriptedBackend {
    calls: Mutex<HashMap<String, u64>>,
    completions: Mutex<Vec<String>>,
    pub closed: AtomicUsize,
}

impl ScriptedBackend {
    pub fn calls_for(&self, key: &str) -> u64 {
        self.calls.lock().get(key).copied().unwrap_or(0)
    }

    /// Keys in the order their calls finished
    pub fn completions(&self) -> Vec<String> {
        self.completions.lock().clone()
    }
}

#[async_trait]
impl BackendClient for ScriptedBackend {
    async fn execute(&self, query: &Value) -> Result<QueryResult, BackendError> {
        let key = query["key"].as_str().unwrap_or("default").to_string();
        let call = {
            let mut calls = self.calls.lock();
            let count = calls.entry(key.clone()).or_insert(0);
            *count += 1;
            *count
        };

        if let Some(delay) = query["delay_ms"].as_u64() {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.completions.lock().push(key.clone());

        if call <= query["fail_times"].as_u64().unwrap_or(0) {
            return Err(BackendError::Execution(format!("{} failed on call {}", key, call)));
        }
        let data = match &query["value"] {
            Value::Null => serde_json::json!({ "value": key }),
            value => value.clone(),
        };
        Ok(QueryResult::new(data).with_metadata("call", call))
    }

    async fn close(&self) -> Result<(), BackendError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn backend_type(&self) -> &str {
        "scripted"
    }
}

/// Factory handing out one shared scripted backend and counting creations
pub struct CountingFactory {
    pub backend: Arc<ScriptedBackend>,
    pub created: AtomicUsize,
    /// Time spent inside each creation, so first uses overlap
    create_delay: Duration,
}

impl CountingFactory {
    pub fn new() -> Arc<Self> {
        Self::slow(Duration::ZERO)
    }

    pub fn slow(create_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            backend: Arc::new(ScriptedBackend::default()),
            created: AtomicUsize::new(0),
            create_delay,
        })
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendFactory for CountingFactory {
    async fn create(&self, _config: &BackendConfig) -> Result<Arc<dyn BackendClient>, BackendError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        if !self.create_delay.is_zero() {
            tokio::time::sleep(self.create_delay).await;
        }
        Ok(Arc::clone(&self.backend) as Arc<dyn BackendClient>)
    }
}

/// Backend config with no backoff delay
pub fn scripted_backend(id: &str) -> BackendConfig {
    let mut config = BackendConfig::new(id, "scripted");
    config.retry_backoff_seconds = 0.0;
    config
}

pub fn config_with(backends: &[&str], reports: Vec<ReportDefinition>) -> QueryHubConfig {
    let mut config = QueryHubConfig::default();
    for id in backends {
        config.backends.insert(id.to_string(), scripted_backend(id));
    }
    for report in reports {
        config.reports.insert(report.id.clone(), report);
    }
    config
}

pub fn executor_with(config: QueryHubConfig, factory: &Arc<CountingFactory>) -> ReportExecutor {
    let mut registry = BackendRegistry::with_defaults();
    registry.register("scripted", Arc::clone(factory) as Arc<dyn BackendFactory>);
    ReportExecutor::new(
        config,
        registry,
        RendererRegistry::with_defaults(),
        Arc::new(HtmlReportEngine::default()),
    )
    .unwrap()
}
