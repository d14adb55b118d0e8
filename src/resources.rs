//! Resource Manager
//!
//! Owns everything that must be released when an executor shuts down: resource
//! pools and individually registered scoped resources. Release runs in reverse
//! registration order and keeps going past failures.

use crate::error::ReleaseError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Something the resource manager can release at shutdown.
#[async_trait]
pub trait ManagedResource: Send + Sync {
    fn name(&self) -> &str;

    /// Release everything held; returns the failures encountered.
    async fn close(&self) -> Vec<ReleaseError>;
}

type ReleaseFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), String>> + Send>;

/// A resource with a single release action, run at most once.
pub struct ScopedResource {
    name: String,
    release: Mutex<Option<ReleaseFn>>,
}

impl ScopedResource {
    pub fn new<F, Fut>(name: impl Into<String>, release: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        let release: ReleaseFn = Box::new(move || Box::pin(release()));
        Self {
            name: name.into(),
            release: Mutex::new(Some(release)),
        }
    }
}

#[async_trait]
impl ManagedResource for ScopedResource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn close(&self) -> Vec<ReleaseError> {
        let Some(release) = self.release.lock().take() else {
            return Vec::new();
        };
        match release().await {
            Ok(()) => Vec::new(),
            Err(message) => vec![ReleaseError::new(self.name.clone(), message)],
        }
    }
}

/// Tracks managed resources in registration order.
#[derive(Default)]
pub struct ResourceManager {
    resources: Mutex<Vec<Arc<dyn ManagedResource>>>,
}

impl ResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_pool(&self, pool: Arc<dyn ManagedResource>) {
        debug!(resource = pool.name(), "Registered pool");
        self.resources.lock().push(pool);
    }

    pub fn register_scoped_resource(&self, resource: ScopedResource) {
        debug!(resource = resource.name(), "Registered scoped resource");
        self.resources.lock().push(Arc::new(resource));
    }

    pub fn len(&self) -> usize {
        self.resources.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Release every registered resource, last registered first.
    ///
    /// Resources are forgotten once released, so a second call is a no-op.
    pub async fn close_all(&self) -> Vec<ReleaseError> {
        let resources = std::mem::take(&mut *self.resources.lock());
        if resources.is_empty() {
            return Vec::new();
        }

        let mut failures = Vec::new();
        for resource in resources.iter().rev() {
            let errors = resource.close().await;
            for err in &errors {
                error!(resource = %err.resource, error = %err.message, "Resource release failed");
            }
            failures.extend(errors);
        }

        info!(
            released = resources.len(),
            failures = failures.len(),
            "Resources closed"
        );
        failures
    }
}
