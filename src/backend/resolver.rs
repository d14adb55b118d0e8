//! Provider Resolver
//!
//! Maps backend ids to live clients through a [`ResourcePool`]. Configuration
//! lookups and client construction go through the backend registry; clients
//! are closed when the pool closes.

use super::{BackendClient, BackendConfig, BackendRegistry};
use crate::error::{BackendError, ReleaseError, ReportError};
use crate::pool::{HandleFactory, ResourcePool};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Pool name used in release errors and logs
pub const BACKEND_POOL_NAME: &str = "backends";

struct BackendHandleFactory {
    configs: RwLock<HashMap<String, BackendConfig>>,
    registry: BackendRegistry,
}

#[async_trait]
impl HandleFactory<dyn BackendClient> for BackendHandleFactory {
    async fn create(&self, id: &str) -> Result<Arc<dyn BackendClient>, BackendError> {
        let config = self
            .configs
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| BackendError::NotConfigured(id.to_string()))?;
        debug!(backend_id = id, backend_type = %config.backend_type, "Creating backend client");
        self.registry.create(&config).await
    }

    async fn release(&self, id: &str, handle: Arc<dyn BackendClient>) -> Result<(), BackendError> {
        debug!(backend_id = id, "Closing backend client");
        handle.close().await
    }
}

/// Resolves backend ids to shared clients
pub struct ProviderResolver {
    factory: Arc<BackendHandleFactory>,
    pool: Arc<ResourcePool<dyn BackendClient>>,
}

impl ProviderResolver {
    pub fn new(configs: HashMap<String, BackendConfig>, registry: BackendRegistry) -> Self {
        let factory = Arc::new(BackendHandleFactory {
            configs: RwLock::new(configs),
            registry,
        });
        let pool = Arc::new(ResourcePool::new(
            BACKEND_POOL_NAME,
            Arc::clone(&factory) as Arc<dyn HandleFactory<dyn BackendClient>>,
        ));
        Self { factory, pool }
    }

    /// Client for `backend_id`, created on first use and shared afterwards.
    pub async fn get_provider(&self, backend_id: &str) -> Result<Arc<dyn BackendClient>, BackendError> {
        self.pool.get(backend_id).await
    }

    pub fn backend_config(&self, backend_id: &str) -> Option<BackendConfig> {
        self.factory.configs.read().get(backend_id).cloned()
    }

    pub fn is_configured(&self, backend_id: &str) -> bool {
        self.factory.configs.read().contains_key(backend_id)
    }

    /// Replace a backend's configuration and drop its cached client.
    ///
    /// The next `get_provider` builds a client from the new configuration. A
    /// configuration that fails validation, or names a type with no registered
    /// factory, is rejected and the current client stays in place.
    pub async fn reload(&self, config: BackendConfig) -> Result<(), ReportError> {
        config
            .validate()
            .map_err(|msg| ReportError::Config(format!("Backend '{}': {}", config.id, msg)))?;
        if !self.factory.registry.contains(&config.backend_type) {
            return Err(ReportError::Config(format!(
                "Backend '{}': unsupported type '{}' (registered: {})",
                config.id,
                config.backend_type,
                self.factory.registry.backend_types().join(", ")
            )));
        }

        let id = config.id.clone();
        self.factory.configs.write().insert(id.clone(), config);
        let released = self.pool.invalidate(&id).await?;
        info!(backend_id = %id, released, "Backend configuration reloaded");
        Ok(())
    }

    /// The underlying pool, for registration with a resource manager.
    pub fn pool(&self) -> Arc<ResourcePool<dyn BackendClient>> {
        Arc::clone(&self.pool)
    }

    pub async fn close_all(&self) -> Vec<ReleaseError> {
        self.pool.close().await
    }
}
