//! Component executor: one component's query, retries, timeout and rendering.
//! Every failure becomes data on the returned outcome; nothing propagates.

use crate::backend::{BackendClient, ProviderResolver, QueryResult};
use crate::definition::ComponentDefinition;
use crate::error::{BackendError, ComponentError};
use crate::render::RendererRegistry;
use crate::retry::RetryStrategy;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How a component run ended
#[derive(Debug)]
pub enum ComponentOutcome {
    Succeeded { result: QueryResult, rendered: String },
    Failed(ComponentError),
}

/// Immutable outcome of one component run
#[derive(Debug)]
pub struct ComponentExecutionResult {
    pub component: ComponentDefinition,
    pub outcome: ComponentOutcome,
    /// Backend calls made, zero when no handle could be obtained
    pub attempts: u32,
    pub duration: Duration,
}

impl ComponentExecutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ComponentOutcome::Succeeded { .. })
    }

    pub fn result(&self) -> Option<&QueryResult> {
        match &self.outcome {
            ComponentOutcome::Succeeded { result, .. } => Some(result),
            ComponentOutcome::Failed(_) => None,
        }
    }

    pub fn rendered(&self) -> Option<&str> {
        match &self.outcome {
            ComponentOutcome::Succeeded { rendered, .. } => Some(rendered),
            ComponentOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ComponentError> {
        match &self.outcome {
            ComponentOutcome::Succeeded { .. } => None,
            ComponentOutcome::Failed(err) => Some(err),
        }
    }
}

/// Runs single components against shared backend handles
pub struct ComponentExecutor {
    resolver: Arc<ProviderResolver>,
    renderers: Arc<RendererRegistry>,
}

impl ComponentExecutor {
    pub fn new(resolver: Arc<ProviderResolver>, renderers: Arc<RendererRegistry>) -> Self {
        Self {
            resolver,
            renderers,
        }
    }

    /// Execute one component. Never fails; errors land on the outcome.
    pub async fn execute(&self, component: &ComponentDefinition) -> ComponentExecutionResult {
        let started = Instant::now();
        debug!(component_id = %component.id, backend_id = %component.backend, "Component started");

        let mut attempts = 0u32;
        let outcome = match self.run(component, &mut attempts).await {
            Ok((result, rendered)) => ComponentOutcome::Succeeded { result, rendered },
            Err(err) => ComponentOutcome::Failed(err),
        };
        let duration = started.elapsed();

        match &outcome {
            ComponentOutcome::Succeeded { .. } => info!(
                component_id = %component.id,
                attempts,
                duration_ms = duration.as_millis() as u64,
                "Component completed"
            ),
            ComponentOutcome::Failed(err) => warn!(
                component_id = %component.id,
                kind = %err.kind(),
                attempts,
                duration_ms = duration.as_millis() as u64,
                error = %err,
                "Component failed"
            ),
        }

        ComponentExecutionResult {
            component: component.clone(),
            outcome,
            attempts,
            duration,
        }
    }

    async fn run(
        &self,
        component: &ComponentDefinition,
        attempts: &mut u32,
    ) -> Result<(QueryResult, String), ComponentError> {
        let resource_error = |source: BackendError| ComponentError::Resource {
            backend_id: component.backend.clone(),
            source,
        };

        let client = self
            .resolver
            .get_provider(&component.backend)
            .await
            .map_err(resource_error)?;
        let backend = self
            .resolver
            .backend_config(&component.backend)
            .ok_or_else(|| resource_error(BackendError::NotConfigured(component.backend.clone())))?;

        let policy = backend
            .retry_policy(component.retries)
            .map_err(|source| ComponentError::Configuration {
                component_id: component.id.clone(),
                source,
            })?;
        let timeout = component.timeout().unwrap_or_else(|| backend.default_timeout());

        let strategy = RetryStrategy::ExponentialBackoff(policy);
        let result = strategy
            .execute_with(
                || {
                    *attempts += 1;
                    debug!(component_id = %component.id, attempt = *attempts, "Query attempt");
                    Self::attempt(component, Arc::clone(&client), timeout)
                },
                ComponentError::is_retryable,
            )
            .await?;

        let rendered = self
            .renderers
            .render(component, &result)
            .map_err(|source| ComponentError::Rendering {
                component_id: component.id.clone(),
                source,
            })?;

        Ok((result, rendered))
    }

    /// One backend call bounded by `timeout`
    async fn attempt(
        component: &ComponentDefinition,
        client: Arc<dyn BackendClient>,
        timeout: Duration,
    ) -> Result<QueryResult, ComponentError> {
        match tokio::time::timeout(timeout, client.execute(&component.query)).await {
            Ok(result) => result.map_err(ComponentError::from),
            Err(_) => {
                warn!(
                    component_id = %component.id,
                    timeout_ms = timeout.as_millis() as u64,
                    "Backend call timed out"
                );
                Err(ComponentError::Timeout {
                    component_id: component.id.clone(),
                    timeout,
                })
            }
        }
    }
}
