//! Report executor: concurrent fan-out over a report's components, ordered
//! fan-in, template rendering, and executor-level shutdown.

use super::component::{ComponentExecutionResult, ComponentExecutor};
use crate::backend::{BackendRegistry, ProviderResolver};
use crate::config::QueryHubConfig;
use crate::definition::ReportDefinition;
use crate::error::{ComponentErrorKind, ReleaseError, ReportError};
use crate::render::{ComponentPayload, RendererRegistry, ReportContext, ReportTemplateEngine};
use crate::resources::ResourceManager;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Phase of one report run; transitions only move forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunPhase {
    Pending,
    Running,
    Aggregating,
    Done,
}

struct ReportRun<'a> {
    report_id: &'a str,
    phase: RunPhase,
}

impl<'a> ReportRun<'a> {
    fn new(report_id: &'a str) -> Self {
        Self {
            report_id,
            phase: RunPhase::Pending,
        }
    }

    fn advance(&mut self, next: RunPhase) {
        debug_assert!(next > self.phase, "report run phases only move forward");
        debug!(report_id = self.report_id, from = ?self.phase, to = ?next, "Report run phase");
        self.phase = next;
    }
}

/// Summary metadata for one report run
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub component_count: usize,
    /// Ids of failed components, in definition order
    pub failures: Vec<String>,
    /// Sum of component durations
    pub total_duration: Duration,
    /// Elapsed time of the whole run
    pub wall_clock_duration: Duration,
}

/// Aggregate outcome of one `execute_report` call
#[derive(Debug)]
pub struct ReportExecutionResult {
    pub report: ReportDefinition,
    pub generated_at: DateTime<Utc>,
    pub html: String,
    /// Component outcomes in definition order
    pub components: Vec<ComponentExecutionResult>,
    pub metadata: ReportMetadata,
}

impl ReportExecutionResult {
    pub fn has_failures(&self) -> bool {
        !self.metadata.failures.is_empty()
    }

    pub fn success_count(&self) -> usize {
        self.components.iter().filter(|c| c.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.components.len() - self.success_count()
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            report_id: self.report.id.clone(),
            title: self.report.title.clone(),
            generated_at: self.generated_at,
            success_count: self.success_count(),
            failure_count: self.failure_count(),
            failures: self.metadata.failures.clone(),
            total_duration_ms: self.metadata.total_duration.as_millis() as u64,
            wall_clock_duration_ms: self.metadata.wall_clock_duration.as_millis() as u64,
            components: self
                .components
                .iter()
                .map(|c| ComponentSummary {
                    id: c.component.id.clone(),
                    success: c.is_success(),
                    attempts: c.attempts,
                    duration_ms: c.duration.as_millis() as u64,
                    error_kind: c.error().map(|e| e.kind()),
                    error: c.error().map(|e| e.to_string()),
                })
                .collect(),
        }
    }
}

/// Serializable run summary
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub report_id: String,
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub success_count: usize,
    pub failure_count: usize,
    pub failures: Vec<String>,
    pub total_duration_ms: u64,
    pub wall_clock_duration_ms: u64,
    pub components: Vec<ComponentSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentSummary {
    pub id: String,
    pub success: bool,
    pub attempts: u32,
    pub duration_ms: u64,
    pub error_kind: Option<ComponentErrorKind>,
    pub error: Option<String>,
}

/// Executes reports against one shared set of backend handles.
///
/// Handles live across `execute_report` calls until `shutdown`.
pub struct ReportExecutor {
    config: Arc<QueryHubConfig>,
    resolver: Arc<ProviderResolver>,
    component_executor: ComponentExecutor,
    template_engine: Arc<dyn ReportTemplateEngine>,
    resources: ResourceManager,
    shut_down: AtomicBool,
}

impl ReportExecutor {
    /// Validate the configuration and wire the executor.
    ///
    /// Invalid configuration, including backends whose type has no registered
    /// factory, is a fatal configuration error.
    pub fn new(
        config: QueryHubConfig,
        backends: BackendRegistry,
        renderers: RendererRegistry,
        template_engine: Arc<dyn ReportTemplateEngine>,
    ) -> Result<Self, ReportError> {
        if let Err(errors) = config.validate() {
            let message = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ReportError::Config(message));
        }
        for backend in config.backends.values() {
            if !backends.contains(&backend.backend_type) {
                return Err(ReportError::Config(format!(
                    "Backend '{}': unsupported type '{}' (registered: {})",
                    backend.id,
                    backend.backend_type,
                    backends.backend_types().join(", ")
                )));
            }
        }

        let resolver = Arc::new(ProviderResolver::new(config.backends.clone(), backends));
        let resources = ResourceManager::new();
        resources.register_pool(resolver.pool());

        let component_executor = ComponentExecutor::new(Arc::clone(&resolver), Arc::new(renderers));

        Ok(Self {
            config: Arc::new(config),
            resolver,
            component_executor,
            template_engine,
            resources,
            shut_down: AtomicBool::new(false),
        })
    }

    /// Loaded configuration, for introspection
    pub fn config(&self) -> &QueryHubConfig {
        &self.config
    }

    /// Report definitions sorted by id
    pub fn list_reports(&self) -> Vec<&ReportDefinition> {
        let mut reports: Vec<&ReportDefinition> = self.config.reports.values().collect();
        reports.sort_by(|a, b| a.id.cmp(&b.id));
        reports
    }

    pub fn resolver(&self) -> &Arc<ProviderResolver> {
        &self.resolver
    }

    pub fn resources(&self) -> &ResourceManager {
        &self.resources
    }

    /// Run every component of `report_id` concurrently and assemble the report.
    ///
    /// Component failures are recorded on the result; only a missing report,
    /// a report template failure, or a prior `shutdown` aborts the call.
    pub async fn execute_report(&self, report_id: &str) -> Result<ReportExecutionResult, ReportError> {
        if self.shut_down.load(Ordering::SeqCst) {
            warn!(report_id, "Report requested after shutdown");
            return Err(ReportError::ShutDown);
        }
        let report = self
            .config
            .reports
            .get(report_id)
            .ok_or_else(|| ReportError::ReportNotFound(report_id.to_string()))?;

        let mut run = ReportRun::new(report_id);
        let started = Instant::now();
        info!(report_id, components = report.components.len(), "Report started");

        run.advance(RunPhase::Running);
        let components = self.run_components(report).await;

        run.advance(RunPhase::Aggregating);
        let generated_at = Utc::now();
        let context = Self::build_context(report, &components, generated_at);
        let html = self.template_engine.render(report, &context).await?;

        let failures: Vec<String> = components
            .iter()
            .filter(|c| !c.is_success())
            .map(|c| c.component.id.clone())
            .collect();
        let total_duration = components.iter().map(|c| c.duration).sum();
        let result = ReportExecutionResult {
            report: report.clone(),
            generated_at,
            html,
            metadata: ReportMetadata {
                component_count: components.len(),
                failures,
                total_duration,
                wall_clock_duration: started.elapsed(),
            },
            components,
        };

        run.advance(RunPhase::Done);
        info!(
            report_id,
            succeeded = result.success_count(),
            failed = result.failure_count(),
            duration_ms = result.metadata.wall_clock_duration.as_millis() as u64,
            "Report completed"
        );
        Ok(result)
    }

    /// Fan out over the components and collect outcomes in definition order.
    async fn run_components(&self, report: &ReportDefinition) -> Vec<ComponentExecutionResult> {
        let count = report.components.len();
        let limit = match self.config.execution.max_concurrent_components {
            0 => count.max(1),
            cap => cap,
        };

        let mut indexed: Vec<(usize, ComponentExecutionResult)> =
            stream::iter(report.components.iter().enumerate().map(|(index, component)| {
                let executor = &self.component_executor;
                async move { (index, executor.execute(component).await) }
            }))
            .buffer_unordered(limit)
            .collect()
            .await;

        indexed.sort_by_key(|(index, _)| *index);
        indexed.into_iter().map(|(_, outcome)| outcome).collect()
    }

    fn build_context(
        report: &ReportDefinition,
        components: &[ComponentExecutionResult],
        generated_at: DateTime<Utc>,
    ) -> ReportContext {
        let payloads: Vec<ComponentPayload> = components
            .iter()
            .map(|c| ComponentPayload {
                id: c.component.id.clone(),
                title: c.component.display_title().to_string(),
                rendered: c.rendered().map(str::to_string),
                error: c.error().map(|e| e.to_string()),
                error_kind: c.error().map(|e| e.kind()),
                metadata: c.result().map(|r| r.metadata.clone()).unwrap_or_default(),
                data: c.result().map(|r| r.data.clone()),
                attempts: c.attempts,
                duration_ms: c.duration.as_millis() as u64,
            })
            .collect();
        let success_count = components.iter().filter(|c| c.is_success()).count();

        ReportContext {
            report_id: report.id.clone(),
            title: report.title.clone(),
            description: report.description.clone(),
            generated_at,
            failure_count: payloads.len() - success_count,
            success_count,
            components: payloads,
        }
    }

    /// Release every pooled backend handle.
    ///
    /// Safe to call more than once; later calls release nothing.
    pub async fn shutdown(&self) -> Vec<ReleaseError> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            debug!("Executor already shut down");
            return Vec::new();
        }
        info!("Shutting down report executor");
        self.resources.close_all().await
    }
}
