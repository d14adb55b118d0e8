//! Application wiring
//!
//! Loads configuration and assembles a [`ReportExecutor`] with the built-in
//! backends, renderers and template engine unless overrides are supplied.

use crate::backend::BackendRegistry;
use crate::config::{ConfigLoader, QueryHubConfig};
use crate::error::ReportError;
use crate::execution::ReportExecutor;
use crate::render::{HtmlReportEngine, RendererRegistry, ReportTemplateEngine};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Builder for a ready-to-run [`ReportExecutor`]
#[derive(Default)]
pub struct ApplicationBuilder {
    config_dir: Option<PathBuf>,
    config_file: Option<PathBuf>,
    templates_dir: Option<PathBuf>,
    config: Option<QueryHubConfig>,
    backends: Option<BackendRegistry>,
    renderers: Option<RendererRegistry>,
    template_engine: Option<Arc<dyn ReportTemplateEngine>>,
}

impl ApplicationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = Some(dir.into());
        self
    }

    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Directory for report template files; defaults to `<config_dir>/templates`
    pub fn templates_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.templates_dir = Some(dir.into());
        self
    }

    /// Use an already loaded configuration instead of reading files.
    pub fn with_config(mut self, config: QueryHubConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_backends(mut self, backends: BackendRegistry) -> Self {
        self.backends = Some(backends);
        self
    }

    pub fn with_renderers(mut self, renderers: RendererRegistry) -> Self {
        self.renderers = Some(renderers);
        self
    }

    pub fn with_template_engine(mut self, engine: Arc<dyn ReportTemplateEngine>) -> Self {
        self.template_engine = Some(engine);
        self
    }

    fn resolved_config_dir(&self) -> PathBuf {
        self.config_dir
            .clone()
            .unwrap_or_else(ConfigLoader::default_config_dir)
    }

    /// Load the configuration this builder points at.
    pub fn load_config(&self) -> Result<QueryHubConfig, ReportError> {
        if let Some(config) = &self.config {
            return Ok(config.clone());
        }
        let mut loader = ConfigLoader::new(self.resolved_config_dir());
        if let Some(file) = &self.config_file {
            loader = loader.with_config_file(file);
        }
        loader.load()
    }

    /// Load configuration and construct the executor.
    pub fn build(self) -> Result<ReportExecutor, ReportError> {
        let config = self.load_config()?;
        let config_dir = self.resolved_config_dir();

        let template_engine = match self.template_engine {
            Some(engine) => engine,
            None => {
                let templates_dir = self
                    .templates_dir
                    .unwrap_or_else(|| config_dir.join("templates"));
                debug!(templates_dir = %templates_dir.display(), "Using HTML report engine");
                Arc::new(HtmlReportEngine::new(Some(templates_dir)))
            }
        };

        ReportExecutor::new(
            config,
            self.backends.unwrap_or_else(BackendRegistry::with_defaults),
            self.renderers.unwrap_or_else(RendererRegistry::with_defaults),
            template_engine,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn builds_from_config_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("queryhub.toml"),
            r#"
[backends.files]
type = "csv"

[reports.daily]
title = "Daily"

[[reports.daily.components]]
id = "sales"
backend = "files"
"#,
        )
        .unwrap();

        let executor = ApplicationBuilder::new()
            .config_dir(dir.path())
            .build()
            .unwrap();
        let ids: Vec<&str> = executor.list_reports().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["daily"]);
    }

    #[test]
    fn invalid_configuration_fails_build() {
        let mut config = QueryHubConfig::default();
        config.reports.insert(
            "daily".to_string(),
            crate::definition::ReportDefinition::new("daily", "Daily").with_component(
                crate::definition::ComponentDefinition::new("sales", "missing"),
            ),
        );

        let result = ApplicationBuilder::new().with_config(config).build();
        assert!(matches!(result, Err(ReportError::Config(msg)) if msg.contains("unknown backend 'missing'")));
    }
}
