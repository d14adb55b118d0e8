//! CLI route: single route table and run context. Dispatches to the library and presentation.

use crate::app::ApplicationBuilder;
use crate::backend::BackendRegistry;
use crate::cli::parse::{Cli, Commands, ListFormat, RunFormat};
use crate::cli::presentation::{
    format_report_list_json, format_report_list_text, format_run_status, format_validation_result,
};
use crate::config::ValidationError;
use crate::error::ReportError;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// What a command produced: stdout body, a status message for stderr, and the exit code
#[derive(Debug, Default)]
pub struct CommandOutcome {
    pub stdout: Option<String>,
    pub status: Option<String>,
    pub exit_code: i32,
}

/// Runtime context for CLI execution: config locations and terminal settings.
pub struct RunContext {
    config_dir: Option<PathBuf>,
    config_file: Option<PathBuf>,
    templates_dir: Option<PathBuf>,
    color: bool,
}

impl RunContext {
    pub fn new(cli: &Cli) -> Self {
        Self {
            config_dir: cli.config_dir.clone(),
            config_file: cli.config.clone(),
            templates_dir: cli.templates_dir.clone(),
            color: std::io::stderr().is_terminal(),
        }
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    fn builder(&self) -> ApplicationBuilder {
        let mut builder = ApplicationBuilder::new();
        if let Some(dir) = &self.config_dir {
            builder = builder.config_dir(dir);
        }
        if let Some(file) = &self.config_file {
            builder = builder.config_file(file);
        }
        if let Some(dir) = &self.templates_dir {
            builder = builder.templates_dir(dir);
        }
        builder
    }

    pub async fn execute(&self, command: &Commands) -> Result<CommandOutcome, ReportError> {
        match command {
            Commands::Run {
                report_id,
                output,
                format,
                fail_on_error,
            } => {
                self.handle_run(report_id, output.as_deref(), *format, *fail_on_error)
                    .await
            }
            Commands::List { format } => self.handle_list(*format),
            Commands::Validate => self.handle_validate(),
        }
    }

    async fn handle_run(
        &self,
        report_id: &str,
        output: Option<&Path>,
        format: RunFormat,
        fail_on_error: bool,
    ) -> Result<CommandOutcome, ReportError> {
        let executor = self.builder().build()?;
        let result = executor.execute_report(report_id).await;
        for err in executor.shutdown().await {
            warn!(resource = %err.resource, error = %err.message, "Release failed during shutdown");
        }
        let result = result?;

        let body = match format {
            RunFormat::Html => result.html.clone(),
            RunFormat::Json => serde_json::to_string_pretty(&result.summary())
                .map_err(|e| ReportError::Config(format!("Failed to serialize summary: {}", e)))?,
        };
        let stdout = match output {
            Some(path) => {
                tokio::fs::write(path, body).await?;
                info!(report_id, path = %path.display(), "Report written");
                None
            }
            None => Some(body),
        };

        Ok(CommandOutcome {
            stdout,
            status: Some(format_run_status(&result, self.color)),
            exit_code: if fail_on_error && result.has_failures() { 1 } else { 0 },
        })
    }

    fn handle_list(&self, format: ListFormat) -> Result<CommandOutcome, ReportError> {
        let executor = self.builder().build()?;
        let reports = executor.list_reports();
        let body = match format {
            ListFormat::Text => format_report_list_text(&reports),
            ListFormat::Json => format_report_list_json(&reports)?,
        };
        Ok(CommandOutcome {
            stdout: Some(body),
            ..CommandOutcome::default()
        })
    }

    /// Validation problems are reported as output, not as an error.
    fn handle_validate(&self) -> Result<CommandOutcome, ReportError> {
        let config = self.builder().load_config()?;
        let registry = BackendRegistry::with_defaults();

        let mut errors = config.validate().err().unwrap_or_default();
        let mut backends: Vec<_> = config.backends.values().collect();
        backends.sort_by(|a, b| a.id.cmp(&b.id));
        for backend in backends {
            if !registry.contains(&backend.backend_type) {
                errors.push(ValidationError::Backend(
                    backend.id.clone(),
                    format!(
                        "unsupported type '{}' (registered: {})",
                        backend.backend_type,
                        registry.backend_types().join(", ")
                    ),
                ));
            }
        }

        let exit_code = if errors.is_empty() { 0 } else { 1 };
        let result = if errors.is_empty() { Ok(()) } else { Err(errors) };
        Ok(CommandOutcome {
            stdout: Some(format_validation_result(&config, &result, self.color)),
            status: None,
            exit_code,
        })
    }
}
