//! Layered configuration loading.
//!
//! Layers, lowest first: built-in defaults, the main file, the environment
//! overlay file, `QUERYHUB__*` variables. Report files from `reports/` are
//! merged in afterwards, then `${VAR}` placeholders are resolved.

use super::defaults::builder_with_defaults;
use super::reports_dir::load_report_files;
use super::sources;
use super::substitution::substitute_env;
use super::QueryHubConfig;
use crate::error::ReportError;
use directories::ProjectDirs;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Loads a [`QueryHubConfig`] from a config directory
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config_dir: PathBuf,
    config_file: Option<PathBuf>,
    environment: Option<String>,
    env_overrides: bool,
}

impl ConfigLoader {
    /// Loader for `config_dir`; the overlay environment comes from `QUERYHUB_ENV`.
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            config_file: None,
            environment: std::env::var(sources::ENVIRONMENT_VAR).ok(),
            env_overrides: true,
        }
    }

    /// Use `path` instead of `<config_dir>/queryhub.toml`; the file must exist.
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Skip the `QUERYHUB__*` environment layer.
    pub fn without_env_overrides(mut self) -> Self {
        self.env_overrides = false;
        self
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// `./config` when present, else the platform config directory.
    pub fn default_config_dir() -> PathBuf {
        let local = PathBuf::from("config");
        if local.is_dir() {
            return local;
        }
        ProjectDirs::from("", "", "queryhub")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .unwrap_or(local)
    }

    /// Load using the process environment for `${VAR}` placeholders.
    pub fn load(&self) -> Result<QueryHubConfig, ReportError> {
        self.load_with(&|name: &str| std::env::var(name).ok())
    }

    /// Load resolving `${VAR}` placeholders through `lookup`.
    pub fn load_with<F>(&self, lookup: &F) -> Result<QueryHubConfig, ReportError>
    where
        F: Fn(&str) -> Option<String>,
    {
        debug!(config_dir = %self.config_dir.display(), "Loading configuration");

        let mut builder = builder_with_defaults()?;
        builder = sources::add_main_file(builder, &self.config_dir, self.config_file.as_deref());
        builder = sources::add_environment_overlay(builder, &self.config_dir, self.environment.as_deref());
        if self.env_overrides {
            builder = sources::add_environment_overrides(builder);
        }

        let mut value: Value = builder.build()?.try_deserialize()?;
        substitute_env(&mut value, lookup)?;
        self.merge_report_files(&mut value, lookup)?;

        let mut config: QueryHubConfig = serde_json::from_value(value)
            .map_err(|e| ReportError::Config(format!("Invalid configuration: {}", e)))?;
        config.normalize_ids().map_err(|errors| {
            ReportError::Config(
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })?;

        info!(
            backends = config.backends.len(),
            reports = config.reports.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    fn merge_report_files<F>(&self, value: &mut Value, lookup: &F) -> Result<(), ReportError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let files = load_report_files(&self.config_dir, lookup)?;
        if files.is_empty() {
            return Ok(());
        }

        let Value::Object(root) = value else {
            return Err(ReportError::Config("Configuration root must be a table".to_string()));
        };
        let reports = root
            .entry("reports")
            .or_insert_with(|| Value::Object(Map::new()));
        let Value::Object(reports) = reports else {
            return Err(ReportError::Config("'reports' must be a table".to_string()));
        };

        for (id, report) in files {
            if reports.contains_key(&id) {
                return Err(ReportError::Config(format!("Report '{}' is defined more than once", id)));
            }
            reports.insert(id, report);
        }
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new(Self::default_config_dir())
    }
}
