//! Configuration System
//!
//! Backends, report definitions, execution limits and logging, loaded from a
//! layered set of TOML files and environment overrides. Validation collects
//! every problem instead of stopping at the first one.

use crate::backend::BackendConfig;
use crate::definition::ReportDefinition;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

mod defaults;
mod loader;
mod reports_dir;
mod sources;
mod substitution;

pub use loader::ConfigLoader;
pub use substitution::substitute_env;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryHubConfig {
    /// Backend configurations keyed by backend id
    #[serde(default)]
    pub backends: HashMap<String, BackendConfig>,

    /// Report definitions keyed by report id
    #[serde(default)]
    pub reports: HashMap<String, ReportDefinition>,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Fan-out limits for report runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Components run at once per report; 0 runs them all together
    #[serde(default)]
    pub max_concurrent_components: usize,
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    Backend(String, String),
    Report(String, String),
    Component(String, String, String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Backend(id, msg) => write!(f, "Backend '{}': {}", id, msg),
            ValidationError::Report(id, msg) => write!(f, "Report '{}': {}", id, msg),
            ValidationError::Component(report, component, msg) => {
                write!(f, "Report '{}', component '{}': {}", report, component, msg)
            }
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl QueryHubConfig {
    /// Fill empty ids from table keys and re-key entries by their explicit id.
    ///
    /// Two entries resolving to the same id are a collision: the entry with the
    /// first key (in sorted order) is kept and every other one is reported.
    pub fn normalize_ids(&mut self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        let (backends, collisions) = rekey_by_id(std::mem::take(&mut self.backends), |b| &mut b.id);
        self.backends = backends;
        errors.extend(collisions.into_iter().map(|(id, kept, dropped)| {
            ValidationError::Backend(id, collision_message(&kept, &dropped))
        }));

        let (reports, collisions) = rekey_by_id(std::mem::take(&mut self.reports), |r| &mut r.id);
        self.reports = reports;
        errors.extend(collisions.into_iter().map(|(id, kept, dropped)| {
            ValidationError::Report(id, collision_message(&kept, &dropped))
        }));

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        let backends: BTreeMap<&String, &BackendConfig> = self.backends.iter().collect();
        for (key, backend) in backends {
            if backend.id != *key {
                errors.push(ValidationError::Backend(
                    key.clone(),
                    format!("id '{}' does not match its key", backend.id),
                ));
            }
            if let Err(e) = backend.validate() {
                errors.push(ValidationError::Backend(key.clone(), e));
            }
        }

        let reports: BTreeMap<&String, &ReportDefinition> = self.reports.iter().collect();
        for (key, report) in reports {
            self.validate_report(key, report, &mut errors);
        }

        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_report(&self, key: &str, report: &ReportDefinition, errors: &mut Vec<ValidationError>) {
        if report.id != key {
            errors.push(ValidationError::Report(
                key.to_string(),
                format!("id '{}' does not match its key", report.id),
            ));
        }

        let mut seen = HashSet::new();
        for component in &report.components {
            let error = |msg: String| ValidationError::Component(key.to_string(), component.id.clone(), msg);

            if component.id.trim().is_empty() {
                errors.push(error("component id cannot be empty".to_string()));
            } else if !seen.insert(component.id.as_str()) {
                errors.push(error("duplicate component id".to_string()));
            }
            if !self.backends.contains_key(&component.backend) {
                errors.push(error(format!("unknown backend '{}'", component.backend)));
            }
            if let Some(timeout) = component.timeout_seconds {
                if !(timeout.is_finite() && timeout > 0.0) {
                    errors.push(error(format!("timeout_seconds must be positive (got {})", timeout)));
                }
            }
            if component.render.render_type.trim().is_empty() {
                errors.push(error("render type cannot be empty".to_string()));
            }
        }
    }

    /// Report ids in sorted order
    pub fn report_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.reports.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

/// Re-key `entries` by id; returns `(id, kept_key, dropped_key)` per collision.
fn rekey_by_id<T>(
    entries: HashMap<String, T>,
    id_of: fn(&mut T) -> &mut String,
) -> (HashMap<String, T>, Vec<(String, String, String)>) {
    let mut sorted: Vec<(String, T)> = entries.into_iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let mut keyed: HashMap<String, (String, T)> = HashMap::with_capacity(sorted.len());
    let mut collisions = Vec::new();
    for (key, mut entry) in sorted {
        let id = id_of(&mut entry);
        if id.is_empty() {
            *id = key.clone();
        }
        let id = id.clone();
        match keyed.get(&id) {
            Some((kept, _)) => collisions.push((id, kept.clone(), key)),
            None => {
                keyed.insert(id, (key, entry));
            }
        }
    }

    let entries = keyed
        .into_iter()
        .map(|(id, (_, entry))| (id, entry))
        .collect();
    (entries, collisions)
}

fn collision_message(kept: &str, dropped: &str) -> String {
    format!(
        "id defined more than once (tables '{}' and '{}')",
        kept, dropped
    )
}
