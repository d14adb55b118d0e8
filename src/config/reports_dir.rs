//! One report per file under `<config_dir>/reports/*.toml`.

use super::substitution::substitute_env;
use crate::error::ReportError;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

pub const REPORTS_DIR_NAME: &str = "reports";

/// Read every report file in `config_dir/reports`, in file-name order.
///
/// Returns `(id, report value)` pairs; the id defaults to the file stem.
pub fn load_report_files<F>(config_dir: &Path, lookup: &F) -> Result<Vec<(String, Value)>, ReportError>
where
    F: Fn(&str) -> Option<String>,
{
    let dir = config_dir.join(REPORTS_DIR_NAME);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut reports = Vec::new();
    for entry in WalkDir::new(&dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            ReportError::Config(format!("Failed to read reports directory {}: {}", dir.display(), e))
        })?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("toml") {
            continue;
        }

        let contents = std::fs::read_to_string(path)?;
        let parsed: toml::Value = toml::from_str(&contents)
            .map_err(|e| ReportError::Config(format!("Invalid report file {}: {}", path.display(), e)))?;
        let mut value = serde_json::to_value(parsed)
            .map_err(|e| ReportError::Config(format!("Invalid report file {}: {}", path.display(), e)))?;
        substitute_env(&mut value, lookup)?;

        let Value::Object(ref mut table) = value else {
            return Err(ReportError::Config(format!(
                "Report file {} must contain a table",
                path.display()
            )));
        };
        let id = report_id(table, path)?;
        debug!(report_id = %id, path = %path.display(), "Loaded report file");
        reports.push((id, value));
    }
    Ok(reports)
}

fn report_id(table: &mut Map<String, Value>, path: &Path) -> Result<String, ReportError> {
    if let Some(id) = table.get("id").and_then(Value::as_str).filter(|id| !id.is_empty()) {
        return Ok(id.to_string());
    }
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| ReportError::Config(format!("Invalid report file name {}", path.display())))?
        .to_string();
    table.insert("id".to_string(), Value::String(stem.clone()));
    Ok(stem)
}
