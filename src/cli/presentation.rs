//! CLI presentation: text and json formatters per command.

use crate::config::{QueryHubConfig, ValidationError};
use crate::definition::ReportDefinition;
use crate::error::ReportError;
use crate::execution::ReportExecutionResult;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde_json::json;

pub fn format_report_list_text(reports: &[&ReportDefinition]) -> String {
    if reports.is_empty() {
        return "No reports configured.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Id", "Title", "Components", "Template", "Tags"]);
    for report in reports {
        table.add_row(vec![
            report.id.clone(),
            report.title.clone(),
            report.components.len().to_string(),
            report.template.clone().unwrap_or_else(|| "-".to_string()),
            report.tags.join(", "),
        ]);
    }
    table.to_string()
}

pub fn format_report_list_json(reports: &[&ReportDefinition]) -> Result<String, ReportError> {
    let arr: Vec<serde_json::Value> = reports
        .iter()
        .map(|r| {
            json!({
                "id": r.id,
                "title": r.title,
                "description": r.description,
                "components": r.components.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
                "tags": r.tags,
            })
        })
        .collect();
    serde_json::to_string_pretty(&arr)
        .map_err(|e| ReportError::Config(format!("Failed to serialize report list: {}", e)))
}

/// One status line per component plus a summary line
pub fn format_run_status(result: &ReportExecutionResult, color: bool) -> String {
    let mut lines = Vec::with_capacity(result.components.len() + 1);
    for component in &result.components {
        let line = match component.error() {
            None => format!(
                "ok    {} ({} attempt(s), {} ms)",
                component.component.id,
                component.attempts,
                component.duration.as_millis()
            ),
            Some(err) => format!(
                "FAIL  {} [{}] {} ({} attempt(s))",
                component.component.id,
                err.kind(),
                err,
                component.attempts
            ),
        };
        lines.push(match (color, component.is_success()) {
            (false, _) => line,
            (true, true) => line.green().to_string(),
            (true, false) => line.red().to_string(),
        });
    }

    let summary = format!(
        "{}: {} of {} components succeeded in {} ms",
        result.report.id,
        result.success_count(),
        result.components.len(),
        result.metadata.wall_clock_duration.as_millis()
    );
    lines.push(if color { summary.bold().to_string() } else { summary });
    lines.join("\n")
}

pub fn format_validation_result(
    config: &QueryHubConfig,
    result: &Result<(), Vec<ValidationError>>,
    color: bool,
) -> String {
    match result {
        Ok(()) => {
            let line = format!(
                "Configuration valid: {} backend(s), {} report(s)",
                config.backends.len(),
                config.reports.len()
            );
            if color {
                line.green().to_string()
            } else {
                line
            }
        }
        Err(errors) => {
            let header = format!("Configuration invalid: {} error(s)", errors.len());
            let mut lines = vec![if color { header.red().to_string() } else { header }];
            lines.extend(errors.iter().map(|e| format!("  - {}", e)));
            lines.join("\n")
        }
    }
}
