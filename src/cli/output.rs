//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::ReportError;

/// Map domain errors to a string for CLI output.
pub fn map_error(e: &ReportError) -> String {
    match e {
        ReportError::ReportNotFound(id) => {
            format!("Report '{}' not found. Run `queryhub list` to see available reports.", id)
        }
        other => other.to_string(),
    }
}
