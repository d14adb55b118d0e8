//! Table renderer

use super::{display_value, empty_state, ensure_rows, escape_html, Renderer};
use crate::backend::QueryResult;
use crate::definition::ComponentDefinition;
use crate::error::RenderError;
use serde_json::{Map, Value};

/// Renders list-of-objects data as an HTML table.
///
/// Columns come from `options.columns`, else from the first row's keys.
pub struct TableRenderer;

impl TableRenderer {
    fn columns(
        component: &ComponentDefinition,
        first_row: &Map<String, Value>,
    ) -> Result<Vec<String>, RenderError> {
        match component.render.options.get("columns") {
            None => Ok(first_row.keys().cloned().collect()),
            Some(Value::Array(columns)) => columns
                .iter()
                .map(|c| {
                    c.as_str().map(str::to_string).ok_or_else(|| {
                        RenderError::InvalidOptions("table columns must be strings".to_string())
                    })
                })
                .collect(),
            Some(_) => Err(RenderError::InvalidOptions(
                "table columns must be a list".to_string(),
            )),
        }
    }
}

impl Renderer for TableRenderer {
    fn render(
        &self,
        component: &ComponentDefinition,
        result: &QueryResult,
    ) -> Result<String, RenderError> {
        let rows = ensure_rows(&result.data);
        let Some(first) = rows.first() else {
            return Ok(empty_state("No data available", "component-table"));
        };
        let columns = Self::columns(component, first)?;

        let header: String = columns
            .iter()
            .map(|c| format!("<th>{}</th>", escape_html(c)))
            .collect();
        let body: String = rows
            .iter()
            .map(|row| {
                let cells: String = columns
                    .iter()
                    .map(|c| {
                        let cell = row.get(c).map(display_value).unwrap_or_default();
                        format!("<td>{}</td>", escape_html(&cell))
                    })
                    .collect();
                format!("<tr>{}</tr>", cells)
            })
            .collect();

        Ok(format!(
            r#"<div class="component component-table"><h3>{}</h3><table><thead><tr>{}</tr></thead><tbody>{}</tbody></table></div>"#,
            escape_html(component.display_title()),
            header,
            body
        ))
    }
}
