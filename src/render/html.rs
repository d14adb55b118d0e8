//! Custom HTML renderer

use super::{empty_state, ensure_rows, escape_html, inline_templates, Renderer};
use crate::backend::QueryResult;
use crate::definition::ComponentDefinition;
use crate::error::RenderError;
use serde_json::{Map, Value};

/// Renders `options.template` as an inline template.
///
/// The context holds `data` (all rows), `result` (the raw payload) and
/// `row_count`, plus the first row's fields at top level.
pub struct HtmlRenderer;

impl Renderer for HtmlRenderer {
    fn render(
        &self,
        component: &ComponentDefinition,
        result: &QueryResult,
    ) -> Result<String, RenderError> {
        let template = match component.render.option_str("template") {
            Some(t) if !t.is_empty() => t,
            _ => return Ok(empty_state("No HTML template provided", "component-html")),
        };

        let rows = ensure_rows(&result.data);
        let mut context = Map::new();
        context.insert(
            "data".to_string(),
            Value::Array(rows.iter().map(|row| Value::Object((*row).clone())).collect()),
        );
        context.insert("result".to_string(), result.data.clone());
        context.insert("row_count".to_string(), Value::from(rows.len()));
        if let Some(first) = rows.first() {
            context.extend((*first).clone());
        }

        let body = inline_templates()
            .render_str(template, &context)
            .map_err(|e| RenderError::Template(e.to_string()))?;

        Ok(format!(
            r#"<div class="component component-html"><h3>{}</h3><div class="html-body">{}</div></div>"#,
            escape_html(component.display_title()),
            body
        ))
    }
}
