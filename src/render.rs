//! Rendering
//!
//! Component renderers turn a query result into an HTML fragment; the report
//! template engine assembles fragments into the full report body. Renderers
//! are looked up by the component's render `type`.

use crate::backend::QueryResult;
use crate::definition::ComponentDefinition;
use crate::error::RenderError;
use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

pub mod html;
pub mod report;
pub mod table;
pub mod text;

pub use report::{ComponentPayload, HtmlReportEngine, ReportContext, ReportTemplateEngine};

/// Turns one component's query result into a fragment
pub trait Renderer: Send + Sync {
    fn render(&self, component: &ComponentDefinition, result: &QueryResult)
        -> Result<String, RenderError>;
}

/// Renderers keyed by render type
#[derive(Clone, Default)]
pub struct RendererRegistry {
    renderers: BTreeMap<String, Arc<dyn Renderer>>,
}

impl RendererRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `table`, `text` and `html` renderers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("table", Arc::new(table::TableRenderer));
        registry.register("text", Arc::new(text::TextRenderer));
        registry.register("html", Arc::new(html::HtmlRenderer));
        registry
    }

    pub fn register(&mut self, render_type: impl Into<String>, renderer: Arc<dyn Renderer>) {
        self.renderers.insert(render_type.into(), renderer);
    }

    pub fn contains(&self, render_type: &str) -> bool {
        self.renderers.contains_key(render_type)
    }

    pub fn resolve(&self, render_type: &str) -> Result<&Arc<dyn Renderer>, RenderError> {
        self.renderers
            .get(render_type)
            .ok_or_else(|| RenderError::UnknownRenderer(render_type.to_string()))
    }

    /// Render `result` with the renderer named by the component's render type
    pub fn render(
        &self,
        component: &ComponentDefinition,
        result: &QueryResult,
    ) -> Result<String, RenderError> {
        self.resolve(&component.render.render_type)?
            .render(component, result)
    }
}

/// Escape text for inclusion in HTML
pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Display form of a JSON value: strings unquoted, null empty
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
        other => other.to_string(),
    }
}

/// Rows of a list-of-objects payload; anything else yields no rows
pub fn ensure_rows(data: &Value) -> Vec<&Map<String, Value>> {
    match data {
        Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
        Value::Object(row) => vec![row],
        _ => Vec::new(),
    }
}

/// Follow a dotted path; numeric segments index arrays
pub fn traverse_path<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(data, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Shared environment for inline component templates.
///
/// Output is always HTML-escaped and an undefined name is an error.
pub(crate) fn inline_templates() -> &'static Environment<'static> {
    static ENV: OnceLock<Environment<'static>> = OnceLock::new();
    ENV.get_or_init(|| {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        env
    })
}

pub(crate) fn empty_state(message: &str, css_class: &str) -> String {
    format!(
        r#"<div class="component {} empty">{}</div>"#,
        css_class,
        escape_html(message)
    )
}
