//! Text renderer

use super::{display_value, escape_html, traverse_path, Renderer};
use crate::backend::QueryResult;
use crate::definition::ComponentDefinition;
use crate::error::RenderError;
use serde_json::Value;

const DEFAULT_VALUE_KEY: &str = "value";
const DEFAULT_TEMPLATE: &str = "{value}";

/// Renders a single extracted value through a `{value}` template.
///
/// The value is looked up with `options.value_path` (dotted) or
/// `options.value_key` (default `value`); list data uses its first row.
pub struct TextRenderer;

fn extract_value<'a>(data: &'a Value, component: &ComponentDefinition) -> Option<&'a Value> {
    let data = match data {
        Value::Array(items) if !items.is_empty() => &items[0],
        other => other,
    };
    if let Some(path) = component.render.option_str("value_path") {
        return traverse_path(data, path);
    }
    match data {
        Value::Object(map) => {
            let key = component
                .render
                .option_str("value_key")
                .unwrap_or(DEFAULT_VALUE_KEY);
            map.get(key)
        }
        other => Some(other),
    }
}

impl Renderer for TextRenderer {
    fn render(
        &self,
        component: &ComponentDefinition,
        result: &QueryResult,
    ) -> Result<String, RenderError> {
        let value = extract_value(&result.data, component)
            .map(display_value)
            .unwrap_or_default();
        let template = component
            .render
            .option_str("template")
            .unwrap_or(DEFAULT_TEMPLATE);
        let body = template.replace("{value}", &escape_html(&value));

        Ok(format!(
            r#"<div class="component component-text"><h3>{}</h3><div class="text-body">{}</div></div>"#,
            escape_html(component.display_title()),
            body
        ))
    }
}
