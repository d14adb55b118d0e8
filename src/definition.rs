//! Report and component definitions
//!
//! Declarative, read-only descriptions loaded from configuration. The engine
//! never mutates them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// How a component's query result is turned into a fragment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSpec {
    #[serde(rename = "type")]
    pub render_type: String,
    #[serde(default)]
    pub options: Map<String, Value>,
}

impl RenderSpec {
    pub fn new(render_type: impl Into<String>) -> Self {
        Self {
            render_type: render_type.into(),
            options: Map::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(Value::as_str)
    }
}

impl Default for RenderSpec {
    fn default() -> Self {
        Self::new("table")
    }
}

/// One independently queried and rendered unit of a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDefinition {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(alias = "provider")]
    pub backend: String,
    #[serde(default)]
    pub query: Value,
    #[serde(default)]
    pub render: RenderSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<f64>,
    /// Attempt budget; overrides the backend's `retry_attempts`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
}

impl ComponentDefinition {
    pub fn new(id: impl Into<String>, backend: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            backend: backend.into(),
            query: Value::Object(Map::new()),
            render: RenderSpec::default(),
            timeout_seconds: None,
            retries: None,
        }
    }

    pub fn with_query(mut self, query: Value) -> Self {
        self.query = query;
        self
    }

    pub fn with_render(mut self, render: RenderSpec) -> Self {
        self.render = render;
        self
    }

    pub fn with_timeout_seconds(mut self, seconds: f64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds
            .map(|s| Duration::try_from_secs_f64(s).unwrap_or(Duration::MAX))
    }
}

/// A report: an ordered list of components plus presentation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDefinition {
    /// Report id; filled from the table key when omitted
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Template file, relative to the templates directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default)]
    pub components: Vec<ComponentDefinition>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ReportDefinition {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            template: None,
            components: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn with_component(mut self, component: ComponentDefinition) -> Self {
        self.components.push(component);
        self
    }

    pub fn component(&self, id: &str) -> Option<&ComponentDefinition> {
        self.components.iter().find(|c| c.id == id)
    }
}
