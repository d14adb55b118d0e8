//! Report assembly
//!
//! Builds the full report body from every component outcome, failed ones
//! included, so partial results stay visible.

use super::escape_html;
use crate::definition::ReportDefinition;
use crate::error::{ComponentErrorKind, ReportError};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use minijinja::{context, Environment, UndefinedBehavior, Value as TemplateValue};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// What the template engine sees for one component
#[derive(Debug, Clone, Serialize)]
pub struct ComponentPayload {
    pub id: String,
    pub title: String,
    pub rendered: Option<String>,
    pub error: Option<String>,
    pub error_kind: Option<ComponentErrorKind>,
    pub metadata: Map<String, Value>,
    pub data: Option<Value>,
    pub attempts: u32,
    pub duration_ms: u64,
}

impl ComponentPayload {
    /// The component's fragment, or an error panel when it failed
    pub fn fragment(&self) -> String {
        match (&self.rendered, &self.error) {
            (Some(rendered), _) => rendered.clone(),
            (None, error) => format!(
                r#"<div class="component component-error"><h3>{}</h3><p class="error">{}</p></div>"#,
                escape_html(&self.title),
                escape_html(error.as_deref().unwrap_or("No output"))
            ),
        }
    }

    /// Template view of this component; `rendered` and `fragment` are
    /// already HTML and pass through auto-escaping untouched.
    fn template_value(&self) -> TemplateValue {
        context! {
            id => &self.id,
            title => &self.title,
            rendered => self.rendered.clone().map(TemplateValue::from_safe_string),
            error => &self.error,
            error_kind => &self.error_kind,
            metadata => &self.metadata,
            data => &self.data,
            attempts => self.attempts,
            duration_ms => self.duration_ms,
            fragment => TemplateValue::from_safe_string(self.fragment()),
        }
    }
}

/// Template context for one report run
#[derive(Debug, Clone, Serialize)]
pub struct ReportContext {
    pub report_id: String,
    pub title: String,
    pub description: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub components: Vec<ComponentPayload>,
    pub success_count: usize,
    pub failure_count: usize,
}

impl ReportContext {
    pub fn summary_line(&self) -> String {
        format!(
            "{} of {} components succeeded",
            self.success_count,
            self.components.len()
        )
    }

    fn fragments(&self) -> String {
        self.components
            .iter()
            .map(ComponentPayload::fragment)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Variables available to report templates.
    ///
    /// Adds `summary` and `body` (every component fragment, joined) to the
    /// report fields; `components` is the list of component views.
    pub fn template_values(&self) -> TemplateValue {
        let components: Vec<TemplateValue> = self
            .components
            .iter()
            .map(ComponentPayload::template_value)
            .collect();
        context! {
            report_id => &self.report_id,
            title => &self.title,
            description => &self.description,
            generated_at => self.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            components => components,
            success_count => self.success_count,
            failure_count => self.failure_count,
            summary => self.summary_line(),
            body => TemplateValue::from_safe_string(self.fragments()),
        }
    }
}

/// Renders the full report body
#[async_trait]
pub trait ReportTemplateEngine: Send + Sync {
    async fn render(
        &self,
        report: &ReportDefinition,
        context: &ReportContext,
    ) -> Result<String, ReportError>;
}

/// Template files under one directory, compiled on first use
struct TemplateFiles {
    dir: PathBuf,
    env: Environment<'static>,
}

impl TemplateFiles {
    fn new(dir: PathBuf) -> Self {
        let mut env = Environment::new();
        env.set_loader(minijinja::path_loader(dir.clone()));
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        Self { dir, env }
    }

    fn render(&self, name: &str, values: TemplateValue) -> Result<String, ReportError> {
        debug!(template = name, dir = %self.dir.display(), "Rendering report template");
        let template = self.env.get_template(name).map_err(|e| {
            ReportError::Template(format!("Failed to load template '{}': {}", name, e))
        })?;
        template
            .render(values)
            .map_err(|e| ReportError::Template(format!("Template '{}': {}", name, e)))
    }
}

/// Default engine: template files from the templates directory, or a
/// built-in document when the report names no template.
///
/// Files ending in `.html`, `.htm` or `.xml` are auto-escaped; the variables
/// are those of [`ReportContext::template_values`].
#[derive(Clone, Default)]
pub struct HtmlReportEngine {
    templates: Option<Arc<TemplateFiles>>,
}

impl HtmlReportEngine {
    pub fn new(templates_dir: Option<PathBuf>) -> Self {
        Self {
            templates: templates_dir.map(|dir| Arc::new(TemplateFiles::new(dir))),
        }
    }

    pub fn templates_dir(&self) -> Option<&Path> {
        self.templates.as_ref().map(|files| files.dir.as_path())
    }

    fn builtin_document(context: &ReportContext) -> String {
        let description = context
            .description
            .as_deref()
            .map(|d| format!("<p class=\"description\">{}</p>\n", escape_html(d)))
            .unwrap_or_default();
        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n</head>\n<body>\n<h1>{title}</h1>\n{description}<p class=\"generated\">Generated {generated}</p>\n<p class=\"summary\">{summary}</p>\n{components}\n</body>\n</html>\n",
            title = escape_html(&context.title),
            description = description,
            generated = context.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            summary = escape_html(&context.summary_line()),
            components = context.fragments(),
        )
    }
}

impl fmt::Debug for HtmlReportEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HtmlReportEngine")
            .field("templates_dir", &self.templates_dir())
            .finish()
    }
}

#[async_trait]
impl ReportTemplateEngine for HtmlReportEngine {
    async fn render(
        &self,
        report: &ReportDefinition,
        context: &ReportContext,
    ) -> Result<String, ReportError> {
        let Some(name) = report.template.clone() else {
            return Ok(Self::builtin_document(context));
        };
        let templates = self.templates.as_ref().map(Arc::clone).ok_or_else(|| {
            ReportError::Template(format!(
                "Report '{}' uses template '{}' but no templates directory is configured",
                report.id, name
            ))
        })?;

        // Template loading reads the filesystem.
        let values = context.template_values();
        tokio::task::spawn_blocking(move || templates.render(&name, values))
            .await
            .map_err(|e| ReportError::Template(format!("Template rendering task failed: {}", e)))?
    }
}
