//! Configuration loading through to a running executor

use crate::integration::test_utils::CountingFactory;
use queryhub::backend::BackendFactory;
use queryhub::{ApplicationBuilder, BackendRegistry, ConfigLoader, ReportError};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn write(dir: &Path, name: &str, contents: &str) {
    let path = dir.join(name);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

fn lookup(name: &str) -> Option<String> {
    match name {
        "WAREHOUSE_TIMEOUT" => Some("4".to_string()),
        "REGION" => Some("emea".to_string()),
        _ => None,
    }
}

const MAIN: &str = r#"
[backends.warehouse]
type = "scripted"
default_timeout_seconds = "${WAREHOUSE_TIMEOUT}"
retry_attempts = 2
retry_backoff_seconds = 0

[reports.revenue]
title = "Revenue ${REGION}"

[[reports.revenue.components]]
id = "total"
backend = "warehouse"
query = { key = "total", value = { value = 42 } }
render = { type = "text", options = { template = "Total: {value}" } }
"#;

const WEEKLY: &str = r#"
title = "Weekly"
description = "Loaded from its own file"
tags = ["ops"]

[[components]]
id = "flaky"
provider = "warehouse"
query = { key = "flaky", fail_times = 1 }
render = { type = "text" }
"#;

#[tokio::test]
async fn loaded_configuration_drives_report_execution() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "queryhub.toml", MAIN);
    write(dir.path(), "reports/weekly.toml", WEEKLY);

    let config = ConfigLoader::new(dir.path())
        .without_env_overrides()
        .load_with(&lookup)
        .unwrap();
    assert_eq!(config.report_ids(), vec!["revenue", "weekly"]);
    assert_eq!(config.reports["revenue"].title, "Revenue emea");
    assert_eq!(
        config.backends["warehouse"].default_timeout(),
        Duration::from_secs(4)
    );
    assert_eq!(config.reports["weekly"].tags, vec!["ops".to_string()]);

    let factory = CountingFactory::new();
    let mut registry = BackendRegistry::with_defaults();
    registry.register("scripted", Arc::clone(&factory) as Arc<dyn BackendFactory>);
    let executor = ApplicationBuilder::new()
        .with_config(config)
        .with_backends(registry)
        .build()
        .unwrap();

    let revenue = executor.execute_report("revenue").await.unwrap();
    assert!(revenue.html.contains("Total: 42"));
    assert!(revenue.html.contains("<title>Revenue emea</title>"));

    let weekly = executor.execute_report("weekly").await.unwrap();
    assert_eq!(weekly.components[0].attempts, 2);
    assert!(!weekly.has_failures());
    assert_eq!(factory.created(), 1);

    assert!(executor.shutdown().await.is_empty());
}

#[test]
fn unknown_backend_type_fails_construction() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "queryhub.toml",
        "[backends.warehouse]\ntype = \"adx\"\n",
    );

    let result = ApplicationBuilder::new().config_dir(dir.path()).build();

    assert!(matches!(result, Err(ReportError::Config(msg)) if msg.contains("adx")));
}

#[test]
fn component_referencing_missing_backend_fails_construction() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "queryhub.toml",
        "[reports.r]\ntitle = \"R\"\n[[reports.r.components]]\nid = \"c\"\nbackend = \"nowhere\"\n",
    );

    let result = ApplicationBuilder::new().config_dir(dir.path()).build();

    assert!(matches!(result, Err(ReportError::Config(msg)) if msg.contains("unknown backend 'nowhere'")));
}

#[test]
fn report_template_file_is_used_from_templates_dir() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "queryhub.toml",
        "[backends.files]\ntype = \"csv\"\n[reports.r]\ntitle = \"R\"\ntemplate = \"plain.html\"\n",
    );
    write(dir.path(), "templates/plain.html", "<main>{{title}}|{{summary}}</main>");

    let executor = ApplicationBuilder::new().config_dir(dir.path()).build().unwrap();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let result = runtime.block_on(executor.execute_report("r")).unwrap();

    assert_eq!(result.html, "<main>R|0 of 0 components succeeded</main>");
}
