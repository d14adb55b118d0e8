//! Report execution: fan-out, ordering, isolation, retries, timeouts and shutdown

use crate::integration::test_utils::{config_with, executor_with, CountingFactory};
use queryhub::definition::RenderSpec;
use queryhub::{ComponentDefinition, ComponentErrorKind, ReportDefinition, ReportError};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::time::Duration;

fn text(id: &str, backend: &str) -> ComponentDefinition {
    ComponentDefinition::new(id, backend).with_render(RenderSpec::new("text"))
}

#[tokio::test(start_paused = true)]
async fn mixed_outcomes_are_aggregated_in_definition_order() {
    let report = ReportDefinition::new("ops", "Ops")
        .with_component(text("a", "db").with_query(json!({"key": "a"})))
        .with_component(
            text("b", "db")
                .with_query(json!({"key": "b", "fail_times": 2}))
                .with_retries(3),
        )
        .with_component(
            text("c", "db")
                .with_query(json!({"key": "c", "delay_ms": 5_000}))
                .with_timeout_seconds(1.0)
                .with_retries(3),
        );
    let factory = CountingFactory::new();
    let executor = executor_with(config_with(&["db"], vec![report]), &factory);

    let result = executor.execute_report("ops").await.unwrap();

    let ids: Vec<&str> = result.components.iter().map(|c| c.component.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);

    let (a, b, c) = (&result.components[0], &result.components[1], &result.components[2]);
    assert!(a.is_success());
    assert_eq!(a.attempts, 1);
    assert!(b.is_success());
    assert_eq!(b.attempts, 3);
    assert_eq!(c.attempts, 1);
    assert_eq!(c.error().map(|e| e.kind()), Some(ComponentErrorKind::Timeout));
    assert!(c.result().is_none());
    assert!(c.rendered().is_none());

    assert!(result.has_failures());
    assert_eq!(result.success_count(), 2);
    assert_eq!(result.failure_count(), 1);
    assert_eq!(result.metadata.failures, vec!["c".to_string()]);
    assert_eq!(factory.backend.calls_for("c"), 1);
    assert!(result.html.contains("timed out after 1.00s"));

    executor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn output_order_ignores_completion_order() {
    let report = ReportDefinition::new("ordered", "Ordered")
        .with_component(text("first", "db").with_query(json!({"key": "first", "delay_ms": 300})))
        .with_component(text("second", "db").with_query(json!({"key": "second", "delay_ms": 200})))
        .with_component(text("third", "db").with_query(json!({"key": "third", "delay_ms": 100})));
    let factory = CountingFactory::new();
    let executor = executor_with(config_with(&["db"], vec![report]), &factory);

    let result = executor.execute_report("ordered").await.unwrap();

    assert_eq!(factory.backend.completions(), vec!["third", "second", "first"]);
    let ids: Vec<&str> = result.components.iter().map(|c| c.component.id.as_str()).collect();
    assert_eq!(ids, vec!["first", "second", "third"]);
}

#[tokio::test(start_paused = true)]
async fn components_run_concurrently() {
    let report = ReportDefinition::new("parallel", "Parallel")
        .with_component(text("x", "db").with_query(json!({"key": "x", "delay_ms": 1_000})))
        .with_component(text("y", "db").with_query(json!({"key": "y", "delay_ms": 1_000})))
        .with_component(text("z", "db").with_query(json!({"key": "z", "delay_ms": 1_000})));
    let factory = CountingFactory::new();
    let executor = executor_with(config_with(&["db"], vec![report]), &factory);

    let started = tokio::time::Instant::now();
    let result = executor.execute_report("parallel").await.unwrap();

    assert_eq!(result.success_count(), 3);
    assert!(started.elapsed() < Duration::from_millis(2_000));
}

#[tokio::test]
async fn one_failing_component_does_not_affect_the_others() {
    let report = ReportDefinition::new("iso", "Isolation")
        .with_component(text("good-1", "db").with_query(json!({"key": "g1"})))
        .with_component(
            text("bad", "db")
                .with_query(json!({"key": "bad", "fail_times": 100}))
                .with_retries(2),
        )
        .with_component(text("good-2", "db").with_query(json!({"key": "g2"})));
    let factory = CountingFactory::new();
    let executor = executor_with(config_with(&["db"], vec![report]), &factory);

    let result = executor.execute_report("iso").await.unwrap();

    let bad = &result.components[1];
    assert_eq!(bad.attempts, 2);
    assert_eq!(bad.error().map(|e| e.kind()), Some(ComponentErrorKind::Backend));
    assert!(bad.result().is_none());
    assert!(bad.rendered().is_none());
    assert!(result.components[0].is_success());
    assert!(result.components[2].is_success());
    assert!(result.html.contains("2 of 3 components succeeded"));
}

#[tokio::test]
async fn rendering_failure_is_terminal_and_isolated() {
    let report = ReportDefinition::new("render", "Render")
        .with_component(
            ComponentDefinition::new("chart", "db")
                .with_query(json!({"key": "chart"}))
                .with_render(RenderSpec::new("plotly"))
                .with_retries(3),
        )
        .with_component(text("ok", "db").with_query(json!({"key": "ok"})));
    let factory = CountingFactory::new();
    let executor = executor_with(config_with(&["db"], vec![report]), &factory);

    let result = executor.execute_report("render").await.unwrap();

    let chart = &result.components[0];
    assert_eq!(chart.attempts, 1);
    assert_eq!(chart.error().map(|e| e.kind()), Some(ComponentErrorKind::Rendering));
    assert_eq!(factory.backend.calls_for("chart"), 1);
    assert!(result.components[1].is_success());
}

#[tokio::test(start_paused = true)]
async fn concurrent_components_share_one_handle_per_backend() {
    let mut report = ReportDefinition::new("shared", "Shared");
    for i in 0..8 {
        report = report.with_component(text(&format!("c{}", i), "db").with_query(json!({"key": i.to_string()})));
    }
    report = report.with_component(text("other", "cache").with_query(json!({"key": "other"})));
    let factory = CountingFactory::slow(Duration::from_millis(250));
    let executor = executor_with(config_with(&["db", "cache"], vec![report]), &factory);

    let started = tokio::time::Instant::now();
    let result = executor.execute_report("shared").await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(500));
    executor.execute_report("shared").await.unwrap();

    assert_eq!(result.success_count(), 9);
    assert_eq!(factory.created(), 2);
    assert_eq!(executor.resolver().pool().len(), 2);
}

#[tokio::test]
async fn shutdown_releases_each_handle_once() {
    let report = ReportDefinition::new("daily", "Daily")
        .with_component(text("a", "db").with_query(json!({"key": "a"})))
        .with_component(text("b", "cache").with_query(json!({"key": "b"})));
    let factory = CountingFactory::new();
    let executor = executor_with(config_with(&["db", "cache"], vec![report]), &factory);

    executor.execute_report("daily").await.unwrap();

    assert!(executor.shutdown().await.is_empty());
    assert!(executor.shutdown().await.is_empty());
    assert_eq!(factory.backend.closed.load(Ordering::SeqCst), 2);
    assert!(matches!(
        executor.execute_report("daily").await,
        Err(ReportError::ShutDown)
    ));
}

#[tokio::test]
async fn concurrency_cap_still_runs_every_component() {
    let mut report = ReportDefinition::new("capped", "Capped");
    for i in 0..5 {
        report = report.with_component(text(&format!("c{}", i), "db").with_query(json!({"key": i.to_string()})));
    }
    let mut config = config_with(&["db"], vec![report]);
    config.execution.max_concurrent_components = 2;
    let factory = CountingFactory::new();
    let executor = executor_with(config, &factory);

    let result = executor.execute_report("capped").await.unwrap();

    let ids: Vec<&str> = result.components.iter().map(|c| c.component.id.as_str()).collect();
    assert_eq!(ids, vec!["c0", "c1", "c2", "c3", "c4"]);
    assert_eq!(result.success_count(), 5);
}

#[tokio::test]
async fn summary_serializes_component_outcomes() {
    let report = ReportDefinition::new("sum", "Summary")
        .with_component(text("a", "db").with_query(json!({"key": "a"})))
        .with_component(
            text("b", "db")
                .with_query(json!({"key": "b", "fail_times": 9}))
                .with_retries(1),
        );
    let factory = CountingFactory::new();
    let executor = executor_with(config_with(&["db"], vec![report]), &factory);

    let result = executor.execute_report("sum").await.unwrap();
    let summary = serde_json::to_value(result.summary()).unwrap();

    assert_eq!(summary["report_id"], "sum");
    assert_eq!(summary["success_count"], 1);
    assert_eq!(summary["failures"], json!(["b"]));
    assert_eq!(summary["components"][1]["error_kind"], "backend");
    assert_eq!(summary["components"][0]["attempts"], 1);
}
