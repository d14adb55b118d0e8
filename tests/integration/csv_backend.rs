//! CSV backend end to end through the application builder

use queryhub::{ApplicationBuilder, ComponentErrorKind};
use serde_json::json;
use tempfile::TempDir;

fn setup() -> TempDir {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    std::fs::create_dir_all(&data).unwrap();
    std::fs::write(
        data.join("sales.csv"),
        "region,product,units\nnorth,widget,10\nsouth,widget,4\nnorth,gadget,7\n",
    )
    .unwrap();

    let main = format!(
        r#"
[backends.files]
type = "csv"
retry_attempts = 1
options = {{ root_path = {root:?} }}

[reports.sales]
title = "Sales"

[[reports.sales.components]]
id = "north"
backend = "files"
query = {{ path = "sales.csv", filters = [{{ column = "region", value = "north" }}] }}
render = {{ type = "table", options = {{ columns = ["product", "units"] }} }}

[[reports.sales.components]]
id = "headline"
backend = "files"
query = {{ file = "sales.csv", filters = [{{ column = "product", value = "get", operator = "contains" }}] }}
render = {{ type = "html", options = {{ template = "<b>{{{{row_count}}}} rows, first {{{{product}}}}</b>" }} }}

[[reports.sales.components]]
id = "missing"
backend = "files"
query = {{ path = "absent.csv" }}
"#,
        root = data.to_string_lossy()
    );
    std::fs::write(dir.path().join("queryhub.toml"), main).unwrap();
    dir
}

#[tokio::test]
async fn csv_report_renders_filtered_rows_and_isolates_missing_file() {
    let dir = setup();
    let executor = ApplicationBuilder::new()
        .config_dir(dir.path())
        .build()
        .unwrap();

    let result = executor.execute_report("sales").await.unwrap();

    let north = &result.components[0];
    assert!(north.is_success());
    assert_eq!(north.result().unwrap().metadata["rowcount"], json!(2));
    let table = north.rendered().unwrap();
    assert!(table.contains("widget"));
    assert!(table.contains("gadget"));
    assert!(!table.contains("region"));

    let headline = &result.components[1];
    assert_eq!(
        headline.rendered().unwrap(),
        r#"<div class="component component-html"><h3>headline</h3><div class="html-body"><b>3 rows, first widget</b></div></div>"#
    );

    let missing = &result.components[2];
    assert_eq!(missing.attempts, 1);
    assert_eq!(missing.error().map(|e| e.kind()), Some(ComponentErrorKind::Backend));
    assert!(missing.error().unwrap().to_string().contains("absent.csv"));

    assert_eq!(result.success_count(), 2);
    assert!(result.html.contains("2 of 3 components succeeded"));
    assert!(executor.shutdown().await.is_empty());
}
