//! CSV backend
//!
//! Reads delimited files below a configured root directory. Each row becomes a
//! JSON object keyed by header; optional filters narrow the rows.

use super::{BackendClient, BackendConfig, BackendFactory, QueryResult};
use crate::error::BackendError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
struct CsvOptions {
    #[serde(default = "default_root_path")]
    root_path: PathBuf,
    #[serde(default = "default_delimiter")]
    delimiter: String,
}

fn default_root_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_delimiter() -> String {
    ",".to_string()
}

#[derive(Debug, Deserialize)]
struct CsvQuery {
    #[serde(alias = "file")]
    path: Option<String>,
    delimiter: Option<String>,
    #[serde(default)]
    filters: Vec<RowFilter>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum FilterOperator {
    #[default]
    Eq,
    Ne,
    Contains,
}

#[derive(Debug, Clone, Deserialize)]
struct RowFilter {
    column: String,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    operator: FilterOperator,
}

impl RowFilter {
    /// Rows missing the column never match.
    fn matches(&self, row: &Map<String, Value>) -> bool {
        let Some(Value::String(cell)) = row.get(&self.column) else {
            return false;
        };
        // A cell is never null, so a null value only satisfies `ne` and `contains`.
        let expected = match &self.value {
            Value::String(s) => s.clone(),
            Value::Null => return self.operator != FilterOperator::Eq,
            other => other.to_string(),
        };
        match self.operator {
            FilterOperator::Eq => *cell == expected,
            FilterOperator::Ne => *cell != expected,
            FilterOperator::Contains => cell.contains(&expected),
        }
    }
}

fn delimiter_byte(delimiter: &str) -> Result<u8, BackendError> {
    match delimiter.as_bytes() {
        [byte] => Ok(*byte),
        _ => Err(BackendError::InvalidQuery(format!(
            "Delimiter must be a single byte (got {:?})",
            delimiter
        ))),
    }
}

/// Read every row of `path`; runs on the blocking pool.
fn read_rows(path: &Path, delimiter: u8) -> Result<Vec<Map<String, Value>>, BackendError> {
    if !path.exists() {
        return Err(BackendError::Execution(format!(
            "CSV file not found: {}",
            path.display()
        )));
    }
    let mut reader = ::csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|e| BackendError::Execution(format!("Failed to open {}: {}", path.display(), e)))?;

    let headers = reader
        .headers()
        .map_err(|e| BackendError::Execution(format!("Failed to read header: {}", e)))?
        .clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| BackendError::Execution(format!("Malformed CSV row: {}", e)))?;
        let row = headers
            .iter()
            .zip(record.iter())
            .map(|(header, field)| (header.to_string(), Value::String(field.to_string())))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

/// Client for one CSV backend
pub struct CsvBackend {
    root_path: PathBuf,
    delimiter: String,
}

impl CsvBackend {
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root_path.into(),
            delimiter: default_delimiter(),
        }
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        let options: CsvOptions = config.options()?;
        delimiter_byte(&options.delimiter)?;
        Ok(Self {
            root_path: options.root_path,
            delimiter: options.delimiter,
        })
    }
}

#[async_trait]
impl BackendClient for CsvBackend {
    async fn execute(&self, query: &Value) -> Result<QueryResult, BackendError> {
        let query: CsvQuery = serde_json::from_value(query.clone())
            .map_err(|e| BackendError::InvalidQuery(e.to_string()))?;
        let relative = query.path.ok_or_else(|| {
            BackendError::InvalidQuery("CSV queries require a 'path' or 'file'".to_string())
        })?;

        let full_path = self.root_path.join(&relative);
        let delimiter = delimiter_byte(query.delimiter.as_deref().unwrap_or(&self.delimiter))?;
        debug!(path = %full_path.display(), "Reading CSV file");

        let read_path = full_path.clone();
        let rows = tokio::task::spawn_blocking(move || read_rows(&read_path, delimiter))
            .await
            .map_err(|e| BackendError::Execution(format!("CSV reader task failed: {}", e)))??;

        let filtered: Vec<Value> = rows
            .into_iter()
            .filter(|row| query.filters.iter().all(|f| f.matches(row)))
            .map(Value::Object)
            .collect();

        let rowcount = filtered.len();
        Ok(QueryResult::new(Value::Array(filtered))
            .with_metadata("rowcount", rowcount)
            .with_metadata("path", full_path.display().to_string())
            .with_content_type("text/csv"))
    }

    fn backend_type(&self) -> &str {
        "csv"
    }
}

/// Factory registered under the `csv` backend type
pub struct CsvBackendFactory;

#[async_trait]
impl BackendFactory for CsvBackendFactory {
    async fn create(&self, config: &BackendConfig) -> Result<Arc<dyn BackendClient>, BackendError> {
        Ok(Arc::new(CsvBackend::from_config(config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, CsvBackend) {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("sales.csv"),
            "region,product,units\nnorth,widget,10\nsouth,widget,4\nnorth,gadget,7\n",
        )
        .unwrap();
        fs::write(dir.path().join("semi.csv"), "a;b\n1;2\n").unwrap();
        let backend = CsvBackend::new(dir.path());
        (dir, backend)
    }

    #[tokio::test]
    async fn reads_all_rows_as_objects() {
        let (_dir, backend) = fixture();
        let result = backend.execute(&json!({"path": "sales.csv"})).await.unwrap();
        assert_eq!(result.row_count(), Some(3));
        assert_eq!(result.data[0], json!({"region": "north", "product": "widget", "units": "10"}));
        assert_eq!(result.metadata["rowcount"], json!(3));
    }

    #[tokio::test]
    async fn filters_narrow_rows() {
        let (_dir, backend) = fixture();
        let result = backend
            .execute(&json!({
                "file": "sales.csv",
                "filters": [
                    {"column": "region", "value": "north"},
                    {"column": "product", "operator": "ne", "value": "gadget"}
                ]
            }))
            .await
            .unwrap();
        assert_eq!(result.data, json!([{"region": "north", "product": "widget", "units": "10"}]));

        let numeric = backend
            .execute(&json!({
                "path": "sales.csv",
                "filters": [{"column": "units", "value": 4}]
            }))
            .await
            .unwrap();
        assert_eq!(numeric.row_count(), Some(1));

        let contains = backend
            .execute(&json!({
                "path": "sales.csv",
                "filters": [{"column": "product", "operator": "contains", "value": "dg"}]
            }))
            .await
            .unwrap();
        assert_eq!(contains.row_count(), Some(3));
    }

    #[tokio::test]
    async fn unknown_filter_column_matches_nothing() {
        let (_dir, backend) = fixture();
        let result = backend
            .execute(&json!({"path": "sales.csv", "filters": [{"column": "missing", "value": "x"}]}))
            .await
            .unwrap();
        assert_eq!(result.row_count(), Some(0));
    }

    #[tokio::test]
    async fn per_query_delimiter() {
        let (_dir, backend) = fixture();
        let result = backend
            .execute(&json!({"path": "semi.csv", "delimiter": ";"}))
            .await
            .unwrap();
        assert_eq!(result.data, json!([{"a": "1", "b": "2"}]));
    }

    #[tokio::test]
    async fn missing_path_and_missing_file_are_errors() {
        let (_dir, backend) = fixture();
        let err = backend.execute(&json!({})).await.unwrap_err();
        assert!(matches!(err, BackendError::InvalidQuery(_)));

        let err = backend.execute(&json!({"path": "nope.csv"})).await.unwrap_err();
        assert!(err.to_string().contains("CSV file not found"));
    }

    #[tokio::test]
    async fn factory_rejects_multi_byte_delimiter() {
        let config = BackendConfig::new("files", "csv").with_option("delimiter", "::");
        assert!(CsvBackendFactory.create(&config).await.is_err());
    }

    #[test]
    fn blocking_reader_reports_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.csv");

        let err = read_rows(&path, b',').unwrap_err();

        assert!(matches!(&err, BackendError::Execution(msg) if msg.starts_with("CSV file not found")));
        assert!(err.to_string().contains("absent.csv"));
    }
}
