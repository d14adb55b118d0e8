//! REST backend
//!
//! Issues one HTTP request per query against a configured base URL. The HTTP
//! client is built on first use and shared by every query on the backend.

use super::{BackendClient, BackendConfig, BackendFactory, QueryResult};
use crate::error::BackendError;
use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

const REST_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const ERROR_BODY_PREVIEW: usize = 200;

#[derive(Debug, Clone, Default, Deserialize)]
struct RestOptions {
    base_url: Option<String>,
    #[serde(default)]
    default_headers: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RestQuery {
    #[serde(default = "default_method")]
    method: String,
    #[serde(alias = "path")]
    endpoint: Option<String>,
    url: Option<String>,
    #[serde(default)]
    headers: HashMap<String, String>,
    #[serde(default)]
    params: Map<String, Value>,
    json: Option<Value>,
    data: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

fn map_http_error(error: reqwest::Error) -> BackendError {
    if error.is_timeout() {
        BackendError::Http(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        BackendError::Http(format!("Connection error: {}", error))
    } else {
        BackendError::Http(error.to_string())
    }
}

fn param_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Client for one REST backend
pub struct RestBackend {
    base_url: Option<String>,
    default_headers: HashMap<String, String>,
    request_timeout: Duration,
    client: OnceCell<Client>,
}

impl RestBackend {
    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        let options: RestOptions = config.options()?;
        if let Some(base_url) = &options.base_url {
            Url::parse(base_url).map_err(|e| {
                BackendError::Initialization(format!("Invalid base_url '{}': {}", base_url, e))
            })?;
        }
        Ok(Self {
            base_url: options.base_url,
            default_headers: options.default_headers,
            request_timeout: config.default_timeout(),
            client: OnceCell::new(),
        })
    }

    async fn client(&self) -> Result<&Client, BackendError> {
        let request_timeout = self.request_timeout;
        self.client
            .get_or_try_init(|| async move {
                debug!("Building HTTP client");
                Client::builder()
                    .no_proxy()
                    .connect_timeout(REST_CONNECT_TIMEOUT)
                    .timeout(request_timeout)
                    .build()
                    .map_err(|e| {
                        BackendError::Initialization(format!("Failed to create HTTP client: {}", e))
                    })
            })
            .await
    }

    fn resolve_url(&self, query: &RestQuery) -> Result<Url, BackendError> {
        if let Some(url) = &query.url {
            return Url::parse(url)
                .map_err(|e| BackendError::InvalidQuery(format!("Invalid url '{}': {}", url, e)));
        }
        let endpoint = query.endpoint.as_deref().ok_or_else(|| {
            BackendError::InvalidQuery("REST queries require an 'endpoint' or 'url'".to_string())
        })?;
        let base = self.base_url.as_deref().ok_or_else(|| {
            BackendError::InvalidQuery(format!(
                "Endpoint '{}' needs a base_url on the backend",
                endpoint
            ))
        })?;
        let base = Url::parse(&format!("{}/", base.trim_end_matches('/')))
            .map_err(|e| BackendError::InvalidQuery(e.to_string()))?;
        base.join(endpoint.trim_start_matches('/'))
            .map_err(|e| BackendError::InvalidQuery(e.to_string()))
    }
}

#[async_trait]
impl BackendClient for RestBackend {
    async fn execute(&self, query: &Value) -> Result<QueryResult, BackendError> {
        let query: RestQuery = serde_json::from_value(query.clone())
            .map_err(|e| BackendError::InvalidQuery(e.to_string()))?;
        let method = Method::from_bytes(query.method.to_uppercase().as_bytes())
            .map_err(|_| BackendError::InvalidQuery(format!("Invalid method '{}'", query.method)))?;
        let url = self.resolve_url(&query)?;

        let params: Vec<(String, String)> = query
            .params
            .iter()
            .map(|(key, value)| (key.clone(), param_value(value)))
            .collect();

        let mut request = self.client().await?.request(method.clone(), url.clone());
        for (name, value) in self.default_headers.iter().chain(query.headers.iter()) {
            request = request.header(name.as_str(), value.as_str());
        }
        if !params.is_empty() {
            request = request.query(&params);
        }
        if let Some(body) = &query.json {
            request = request.json(body);
        } else if let Some(body) = query.data {
            request = request.body(body);
        }

        debug!(method = %method, url = %url, "Sending REST request");
        let response = request.send().await.map_err(map_http_error)?;

        let status = response.status();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or("").trim().to_string())
            .unwrap_or_default();

        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            let preview: String = body.chars().take(ERROR_BODY_PREVIEW).collect();
            return Err(BackendError::Http(format!(
                "REST request failed with status {}: {}",
                status.as_u16(),
                preview
            )));
        }

        let data = if content_type == "application/json" {
            response
                .json::<Value>()
                .await
                .map_err(|e| BackendError::Execution(format!("Failed to parse response: {}", e)))?
        } else {
            Value::String(response.text().await.map_err(map_http_error)?)
        };

        let mut result = QueryResult::new(data)
            .with_metadata("status", status.as_u16())
            .with_metadata("url", final_url);
        if !content_type.is_empty() {
            result = result.with_content_type(content_type);
        }
        Ok(result)
    }

    fn backend_type(&self) -> &str {
        "rest"
    }
}

/// Factory registered under the `rest` backend type
pub struct RestBackendFactory;

#[async_trait]
impl BackendFactory for RestBackendFactory {
    async fn create(&self, config: &BackendConfig) -> Result<Arc<dyn BackendClient>, BackendError> {
        Ok(Arc::new(RestBackend::from_config(config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response and return the base URL plus the raw request.
    async fn serve_once(
        status_line: &'static str,
        content_type: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let mut request = Vec::new();
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                if n == 0 || request.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                content_type,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).to_string()
        });
        (format!("http://{}", addr), handle)
    }

    fn backend(base_url: &str) -> RestBackend {
        let config = BackendConfig::new("api", "rest")
            .with_option("base_url", base_url)
            .with_option("default_headers", json!({"X-Team": "ops"}));
        RestBackend::from_config(&config).unwrap()
    }

    #[tokio::test]
    async fn json_response_becomes_data() {
        let (base, server) = serve_once("200 OK", "application/json", r#"[{"id":1}]"#).await;
        let backend = backend(&base);

        let result = backend
            .execute(&json!({"endpoint": "/v1/items", "params": {"limit": 5}}))
            .await
            .unwrap();

        assert_eq!(result.data, json!([{"id": 1}]));
        assert_eq!(result.metadata["status"], json!(200));
        assert_eq!(result.content_type.as_deref(), Some("application/json"));

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /v1/items?limit=5 HTTP/1.1"));
        assert!(request.to_lowercase().contains("x-team: ops"));
    }

    #[tokio::test]
    async fn error_status_is_backend_failure() {
        let (base, server) = serve_once("503 Service Unavailable", "text/plain", "down").await;
        let backend = backend(&base);

        let err = backend.execute(&json!({"path": "health"})).await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP request failed: REST request failed with status 503: down");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn text_response_is_string_data() {
        let (base, server) = serve_once("200 OK", "text/plain; charset=utf-8", "hello").await;
        let backend = backend(&base);

        let result = backend
            .execute(&json!({"url": format!("{}/greeting", base)}))
            .await
            .unwrap();
        assert_eq!(result.data, json!("hello"));
        assert_eq!(result.content_type.as_deref(), Some("text/plain"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn query_without_endpoint_or_url_is_invalid() {
        let backend = backend("http://127.0.0.1:9");
        let err = backend.execute(&json!({"method": "GET"})).await.unwrap_err();
        assert!(matches!(err, BackendError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn invalid_base_url_fails_creation() {
        let config = BackendConfig::new("api", "rest").with_option("base_url", "not a url");
        assert!(RestBackendFactory.create(&config).await.is_err());
    }
}
