//! Adapter for a remote analytics backend that executes validated queries.
//!
//! Contract: `POST {base_url}/api/{api_version}/query` with a JSON body
//! `{query, category, metrics}` and store headers; the response body carries
//! the result rows under `rows`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use storesight_core::{DataExecutor, ExecutorError, Intent, Row, StoreContext};
use tracing::{debug, warn};

pub const STORE_DOMAIN_HEADER: &str = "X-Store-Domain";
pub const ACCESS_TOKEN_HEADER: &str = "X-Access-Token";

#[derive(Debug, Serialize)]
struct QueryPayload<'a> {
    query: &'a str,
    category: &'static str,
    metrics: Vec<&'static str>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    rows: Vec<Row>,
}

#[derive(Clone, Debug)]
pub struct HttpExecutor {
    client: Client,
    endpoint: String,
    timeout_secs: u64,
}

impl HttpExecutor {
    pub fn new(
        base_url: &str,
        api_version: &str,
        timeout_secs: u64,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(Duration::from_secs(timeout_secs)).build()?;
        Ok(Self { client, endpoint: endpoint(base_url, api_version), timeout_secs })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn map_transport_error(&self, error: reqwest::Error) -> ExecutorError {
        if error.is_timeout() {
            ExecutorError::Timeout { timeout_secs: self.timeout_secs }
        } else if error.is_decode() {
            ExecutorError::MalformedResponse(error.to_string())
        } else {
            ExecutorError::Unavailable(error.to_string())
        }
    }
}

fn endpoint(base_url: &str, api_version: &str) -> String {
    format!("{}/api/{}/query", base_url.trim_end_matches('/'), api_version.trim_matches('/'))
}

#[async_trait]
impl DataExecutor for HttpExecutor {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn execute(
        &self,
        store: &StoreContext,
        query: &str,
        intent: &Intent,
    ) -> Result<Vec<Row>, ExecutorError> {
        let payload = QueryPayload {
            query,
            category: intent.category.as_str(),
            metrics: intent.metrics.iter().map(|metric| metric.as_str()).collect(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header(STORE_DOMAIN_HEADER, &store.domain)
            .header(ACCESS_TOKEN_HEADER, store.credential())
            .json(&payload)
            .send()
            .await
            .map_err(|error| self.map_transport_error(error))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(
                event_name = "data.http.status",
                store_domain = %store.domain,
                status = status.as_u16(),
                "data backend returned non-success status"
            );
            return Err(ExecutorError::Status {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        let body = response.text().await.map_err(|error| self.map_transport_error(error))?;
        let decoded: QueryResponse = serde_json::from_str(&body)
            .map_err(|error| ExecutorError::MalformedResponse(error.to_string()))?;

        debug!(
            event_name = "data.http.executed",
            store_domain = %store.domain,
            rows = decoded.rows.len(),
            "data backend answered query"
        );
        Ok(decoded.rows)
    }
}

#[cfg(test)]
mod tests {
    use storesight_core::{DataExecutor, ExecutorError, Intent, StoreContext};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::{endpoint, HttpExecutor};

    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
        let address = listener.local_addr().expect("listener address");

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept connection");
            let mut buffer = vec![0_u8; 8192];
            let _ = socket.read(&mut buffer).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        });

        format!("http://{address}")
    }

    fn store() -> StoreContext {
        StoreContext::new("demo-store.myshopify.com", "token-123")
    }

    #[test]
    fn endpoint_joins_base_url_and_version() {
        assert_eq!(
            endpoint("https://analytics.example/", "/2024-01/"),
            "https://analytics.example/api/2024-01/query"
        );
    }

    #[tokio::test]
    async fn rows_are_read_from_response_body() {
        let base_url =
            serve_once("200 OK", r#"{"rows":[{"product_title":"Yoga Mat Pro","total_sold":9}]}"#)
                .await;
        let executor = HttpExecutor::new(&base_url, "2024-01", 5).expect("build executor");

        let rows = executor
            .execute(&store(), "SELECT 1 FROM orders", &Intent::general())
            .await
            .expect("rows");

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("total_sold").and_then(|value| value.as_i64()), Some(9));
    }

    #[tokio::test]
    async fn non_success_status_maps_to_status_error() {
        let base_url = serve_once("502 Bad Gateway", r#"{"error":"upstream"}"#).await;
        let executor = HttpExecutor::new(&base_url, "2024-01", 5).expect("build executor");

        let error = executor
            .execute(&store(), "SELECT 1 FROM orders", &Intent::general())
            .await
            .expect_err("status error");

        assert!(matches!(error, ExecutorError::Status { status: 502, .. }));
    }

    #[tokio::test]
    async fn undecodable_body_is_malformed_response() {
        let base_url = serve_once("200 OK", "not json").await;
        let executor = HttpExecutor::new(&base_url, "2024-01", 5).expect("build executor");

        let error = executor
            .execute(&store(), "SELECT 1 FROM orders", &Intent::general())
            .await
            .expect_err("malformed");

        assert!(matches!(error, ExecutorError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn unreachable_backend_is_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
        let address = listener.local_addr().expect("listener address");
        drop(listener);

        let executor =
            HttpExecutor::new(&format!("http://{address}"), "2024-01", 2).expect("build executor");
        let error = executor
            .execute(&store(), "SELECT 1 FROM orders", &Intent::general())
            .await
            .expect_err("unreachable");

        assert!(matches!(error, ExecutorError::Unavailable(_) | ExecutorError::Timeout { .. }));
    }
}
