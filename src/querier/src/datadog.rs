//! Datadog metrics query client

use async_trait::async_trait;
use common::config::DatadogConfig;

use crate::backend::{BackendError, MetricsBackend, MetricsQueryResponse};

const QUERY_PATH: &str = "/api/v1/query";
const API_KEY_HEADER: &str = "DD-API-KEY";
const APP_KEY_HEADER: &str = "DD-APPLICATION-KEY";

/// HTTP client for the Datadog `GET /api/v1/query` endpoint
pub struct DatadogClient {
    base_url: String,
    api_key: Option<String>,
    app_key: Option<String>,
    http: reqwest::Client,
}

impl DatadogClient {
    /// Create a client for the given base URL and credentials
    pub fn new(base_url: &str, api_key: Option<String>, app_key: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            app_key,
            http: reqwest::Client::new(),
        }
    }

    /// Create a client for the configured site with the configured timeout
    pub fn from_config(config: &DatadogConfig) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            base_url: config.api_base_url().trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            app_key: config.app_key.clone(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, query: &str, from: i64, to: i64) -> reqwest::RequestBuilder {
        let url = format!("{}{QUERY_PATH}", self.base_url);
        let mut builder = self.http.get(url).query(&[
            ("from", from.to_string()),
            ("to", to.to_string()),
            ("query", query.to_string()),
        ]);

        if let Some(key) = &self.api_key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        if let Some(key) = &self.app_key {
            builder = builder.header(APP_KEY_HEADER, key);
        }
        builder
    }
}

#[async_trait]
impl MetricsBackend for DatadogClient {
    async fn query_metrics(
        &self,
        query: &str,
        from: i64,
        to: i64,
    ) -> Result<MetricsQueryResponse, BackendError> {
        let resp = self.request(query, from, to).send().await?;
        handle_response(resp).await
    }

    fn name(&self) -> &'static str {
        "datadog"
    }
}

#[derive(serde::Deserialize)]
struct ApiErrors {
    errors: Vec<String>,
}

async fn handle_response(resp: reqwest::Response) -> Result<MetricsQueryResponse, BackendError> {
    if resp.status().is_success() {
        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    } else {
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        Err(BackendError::Api {
            status,
            message: error_message(text),
        })
    }
}

/// Datadog reports failures as `{"errors": [..]}`; fall back to the raw body
fn error_message(body: String) -> String {
    serde_json::from_str::<ApiErrors>(&body)
        .ok()
        .filter(|e| !e.errors.is_empty())
        .map(|e| e.errors.join("; "))
        .unwrap_or(body)
}
