//! Backend client seam
//!
//! The adapter only talks to the metrics backend through [`MetricsBackend`].
//! The response types mirror the Datadog `GET /api/v1/query` payload; fields
//! the adapter never reads are left out and ignored on deserialization.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Errors from executing a query against the backend
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// Backend answered with an error status or error payload
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    /// JSON deserialization error
    #[error("Deserialization error: {0}")]
    Deserialize(#[from] serde_json::Error),
}

/// Response of one metrics query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsQueryResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub series: Vec<MetricsQuerySeries>,
}

impl MetricsQueryResponse {
    pub fn from_series(series: Vec<MetricsQuerySeries>) -> Self {
        Self {
            status: Some("ok".to_string()),
            error: None,
            series,
        }
    }
}

/// One series of a metrics query response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsQuerySeries {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub metric: Option<String>,
    #[serde(default)]
    pub tag_set: Vec<String>,
    /// `[timestamp, value]` pairs sorted by timestamp; either may be null
    #[serde(default)]
    pub pointlist: Vec<Vec<Option<f64>>>,
}

impl MetricsQuerySeries {
    pub fn new(display_name: &str, points: &[(f64, f64)]) -> Self {
        Self {
            display_name: Some(display_name.to_string()),
            metric: Some(display_name.to_string()),
            tag_set: Vec::new(),
            pointlist: points
                .iter()
                .map(|(ts, value)| vec![Some(*ts), Some(*value)])
                .collect(),
        }
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tag_set = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    /// Name used to identify the series; empty when the backend sent neither
    pub fn name(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.metric.as_deref())
            .unwrap_or_default()
    }
}

/// Executes backend query strings
#[async_trait]
pub trait MetricsBackend: Send + Sync {
    /// Run `query` over `[from, to]`, both in whole seconds
    async fn query_metrics(
        &self,
        query: &str,
        from: i64,
        to: i64,
    ) -> Result<MetricsQueryResponse, BackendError>;

    /// Identifies the backend in logs
    fn name(&self) -> &'static str;
}
