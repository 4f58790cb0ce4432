use crate::backend::BackendError;

/// Errors that abort a remote read request
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The metric name matcher used something other than equality
    #[error("Metric name matcher must use equality, got {0}")]
    UnsupportedNameMatch(String),
    /// The query carried no metric name matcher
    #[error("Query has no metric name matcher")]
    MissingNameMatcher,
    /// A label matcher used an operator outside EQ/NEQ/RE/NRE
    #[error("Unknown match type {0}")]
    UnknownMatchType(i32),
    /// A backend point lacked its timestamp or value
    #[error("Malformed point {index} in series '{series}'")]
    MalformedPoint { series: String, index: usize },
    /// Executing a translated query against the backend failed
    #[error("Backend query '{query}' failed: {source}")]
    Backend {
        query: String,
        #[source]
        source: BackendError,
    },
}

impl QueryError {
    /// True when the backend failed or answered with unusable data
    pub fn is_backend_error(&self) -> bool {
        matches!(self, Self::Backend { .. } | Self::MalformedPoint { .. })
    }
}
