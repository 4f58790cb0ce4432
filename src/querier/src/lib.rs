//! Prometheus remote read on top of the Datadog metrics query API

pub mod adapter;
pub mod backend;
pub mod datadog;
pub mod error;
pub mod handler;
pub mod query;

pub use adapter::{LabelPolicy, RemoteReadAdapter};
pub use backend::{BackendError, MetricsBackend, MetricsQueryResponse, MetricsQuerySeries};
pub use datadog::DatadogClient;
pub use error::QueryError;
pub use handler::remote_read_router;
