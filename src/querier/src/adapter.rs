//! Remote read orchestration
//!
//! A read request is served in three steps:
//!
//! 1. Every query is translated into a backend query. Any translation error
//!    aborts the request before the backend is contacted.
//! 2. The backend queries run concurrently, bounded by `query_concurrency`.
//!    Results are collected in query order, not completion order.
//! 3. The results are folded into one request-scoped series map, in query
//!    order, so the first query wins on a timestamp collision.

use std::collections::BTreeMap;
use std::sync::Arc;

use common::config::{Configuration, SeriesIdentity};
use common::prompb::{Label, QueryResult, ReadRequest, ReadResponse, TimeSeries};
use futures::{StreamExt, TryStreamExt, stream};

use crate::backend::{BackendError, MetricsBackend, MetricsQueryResponse};
use crate::error::QueryError;
use crate::query::{BackendQuery, MetricNameMappings, SeriesMap, build_query, merge_result};

/// Default number of backend queries in flight per read request
pub const DEFAULT_QUERY_CONCURRENCY: usize = 4;

/// Labels dropped from queries and labels added to results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelPolicy {
    /// Matchers on these labels never reach the backend
    pub ignore_labels: Vec<String>,
    /// Added to every returned series unless the series already has the label
    pub add_labels: BTreeMap<String, String>,
}

impl LabelPolicy {
    pub fn from_config(config: &Configuration) -> Self {
        Self {
            ignore_labels: config.ignore_labels.clone(),
            add_labels: config.add_labels.clone(),
        }
    }

    fn apply(&self, series: &mut TimeSeries) {
        for (name, value) in &self.add_labels {
            if !series.labels.iter().any(|label| label.name == *name) {
                series.labels.push(Label::new(name.as_str(), value.as_str()));
            }
        }
        series.labels.sort_by(|a, b| a.name.cmp(&b.name));
    }
}

/// Serves remote read requests from a metrics backend
#[derive(Clone)]
pub struct RemoteReadAdapter {
    backend: Arc<dyn MetricsBackend>,
    mappings: Arc<MetricNameMappings>,
    label_policy: LabelPolicy,
    series_identity: SeriesIdentity,
    query_concurrency: usize,
}

impl RemoteReadAdapter {
    pub fn new(backend: Arc<dyn MetricsBackend>, mappings: Arc<MetricNameMappings>) -> Self {
        Self {
            backend,
            mappings,
            label_policy: LabelPolicy::default(),
            series_identity: SeriesIdentity::default(),
            query_concurrency: DEFAULT_QUERY_CONCURRENCY,
        }
    }

    /// Adapter wired with the mapping table and policies of `config`
    pub fn from_config(backend: Arc<dyn MetricsBackend>, config: &Configuration) -> Self {
        let mappings = MetricNameMappings::new(config.mappings.clone());

        Self::new(backend, Arc::new(mappings))
            .with_label_policy(LabelPolicy::from_config(config))
            .with_series_identity(config.series_identity)
            .with_query_concurrency(config.query_concurrency)
    }

    pub fn with_label_policy(mut self, label_policy: LabelPolicy) -> Self {
        self.label_policy = label_policy;
        self
    }

    pub fn with_series_identity(mut self, series_identity: SeriesIdentity) -> Self {
        self.series_identity = series_identity;
        self
    }

    /// Values below one are raised to one
    pub fn with_query_concurrency(mut self, query_concurrency: usize) -> Self {
        self.query_concurrency = query_concurrency.max(1);
        self
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Answer a remote read request with a single merged query result
    pub async fn read(&self, request: &ReadRequest) -> Result<ReadResponse, QueryError> {
        let queries = request
            .queries
            .iter()
            .map(|query| {
                build_query(
                    self.mappings.as_ref(),
                    query,
                    &self.label_policy.ignore_labels,
                )
            })
            .collect::<Result<Vec<_>, _>>()
            .inspect_err(|e| tracing::warn!(error = %e, "Failed to translate remote read query"))?;

        let query_count = queries.len();
        tracing::debug!(
            query_count,
            concurrency = self.query_concurrency,
            "Translated remote read request"
        );

        let responses: Vec<MetricsQueryResponse> = stream::iter(queries)
            .map(|query| self.execute(query))
            .buffered(self.query_concurrency)
            .try_collect()
            .await?;

        let mut series_map = SeriesMap::new();
        merge_result(&mut series_map, &responses, self.series_identity)?;

        let mut keyed: Vec<(String, TimeSeries)> = series_map.into_iter().collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));

        let timeseries: Vec<TimeSeries> = keyed
            .into_iter()
            .map(|(_, mut series)| {
                self.label_policy.apply(&mut series);
                series
            })
            .collect();

        tracing::info!(
            query_count,
            series_count = timeseries.len(),
            "Completed remote read request"
        );

        Ok(ReadResponse {
            results: vec![QueryResult { timeseries }],
        })
    }

    async fn execute(&self, query: BackendQuery) -> Result<MetricsQueryResponse, QueryError> {
        tracing::debug!(
            backend = self.backend.name(),
            query = %query.query,
            from = query.from,
            to = query.to,
            "Executing backend query"
        );

        let result = self
            .backend
            .query_metrics(&query.query, query.from, query.to)
            .await
            .and_then(check_response);

        match result {
            Ok(response) => {
                tracing::debug!(
                    query = %query.query,
                    series_count = response.series.len(),
                    "Backend query returned"
                );
                Ok(response)
            }
            Err(e) => {
                tracing::error!(error = ?e, query = %query.query, "Backend query failed");
                Err(QueryError::Backend {
                    query: query.query,
                    source: e,
                })
            }
        }
    }
}

/// Reject responses that arrived with a success status but carry an error
fn check_response(response: MetricsQueryResponse) -> Result<MetricsQueryResponse, BackendError> {
    if let Some(message) = response.error.as_deref().filter(|m| !m.is_empty()) {
        return Err(BackendError::Api {
            status: 200,
            message: message.to_string(),
        });
    }
    if response.status.as_deref() == Some("error") {
        return Err(BackendError::Api {
            status: 200,
            message: "query returned status 'error'".to_string(),
        });
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use common::prompb::{LabelMatcher, METRIC_NAME_LABEL, Query, ReadHints, Sample};

    use super::*;
    use crate::backend::MetricsQuerySeries;

    #[derive(Default)]
    struct FakeBackend {
        responses: HashMap<String, MetricsQueryResponse>,
        delays: HashMap<String, Duration>,
        calls: Mutex<Vec<(String, i64, i64)>>,
    }

    impl FakeBackend {
        fn respond(mut self, query: &str, response: MetricsQueryResponse) -> Self {
            self.responses.insert(query.to_string(), response);
            self
        }

        fn delay(mut self, query: &str, delay: Duration) -> Self {
            self.delays.insert(query.to_string(), delay);
            self
        }

        fn calls(&self) -> Vec<(String, i64, i64)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MetricsBackend for FakeBackend {
        async fn query_metrics(
            &self,
            query: &str,
            from: i64,
            to: i64,
        ) -> Result<MetricsQueryResponse, BackendError> {
            self.calls
                .lock()
                .unwrap()
                .push((query.to_string(), from, to));

            if let Some(delay) = self.delays.get(query) {
                tokio::time::sleep(*delay).await;
            }

            self.responses
                .get(query)
                .cloned()
                .ok_or_else(|| BackendError::Api {
                    status: 400,
                    message: format!("unexpected query {query}"),
                })
        }

        fn name(&self) -> &'static str {
            "fake"
        }
    }

    fn mappings() -> Arc<MetricNameMappings> {
        Arc::new(
            [(
                "kube_pod_container_resource_requests",
                "kubernetes_state.container.memory_requested",
            )]
            .into_iter()
            .collect(),
        )
    }

    fn query(matchers: Vec<LabelMatcher>) -> Query {
        Query {
            start_timestamp_ms: 1_600_000_000_000,
            end_timestamp_ms: 1_600_003_600_000,
            matchers,
            hints: None,
        }
    }

    fn request(queries: Vec<Query>) -> ReadRequest {
        ReadRequest {
            queries,
            accepted_response_types: vec![],
        }
    }

    fn adapter(backend: Arc<FakeBackend>) -> RemoteReadAdapter {
        RemoteReadAdapter::new(backend, mappings())
    }

    #[tokio::test]
    async fn test_read_translates_and_merges() {
        let backend = Arc::new(FakeBackend::default().respond(
            "kubernetes_state.container.memory_requested{host:node1,!env:prod}",
            MetricsQueryResponse::from_series(vec![MetricsQuerySeries::new(
                "kubernetes_state.container.memory_requested",
                &[(1600000000.0, 1.0), (1600000010.0, 2.0)],
            )]),
        ));

        let response = adapter(backend.clone())
            .read(&request(vec![query(vec![
                LabelMatcher::equal(METRIC_NAME_LABEL, "kube_pod_container_resource_requests"),
                LabelMatcher::equal("host", "node1"),
                LabelMatcher::not_equal("env", "prod"),
            ])]))
            .await
            .unwrap();

        assert_eq!(
            backend.calls(),
            vec![(
                "kubernetes_state.container.memory_requested{host:node1,!env:prod}".to_string(),
                1_600_000_000,
                1_600_003_600,
            )]
        );

        assert_eq!(response.results.len(), 1);
        let timeseries = &response.results[0].timeseries;
        assert_eq!(timeseries.len(), 1);
        assert!(timeseries[0].labels.is_empty());
        assert_eq!(
            timeseries[0].samples,
            vec![Sample::new(1600000000, 1.0), Sample::new(1600000010, 2.0)]
        );
    }

    #[tokio::test]
    async fn test_translation_error_skips_backend() {
        let backend = Arc::new(FakeBackend::default().respond(
            "system.cpu.idle{*}",
            MetricsQueryResponse::from_series(vec![]),
        ));

        let result = adapter(backend.clone())
            .read(&request(vec![
                query(vec![LabelMatcher::equal(METRIC_NAME_LABEL, "system_cpu_idle")]),
                query(vec![LabelMatcher::regex_match(METRIC_NAME_LABEL, "kube_.*")]),
            ]))
            .await;

        assert!(matches!(result, Err(QueryError::UnsupportedNameMatch(_))));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_name_matcher_aborts() {
        let backend = Arc::new(FakeBackend::default());

        let result = adapter(backend.clone())
            .read(&request(vec![query(vec![LabelMatcher::equal("host", "a")])]))
            .await;

        assert!(matches!(result, Err(QueryError::MissingNameMatcher)));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_backend_failure_aborts_request() {
        let backend = Arc::new(FakeBackend::default());

        let result = adapter(backend)
            .read(&request(vec![query(vec![LabelMatcher::equal(
                METRIC_NAME_LABEL,
                "system_cpu_idle",
            )])]))
            .await;

        match result {
            Err(QueryError::Backend { query, .. }) => assert_eq!(query, "system.cpu.idle{*}"),
            other => panic!("expected Backend error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_payload_is_a_backend_failure() {
        let backend = Arc::new(FakeBackend::default().respond(
            "system.cpu.idle{*}",
            MetricsQueryResponse {
                status: Some("error".to_string()),
                error: Some("Rate limit exceeded".to_string()),
                series: vec![],
            },
        ));

        let result = adapter(backend)
            .read(&request(vec![query(vec![LabelMatcher::equal(
                METRIC_NAME_LABEL,
                "system_cpu_idle",
            )])]))
            .await;

        match result {
            Err(QueryError::Backend {
                source: BackendError::Api { message, .. },
                ..
            }) => assert_eq!(message, "Rate limit exceeded"),
            other => panic!("expected Backend API error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_first_query_wins_regardless_of_completion_order() {
        let backend = Arc::new(
            FakeBackend::default()
                .respond(
                    "system.load.1{host:a}",
                    MetricsQueryResponse::from_series(vec![MetricsQuerySeries::new(
                        "system.load.1",
                        &[(10.0, 1.0), (20.0, 1.0)],
                    )]),
                )
                .delay("system.load.1{host:a}", Duration::from_millis(50))
                .respond(
                    "system.load.1{host:b}",
                    MetricsQueryResponse::from_series(vec![MetricsQuerySeries::new(
                        "system.load.1",
                        &[(20.0, 2.0), (30.0, 2.0)],
                    )]),
                ),
        );

        let response = adapter(backend)
            .with_query_concurrency(2)
            .read(&request(vec![
                query(vec![
                    LabelMatcher::equal(METRIC_NAME_LABEL, "system_load_1"),
                    LabelMatcher::equal("host", "a"),
                ]),
                query(vec![
                    LabelMatcher::equal(METRIC_NAME_LABEL, "system_load_1"),
                    LabelMatcher::equal("host", "b"),
                ]),
            ]))
            .await
            .unwrap();

        let timeseries = &response.results[0].timeseries;
        assert_eq!(timeseries.len(), 1);
        assert_eq!(
            timeseries[0].samples,
            vec![Sample::new(10, 1.0), Sample::new(20, 1.0), Sample::new(30, 2.0)]
        );
    }

    #[tokio::test]
    async fn test_label_policy() {
        let backend = Arc::new(FakeBackend::default().respond(
            "kubernetes_state.container.memory_requested{namespace:default}",
            MetricsQueryResponse::from_series(vec![
                MetricsQuerySeries::new("requested", &[(10.0, 1.0)])
                    .with_tags(&["clustername:prod", "namespace:default"]),
            ]),
        ));

        let policy = LabelPolicy {
            ignore_labels: vec!["resource".to_string(), "unit".to_string()],
            add_labels: BTreeMap::from([
                ("clustername".to_string(), "thebest".to_string()),
                ("region".to_string(), "eu".to_string()),
            ]),
        };

        let response = adapter(backend.clone())
            .with_label_policy(policy)
            .with_series_identity(SeriesIdentity::TagSet)
            .read(&request(vec![query(vec![
                LabelMatcher::equal(METRIC_NAME_LABEL, "kube_pod_container_resource_requests"),
                LabelMatcher::equal("resource", "memory"),
                LabelMatcher::equal("unit", "byte"),
                LabelMatcher::equal("namespace", "default"),
            ])]))
            .await
            .unwrap();

        assert_eq!(backend.calls().len(), 1);

        let labels = &response.results[0].timeseries[0].labels;
        assert_eq!(
            labels,
            &vec![
                Label::new("clustername", "prod"),
                Label::new("namespace", "default"),
                Label::new("region", "eu"),
            ]
        );
    }

    #[tokio::test]
    async fn test_sum_hint_reaches_backend() {
        let backend = Arc::new(FakeBackend::default().respond(
            "sum:system.cpu.idle{*}",
            MetricsQueryResponse::from_series(vec![]),
        ));

        let mut q = query(vec![LabelMatcher::equal(METRIC_NAME_LABEL, "system_cpu_idle")]);
        q.hints = Some(ReadHints {
            func: "sum".to_string(),
            ..Default::default()
        });

        let response = adapter(backend.clone()).read(&request(vec![q])).await.unwrap();

        assert_eq!(backend.calls()[0].0, "sum:system.cpu.idle{*}");
        assert!(response.results[0].timeseries.is_empty());
    }

    // Handlers require the read future to be Send for any borrow of the request
    fn read_future<'a>(
        adapter: &'a RemoteReadAdapter,
        request: &'a ReadRequest,
    ) -> impl std::future::Future<Output = Result<ReadResponse, QueryError>> + Send + 'a {
        adapter.read(request)
    }

    #[tokio::test]
    async fn test_read_future_is_send() {
        let backend = Arc::new(FakeBackend::default().respond(
            "system.cpu.idle{*}",
            MetricsQueryResponse::from_series(vec![MetricsQuerySeries::new(
                "system.cpu.idle",
                &[(10.0, 1.0)],
            )]),
        ));
        let adapter = adapter(backend);
        let request = request(vec![query(vec![LabelMatcher::equal(
            METRIC_NAME_LABEL,
            "system_cpu_idle",
        )])]);

        let response = tokio::spawn({
            let adapter = adapter.clone();
            async move { read_future(&adapter, &request).await }
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(
            response.results[0].timeseries[0].samples,
            vec![Sample::new(10, 1.0)]
        );
    }

    #[tokio::test]
    async fn test_empty_request() {
        let backend = Arc::new(FakeBackend::default());

        let response = adapter(backend.clone()).read(&request(vec![])).await.unwrap();

        assert_eq!(response.results.len(), 1);
        assert!(response.results[0].timeseries.is_empty());
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_from_config() {
        let backend = Arc::new(FakeBackend::default());
        let mut config = Configuration::default();
        config.query_concurrency = 0;

        let adapter = RemoteReadAdapter::from_config(backend, &config);

        assert_eq!(adapter.query_concurrency, 1);
        assert_eq!(adapter.mappings.len(), config.mappings.len());
        assert_eq!(adapter.label_policy, LabelPolicy::from_config(&config));
        assert_eq!(adapter.backend_name(), "fake");
    }
}
