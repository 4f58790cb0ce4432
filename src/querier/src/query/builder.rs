//! Remote-read query to Datadog query string

use common::prompb::Query;

use super::name_mapper::NameLookup;
use super::translator::translate_matchers;
use crate::error::QueryError;

/// The only aggregation hint forwarded to the backend
const SUM_HINT: &str = "sum";

/// A query ready to run against the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendQuery {
    /// Query string, e.g. `sum:system.cpu.idle{host:foo}`
    pub query: String,
    /// Range start in whole seconds
    pub from: i64,
    /// Range end in whole seconds
    pub to: i64,
}

/// Build the backend query for one remote-read query
///
/// Translation errors on any matcher win over a missing name matcher.
pub fn build_query(
    lookup: &impl NameLookup,
    query: &Query,
    ignore_labels: &[String],
) -> Result<BackendQuery, QueryError> {
    let translated = translate_matchers(lookup, &query.matchers, ignore_labels)?;
    let metric = translated.metric.ok_or(QueryError::MissingNameMatcher)?;

    let metric = match query.hint_func() {
        Some(SUM_HINT) => format!("{SUM_HINT}:{metric}"),
        _ => metric,
    };

    Ok(BackendQuery {
        query: format!("{metric}{{{}}}", translated.filter),
        from: millis_to_seconds(query.start_timestamp_ms),
        to: millis_to_seconds(query.end_timestamp_ms),
    })
}

/// Whole seconds at or before `millis`; the backend has no sub-second ranges
pub fn millis_to_seconds(millis: i64) -> i64 {
    millis.div_euclid(1000)
}
