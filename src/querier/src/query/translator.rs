//! Label matcher to Datadog tag filter translation
//!
//! A remote-read query selects series with Prometheus label matchers, e.g.
//! `kube_pod_info{host="node1",env!="prod"}`. Datadog selects the same series
//! with a metric name and a tag filter: `kube.pod.info{host:node1,!env:prod}`.
//!
//! | Prometheus        | Datadog         |
//! |-------------------|-----------------|
//! | `name="value"`    | `name:value`    |
//! | `name!="value"`   | `!name:value`   |
//! | `name=~"pattern"` | `name:pattern`  |
//! | `name!~"pattern"` | `!name:pattern` |
//!
//! Datadog tag filters do not accept quote characters, so every `"` and `'`
//! is removed from the final filter.

use common::prompb::{LabelMatcher, METRIC_NAME_LABEL, label_matcher::Type};

use super::name_mapper::{NameLookup, map_metric_name};
use crate::error::QueryError;

/// Filter used when no label constrains the query
pub const MATCH_ALL_FILTER: &str = "*";

/// Output of [`translate_matchers`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedMatchers {
    /// Backend metric name; `None` when the query had no name matcher
    pub metric: Option<String>,
    /// Comma separated tag filter, or `*`
    pub filter: String,
}

/// Translate all matchers of one query
///
/// The `__name__` matcher must use equality and resolves the backend metric
/// name. Matchers on labels listed in `ignore_labels` are dropped.
pub fn translate_matchers(
    lookup: &impl NameLookup,
    matchers: &[LabelMatcher],
    ignore_labels: &[String],
) -> Result<TranslatedMatchers, QueryError> {
    let mut metric = None;
    let mut clauses = Vec::with_capacity(matchers.len());

    for matcher in matchers {
        if matcher.name == METRIC_NAME_LABEL {
            if matcher.r#type != Type::Eq as i32 {
                return Err(QueryError::UnsupportedNameMatch(match_op_symbol(
                    matcher.r#type,
                )));
            }
            metric = Some(map_metric_name(lookup, &matcher.value));
            continue;
        }

        if ignore_labels.iter().any(|label| *label == matcher.name) {
            tracing::debug!(label = %matcher.name, "Dropping matcher on ignored label");
            continue;
        }

        clauses.push(translate_matcher(matcher)?);
    }

    let filter = strip_quotes(&clauses.join(","));
    let filter = if filter.is_empty() {
        MATCH_ALL_FILTER.to_string()
    } else {
        filter
    };

    Ok(TranslatedMatchers { metric, filter })
}

/// Translate one non-name matcher into a tag filter clause
pub fn translate_matcher(matcher: &LabelMatcher) -> Result<String, QueryError> {
    let name = &matcher.name;
    let value = &matcher.value;

    match Type::try_from(matcher.r#type) {
        Ok(Type::Eq) => Ok(format!("{name}:'{value}'")),
        Ok(Type::Neq) => Ok(format!("!{name}:'{value}'")),
        Ok(Type::Re) => Ok(format!("{name}:{value}")),
        Ok(Type::Nre) => Ok(format!("!{name}:{value}")),
        Err(_) => Err(QueryError::UnknownMatchType(matcher.r#type)),
    }
}

fn strip_quotes(filter: &str) -> String {
    filter.chars().filter(|c| !matches!(c, '"' | '\'')).collect()
}

/// PromQL operator for a wire match type
fn match_op_symbol(kind: i32) -> String {
    match Type::try_from(kind) {
        Ok(Type::Eq) => "=".to_string(),
        Ok(Type::Neq) => "!=".to_string(),
        Ok(Type::Re) => "=~".to_string(),
        Ok(Type::Nre) => "!~".to_string(),
        Err(_) => format!("match type {kind}"),
    }
}
