//! Folding backend series into remote-read time series

use std::collections::{BTreeMap, HashMap};

use common::config::SeriesIdentity;
use common::prompb::{Label, Sample, TimeSeries};

use crate::backend::{MetricsQueryResponse, MetricsQuerySeries};
use crate::error::QueryError;

/// Output series of one read request, keyed by series identity
pub type SeriesMap = HashMap<String, TimeSeries>;

/// Merge every series of `responses` into `series_map`
///
/// Series with the same identity are merged sample by sample; on a timestamp
/// collision the sample already in the map is kept.
pub fn merge_result(
    series_map: &mut SeriesMap,
    responses: &[MetricsQueryResponse],
    identity: SeriesIdentity,
) -> Result<(), QueryError> {
    for response in responses {
        for series in &response.series {
            let samples = values_to_samples(series.name(), &series.pointlist)?;

            let ts = series_map
                .entry(series_key(series, identity))
                .or_insert_with(|| TimeSeries {
                    labels: series_labels(series, identity),
                    samples: Vec::new(),
                });

            if ts.samples.is_empty() {
                ts.samples = samples;
            } else {
                ts.samples = merge_samples(&ts.samples, &samples);
            }
        }
    }
    Ok(())
}

/// Convert backend `[timestamp, value]` points into samples
///
/// Every point must carry both fields; a missing or null one fails the whole
/// conversion instead of silently dropping data.
pub fn values_to_samples(
    series: &str,
    points: &[Vec<Option<f64>>],
) -> Result<Vec<Sample>, QueryError> {
    points
        .iter()
        .enumerate()
        .map(|(index, point)| match point.as_slice() {
            [Some(timestamp), Some(value)] => Ok(Sample::new(*timestamp as i64, *value)),
            _ => Err(QueryError::MalformedPoint {
                series: series.to_string(),
                index,
            }),
        })
        .collect()
}

/// Merge two lists of samples and remove duplicate timestamps
///
/// Both lists must be sorted by timestamp. When both hold a sample for the
/// same timestamp the one from `a` is kept.
pub fn merge_samples(a: &[Sample], b: &[Sample]) -> Vec<Sample> {
    match (a.first(), a.last(), b.first(), b.last()) {
        (_, Some(a_last), Some(b_first), _) if a_last.timestamp < b_first.timestamp => {
            return [a, b].concat();
        }
        (Some(a_first), _, _, Some(b_last)) if b_last.timestamp < a_first.timestamp => {
            return [b, a].concat();
        }
        _ => {}
    }

    let mut result = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);

    while i < a.len() && j < b.len() {
        match a[i].timestamp.cmp(&b[j].timestamp) {
            std::cmp::Ordering::Less => {
                result.push(a[i].clone());
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                result.push(b[j].clone());
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                result.push(a[i].clone());
                i += 1;
                j += 1;
            }
        }
    }

    result.extend_from_slice(&a[i..]);
    result.extend_from_slice(&b[j..]);
    result
}

fn series_key(series: &MetricsQuerySeries, identity: SeriesIdentity) -> String {
    match identity {
        SeriesIdentity::DisplayName => series.name().to_string(),
        SeriesIdentity::TagSet => {
            let mut tags: Vec<&str> = series.tag_set.iter().map(String::as_str).collect();
            tags.sort_unstable();
            format!("{}{{{}}}", series.name(), tags.join(","))
        }
    }
}

/// Labels for a series; the values of a repeated tag key share one label
fn series_labels(series: &MetricsQuerySeries, identity: SeriesIdentity) -> Vec<Label> {
    match identity {
        SeriesIdentity::DisplayName => Vec::new(),
        SeriesIdentity::TagSet => {
            let mut values: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
            for tag in &series.tag_set {
                let (name, value) = tag.split_once(':').unwrap_or((tag.as_str(), ""));
                let entry = values.entry(name).or_default();
                if !entry.contains(&value) {
                    entry.push(value);
                }
            }

            values
                .into_iter()
                .map(|(name, mut values)| {
                    values.sort_unstable();
                    Label::new(name, values.join(","))
                })
                .collect()
        }
    }
}
