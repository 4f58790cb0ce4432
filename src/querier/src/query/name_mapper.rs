//! Canonical to backend metric name mapping

use std::collections::HashMap;

/// Read-only lookup of explicit metric name mappings
pub trait NameLookup {
    fn lookup(&self, canonical: &str) -> Option<&str>;
}

impl NameLookup for HashMap<String, String> {
    fn lookup(&self, canonical: &str) -> Option<&str> {
        self.get(canonical).map(String::as_str)
    }
}

/// Mapping table built once at startup and shared between requests
#[derive(Debug, Clone, Default)]
pub struct MetricNameMappings {
    mappings: HashMap<String, String>,
}

impl MetricNameMappings {
    pub fn new(mappings: HashMap<String, String>) -> Self {
        Self { mappings }
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

impl NameLookup for MetricNameMappings {
    fn lookup(&self, canonical: &str) -> Option<&str> {
        self.mappings.lookup(canonical)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MetricNameMappings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Map a canonical metric name to the backend's name
///
/// Explicit mappings win; anything else is converted to the backend's
/// dot-separated convention (`kube_pod_cpu_usage` → `kube.pod.cpu.usage`).
/// The result is not checked against the backend.
pub fn map_metric_name(lookup: &impl NameLookup, canonical: &str) -> String {
    match lookup.lookup(canonical) {
        Some(mapped) => mapped.to_string(),
        None => canonical.replace('_', "."),
    }
}
