pub mod builder;
pub mod merge;
pub mod name_mapper;
pub mod translator;

pub use builder::{BackendQuery, build_query, millis_to_seconds};
pub use merge::{SeriesMap, merge_result, merge_samples, values_to_samples};
pub use name_mapper::{MetricNameMappings, NameLookup, map_metric_name};
pub use translator::{TranslatedMatchers, translate_matcher, translate_matchers};
