//! Protobuf wire format types for the Prometheus remote_read protocol
//!
//! These prost-derived types match the Prometheus remote read protobuf
//! specification (`prompb/remote.proto` and `prompb/types.proto`). Only the
//! `SAMPLES` response type is modelled; streamed chunked responses are not.
//!
//! Reference: https://github.com/prometheus/prometheus/blob/main/prompb/remote.proto

use prost::Message;

/// Reserved label carrying the metric name
pub const METRIC_NAME_LABEL: &str = "__name__";

/// Content type for remote_read requests and responses
pub const PROTOBUF_CONTENT_TYPE: &str = "application/x-protobuf";

/// Content encoding for remote_read bodies (snappy block format)
pub const SNAPPY_CONTENT_ENCODING: &str = "snappy";

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Snappy decompression failed: {0}")]
    Snappy(#[from] snap::Error),
    #[error("Protobuf decode failed: {0}")]
    Decode(#[from] prost::DecodeError),
}

/// Prometheus ReadRequest - the top-level message in remote_read protocol
#[derive(Clone, PartialEq, Message)]
pub struct ReadRequest {
    #[prost(message, repeated, tag = "1")]
    pub queries: Vec<Query>,
    #[prost(enumeration = "read_request::ResponseType", repeated, tag = "2")]
    pub accepted_response_types: Vec<i32>,
}

pub mod read_request {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
    #[repr(i32)]
    pub enum ResponseType {
        Samples = 0,
        StreamedXorChunks = 1,
    }
}

/// ReadResponse holds one result per query, in request order
#[derive(Clone, PartialEq, Message)]
pub struct ReadResponse {
    #[prost(message, repeated, tag = "1")]
    pub results: Vec<QueryResult>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Query {
    #[prost(int64, tag = "1")]
    pub start_timestamp_ms: i64,
    #[prost(int64, tag = "2")]
    pub end_timestamp_ms: i64,
    #[prost(message, repeated, tag = "3")]
    pub matchers: Vec<LabelMatcher>,
    #[prost(message, optional, tag = "4")]
    pub hints: Option<ReadHints>,
}

impl Query {
    /// Aggregation function hinted by the caller, if any
    pub fn hint_func(&self) -> Option<&str> {
        self.hints
            .as_ref()
            .map(|h| h.func.as_str())
            .filter(|f| !f.is_empty())
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct QueryResult {
    #[prost(message, repeated, tag = "1")]
    pub timeseries: Vec<TimeSeries>,
}

/// A single time series with labels and samples
#[derive(Clone, PartialEq, Message)]
pub struct TimeSeries {
    #[prost(message, repeated, tag = "1")]
    pub labels: Vec<Label>,
    #[prost(message, repeated, tag = "2")]
    pub samples: Vec<Sample>,
}

/// A label key-value pair
#[derive(Clone, PartialEq, Eq, Message)]
pub struct Label {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub value: String,
}

impl Label {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A sample value with timestamp
#[derive(Clone, PartialEq, Message)]
pub struct Sample {
    #[prost(double, tag = "1")]
    pub value: f64,
    #[prost(int64, tag = "2")]
    pub timestamp: i64,
}

impl Sample {
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self { value, timestamp }
    }
}

/// Matcher specifies a rule which can match or set of labels or not
#[derive(Clone, PartialEq, Eq, Message)]
pub struct LabelMatcher {
    #[prost(enumeration = "label_matcher::Type", tag = "1")]
    pub r#type: i32,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, tag = "3")]
    pub value: String,
}

pub mod label_matcher {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
    #[repr(i32)]
    pub enum Type {
        Eq = 0,
        Neq = 1,
        Re = 2,
        Nre = 3,
    }
}

impl LabelMatcher {
    pub fn new(kind: label_matcher::Type, name: &str, value: &str) -> Self {
        Self {
            r#type: kind as i32,
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    pub fn equal(name: &str, value: &str) -> Self {
        Self::new(label_matcher::Type::Eq, name, value)
    }

    pub fn not_equal(name: &str, value: &str) -> Self {
        Self::new(label_matcher::Type::Neq, name, value)
    }

    pub fn regex_match(name: &str, pattern: &str) -> Self {
        Self::new(label_matcher::Type::Re, name, pattern)
    }

    pub fn regex_not_match(name: &str, pattern: &str) -> Self {
        Self::new(label_matcher::Type::Nre, name, pattern)
    }
}

/// Hints passed down by PromQL evaluation
#[derive(Clone, PartialEq, Message)]
pub struct ReadHints {
    #[prost(int64, tag = "1")]
    pub step_ms: i64,
    #[prost(string, tag = "2")]
    pub func: String,
    #[prost(int64, tag = "3")]
    pub start_ms: i64,
    #[prost(int64, tag = "4")]
    pub end_ms: i64,
    #[prost(string, repeated, tag = "5")]
    pub grouping: Vec<String>,
    #[prost(bool, tag = "6")]
    pub by: bool,
    #[prost(int64, tag = "7")]
    pub range_ms: i64,
}

/// Decode a snappy-compressed remote_read request body
pub fn decode_read_request(data: &[u8]) -> Result<ReadRequest, CodecError> {
    let decompressed = snap::raw::Decoder::new().decompress_vec(data)?;
    Ok(ReadRequest::decode(decompressed.as_slice())?)
}

/// Encode a remote_read response body (protobuf, then snappy)
pub fn encode_read_response(response: &ReadResponse) -> Result<Vec<u8>, CodecError> {
    Ok(snap::raw::Encoder::new().compress_vec(&response.encode_to_vec())?)
}

/// Encode a remote_read request body, as a Prometheus server would send it
pub fn encode_read_request(request: &ReadRequest) -> Result<Vec<u8>, CodecError> {
    Ok(snap::raw::Encoder::new().compress_vec(&request.encode_to_vec())?)
}

/// Decode a snappy-compressed remote_read response body
pub fn decode_read_response(data: &[u8]) -> Result<ReadResponse, CodecError> {
    let decompressed = snap::raw::Decoder::new().decompress_vec(data)?;
    Ok(ReadResponse::decode(decompressed.as_slice())?)
}
