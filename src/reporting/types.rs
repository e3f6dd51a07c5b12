//! Report payloads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ledger::LogRecord;

/// Placeholder used when no record has an error status.
pub const NO_ERRORS_FOUND: &str = "No errors found";

/// Error counts by phrase and by hour of day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub total_errors_by_type: BTreeMap<String, u64>,
    pub most_frequent_error: String,
    /// Hour of day (0-23) → error count.
    pub error_peak_hours: BTreeMap<u32, u64>,
    pub peak_hour: Option<u32>,
}

/// Latency distribution over all records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseTimeReport {
    pub min_response_time: u64,
    pub max_response_time: u64,
    pub average_response_time: f64,
    /// Element at `n / 2` of the sorted times.
    pub median_response_time: u64,
    pub response_time_distribution_by_endpoint: BTreeMap<String, f64>,
    /// 90th percentile cutoff: element at `floor(n * 0.9)` of the sorted times.
    pub slow_requests: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointUsageReport {
    /// Endpoint → method → count.
    pub usage_by_endpoint_and_method: BTreeMap<String, BTreeMap<String, u64>>,
    pub most_used_endpoint: String,
    pub least_used_endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriticalEventReport {
    pub critical_events: Vec<LogRecord>,
    pub critical_event_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStatusReport {
    pub total_requests: usize,
    pub total_errors: usize,
    pub average_response_time: f64,
}
