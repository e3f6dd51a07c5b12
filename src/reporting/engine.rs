//! Aggregations behind the five reports.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Timelike};

use crate::ledger::{LogRecord, LogStore, StorageError};
use crate::reporting::types::{
    ApplicationStatusReport, CriticalEventReport, EndpointUsageReport, ErrorReport,
    ResponseTimeReport, NO_ERRORS_FOUND,
};

/// Computes reports from fresh snapshots of the log store.
#[derive(Clone, Debug)]
pub struct ReportEngine {
    store: Arc<LogStore>,
}

impl ReportEngine {
    pub fn new(store: Arc<LogStore>) -> Self {
        Self { store }
    }

    /// Current contents of the store.
    pub fn snapshot(&self) -> Result<Vec<LogRecord>, StorageError> {
        self.store.load_all()
    }

    /// Every record, or `None` when the log is empty.
    pub fn raw_logs(&self) -> Result<Option<Vec<LogRecord>>, StorageError> {
        let records = self.snapshot()?;
        Ok((!records.is_empty()).then_some(records))
    }

    pub fn error_report(&self) -> Result<Option<ErrorReport>, StorageError> {
        Ok(error_report(&self.snapshot()?))
    }

    pub fn response_time_report(&self) -> Result<Option<ResponseTimeReport>, StorageError> {
        Ok(response_time_report(&self.snapshot()?))
    }

    pub fn endpoint_usage_report(&self) -> Result<Option<EndpointUsageReport>, StorageError> {
        Ok(endpoint_usage_report(&self.snapshot()?))
    }

    pub fn critical_event_report(&self) -> Result<Option<CriticalEventReport>, StorageError> {
        Ok(critical_event_report(&self.snapshot()?))
    }

    pub fn application_status_report(
        &self,
    ) -> Result<Option<ApplicationStatusReport>, StorageError> {
        Ok(application_status_report(&self.snapshot()?))
    }
}

/// Key with the largest value; the first one seen wins a tie.
fn first_max<'a, K: 'a, I>(entries: I) -> Option<&'a K>
where
    I: IntoIterator<Item = (&'a K, u64)>,
{
    let mut best: Option<(&K, u64)> = None;
    for (key, value) in entries {
        match best {
            Some((_, top)) if value <= top => {}
            _ => best = Some((key, value)),
        }
    }
    best.map(|(key, _)| key)
}

/// Key with the smallest value; the first one seen wins a tie.
fn first_min<'a, K: 'a, I>(entries: I) -> Option<&'a K>
where
    I: IntoIterator<Item = (&'a K, u64)>,
{
    let mut best: Option<(&K, u64)> = None;
    for (key, value) in entries {
        match best {
            Some((_, low)) if value >= low => {}
            _ => best = Some((key, value)),
        }
    }
    best.map(|(key, _)| key)
}

fn mean(values: impl ExactSizeIterator<Item = u64>) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    values.map(|v| v as f64).sum::<f64>() / n as f64
}

/// Hour of day as written in an ISO-8601 timestamp.
fn hour_of(timestamp: &str) -> Option<u32> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(timestamp) {
        return Some(instant.hour());
    }
    NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|local| local.hour())
}

pub fn error_report(records: &[LogRecord]) -> Option<ErrorReport> {
    if records.is_empty() {
        return None;
    }

    let mut by_type: BTreeMap<String, u64> = BTreeMap::new();
    let mut by_hour: BTreeMap<u32, u64> = BTreeMap::new();

    for record in records.iter().filter(|r| r.is_error()) {
        let phrase = record
            .error_message
            .clone()
            .unwrap_or_else(|| crate::ledger::record::error_phrase(record.status));
        *by_type.entry(phrase).or_default() += 1;

        match hour_of(&record.timestamp) {
            Some(hour) => *by_hour.entry(hour).or_default() += 1,
            None => tracing::debug!(
                timestamp = %record.timestamp,
                "Skipping unparseable timestamp in peak hour count"
            ),
        }
    }

    let most_frequent_error = first_max(by_type.iter().map(|(k, v)| (k, *v)))
        .cloned()
        .unwrap_or_else(|| NO_ERRORS_FOUND.to_string());
    let peak_hour = first_max(by_hour.iter().map(|(k, v)| (k, *v))).copied();

    Some(ErrorReport {
        total_errors_by_type: by_type,
        most_frequent_error,
        error_peak_hours: by_hour,
        peak_hour,
    })
}

pub fn response_time_report(records: &[LogRecord]) -> Option<ResponseTimeReport> {
    if records.is_empty() {
        return None;
    }

    let mut times: Vec<u64> = records.iter().map(|r| r.response_time_ms).collect();
    times.sort_unstable();
    let n = times.len();

    let mut per_endpoint: BTreeMap<&str, (u128, u64)> = BTreeMap::new();
    for record in records {
        let slot = per_endpoint.entry(record.endpoint.as_str()).or_default();
        slot.0 += u128::from(record.response_time_ms);
        slot.1 += 1;
    }
    let distribution = per_endpoint
        .into_iter()
        .map(|(endpoint, (sum, count))| (endpoint.to_string(), sum as f64 / count as f64))
        .collect();

    Some(ResponseTimeReport {
        min_response_time: times[0],
        max_response_time: times[n - 1],
        average_response_time: mean(times.iter().copied()),
        // Upper middle on even counts, not the average of the two.
        median_response_time: times[n / 2],
        response_time_distribution_by_endpoint: distribution,
        slow_requests: times[(n * 9 / 10).min(n - 1)],
    })
}

pub fn endpoint_usage_report(records: &[LogRecord]) -> Option<EndpointUsageReport> {
    if records.is_empty() {
        return None;
    }

    let mut usage: BTreeMap<String, BTreeMap<String, u64>> = BTreeMap::new();
    for record in records {
        *usage
            .entry(record.endpoint.clone())
            .or_default()
            .entry(record.method.clone())
            .or_default() += 1;
    }

    let totals: Vec<(&String, u64)> = usage
        .iter()
        .map(|(endpoint, methods)| (endpoint, methods.values().sum()))
        .collect();
    let most_used = first_max(totals.iter().copied()).cloned().unwrap_or_default();
    let least_used = first_min(totals.iter().copied()).cloned().unwrap_or_default();

    Some(EndpointUsageReport {
        usage_by_endpoint_and_method: usage,
        most_used_endpoint: most_used,
        least_used_endpoint: least_used,
    })
}

pub fn is_critical(record: &LogRecord) -> bool {
    record.status >= 500 || record.message.to_lowercase().contains("critical")
}

pub fn critical_event_report(records: &[LogRecord]) -> Option<CriticalEventReport> {
    if records.is_empty() {
        return None;
    }

    let critical_events: Vec<LogRecord> = records.iter().filter(|r| is_critical(r)).cloned().collect();
    Some(CriticalEventReport {
        critical_event_count: critical_events.len(),
        critical_events,
    })
}

pub fn application_status_report(records: &[LogRecord]) -> Option<ApplicationStatusReport> {
    if records.is_empty() {
        return None;
    }

    Some(ApplicationStatusReport {
        total_requests: records.len(),
        total_errors: records.iter().filter(|r| r.is_error()).count(),
        average_response_time: mean(records.iter().map(|r| r.response_time_ms)),
    })
}
