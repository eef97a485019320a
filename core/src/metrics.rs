//! Cache metrics.
//!
//! Recorded through the `metrics` facade; installing an exporter (Prometheus
//! or otherwise) is up to the embedding application. Without a recorder the
//! calls are no-ops.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Duration;

/// Register descriptions for every metric emitted by the repository.
pub fn describe_metrics() {
    describe_counter!(
        "projection_cache_hits_total",
        "Total number of single-record lookups that found a projection"
    );
    describe_counter!(
        "projection_cache_misses_total",
        "Total number of single-record lookups that found nothing"
    );
    describe_counter!(
        "projection_cache_corrupt_records_total",
        "Total number of stored records that failed to decode"
    );
    describe_counter!(
        "projection_cache_drift_total",
        "Total number of indexed IDs found without a primary record"
    );
    describe_counter!(
        "projection_cache_errors_total",
        "Total number of failed repository operations"
    );
    describe_histogram!(
        "projection_cache_operation_duration_seconds",
        "Time taken by repository operations"
    );
}

/// Repository metrics recorder.
pub struct CacheMetrics;

impl CacheMetrics {
    /// Record the outcome of a single-record lookup.
    pub fn record_lookup(hit: bool) {
        if hit {
            counter!("projection_cache_hits_total").increment(1);
        } else {
            counter!("projection_cache_misses_total").increment(1);
        }
    }

    /// Record records that failed to decode.
    pub fn record_corrupt(count: usize) {
        if count > 0 {
            counter!("projection_cache_corrupt_records_total").increment(count as u64);
        }
    }

    /// Record indexed IDs that had no primary record.
    pub fn record_drift(count: usize) {
        if count > 0 {
            counter!("projection_cache_drift_total").increment(count as u64);
        }
    }

    /// Record a failed operation.
    pub fn record_error(operation: &'static str) {
        counter!("projection_cache_errors_total", "operation" => operation).increment(1);
    }

    /// Record how long an operation took.
    pub fn record_duration(operation: &'static str, duration: Duration) {
        histogram!("projection_cache_operation_duration_seconds", "operation" => operation)
            .record(duration.as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        describe_metrics();
        CacheMetrics::record_lookup(true);
        CacheMetrics::record_lookup(false);
        CacheMetrics::record_corrupt(0);
        CacheMetrics::record_drift(3);
        CacheMetrics::record_error("find");
        CacheMetrics::record_duration("find", Duration::from_millis(2));
    }
}
