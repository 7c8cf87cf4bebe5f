//! Metrics collection and export for resource pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Metrics data for a pool
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{Pool, PoolConfiguration, Resource};
/// use std::convert::Infallible;
///
/// struct Handle;
///
/// impl Resource for Handle {
///     type Error = Infallible;
///     fn add(&self) -> Result<Self, Self::Error> {
///         Ok(Handle)
///     }
/// }
///
/// let pool = Pool::initialize(&Handle, PoolConfiguration::new().with_pool_size(3)).unwrap();
/// let handle = pool.acquire().unwrap();
///
/// let metrics = pool.get_metrics();
/// assert_eq!(metrics.total_acquired, 1);
/// assert_eq!(metrics.checked_out, 1);
/// assert_eq!(metrics.available, 2);
/// # pool.release(handle).unwrap();
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolMetrics {
    /// Successful acquires
    pub total_acquired: usize,

    /// Resources put back into the queue by a release
    pub total_released: usize,

    /// Acquires that gave up after the configured timeout
    pub acquire_timeouts: usize,

    /// Lifecycle hook failures of any stage
    pub hook_failures: usize,

    /// Resources dropped by the pool (hook failures, surplus releases)
    pub discarded: usize,

    /// Resources replaced during refresh passes
    pub evictions: usize,

    /// Refresh replacements that failed, leaving the stale resource in place
    pub replacement_failures: usize,

    /// Completed refresh passes
    pub refresh_passes: usize,

    /// Resources currently checked out
    pub checked_out: usize,

    /// Resources currently waiting in the queue
    pub available: usize,

    /// Pool size
    pub capacity: usize,

    /// Checked-out share of the capacity (0.0 to 1.0)
    pub utilization: f64,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_acquired".to_string(), self.total_acquired.to_string());
        metrics.insert("total_released".to_string(), self.total_released.to_string());
        metrics.insert("acquire_timeouts".to_string(), self.acquire_timeouts.to_string());
        metrics.insert("hook_failures".to_string(), self.hook_failures.to_string());
        metrics.insert("discarded".to_string(), self.discarded.to_string());
        metrics.insert("evictions".to_string(), self.evictions.to_string());
        metrics.insert("replacement_failures".to_string(), self.replacement_failures.to_string());
        metrics.insert("refresh_passes".to_string(), self.refresh_passes.to_string());
        metrics.insert("checked_out".to_string(), self.checked_out.to_string());
        metrics.insert("available".to_string(), self.available.to_string());
        metrics.insert("capacity".to_string(), self.capacity.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics
    }
}

/// Metrics exporter for Prometheus format
pub struct MetricsExporter;

impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        let labels = Self::format_labels(pool_name, tags);
        let mut output = String::new();

        let gauges = [
            ("resourcepool_resources_checked_out", "Resources currently checked out", metrics.checked_out),
            ("resourcepool_resources_available", "Resources currently available", metrics.available),
            ("resourcepool_capacity", "Configured pool size", metrics.capacity),
        ];
        for (name, help, value) in gauges {
            Self::write_metric(&mut output, name, help, "gauge", &labels, &value.to_string());
        }
        Self::write_metric(
            &mut output,
            "resourcepool_utilization",
            "Pool utilization ratio",
            "gauge",
            &labels,
            &format!("{:.2}", metrics.utilization),
        );

        let counters = [
            ("resourcepool_acquired_total", "Total successful acquires", metrics.total_acquired),
            ("resourcepool_released_total", "Total resources released back to the pool", metrics.total_released),
            ("resourcepool_acquire_timeouts_total", "Acquires that timed out", metrics.acquire_timeouts),
            ("resourcepool_hook_failures_total", "Lifecycle hook failures", metrics.hook_failures),
            ("resourcepool_discarded_total", "Resources dropped by the pool", metrics.discarded),
            ("resourcepool_evictions_total", "Resources replaced by refresh passes", metrics.evictions),
            ("resourcepool_replacement_failures_total", "Failed replacements during refresh", metrics.replacement_failures),
            ("resourcepool_refresh_passes_total", "Completed refresh passes", metrics.refresh_passes),
        ];
        for (name, help, value) in counters {
            Self::write_metric(&mut output, name, help, "counter", &labels, &value.to_string());
        }

        output
    }

    fn write_metric(output: &mut String, name: &str, help: &str, kind: &str, labels: &str, value: &str) {
        output.push_str(&format!("# HELP {} {}\n", name, help));
        output.push_str(&format!("# TYPE {} {}\n", name, kind));
        output.push_str(&format!("{}{{{}}} {}\n", name, labels, value));
    }

    fn format_labels(pool_name: &str, tags: Option<&HashMap<String, String>>) -> String {
        let mut labels = vec![format!("pool=\"{}\"", pool_name)];

        if let Some(tags) = tags {
            let mut sorted: Vec<_> = tags.iter().collect();
            sorted.sort();
            for (key, value) in sorted {
                labels.push(format!("{}=\"{}\"", key, value));
            }
        }

        labels.join(",")
    }
}

/// Internal metrics tracker
#[derive(Default)]
pub(crate) struct MetricsTracker {
    pub total_acquired: AtomicUsize,
    pub total_released: AtomicUsize,
    pub acquire_timeouts: AtomicUsize,
    pub hook_failures: AtomicUsize,
    pub discarded: AtomicUsize,
    pub evictions: AtomicUsize,
    pub replacement_failures: AtomicUsize,
    pub refresh_passes: AtomicUsize,
    pub checked_out: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_checkout(&self) {
        self.checked_out.fetch_add(1, Ordering::Relaxed);
    }

    /// A checked-out resource left the caller's hands, either back into the
    /// queue or out of the pool entirely.
    pub fn record_checkin(&self) {
        // Saturating so that releasing a resource the pool never handed out
        // cannot wrap the gauge.
        let _ = self
            .checked_out
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| Some(n.saturating_sub(1)));
    }

    pub fn increment(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_metrics(&self, available: usize, capacity: usize) -> PoolMetrics {
        let checked_out = self.checked_out.load(Ordering::Relaxed);
        let utilization = if capacity > 0 {
            checked_out as f64 / capacity as f64
        } else {
            0.0
        };

        PoolMetrics {
            total_acquired: self.total_acquired.load(Ordering::Relaxed),
            total_released: self.total_released.load(Ordering::Relaxed),
            acquire_timeouts: self.acquire_timeouts.load(Ordering::Relaxed),
            hook_failures: self.hook_failures.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            replacement_failures: self.replacement_failures.load(Ordering::Relaxed),
            refresh_passes: self.refresh_passes.load(Ordering::Relaxed),
            checked_out,
            available,
            capacity,
            utilization,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkin_never_underflows() {
        let tracker = MetricsTracker::new();
        tracker.record_checkin();
        tracker.record_checkout();
        tracker.record_checkin();
        tracker.record_checkin();

        let metrics = tracker.get_metrics(4, 4);
        assert_eq!(metrics.checked_out, 0);
        assert_eq!(metrics.utilization, 0.0);
    }

    #[test]
    fn test_prometheus_labels_and_types() {
        let tracker = MetricsTracker::new();
        tracker.record_checkout();
        MetricsTracker::increment(&tracker.evictions);
        let metrics = tracker.get_metrics(1, 2);

        let mut tags = HashMap::new();
        tags.insert("service".to_string(), "db".to_string());
        let output = MetricsExporter::export_prometheus(&metrics, "primary", Some(&tags));

        assert!(output.contains("# TYPE resourcepool_resources_checked_out gauge"));
        assert!(output.contains("resourcepool_resources_checked_out{pool=\"primary\",service=\"db\"} 1"));
        assert!(output.contains("# TYPE resourcepool_evictions_total counter"));
        assert!(output.contains("resourcepool_evictions_total{pool=\"primary\",service=\"db\"} 1"));
        assert!(output.contains("resourcepool_utilization{pool=\"primary\",service=\"db\"} 0.50"));
    }

    #[test]
    fn test_export_map() {
        let metrics = MetricsTracker::new().get_metrics(3, 3);
        let exported = metrics.export();
        assert_eq!(exported["available"], "3");
        assert_eq!(exported["utilization"], "0.00");
        assert_eq!(exported.len(), 12);
    }
}
