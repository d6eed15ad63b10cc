//! Metrics for monitoring the routing layer.
//!
//! Routing is an optimization, so its failure mode is silent: requests keep
//! succeeding while landing on non-owning nodes. These metrics make that
//! visible:
//! - Counters for routed and unrouted requests, errors and refreshes
//! - Gauges for the current partition count and table version
//!
//! # Example
//!
//! ```rust
//! use affinity_client::metrics::RoutingMetrics;
//!
//! let metrics = RoutingMetrics::new();
//! metrics.record_request(true);
//! metrics.record_request(false);
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.requests_total, 2);
//! assert_eq!(snapshot.affinity_hit_rate(), 0.5);
//! ```

mod counters;
mod gauges;

pub use counters::{Counter, LabeledCounter};
pub use gauges::Gauge;

use crate::error::Error;
use crate::partitioning::PartitionSnapshot;

/// Metrics for affinity routing and cache operations.
#[derive(Debug)]
pub struct RoutingMetrics {
    /// Total keyed requests dispatched.
    pub requests_total: Counter,
    /// Requests sent with a non-empty endpoint list.
    pub requests_routed: Counter,
    /// Requests whose partition had no endpoints.
    pub requests_unrouted: Counter,
    /// Partition refresh attempts.
    pub refresh_total: Counter,
    /// Failed partition refreshes.
    pub refresh_failures: Counter,
    /// Errors by kind.
    pub errors: LabeledCounter,

    /// Partition count of the current table.
    pub partition_count: Gauge,
    /// Version of the current table.
    pub table_version: Gauge,
}

impl RoutingMetrics {
    /// Create a new metrics instance.
    pub fn new() -> Self {
        Self {
            requests_total: Counter::new("affinity_requests_total", "Total keyed requests"),
            requests_routed: Counter::new(
                "affinity_requests_routed",
                "Requests sent to the partition owner",
            ),
            requests_unrouted: Counter::new(
                "affinity_requests_unrouted",
                "Requests for partitions without known owners",
            ),
            refresh_total: Counter::new("affinity_refresh_total", "Partition map refreshes"),
            refresh_failures: Counter::new(
                "affinity_refresh_failures",
                "Failed partition map refreshes",
            ),
            errors: LabeledCounter::new("affinity_errors_total", "Errors by kind", "kind"),
            partition_count: Gauge::new("affinity_partition_count", "Partitions in current table"),
            table_version: Gauge::new("affinity_table_version", "Current partition table version"),
        }
    }

    /// Record a dispatched keyed request.
    pub fn record_request(&self, routed: bool) {
        self.requests_total.inc();
        if routed {
            self.requests_routed.inc();
        } else {
            self.requests_unrouted.inc();
        }
    }

    /// Record a refresh attempt.
    pub fn record_refresh(&self, success: bool) {
        self.refresh_total.inc();
        if !success {
            self.refresh_failures.inc();
        }
    }

    /// Record a published partition table.
    pub fn record_table(&self, snapshot: &PartitionSnapshot) {
        self.partition_count.set(snapshot.partition_count() as i64);
        self.table_version.set(snapshot.version() as i64);
    }

    /// Record an error returned to a caller.
    pub fn record_error(&self, error: &Error) {
        self.errors.inc(error.kind());
    }

    /// Get a point-in-time snapshot.
    pub fn snapshot(&self) -> RoutingMetricsSnapshot {
        RoutingMetricsSnapshot {
            requests_total: self.requests_total.get(),
            requests_routed: self.requests_routed.get(),
            requests_unrouted: self.requests_unrouted.get(),
            refresh_total: self.refresh_total.get(),
            refresh_failures: self.refresh_failures.get(),
            errors: self.errors.get_all(),
            partition_count: self.partition_count.get(),
            table_version: self.table_version.get(),
        }
    }

    /// Format metrics in Prometheus exposition format.
    pub fn to_prometheus(&self) -> String {
        let mut output = String::new();

        macro_rules! add_metric {
            ($kind:literal, $metric:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $metric.name(),
                    $metric.help(),
                    $metric.name(),
                    $kind,
                    $metric.name(),
                    $metric.get()
                ));
            };
        }

        add_metric!("counter", self.requests_total);
        add_metric!("counter", self.requests_routed);
        add_metric!("counter", self.requests_unrouted);
        add_metric!("counter", self.refresh_total);
        add_metric!("counter", self.refresh_failures);
        add_metric!("gauge", self.partition_count);
        add_metric!("gauge", self.table_version);

        output.push_str(&format!(
            "# HELP {} {}\n# TYPE {} counter\n",
            self.errors.name(),
            self.errors.help(),
            self.errors.name()
        ));
        for (kind, count) in self.errors.get_all() {
            output.push_str(&format!(
                "{}{{{}=\"{}\"}} {}\n",
                self.errors.name(),
                self.errors.label(),
                kind,
                count
            ));
        }

        output
    }
}

impl Default for RoutingMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of routing metrics.
#[derive(Debug, Clone)]
pub struct RoutingMetricsSnapshot {
    pub requests_total: u64,
    pub requests_routed: u64,
    pub requests_unrouted: u64,
    pub refresh_total: u64,
    pub refresh_failures: u64,
    pub errors: Vec<(&'static str, u64)>,
    pub partition_count: i64,
    pub table_version: i64,
}

impl RoutingMetricsSnapshot {
    /// Share of requests sent to a known partition owner.
    pub fn affinity_hit_rate(&self) -> f64 {
        if self.requests_total == 0 {
            0.0
        } else {
            self.requests_routed as f64 / self.requests_total as f64
        }
    }
}
