// Private module declaration
mod server;

use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Order workflow outcomes (created, failed by reason) and latency
// - Stock units reserved
// - Status updates by target status
// - Storage connection retries
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

/// Metrics registry for one running application
pub struct Metrics {
    registry: Registry,

    // Order Workflow Metrics
    pub orders_created: IntCounter,
    pub order_failures: IntCounterVec,
    pub workflow_duration: HistogramVec,
    pub stock_units_reserved: IntCounter,
    pub status_updates: IntCounterVec,

    // Retry Metrics
    pub retry_attempts_total: IntCounterVec,
    pub retry_outcomes: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // Order Workflow Metrics
        let orders_created = IntCounter::new("orders_created_total", "Total orders committed")?;
        registry.register(Box::new(orders_created.clone()))?;

        let order_failures = IntCounterVec::new(
            Opts::new("order_failures_total", "Order workflow invocations that failed"),
            &["reason"],
        )?;
        registry.register(Box::new(order_failures.clone()))?;

        let workflow_duration = HistogramVec::new(
            HistogramOpts::new("order_workflow_duration_seconds", "Order workflow duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["operation"],
        )?;
        registry.register(Box::new(workflow_duration.clone()))?;

        let stock_units_reserved = IntCounter::new(
            "stock_units_reserved_total",
            "Product units decremented by committed orders",
        )?;
        registry.register(Box::new(stock_units_reserved.clone()))?;

        let status_updates = IntCounterVec::new(
            Opts::new("order_status_updates_total", "Committed order status changes"),
            &["status"],
        )?;
        registry.register(Box::new(status_updates.clone()))?;

        // Retry Metrics
        let retry_attempts_total = IntCounterVec::new(
            Opts::new("retry_attempts_total", "Total retry attempts"),
            &["operation", "attempt"],
        )?;
        registry.register(Box::new(retry_attempts_total.clone()))?;

        let retry_outcomes = IntCounterVec::new(
            Opts::new("retry_outcomes_total", "Outcomes of retried operations"),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(retry_outcomes.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            order_failures,
            workflow_duration,
            stock_units_reserved,
            status_updates,
            retry_attempts_total,
            retry_outcomes,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Helper to record a committed order
    pub fn record_order_created(&self, units_reserved: u64, duration_secs: f64) {
        self.orders_created.inc();
        self.stock_units_reserved.inc_by(units_reserved);
        self.workflow_duration.with_label_values(&["create_order"]).observe(duration_secs);
    }

    /// Helper to record a failed workflow invocation
    pub fn record_order_failure(&self, operation: &str, reason: &str, duration_secs: f64) {
        self.order_failures.with_label_values(&[reason]).inc();
        self.workflow_duration.with_label_values(&[operation]).observe(duration_secs);
    }

    /// Helper to record a committed status change
    pub fn record_status_update(&self, status: &str, duration_secs: f64) {
        self.status_updates.with_label_values(&[status]).inc();
        self.workflow_duration.with_label_values(&["update_status"]).observe(duration_secs);
    }

    /// Helper to record retry attempt
    pub fn record_retry_attempt(&self, operation: &str, attempt: u32) {
        self.retry_attempts_total.with_label_values(&[operation, &attempt.to_string()]).inc();
    }

    /// Helper to record retry outcome
    pub fn record_retry_outcome(&self, operation: &str, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.retry_outcomes.with_label_values(&[operation, outcome]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter_value(metrics: &Metrics, name: &str) -> Option<f64> {
        metrics
            .registry
            .gather()
            .iter()
            .find(|m| m.name() == name)
            .and_then(|m| m.metric.first().and_then(|v| v.counter.value))
    }

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        // Vec metrics only appear once a label set is used.
        assert!(metrics.registry.gather().len() >= 2);
    }

    #[test]
    fn test_record_order_created() {
        let metrics = Metrics::new().unwrap();
        metrics.record_order_created(3, 0.01);
        metrics.record_order_created(2, 0.02);

        assert_eq!(counter_value(&metrics, "orders_created_total"), Some(2.0));
        assert_eq!(counter_value(&metrics, "stock_units_reserved_total"), Some(5.0));
    }

    #[test]
    fn test_record_order_failure_by_reason() {
        let metrics = Metrics::new().unwrap();
        metrics.record_order_failure("create_order", "insufficient_stock", 0.001);
        metrics.record_order_failure("create_order", "empty_order", 0.001);

        let gathered = metrics.registry.gather();
        let failures = gathered.iter().find(|m| m.name() == "order_failures_total").unwrap();
        assert_eq!(failures.metric.len(), 2);
    }

    #[test]
    fn test_record_retry() {
        let metrics = Metrics::new().unwrap();
        metrics.record_retry_attempt("db_connect", 1);
        metrics.record_retry_attempt("db_connect", 2);
        metrics.record_retry_outcome("db_connect", true);

        let gathered = metrics.registry.gather();
        let attempts = gathered.iter().find(|m| m.name() == "retry_attempts_total").unwrap();
        assert_eq!(attempts.metric.len(), 2); // Two different attempt labels
    }
}
