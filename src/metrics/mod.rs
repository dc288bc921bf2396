// Private module declaration
mod server;

use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

use crate::domain::order::{OrderError, OrderStatus};

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Checkout outcomes and latency
// - Stock races lost at the conditional decrement
// - Status changes and optimistic rollbacks
// - Supplier view builds
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

/// Central metrics registry for the entire application
pub struct Metrics {
    registry: Registry,

    // Checkout Metrics
    pub checkouts_total: IntCounterVec,
    pub checkout_duration: HistogramVec,
    pub stock_conflicts_total: IntCounter,

    // Status Workflow Metrics
    pub status_changes_total: IntCounterVec,
    pub status_rollbacks_total: IntCounter,

    // Read Path Metrics
    pub supplier_views_built_total: IntCounter,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // Checkout Metrics
        let checkouts_total = IntCounterVec::new(
            Opts::new("checkouts_total", "Checkouts by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(checkouts_total.clone()))?;

        let checkout_duration = HistogramVec::new(
            HistogramOpts::new("checkout_duration_seconds", "Checkout duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["outcome"],
        )?;
        registry.register(Box::new(checkout_duration.clone()))?;

        let stock_conflicts_total = IntCounter::new(
            "stock_conflicts_total",
            "Checkouts rejected because stock ran short",
        )?;
        registry.register(Box::new(stock_conflicts_total.clone()))?;

        // Status Workflow Metrics
        let status_changes_total = IntCounterVec::new(
            Opts::new("status_changes_total", "Order status change attempts"),
            &["from", "to", "outcome"],
        )?;
        registry.register(Box::new(status_changes_total.clone()))?;

        let status_rollbacks_total = IntCounter::new(
            "status_rollbacks_total",
            "Optimistic status changes undone after a failed write",
        )?;
        registry.register(Box::new(status_rollbacks_total.clone()))?;

        // Read Path Metrics
        let supplier_views_built_total = IntCounter::new(
            "supplier_views_built_total",
            "Supplier order views produced",
        )?;
        registry.register(Box::new(supplier_views_built_total.clone()))?;

        Ok(Self {
            registry,
            checkouts_total,
            checkout_duration,
            stock_conflicts_total,
            status_changes_total,
            status_rollbacks_total,
            supplier_views_built_total,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Helper to record a finished checkout
    pub fn record_checkout(&self, duration_secs: f64, error: Option<&OrderError>) {
        let outcome = error.map_or("placed", OrderError::kind);

        if matches!(error, Some(OrderError::InsufficientStock { .. })) {
            self.stock_conflicts_total.inc();
        }
        self.checkouts_total.with_label_values(&[outcome]).inc();
        self.checkout_duration.with_label_values(&[outcome]).observe(duration_secs);
    }

    /// Helper to record a status change attempt
    pub fn record_status_change(&self, from: Option<OrderStatus>, to: OrderStatus, error: Option<&OrderError>) {
        let from = from.map_or("unknown", OrderStatus::as_str);
        let outcome = error.map_or("applied", OrderError::kind);
        self.status_changes_total
            .with_label_values(&[from, to.as_str(), outcome])
            .inc();
    }

    /// Helper to record an optimistic change being undone
    pub fn record_status_rollback(&self) {
        self.status_rollbacks_total.inc();
    }

    /// Helper to record supplier views handed out
    pub fn record_supplier_views(&self, count: usize) {
        self.supplier_views_built_total.inc_by(count as u64);
    }
}
