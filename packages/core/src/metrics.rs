//! Prometheus metrics registry for the peershare session.
//!
//! [`AppMetrics`] owns all registered metrics and the [`Registry`] they
//! belong to. Construct it once at startup, wrap in `Arc`, and pass it
//! to the accrual loop.

use prometheus::{Counter, Gauge, GaugeVec, Opts, Registry};

use crate::session::SessionStore;

/// All application-level Prometheus metrics.
pub struct AppMetrics {
    /// Accrual ticks executed.
    pub ticks_total: Counter,
    /// Connections currently in `connected`.
    pub active_connections: Gauge,
    /// Sum of completed earning transactions.
    pub total_earnings: Gauge,
    /// Sum of completed payment transactions.
    pub total_spent: Gauge,
    /// Transactions held in the ledger, labelled by kind and status.
    pub transactions: GaugeVec,
    /// Latest sampled upload in Mbps.
    pub upload_mbps: Gauge,
    /// Latest sampled download in Mbps.
    pub download_mbps: Gauge,
    /// The registry that owns all of the above metrics.
    pub registry: Registry,
}

impl AppMetrics {
    /// Create and register all metrics. Returns an error if any metric
    /// name is invalid or duplicated (should not happen in practice).
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let ticks_total = Counter::with_opts(Opts::new(
            "peershare_ticks_total",
            "Accrual ticks executed",
        ))?;

        let active_connections = Gauge::with_opts(Opts::new(
            "peershare_active_connections",
            "Connections currently accruing",
        ))?;

        let total_earnings = Gauge::with_opts(Opts::new(
            "peershare_total_earnings",
            "Completed earnings",
        ))?;

        let total_spent = Gauge::with_opts(Opts::new(
            "peershare_total_spent",
            "Completed payments",
        ))?;

        let transactions = GaugeVec::new(
            Opts::new(
                "peershare_transactions",
                "Ledger transactions by kind and status",
            ),
            &["kind", "status"],
        )?;

        let upload_mbps = Gauge::with_opts(Opts::new(
            "peershare_upload_mbps",
            "Latest sampled upload throughput",
        ))?;

        let download_mbps = Gauge::with_opts(Opts::new(
            "peershare_download_mbps",
            "Latest sampled download throughput",
        ))?;

        registry.register(Box::new(ticks_total.clone()))?;
        registry.register(Box::new(active_connections.clone()))?;
        registry.register(Box::new(total_earnings.clone()))?;
        registry.register(Box::new(total_spent.clone()))?;
        registry.register(Box::new(transactions.clone()))?;
        registry.register(Box::new(upload_mbps.clone()))?;
        registry.register(Box::new(download_mbps.clone()))?;

        Ok(Self {
            ticks_total,
            active_connections,
            total_earnings,
            total_spent,
            transactions,
            upload_mbps,
            download_mbps,
            registry,
        })
    }

    /// Copy the session's gauges into the registry.
    pub fn observe(&self, store: &SessionStore) {
        let totals = store.ledger().totals();
        self.active_connections
            .set(store.active_connections().count() as f64);
        self.total_earnings.set(totals.total_earnings);
        self.total_spent.set(totals.total_spent);

        let bandwidth = store.bandwidth();
        self.upload_mbps.set(bandwidth.current.upload);
        self.download_mbps.set(bandwidth.current.download);

        self.transactions.reset();
        for tx in store.ledger().transactions() {
            self.transactions
                .with_label_values(&[tx.kind.as_str(), tx.status.as_str()])
                .inc();
        }
    }

    /// Render all metrics as Prometheus text format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&metric_families, &mut buf)?;
        Ok(String::from_utf8(buf).unwrap_or_default())
    }
}
