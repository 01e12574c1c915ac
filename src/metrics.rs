//! Prometheus metrics for the queue: chunk throughput and request
//! counts, registered once behind a global registry and exposed on
//! `/metrics`.

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

fn counter_vec(name: &str, help: &str, labels: &[&str]) -> prometheus::Result<IntCounterVec> {
    let metric = IntCounterVec::new(Opts::new(name, help), labels)?;
    REGISTRY.register(Box::new(metric.clone()))?;
    Ok(metric)
}

fn counter(name: &str, help: &str) -> prometheus::Result<IntCounter> {
    let metric = IntCounter::with_opts(Opts::new(name, help))?;
    REGISTRY.register(Box::new(metric.clone()))?;
    Ok(metric)
}

fn gauge(name: &str, help: &str) -> prometheus::Result<IntGauge> {
    let metric = IntGauge::with_opts(Opts::new(name, help))?;
    REGISTRY.register(Box::new(metric.clone()))?;
    Ok(metric)
}

/// Request- and replication-facing counters.
pub struct Metrics {
    /// Records appended, labeled by category.
    pub writes_total: IntCounterVec,
    /// Bytes appended, labeled by category.
    pub write_bytes_total: IntCounterVec,
    /// Bytes served by `read`, labeled by category.
    pub read_bytes_total: IntCounterVec,
    /// Chunks deleted via `ack`.
    pub acks_total: IntCounter,
    /// Chunks successfully downloaded by the replicator.
    pub replication_chunks_total: IntCounter,
    /// Replication tasks that failed and remain queued for retry.
    pub replication_errors_total: IntCounter,
    /// Number of categories this instance has opened a store for.
    pub open_categories: IntGauge,
}

impl Metrics {
    fn new() -> prometheus::Result<Self> {
        Ok(Self {
            writes_total: counter_vec("chukcha_writes_total", "Total number of records appended", &["category"])?,
            write_bytes_total: counter_vec(
                "chukcha_write_bytes_total",
                "Total number of bytes appended",
                &["category"],
            )?,
            read_bytes_total: counter_vec(
                "chukcha_read_bytes_total",
                "Total number of bytes served by read",
                &["category"],
            )?,
            acks_total: counter("chukcha_acks_total", "Total number of chunks acked")?,
            replication_chunks_total: counter(
                "chukcha_replication_chunks_total",
                "Total number of chunks fully downloaded by the replicator",
            )?,
            replication_errors_total: counter(
                "chukcha_replication_errors_total",
                "Total number of replication task attempts that failed and were requeued",
            )?,
            open_categories: gauge(
                "chukcha_open_categories",
                "Number of categories this instance has opened a store for",
            )?,
        })
    }

    /// Record a successful append.
    pub fn record_write(&self, category: &str, bytes: usize) {
        self.writes_total.with_label_values(&[category]).inc();
        self.write_bytes_total.with_label_values(&[category]).inc_by(bytes as u64);
    }

    /// Record bytes served by a read call.
    pub fn record_read(&self, category: &str, bytes: usize) {
        if bytes > 0 {
            self.read_bytes_total.with_label_values(&[category]).inc_by(bytes as u64);
        }
    }
}

/// The process-wide metrics instance.
pub fn global() -> &'static Metrics {
    static INSTANCE: Lazy<Metrics> = Lazy::new(|| Metrics::new().expect("failed to register metrics"));
    &INSTANCE
}

/// Force registration of the global metrics before the first request.
pub fn init() {
    let _ = global();
}

/// Render the registry in Prometheus text exposition format.
pub fn collect() -> String {
    let encoder = prometheus::TextEncoder::new();
    let families = REGISTRY.gather();
    encoder.encode_to_string(&families).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_writes_increments_counters() {
        init();
        global().record_write("numbers", 6);
        let output = collect();
        assert!(output.contains("chukcha_writes_total"));
    }
}
