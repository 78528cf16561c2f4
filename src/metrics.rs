use std::sync::OnceLock;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus exporter and register all application metrics.
/// Returns a `PrometheusHandle` whose `render()` method produces the
/// text/plain Prometheus scrape payload. The recorder is process-global, so
/// later calls return the handle installed by the first.
pub fn init_metrics() -> PrometheusHandle {
    HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder");
            register_metrics();
            handle
        })
        .clone()
}

fn register_metrics() {
    // Pre-register counters so they appear even before the first increment.
    counter!("trades_executed").absolute(0);
    counter!("trades_rejected").absolute(0);
    counter!("deposits_submitted").absolute(0);
    counter!("deposits_expired").absolute(0);
    counter!("withdrawals_reassigned").absolute(0);
    counter!("withdrawals_refunded").absolute(0);
    counter!("tontine_autopay_total").absolute(0);
    counter!("tontine_payouts_total").absolute(0);

    // Histogram is lazily created on first record; force creation.
    histogram!("sweep_duration_seconds").record(0.0);
}
