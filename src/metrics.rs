use std::net::SocketAddr;

use anyhow::Context;
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
/// Without this the `metrics` macros are no-ops.
/// Must be called from inside a Tokio runtime.
pub fn install(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .with_context(|| format!("prometheus: listen on {addr}"))?;

    describe_counter!("scan_runs_total", "Scans run, by outcome.");
    describe_histogram!("scan_ranked_items", "Items delivered per scan.");
    describe_gauge!("scan_last_run_ts", "Unix time of the last finished scan.");
    describe_counter!("telegram_poll_errors_total", "Failed getUpdates calls.");
    describe_gauge!("build_info", "Constant 1, labelled with the crate version.");

    gauge!("build_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);

    tracing::info!(%addr, "metrics exporter listening");
    Ok(())
}
