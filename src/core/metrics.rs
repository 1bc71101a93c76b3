use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::core::config::Settings;

/// The worker has no API router, so the exporter runs its own listener.
pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.telemetry().prometheus_port));
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(%addr, "Prometheus exporter listening");
    Ok(())
}
