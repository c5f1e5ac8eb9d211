use std::net::SocketAddr;

use anyhow::Result;
use report_service::{api, config::AppConfig, metrics_server, observability};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    observability::init_tracing();

    // Load configuration
    let cfg = AppConfig::load()?;

    // Start metrics server if configured
    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let addr: SocketAddr = cfg
        .server
        .bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid server.bind_addr: {e}"))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        workbook = %cfg.workbook.path.display(),
        format = ?cfg.workbook.format,
        "serving consumption report API"
    );

    axum::serve(listener, api::router(cfg.workbook)).await?;

    Ok(())
}
