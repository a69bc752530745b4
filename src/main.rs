#![deny(unused)]
//! Photo Advisor - photo analysis backend.
//!
//! Accepts a problem photo and a selfie with consent, asks a vision model for
//! structured advice, and sends an audit trail to an operator chat.

use std::sync::Arc;
use std::time::Duration;

use photo_advisor_core::config::AppConfig;
use photo_advisor_gateway::{AnalysisPipeline, GatewayConfig, GatewayServer};
use photo_advisor_store::EphemeralFileStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    config.validate()?;

    photo_advisor_governance::configure_tracing(config.governance.json_logs)?;

    tracing::info!(
        environment = %config.governance.environment,
        "Starting Photo Advisor v{}",
        env!("CARGO_PKG_VERSION")
    );

    // =========================================================================
    // Upload directory sweep
    // =========================================================================
    let sweeper = if config.upload.sweep_interval_secs > 0 {
        let store = Arc::new(EphemeralFileStore::from_config(&config.upload));
        let max_age = Duration::from_secs(config.upload.max_file_age_secs);
        if let Err(e) = store.sweep_stale(max_age).await {
            tracing::warn!(error = %e, "Initial upload sweep failed");
        }
        Some(store.spawn_sweeper(
            Duration::from_secs(config.upload.sweep_interval_secs),
            max_age,
        ))
    } else {
        tracing::info!("Upload sweep disabled");
        None
    };

    // =========================================================================
    // Pipeline & gateway
    // =========================================================================
    let pipeline = AnalysisPipeline::from_config(&config);
    let gateway_config = GatewayConfig::from_config(&config);
    let mut server = GatewayServer::new(gateway_config.clone(), pipeline);

    if config.governance.enable_metrics {
        let metrics_handle = photo_advisor_governance::setup_metrics_recorder()?;
        server = server.with_metrics(metrics_handle);
    }

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                  Photo Advisor v{:<29}║", env!("CARGO_PKG_VERSION"));
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  Endpoints:                                                  ║");
    println!("║    GET  /          - Liveness                                ║");
    println!("║    GET  /health    - Health check                            ║");
    println!("║    POST /analyze   - Analyze a problem photo                 ║");
    if config.governance.enable_metrics {
        println!("║    GET  /metrics   - Prometheus metrics                      ║");
    }
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!(
        "║  Server: http://{:<45}║",
        format!("{}:{}", gateway_config.host, gateway_config.port)
    );
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    let result = server.run().await;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    result?;

    tracing::info!("Photo Advisor stopped");
    Ok(())
}
