//! # Browser Relay Node
//!
//! Entry point for the relay.
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry (logging filter, metrics registry)
//! 2. Load configuration: `RELAY_CONFIG` TOML file, then env overrides
//! 3. Build the gateway (validates configuration)
//! 4. Serve `/mcp`, `/ws`, `/status`, `/health` and `/metrics`
//! 5. On Ctrl+C, stop accepting connections and stop the reaper

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use relay_gateway::{GatewayConfig, RelayGatewayService};
use relay_telemetry::{init_telemetry, TelemetryConfig};
use tracing::info;

fn load_config() -> Result<GatewayConfig> {
    let mut config = match std::env::var("RELAY_CONFIG") {
        Ok(path) => {
            let path = PathBuf::from(path);
            info!(path = %path.display(), "Loading configuration file");
            GatewayConfig::from_file(&path)
                .with_context(|| format!("loading {}", path.display()))?
        }
        Err(_) => GatewayConfig::default(),
    };

    config
        .apply_overrides(|key| std::env::var(key).ok())
        .context("applying environment overrides")?;

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry =
        init_telemetry(TelemetryConfig::from_env()).context("initializing telemetry")?;

    let config = load_config()?;
    info!(
        addr = %config.http_addr(),
        broadcast = ?config.dispatch.broadcast,
        "Browser relay v{}",
        env!("CARGO_PKG_VERSION")
    );

    let service = Arc::new(RelayGatewayService::new(config).context("building gateway")?);

    let mut server = tokio::spawn({
        let service = Arc::clone(&service);
        async move { service.start().await }
    });

    let finished = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("listening for Ctrl+C")?;
            info!("Shutting down");
            service.shutdown();
            server.await
        }
        // Bind failures end the server before any signal arrives
        finished = &mut server => finished,
    };

    finished
        .context("gateway task panicked")?
        .context("gateway stopped with an error")?;

    Ok(())
}
