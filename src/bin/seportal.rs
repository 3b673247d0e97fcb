use anyhow::Result;
use seportal::cli::{self, telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    // sqlx, lettre and the OTLP exporter all share the process-wide rustls provider.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let action = cli::start()?;

    let result = action.execute().await;

    telemetry::shutdown_tracer();

    result
}
