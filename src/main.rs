use anyhow::Result;
use insurance_lakehouse::{config::PipelineConfig, pipeline};
use std::env;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()))
    });
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    // ─── 2) configuration, read once ─────────────────────────────────
    let config = PipelineConfig::load()?;

    // ─── 3) run ──────────────────────────────────────────────────────
    let summary = match pipeline::run(&config).await {
        Ok(summary) => summary,
        Err(e) => {
            error!("pipeline failed: {:#}", e);
            return Err(e);
        }
    };

    println!("{}", summary);
    info!("all done");
    Ok(())
}
