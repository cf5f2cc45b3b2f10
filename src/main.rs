//! Threat feed aggregator — binary entrypoint.
//! One run: load config, fetch + enrich, write the dashboard snapshot, exit.
//! Only config or output failures make the process exit non-zero.

use anyhow::Result;
use threat_feed_aggregator::{
    config::AggregatorConfig, metrics::Metrics, AggregationPipeline, JsonFileSink,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// `RUST_LOG` wins; otherwise info for this crate, warn for dependencies.
/// `LOG_FORMAT=json` switches to one JSON object per line (CI / log shipping).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("threat_feed_aggregator=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when the file is missing.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AggregatorConfig::load_default()?;
    tracing::info!(
        otx_key = cfg.otx_api_key.is_some(),
        total_limit = cfg.limits.total_indicators,
        geo_limit = cfg.limits.geo_lookups,
        pulse_limit = cfg.limits.otx_pulses,
        output = %cfg.output_path.display(),
        "starting threat data fetch"
    );

    let metrics = match Metrics::init() {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::warn!(error = ?e, "metrics disabled");
            None
        }
    };

    let sink = JsonFileSink::new(cfg.output_path.clone());
    let mut pipeline = AggregationPipeline::from_config(&cfg);
    let summary = pipeline.publish(&sink).await?;

    tracing::info!(
        indicators = summary.kept,
        geolocated = summary.geolocated,
        path = %sink.path().display(),
        "done"
    );

    if let (Some(m), Some(path)) = (metrics.as_ref(), cfg.metrics_textfile.as_deref()) {
        if let Err(e) = m.write_textfile(path) {
            tracing::warn!(error = ?e, "metrics textfile not written");
        }
    }

    Ok(())
}
