// src/ingest/mod.rs
pub mod providers;
pub mod types;

use crate::ingest::types::{Indicator, SourceProvider};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up in the text dump).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "ingest_indicators_total",
            "Indicators parsed from providers."
        );
        describe_counter!(
            "ingest_dropped_total",
            "Feed entries dropped (unknown type or empty value)."
        );
        describe_counter!(
            "ingest_provider_errors_total",
            "Provider fetch/parse errors."
        );
        describe_histogram!("ingest_parse_ms", "Provider parse time in milliseconds.");
        describe_gauge!(
            "ingest_pipeline_last_run_ts",
            "Unix ts when the ingest stage last ran."
        );
    });
}

/// Collapse whitespace in feed-supplied free text.
pub fn normalize_text(s: &str) -> String {
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("static regex"));
    re_ws.replace_all(s, " ").trim().to_string()
}

/// Fetch from one provider; any error is logged and becomes an empty batch.
pub async fn fetch_isolated(provider: &dyn SourceProvider) -> Vec<Indicator> {
    match provider.fetch_latest().await {
        Ok(v) => {
            tracing::info!(provider = provider.name(), count = v.len(), "provider fetched");
            v
        }
        Err(e) => {
            tracing::warn!(error = ?e, provider = provider.name(), "provider error");
            counter!("ingest_provider_errors_total").increment(1);
            Vec::new()
        }
    }
}

/// Run every provider once, in order, and concatenate their indicators.
pub async fn run_once(providers: &[Box<dyn SourceProvider>]) -> Vec<Indicator> {
    ensure_metrics_described();

    let mut raw = Vec::new();
    for p in providers {
        let mut v = fetch_isolated(p.as_ref()).await;
        raw.append(&mut v);
    }

    let now = chrono::Utc::now().timestamp().max(0) as u64;
    gauge!("ingest_pipeline_last_run_ts").set(now as f64);

    raw
}
