use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Deserialize;
use std::time::Duration;

use super::{get_text, Mode};
use crate::ingest::normalize_text;
use crate::ingest::types::{FeedSource, Indicator, IndicatorKind, SourceProvider};

pub const DEFAULT_BASE_URL: &str = "https://otx.alienvault.com/api/v1/pulses/subscribed";
const API_KEY_HEADER: &str = "X-OTX-API-KEY";
// Authenticated, nested payload: give it more room than the text feeds.
const TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Deserialize)]
struct PulsePage {
    #[serde(default)]
    results: Vec<Pulse>,
}

#[derive(Debug, Deserialize)]
struct Pulse {
    name: Option<String>,
    #[serde(default)]
    indicators: Vec<PulseIndicator>,
}

#[derive(Debug, Deserialize)]
struct PulseIndicator {
    indicator: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// AlienVault OTX subscribed pulses, flattened to one indicator per pulse entry.
pub struct OtxProvider {
    mode: Mode,
    api_key: Option<String>,
}

impl OtxProvider {
    pub fn from_fixture_str(s: &str) -> Self {
        Self {
            mode: Mode::Fixture(s.to_string()),
            api_key: None,
        }
    }

    /// `api_key == None` keeps the provider wired but makes every fetch a no-op.
    pub fn from_url(base_url: &str, api_key: Option<String>, pulse_limit: u32) -> Self {
        let url = format!("{base_url}?limit={pulse_limit}");
        Self {
            mode: Mode::Http {
                url,
                client: reqwest::Client::new(),
                timeout: TIMEOUT,
            },
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    fn parse_pulses_from_str(s: &str) -> Result<Vec<Indicator>> {
        let t0 = std::time::Instant::now();
        let page: PulsePage = serde_json::from_str(s).context("parsing otx pulses json")?;

        let mut out = Vec::new();
        let mut dropped = 0u64;
        for pulse in page.results {
            let description = pulse
                .name
                .as_deref()
                .map(normalize_text)
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| "N/A".to_string());

            for ind in pulse.indicators {
                let kind = ind.kind.as_deref().and_then(IndicatorKind::from_feed_tag);
                let value = ind.indicator.as_deref().map(str::trim).unwrap_or_default();
                match kind {
                    Some(kind) if !value.is_empty() => out.push(Indicator::new(
                        value,
                        kind,
                        FeedSource::AlienVaultOtx,
                        description.clone(),
                    )),
                    _ => dropped += 1,
                }
            }
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms", "provider" => "otx").record(ms);
        counter!("ingest_indicators_total", "provider" => "otx").increment(out.len() as u64);
        counter!("ingest_dropped_total", "provider" => "otx").increment(dropped);
        Ok(out)
    }
}

#[async_trait]
impl SourceProvider for OtxProvider {
    async fn fetch_latest(&self) -> Result<Vec<Indicator>> {
        match &self.mode {
            Mode::Fixture(s) => Self::parse_pulses_from_str(s),
            Mode::Http {
                url,
                client,
                timeout,
            } => {
                let Some(key) = self.api_key.as_deref() else {
                    tracing::warn!(provider = "otx", "OTX_API_KEY is not set, skipping OTX fetch");
                    return Ok(Vec::new());
                };
                let body = get_text(client, url, *timeout, &[(API_KEY_HEADER, key)]).await?;
                Self::parse_pulses_from_str(&body)
            }
        }
    }

    fn name(&self) -> &'static str {
        "otx"
    }
}
