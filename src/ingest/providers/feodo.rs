use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Deserialize;
use std::time::Duration;

use super::{get_text, Mode};
use crate::ingest::types::{FeedSource, Indicator, IndicatorKind, SourceProvider};

pub const DEFAULT_URL: &str = "https://feodotracker.abuse.ch/downloads/ipblocklist.json";
const TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct BlocklistEntry {
    ip_address: Option<String>,
    malware: Option<String>,
}

/// Feodo Tracker botnet C2 blocklist (flat JSON array, no auth).
pub struct FeodoProvider {
    mode: Mode,
}

impl FeodoProvider {
    pub fn from_fixture_str(s: &str) -> Self {
        Self {
            mode: Mode::Fixture(s.to_string()),
        }
    }

    pub fn from_url(url: &str) -> Self {
        Self {
            mode: Mode::Http {
                url: url.to_string(),
                client: reqwest::Client::new(),
                timeout: TIMEOUT,
            },
        }
    }

    fn parse_blocklist_from_str(s: &str) -> Result<Vec<Indicator>> {
        let t0 = std::time::Instant::now();
        let entries: Vec<BlocklistEntry> =
            serde_json::from_str(s).context("parsing feodo blocklist json")?;

        let total = entries.len();
        let out: Vec<Indicator> = entries
            .into_iter()
            .filter_map(|e| {
                let ip = e.ip_address?.trim().to_string();
                if ip.is_empty() {
                    return None;
                }
                let family = e.malware.as_deref().unwrap_or("unknown");
                Some(Indicator::new(
                    ip,
                    IndicatorKind::Ipv4,
                    FeedSource::FeodoTracker,
                    format!("Botnet C2 ({family})"),
                ))
            })
            .collect();

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms", "provider" => "feodo").record(ms);
        counter!("ingest_indicators_total", "provider" => "feodo").increment(out.len() as u64);
        counter!("ingest_dropped_total", "provider" => "feodo")
            .increment((total - out.len()) as u64);
        Ok(out)
    }
}

#[async_trait]
impl SourceProvider for FeodoProvider {
    async fn fetch_latest(&self) -> Result<Vec<Indicator>> {
        match &self.mode {
            Mode::Fixture(s) => Self::parse_blocklist_from_str(s),
            Mode::Http {
                url,
                client,
                timeout,
            } => {
                let body = get_text(client, url, *timeout, &[]).await?;
                Self::parse_blocklist_from_str(&body)
            }
        }
    }

    fn name(&self) -> &'static str {
        "feodo"
    }
}
