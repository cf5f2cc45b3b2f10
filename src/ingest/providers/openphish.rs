use anyhow::Result;
use async_trait::async_trait;
use metrics::{counter, histogram};
use std::time::Duration;

use super::{get_text, Mode};
use crate::ingest::types::{FeedSource, Indicator, IndicatorKind, SourceProvider};

pub const DEFAULT_URL: &str = "https://openphish.com/feed.txt";
const TIMEOUT: Duration = Duration::from_secs(15);
const DESCRIPTION: &str = "Active Phishing URL";

/// OpenPhish community feed: one URL per line.
pub struct OpenPhishProvider {
    mode: Mode,
}

impl OpenPhishProvider {
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

    fn parse_lines(s: &str) -> Vec<Indicator> {
        let t0 = std::time::Instant::now();
        let out: Vec<Indicator> = s
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| Indicator::new(l, IndicatorKind::Url, FeedSource::OpenPhish, DESCRIPTION))
            .collect();

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms", "provider" => "openphish").record(ms);
        counter!("ingest_indicators_total", "provider" => "openphish").increment(out.len() as u64);
        out
    }
}

#[async_trait]
impl SourceProvider for OpenPhishProvider {
    async fn fetch_latest(&self) -> Result<Vec<Indicator>> {
        match &self.mode {
            Mode::Fixture(s) => Ok(Self::parse_lines(s)),
            Mode::Http {
                url,
                client,
                timeout,
            } => {
                let body = get_text(client, url, *timeout, &[]).await?;
                Ok(Self::parse_lines(&body))
            }
        }
    }

    fn name(&self) -> &'static str {
        "openphish"
    }
}
