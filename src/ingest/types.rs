// src/ingest/types.rs
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// The three indicator shapes the dashboard knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndicatorKind {
    #[serde(rename = "IPv4")]
    Ipv4,
    #[serde(rename = "URL")]
    Url,
    #[serde(rename = "domain")]
    Domain,
}

impl IndicatorKind {
    /// Maps a feed-native type tag; anything outside the three known kinds is `None`.
    pub fn from_feed_tag(tag: &str) -> Option<Self> {
        match tag {
            "IPv4" => Some(Self::Ipv4),
            "URL" => Some(Self::Url),
            "domain" => Some(Self::Domain),
            _ => None,
        }
    }
}

/// Provenance tag, one per provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FeedSource {
    #[serde(rename = "AlienVault OTX")]
    AlienVaultOtx,
    #[serde(rename = "Feodo Tracker")]
    FeodoTracker,
    #[serde(rename = "OpenPhish")]
    OpenPhish,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoRecord {
    pub city: Option<String>,
    pub country: Option<String>,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    pub value: String, // IP literal, URL or bare domain
    #[serde(rename = "type")]
    pub kind: IndicatorKind,
    pub source: FeedSource,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo: Option<GeoRecord>,
}

impl Indicator {
    pub fn new(
        value: impl Into<String>,
        kind: IndicatorKind,
        source: FeedSource,
        description: impl Into<String>,
    ) -> Self {
        Self {
            value: value.into(),
            kind,
            source,
            description: description.into(),
            geo: None,
        }
    }
}

#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<Indicator>>;
    fn name(&self) -> &'static str;
}
