// src/document.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ingest::types::Indicator;

/// Terminal artifact of one run. No mutating API once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultDocument {
    #[serde(rename = "last_updated_utc")]
    generated_at: DateTime<Utc>,
    indicators: Vec<Indicator>,
}

impl ResultDocument {
    /// Stamps the document with the current UTC time.
    pub fn new(indicators: Vec<Indicator>) -> Self {
        Self {
            generated_at: Utc::now(),
            indicators,
        }
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    pub fn indicators(&self) -> &[Indicator] {
        &self.indicators
    }

    pub fn geolocated_count(&self) -> usize {
        self.indicators.iter().filter(|i| i.geo.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::{FeedSource, GeoRecord, IndicatorKind};

    #[test]
    fn json_shape_matches_dashboard() {
        let mut tagged = Indicator::new(
            "203.0.113.9",
            IndicatorKind::Ipv4,
            FeedSource::FeodoTracker,
            "Botnet C2 (Pikabot)",
        );
        tagged.geo = Some(GeoRecord {
            city: None,
            country: Some("Germany".into()),
            lat: 51.0,
            lon: 9.0,
        });
        let plain = Indicator::new(
            "https://x.test/",
            IndicatorKind::Url,
            FeedSource::OpenPhish,
            "Active Phishing URL",
        );
        let doc = ResultDocument::new(vec![tagged, plain]);

        let v = serde_json::to_value(&doc).unwrap();
        let ts = v["last_updated_utc"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(ts).is_ok());
        let arr = v["indicators"].as_array().unwrap();
        assert_eq!(arr[0]["geo"]["country"], "Germany");
        assert!(arr[0]["geo"]["city"].is_null());
        assert!(arr[1].get("geo").is_none());
        assert_eq!(doc.geolocated_count(), 1);
    }
}
