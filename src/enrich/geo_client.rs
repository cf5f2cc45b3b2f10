// src/enrich/geo_client.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::ingest::types::GeoRecord;

pub const DEFAULT_BASE_URL: &str = "http://ip-api.com/json";

#[async_trait]
pub trait GeoLookup: Send + Sync {
    /// One request for `ip`. Any transport error or non-success status is `Err`.
    async fn lookup(&self, ip: &str) -> Result<GeoRecord>;
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    message: Option<String>,
    city: Option<String>,
    country: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

/// ip-api.com free endpoint (unauthenticated, IP in the path).
#[derive(Clone)]
pub struct IpApiClient {
    base_url: String,
    client: Client,
    timeout: Duration,
}

impl IpApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(5),
        }
    }
}

impl Default for IpApiClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

fn into_record(rsp: IpApiResponse) -> Result<GeoRecord> {
    if rsp.status != "success" {
        return Err(anyhow!(
            "geo lookup status={} message={}",
            rsp.status,
            rsp.message.as_deref().unwrap_or("-")
        ));
    }
    match (rsp.lat, rsp.lon) {
        (Some(lat), Some(lon)) => Ok(GeoRecord {
            city: rsp.city.filter(|c| !c.is_empty()),
            country: rsp.country.filter(|c| !c.is_empty()),
            lat,
            lon,
        }),
        _ => Err(anyhow!("geo lookup succeeded without coordinates")),
    }
}

#[async_trait]
impl GeoLookup for IpApiClient {
    async fn lookup(&self, ip: &str) -> Result<GeoRecord> {
        let url = format!("{}/{}", self.base_url, ip);
        let rsp: IpApiResponse = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .context("geo http get()")?
            .error_for_status()
            .context("geo http status")?
            .json()
            .await
            .context("geo http .json()")?;
        into_record(rsp)
    }
}
