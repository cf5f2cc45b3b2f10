//! # Geolocation enrichment
//! Turns an indicator into (at most) one geolocation request:
//! IPv4 values are queried as-is, URLs and domains go through DNS first.
//!
//! Policy: every resolved IP is queried at most once per run. Only the
//! indicator that triggered the request can carry the record; later
//! indicators reaching the same IP stay untagged.

pub mod dns;
pub mod geo_client;
pub mod pacer;

use std::collections::HashSet;
use std::sync::Arc;

use crate::ingest::types::{GeoRecord, Indicator, IndicatorKind};
use dns::{extract_host, HostResolver};
use geo_client::GeoLookup;
use pacer::Pacer;

/// IPs already sent to the geolocation service during one run.
#[derive(Debug, Default)]
pub struct QueriedIps(HashSet<String>);

impl QueriedIps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, ip: &str) -> bool {
        self.0.contains(ip)
    }

    /// Returns false if the IP was already recorded.
    pub fn insert(&mut self, ip: impl Into<String>) -> bool {
        self.0.insert(ip.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    /// DNS failed or the host was empty; nothing was sent.
    Unresolved,
    /// IP was queried earlier in this run; nothing was sent.
    AlreadyQueried { ip: String },
    /// One request was sent; `geo` is `None` if it failed.
    Queried { ip: String, geo: Option<GeoRecord> },
}

impl LookupOutcome {
    pub fn consumes_budget(&self) -> bool {
        matches!(self, Self::Queried { .. })
    }
}

#[derive(Clone)]
pub struct GeoResolver {
    dns: Arc<dyn HostResolver>,
    geo: Arc<dyn GeoLookup>,
}

impl GeoResolver {
    pub fn new(dns: Arc<dyn HostResolver>, geo: Arc<dyn GeoLookup>) -> Self {
        Self { dns, geo }
    }

    /// IP to geolocate for this indicator, or `None` if it cannot be resolved.
    async fn target_ip(&self, indicator: &Indicator) -> Option<String> {
        match indicator.kind {
            IndicatorKind::Ipv4 => {
                let ip = indicator.value.trim();
                (!ip.is_empty()).then(|| ip.to_string())
            }
            IndicatorKind::Url | IndicatorKind::Domain => {
                let host = extract_host(&indicator.value);
                if host.is_empty() {
                    return None;
                }
                match self.dns.resolve(host).await {
                    Ok(ip) => {
                        tracing::debug!(host, %ip, "resolved");
                        Some(ip.to_string())
                    }
                    Err(e) => {
                        tracing::debug!(host, error = %e, "dns resolution failed");
                        None
                    }
                }
            }
        }
    }

    pub async fn resolve_and_lookup(
        &self,
        indicator: &Indicator,
        queried: &mut QueriedIps,
        pacer: &mut dyn Pacer,
    ) -> LookupOutcome {
        let Some(ip) = self.target_ip(indicator).await else {
            return LookupOutcome::Unresolved;
        };
        if queried.contains(&ip) {
            return LookupOutcome::AlreadyQueried { ip };
        }

        pacer.acquire().await;
        let result = self.geo.lookup(&ip).await;
        pacer.release();
        let geo = match result {
            Ok(rec) => Some(rec),
            Err(e) => {
                tracing::debug!(ip = %ip, error = %e, "geo lookup failed");
                None
            }
        };
        queried.insert(ip.clone());
        LookupOutcome::Queried { ip, geo }
    }
}
