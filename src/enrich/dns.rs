// src/enrich/dns.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::net::IpAddr;
use std::time::Duration;

#[async_trait]
pub trait HostResolver: Send + Sync {
    /// Resolve `host` to the single address that should be geolocated.
    async fn resolve(&self, host: &str) -> Result<IpAddr>;
}

/// System resolver (getaddrinfo via tokio's blocking pool), first IPv4 wins.
#[derive(Debug, Clone)]
pub struct DnsResolver {
    timeout: Duration,
}

impl DnsResolver {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(5),
        }
    }
}

impl Default for DnsResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostResolver for DnsResolver {
    async fn resolve(&self, host: &str) -> Result<IpAddr> {
        let addrs = tokio::time::timeout(self.timeout, tokio::net::lookup_host((host, 0u16)))
            .await
            .map_err(|_| anyhow!("dns timeout for {host}"))?
            .with_context(|| format!("dns lookup {host}"))?;
        addrs
            .map(|sa| sa.ip())
            .find(IpAddr::is_ipv4)
            .ok_or_else(|| anyhow!("no IPv4 address for {host}"))
    }
}

/// Bare hostname of a URL or domain indicator: drops scheme, path, query and port.
pub fn extract_host(value: &str) -> &str {
    let after_scheme = value.rsplit("//").next().unwrap_or(value);
    let authority = after_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or(after_scheme);
    // userinfo@host
    let host_port = authority.rsplit('@').next().unwrap_or(authority);
    host_port.split(':').next().unwrap_or(host_port).trim()
}
