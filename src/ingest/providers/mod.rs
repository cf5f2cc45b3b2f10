// src/ingest/providers/mod.rs
pub mod feodo;
pub mod openphish;
pub mod otx;

use anyhow::{Context, Result};
use std::time::Duration;

/// Where a provider reads its body from.
pub(crate) enum Mode {
    // Owned copy so tests can pass any &str.
    Fixture(String),
    Http {
        url: String,
        client: reqwest::Client,
        timeout: Duration,
    },
}

/// Single GET with timeout; non-2xx is an error.
pub(crate) async fn get_text(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
    headers: &[(&'static str, &str)],
) -> Result<String> {
    let mut req = client.get(url).timeout(timeout);
    for (k, v) in headers {
        req = req.header(*k, *v);
    }
    let resp = req
        .send()
        .await
        .with_context(|| format!("GET {url}"))?
        .error_for_status()
        .with_context(|| format!("GET {url} status"))?;
    resp.text().await.with_context(|| format!("GET {url} .text()"))
}
