//! # Aggregation pipeline
//! fetch (all providers, sequential) → shuffle → cap → budgeted geo pass → document.
//!
//! Shuffling happens before the cap so the trimmed sample keeps the source mix
//! instead of favouring whichever provider ran first. The geo budget counts
//! requests sent, not successes.

use anyhow::{Context, Result};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::config::{AggregatorConfig, Limits};
use crate::document::ResultDocument;
use crate::enrich::dns::DnsResolver;
use crate::enrich::geo_client::IpApiClient;
use crate::enrich::pacer::{FixedDelayPacer, Pacer};
use crate::enrich::{GeoResolver, LookupOutcome, QueriedIps};
use crate::ingest::providers::{
    feodo::FeodoProvider, openphish::OpenPhishProvider, otx::OtxProvider,
};
use crate::ingest::types::{FeedSource, Indicator, SourceProvider};
use crate::output::OutputSink;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "geo_lookups_total",
            "Geolocation requests sent (successful or not)."
        );
        describe_counter!(
            "geo_tagged_total",
            "Indicators that received a geolocation record."
        );
        describe_gauge!(
            "snapshot_indicators",
            "Indicators in the last snapshot after the size cap."
        );
    });
}

/// Counters for one run, logged at the end.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub fetched: usize,
    pub fetched_by_source: BTreeMap<FeedSource, usize>,
    pub kept: usize,
    pub lookups: usize,
    pub geolocated: usize,
    pub unresolved: usize,
    pub dedup_skips: usize,
}

/// Result of the single enrichment pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichStats {
    pub lookups: usize,
    pub geolocated: usize,
    pub unresolved: usize,
    pub dedup_skips: usize,
}

/// Walk `indicators` once, in order, until `budget` requests have been sent.
/// Indicators past the budget are left untouched.
pub async fn enrich(
    indicators: &mut [Indicator],
    resolver: &GeoResolver,
    pacer: &mut dyn Pacer,
    queried: &mut QueriedIps,
    budget: usize,
) -> EnrichStats {
    let mut stats = EnrichStats::default();
    for ind in indicators.iter_mut() {
        if stats.lookups >= budget {
            break;
        }
        match resolver.resolve_and_lookup(ind, queried, pacer).await {
            LookupOutcome::Unresolved => stats.unresolved += 1,
            LookupOutcome::AlreadyQueried { .. } => stats.dedup_skips += 1,
            LookupOutcome::Queried { geo, .. } => {
                stats.lookups += 1;
                if geo.is_some() {
                    stats.geolocated += 1;
                }
                ind.geo = geo;
            }
        }
    }
    stats
}

pub struct AggregationPipeline {
    providers: Vec<Box<dyn SourceProvider>>,
    resolver: GeoResolver,
    pacer: Box<dyn Pacer>,
    limits: Limits,
    rng: StdRng,
}

impl AggregationPipeline {
    pub fn new(
        providers: Vec<Box<dyn SourceProvider>>,
        resolver: GeoResolver,
        pacer: Box<dyn Pacer>,
        limits: Limits,
    ) -> Self {
        Self {
            providers,
            resolver,
            pacer,
            limits,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Fixed RNG for reproducible shuffles.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Production wiring: OTX, Feodo Tracker and OpenPhish over HTTP,
    /// system DNS, ip-api.com paced by the configured delay.
    pub fn from_config(cfg: &AggregatorConfig) -> Self {
        let providers: Vec<Box<dyn SourceProvider>> = vec![
            Box::new(OtxProvider::from_url(
                &cfg.endpoints.otx,
                cfg.otx_api_key.clone(),
                cfg.limits.otx_pulses,
            )),
            Box::new(FeodoProvider::from_url(&cfg.endpoints.feodo)),
            Box::new(OpenPhishProvider::from_url(&cfg.endpoints.openphish)),
        ];
        let resolver = GeoResolver::new(
            Arc::new(DnsResolver::new()),
            Arc::new(IpApiClient::new(cfg.endpoints.geo.clone())),
        );
        Self::new(
            providers,
            resolver,
            Box::new(FixedDelayPacer::new(cfg.geo_lookup_delay)),
            cfg.limits,
        )
    }

    pub async fn run(&mut self) -> ResultDocument {
        self.run_with_summary().await.0
    }

    pub async fn run_with_summary(&mut self) -> (ResultDocument, RunSummary) {
        ensure_metrics_described();
        let mut summary = RunSummary::default();

        // 1) Fetch + merge
        let mut all = crate::ingest::run_once(&self.providers).await;
        summary.fetched = all.len();
        for ind in &all {
            *summary.fetched_by_source.entry(ind.source).or_default() += 1;
        }

        // 2) Shuffle for source diversity, 3) cap
        info!(total = all.len(), "shuffling indicators");
        all.shuffle(&mut self.rng);
        if all.len() > self.limits.total_indicators {
            info!(
                from = all.len(),
                to = self.limits.total_indicators,
                "trimming indicators"
            );
            all.truncate(self.limits.total_indicators);
        }
        summary.kept = all.len();

        // 4) Bounded geo pass with a fresh dedup set
        info!(
            indicators = all.len(),
            budget = self.limits.geo_lookups,
            "geolocating"
        );
        let mut queried = QueriedIps::new();
        let stats = enrich(
            &mut all,
            &self.resolver,
            self.pacer.as_mut(),
            &mut queried,
            self.limits.geo_lookups,
        )
        .await;
        summary.lookups = stats.lookups;
        summary.geolocated = stats.geolocated;
        summary.unresolved = stats.unresolved;
        summary.dedup_skips = stats.dedup_skips;

        // 5) Timestamp + wrap
        let doc = ResultDocument::new(all);

        counter!("geo_lookups_total").increment(summary.lookups as u64);
        counter!("geo_tagged_total").increment(summary.geolocated as u64);
        gauge!("snapshot_indicators").set(summary.kept as f64);
        info!(
            fetched = summary.fetched,
            kept = summary.kept,
            lookups = summary.lookups,
            geolocated = summary.geolocated,
            unresolved = summary.unresolved,
            dedup_skips = summary.dedup_skips,
            "pipeline run complete"
        );

        (doc, summary)
    }

    /// Run, then hand the document to `sink`. A sink failure is the only error.
    pub async fn publish(&mut self, sink: &dyn OutputSink) -> Result<RunSummary> {
        let (doc, summary) = self.run_with_summary().await;
        sink.write(&doc).await.context("writing snapshot")?;
        Ok(summary)
    }
}
