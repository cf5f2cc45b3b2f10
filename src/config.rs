// src/config.rs
use anyhow::{anyhow, Context, Result};
use rand::Rng;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::enrich::geo_client;
use crate::ingest::providers::{feodo, openphish, otx};

const ENV_PATH: &str = "AGGREGATOR_CONFIG_PATH";
const DEFAULT_PATH: &str = "config/aggregator.toml";
/// Value shipped in `.env.example`; treated the same as no key.
pub const OTX_KEY_PLACEHOLDER: &str = "YOUR_ALIENVAULT_OTX_API_KEY";

pub const GEO_LOOKUP_RANGE: std::ops::RangeInclusive<usize> = 60..=80;
pub const TOTAL_INDICATOR_RANGE: std::ops::RangeInclusive<usize> = 2000..=2100;
pub const DEFAULT_PULSE_LIMIT: u32 = 50;
pub const DEFAULT_GEO_DELAY_MS: u64 = 1100;
pub const DEFAULT_OUTPUT_PATH: &str = "docs/data.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub total_indicators: usize,
    pub geo_lookups: usize,
    pub otx_pulses: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub otx: String,
    pub feodo: String,
    pub openphish: String,
    pub geo: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            otx: otx::DEFAULT_BASE_URL.to_string(),
            feodo: feodo::DEFAULT_URL.to_string(),
            openphish: openphish::DEFAULT_URL.to_string(),
            geo: geo_client::DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// Everything one run needs; built once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub otx_api_key: Option<String>,
    pub limits: Limits,
    pub geo_lookup_delay: Duration,
    pub output_path: PathBuf,
    pub metrics_textfile: Option<PathBuf>,
    pub endpoints: Endpoints,
}

/// Optional TOML layer. Environment variables win over it.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub otx_api_key: Option<String>,
    pub geo_lookup_limit: Option<usize>,
    pub total_indicator_limit: Option<usize>,
    pub otx_pulse_limit: Option<u32>,
    pub geo_lookup_delay_ms: Option<u64>,
    pub output_path: Option<PathBuf>,
    pub metrics_textfile: Option<PathBuf>,
    pub otx_url: Option<String>,
    pub feodo_url: Option<String>,
    pub openphish_url: Option<String>,
    pub geo_url: Option<String>,
}

pub fn load_file_from(path: &Path) -> Result<FileConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
}

/// Config file lookup:
/// 1) $AGGREGATOR_CONFIG_PATH (must exist)
/// 2) config/aggregator.toml
/// 3) none
pub fn load_file_default() -> Result<FileConfig> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_file_from(&pb);
        } else {
            return Err(anyhow!("{ENV_PATH} points to non-existent path"));
        }
    }
    let p = PathBuf::from(DEFAULT_PATH);
    if p.exists() {
        return load_file_from(&p);
    }
    Ok(FileConfig::default())
}

/// Absent, blank or placeholder keys all mean "no key".
pub fn sanitize_api_key(raw: Option<String>) -> Option<String> {
    raw.map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty() && k != OTX_KEY_PLACEHOLDER)
}

fn parse_var<T: std::str::FromStr>(
    env: &dyn Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow!("invalid {key}={raw:?}: {e}")),
        _ => Ok(None),
    }
}

impl AggregatorConfig {
    /// Merge env (via `env`) over `file`; unset limits are drawn from `rng`.
    pub fn resolve<R: Rng>(
        file: FileConfig,
        env: &dyn Fn(&str) -> Option<String>,
        rng: &mut R,
    ) -> Result<Self> {
        let otx_api_key = sanitize_api_key(env("OTX_API_KEY").or(file.otx_api_key));

        let geo_lookups = match parse_var(env, "GEO_LOOKUP_LIMIT")?.or(file.geo_lookup_limit) {
            Some(v) => v,
            None => rng.random_range(GEO_LOOKUP_RANGE),
        };
        let total_indicators =
            match parse_var(env, "TOTAL_INDICATOR_LIMIT")?.or(file.total_indicator_limit) {
                Some(v) => v,
                None => rng.random_range(TOTAL_INDICATOR_RANGE),
            };
        let otx_pulses = parse_var(env, "OTX_PULSE_LIMIT")?
            .or(file.otx_pulse_limit)
            .unwrap_or(DEFAULT_PULSE_LIMIT);
        let delay_ms = parse_var(env, "GEO_LOOKUP_DELAY_MS")?
            .or(file.geo_lookup_delay_ms)
            .unwrap_or(DEFAULT_GEO_DELAY_MS);

        let output_path = env("OUTPUT_PATH")
            .map(PathBuf::from)
            .or(file.output_path)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_PATH));
        let metrics_textfile = env("METRICS_TEXTFILE")
            .map(PathBuf::from)
            .or(file.metrics_textfile);

        let defaults = Endpoints::default();
        let endpoints = Endpoints {
            otx: env("OTX_URL").or(file.otx_url).unwrap_or(defaults.otx),
            feodo: env("FEODO_URL").or(file.feodo_url).unwrap_or(defaults.feodo),
            openphish: env("OPENPHISH_URL")
                .or(file.openphish_url)
                .unwrap_or(defaults.openphish),
            geo: env("GEO_URL").or(file.geo_url).unwrap_or(defaults.geo),
        };

        Ok(Self {
            otx_api_key,
            limits: Limits {
                total_indicators,
                geo_lookups,
                otx_pulses,
            },
            geo_lookup_delay: Duration::from_millis(delay_ms),
            output_path,
            metrics_textfile,
            endpoints,
        })
    }

    /// Process environment + default config file + thread RNG.
    pub fn load_default() -> Result<Self> {
        let file = load_file_default()?;
        let env = |k: &str| std::env::var(k).ok();
        Self::resolve(file, &env, &mut rand::rng())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use std::collections::HashMap;
    use std::{env, fs};

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn placeholder_and_blank_keys_are_absent() {
        assert_eq!(sanitize_api_key(None), None);
        assert_eq!(sanitize_api_key(Some("  ".into())), None);
        assert_eq!(sanitize_api_key(Some(OTX_KEY_PLACEHOLDER.into())), None);
        assert_eq!(sanitize_api_key(Some(" abc ".into())), Some("abc".into()));
    }

    #[test]
    fn unset_limits_stay_in_documented_ranges() {
        let env = env_of(&[]);
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let cfg = AggregatorConfig::resolve(FileConfig::default(), &env, &mut rng).unwrap();
            assert!(GEO_LOOKUP_RANGE.contains(&cfg.limits.geo_lookups));
            assert!(TOTAL_INDICATOR_RANGE.contains(&cfg.limits.total_indicators));
            assert_eq!(cfg.limits.otx_pulses, DEFAULT_PULSE_LIMIT);
            assert_eq!(cfg.geo_lookup_delay, Duration::from_millis(1100));
        }
    }

    #[test]
    fn env_overrides_file() {
        let file: FileConfig = toml::from_str(
            r#"
            geo_lookup_limit = 5
            total_indicator_limit = 10
            output_path = "out/file.json"
            "#,
        )
        .unwrap();
        let env = env_of(&[("GEO_LOOKUP_LIMIT", "7"), ("OTX_API_KEY", "k")]);
        let cfg =
            AggregatorConfig::resolve(file, &env, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(cfg.limits.geo_lookups, 7);
        assert_eq!(cfg.limits.total_indicators, 10);
        assert_eq!(cfg.output_path, PathBuf::from("out/file.json"));
        assert_eq!(cfg.otx_api_key.as_deref(), Some("k"));
    }

    #[test]
    fn malformed_number_is_an_error() {
        let env = env_of(&[("TOTAL_INDICATOR_LIMIT", "lots")]);
        let err = AggregatorConfig::resolve(
            FileConfig::default(),
            &env,
            &mut StdRng::seed_from_u64(1),
        )
        .unwrap_err();
        assert!(err.to_string().contains("TOTAL_INDICATOR_LIMIT"));
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        assert!(toml::from_str::<FileConfig>("geo_limit = 3").is_err());
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_path_then_fallback() {
        // Isolate CWD so a real config/ in the repo does not interfere.
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_PATH);

        // No files → defaults
        let f = load_file_default().unwrap();
        assert!(f.geo_lookup_limit.is_none());

        // Env path wins
        let p = tmp.path().join("custom.toml");
        fs::write(&p, "geo_lookup_limit = 3\n").unwrap();
        env::set_var(ENV_PATH, p.display().to_string());
        let f2 = load_file_default().unwrap();
        assert_eq!(f2.geo_lookup_limit, Some(3));

        // Dangling env path is an error
        env::set_var(ENV_PATH, tmp.path().join("missing.toml").display().to_string());
        assert!(load_file_default().is_err());
        env::remove_var(ENV_PATH);

        env::set_current_dir(&old).unwrap();
    }
}
