//! Layered configuration: defaults, then an optional `lobx.toml` (or an
//! explicit file), then `LOBX_*` environment variables.
//!
//! Nested keys use `__` in the environment, e.g. `LOBX_FETCH__TIMEOUT_MS=3000`.
//! `LOBX_DEFAULT_VENUES` takes a comma-separated list.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::analytics::metrics::AnalyzerSettings;
use crate::engine::router::RouterSettings;
use crate::market_data::adapters::AdapterSettings;
use crate::market_data::aggregator::EngineSettings;
use crate::market_data::normaliser::Normaliser;
use crate::market_data::types::VenueId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Prometheus listener, only used with the `metrics-exporter` feature.
    pub metrics_port: u16,
    pub default_venues: Vec<String>,
    /// Levels per side kept in `aggregate` output.
    pub top_levels: usize,
    pub fetch: FetchConfig,
    pub book: BookConfig,
    pub analytics: AnalyticsConfig,
    pub router: RouterConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// HTTP client timeout per adapter.
    pub timeout_ms: u64,
    /// Engine-side bound per venue call.
    pub engine_timeout_ms: u64,
    pub depth: u32,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookConfig {
    pub min_healthy_levels: usize,
    pub stale_after_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub whale_multiplier: Decimal,
    pub max_whales: usize,
    pub wall_band_pct: Decimal,
    pub wall_min_quantity: Option<Decimal>,
    pub wall_median_multiplier: Decimal,
    pub notional_sizes: Vec<Decimal>,
    pub full_depth_notional: Decimal,
    pub arbitrage_min_spread_pct: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub taker_fee_bps: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub sled_path: PathBuf,
    /// Postgres is used instead of sled when set (or when `DATABASE_URL` is).
    pub database_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            metrics_port: 9000,
            default_venues: VenueId::DEFAULT_SET.iter().map(|v| v.to_string()).collect(),
            top_levels: 50,
            fetch: FetchConfig::default(),
            book: BookConfig::default(),
            analytics: AnalyticsConfig::default(),
            router: RouterConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { timeout_ms: 4_000, engine_timeout_ms: 5_000, depth: 100, user_agent: None }
    }
}

impl Default for BookConfig {
    fn default() -> Self {
        let n = Normaliser::default();
        Self { min_healthy_levels: n.min_healthy_levels, stale_after_ms: n.stale_after_ms }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        let s = AnalyzerSettings::default();
        Self {
            whale_multiplier: s.whale_multiplier,
            max_whales: s.max_whales,
            wall_band_pct: s.wall_band_pct,
            wall_min_quantity: s.wall_min_quantity,
            wall_median_multiplier: s.wall_median_multiplier,
            notional_sizes: s.notional_sizes,
            full_depth_notional: s.full_depth_notional,
            arbitrage_min_spread_pct: s.arbitrage_min_spread_pct,
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self { taker_fee_bps: RouterSettings::default().taker_fee_bps }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { sled_path: PathBuf::from("data/lobx-snapshots"), database_url: None }
    }
}

impl AppConfig {
    /// Load from `path` when given (must exist), else from an optional `lobx.*` in the working dir.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name("lobx").required(false),
        };
        Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("LOBX")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("default_venues")
                    .with_list_parse_key("analytics.notional_sizes")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    pub fn adapter_settings(&self) -> AdapterSettings {
        let mut settings = AdapterSettings {
            timeout: Duration::from_millis(self.fetch.timeout_ms),
            normaliser: Normaliser::new(self.book.min_healthy_levels, self.book.stale_after_ms),
            ..AdapterSettings::default()
        };
        if let Some(ua) = &self.fetch.user_agent {
            settings.user_agent = ua.clone();
        }
        settings
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            fetch_timeout: Duration::from_millis(self.fetch.engine_timeout_ms),
            depth: self.fetch.depth,
        }
    }

    pub fn analyzer_settings(&self) -> AnalyzerSettings {
        AnalyzerSettings {
            whale_multiplier: self.analytics.whale_multiplier,
            max_whales: self.analytics.max_whales,
            wall_band_pct: self.analytics.wall_band_pct,
            wall_min_quantity: self.analytics.wall_min_quantity,
            wall_median_multiplier: self.analytics.wall_median_multiplier,
            notional_sizes: self.analytics.notional_sizes.clone(),
            full_depth_notional: self.analytics.full_depth_notional,
            arbitrage_min_spread_pct: self.analytics.arbitrage_min_spread_pct,
        }
    }

    pub fn router_settings(&self) -> RouterSettings {
        RouterSettings { taker_fee_bps: self.router.taker_fee_bps }
    }

    /// Configured default venues; unknown ids are skipped, and an empty
    /// result falls back to the built-in set.
    pub fn default_venue_ids(&self) -> Vec<VenueId> {
        let venues: Vec<VenueId> = self
            .default_venues
            .iter()
            .filter_map(|raw| match raw.parse::<VenueId>() {
                Ok(v) => Some(v),
                Err(err) => {
                    warn!(%err, "ignoring configured default venue");
                    None
                }
            })
            .collect();
        if venues.is_empty() {
            VenueId::DEFAULT_SET.to_vec()
        } else {
            venues
        }
    }

    pub fn database_url(&self) -> Option<String> {
        self.storage
            .database_url
            .clone()
            .or_else(|| std::env::var("DATABASE_URL").ok())
            .filter(|url| !url.trim().is_empty())
    }
}
