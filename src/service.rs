//! The read and compute operations exposed to callers (CLI today).
//!
//! Input validation lives here so nothing malformed reaches the engine.

use std::sync::Arc;

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::analytics::compare::{compare_exchanges, ExchangeComparison};
use crate::analytics::depth::{depth_chart, DepthChart};
use crate::analytics::metrics::{Metrics, PriceWall, WhaleOrder};
use crate::engine::router::SmartRouter;
use crate::engine::types::{RouteRecommendation, Side};
use crate::error::{ServiceError, ValidationError};
use crate::market_data::adapters::MAX_REQUEST_DEPTH;
use crate::market_data::aggregator::AggregationEngine;
use crate::market_data::types::{VenueBook, VenueId};
use crate::market_data::unified_book::{AggregatedBook, Nbbo, UnavailableVenue};
use crate::persist::{snapshot, SavedSnapshot, Snapshot, SnapshotFilter, SnapshotStore, SnapshotSummary};

/// Routing quantity as callers supply it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuantityInput {
    Text(String),
    Float(f64),
}

impl From<&str> for QuantityInput {
    fn from(s: &str) -> Self {
        QuantityInput::Text(s.to_string())
    }
}

impl From<f64> for QuantityInput {
    fn from(f: f64) -> Self {
        QuantityInput::Float(f)
    }
}

impl QuantityInput {
    pub fn parse(&self) -> Result<Decimal, ValidationError> {
        match self {
            QuantityInput::Text(s) => parse_quantity(s),
            QuantityInput::Float(f) => quantity_from_f64(*f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NbboView {
    pub symbol: String,
    pub nbbo: Nbbo,
    pub crossed: bool,
    pub exchanges: Vec<VenueId>,
    pub unavailable: Vec<UnavailableVenue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsView {
    pub symbol: String,
    pub metrics: Metrics,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhaleView {
    pub symbol: String,
    pub whale_orders: Vec<WhaleOrder>,
    pub price_walls: Vec<PriceWall>,
    pub timestamp_ms: u64,
}

pub struct OrderBookService {
    engine: AggregationEngine,
    router: SmartRouter,
    store: Arc<dyn SnapshotStore>,
    default_venues: Vec<VenueId>,
    top_levels: usize,
}

impl OrderBookService {
    pub fn new(
        engine: AggregationEngine,
        router: SmartRouter,
        store: Arc<dyn SnapshotStore>,
        default_venues: Vec<VenueId>,
        top_levels: usize,
    ) -> Self {
        Self { engine, router, store, default_venues, top_levels }
    }

    pub fn engine(&self) -> &AggregationEngine {
        &self.engine
    }

    // Full, untrimmed book; every operation below derives from this.
    async fn full_book(&self, symbol: &str, venues: Option<&[String]>) -> Result<AggregatedBook, ServiceError> {
        let symbol = normalise_symbol(symbol)?;
        let venues = resolve_venues(venues, &self.default_venues)?;
        Ok(self.engine.aggregate(&symbol, &venues).await?)
    }

    /// Consolidated book trimmed to the configured number of levels per side.
    #[instrument(skip(self, venues))]
    pub async fn aggregate(&self, symbol: &str, venues: Option<&[String]>) -> Result<AggregatedBook, ServiceError> {
        Ok(self.full_book(symbol, venues).await?.trimmed(self.top_levels))
    }

    pub async fn depth(&self, symbol: &str, venues: Option<&[String]>) -> Result<DepthChart, ServiceError> {
        let book = self.full_book(symbol, venues).await?;
        Ok(depth_chart(&book).trimmed(self.top_levels))
    }

    #[instrument(skip(self))]
    pub async fn single(&self, venue: &str, symbol: &str, depth: u32) -> Result<VenueBook, ServiceError> {
        let venue: VenueId = venue.parse()?;
        let symbol = normalise_symbol(symbol)?;
        if depth == 0 || depth > MAX_REQUEST_DEPTH {
            return Err(ValidationError::InvalidDepth { depth, max: MAX_REQUEST_DEPTH }.into());
        }
        self.engine
            .fetch_single(venue, &symbol, depth)
            .await
            .map_err(|source| ServiceError::Venue { venue, source })
    }

    pub async fn nbbo(&self, symbol: &str, venues: Option<&[String]>) -> Result<NbboView, ServiceError> {
        let book = self.full_book(symbol, venues).await?;
        Ok(NbboView {
            symbol: book.symbol,
            nbbo: book.nbbo,
            crossed: book.crossed,
            exchanges: book.exchanges,
            unavailable: book.unavailable,
        })
    }

    pub async fn metrics(&self, symbol: &str, venues: Option<&[String]>) -> Result<MetricsView, ServiceError> {
        let book = self.full_book(symbol, venues).await?;
        Ok(MetricsView { symbol: book.symbol, metrics: book.metrics, timestamp_ms: book.timestamp_ms })
    }

    pub async fn whales(&self, symbol: &str, venues: Option<&[String]>) -> Result<WhaleView, ServiceError> {
        let book = self.full_book(symbol, venues).await?;
        Ok(WhaleView {
            symbol: book.symbol,
            whale_orders: book.metrics.whale_orders,
            price_walls: book.metrics.price_walls,
            timestamp_ms: book.timestamp_ms,
        })
    }

    /// Validates side and quantity before any venue is contacted.
    #[instrument(skip(self, quantity, venues))]
    pub async fn smart_route(
        &self,
        symbol: &str,
        side: &str,
        quantity: &QuantityInput,
        venues: Option<&[String]>,
    ) -> Result<RouteRecommendation, ServiceError> {
        let side: Side = side.parse()?;
        let quantity = quantity.parse()?;
        let book = self.full_book(symbol, venues).await?;
        Ok(self.router.route(&book, side, quantity)?)
    }

    /// Persists the full (untrimmed) book.
    #[instrument(skip(self, venues))]
    pub async fn save_snapshot(&self, symbol: &str, venues: Option<&[String]>) -> Result<SavedSnapshot, ServiceError> {
        let book = self.full_book(symbol, venues).await?;
        let snap = snapshot::from_book(&book);
        self.store.save_snapshot(&snap).await?;
        info!(id = %snap.id, symbol = %snap.symbol, "snapshot saved");
        Ok(SavedSnapshot { id: snap.id, symbol: snap.symbol, timestamp_ms: snap.timestamp_ms })
    }

    /// `Ok(None)` means no snapshot has this id.
    pub async fn get_snapshot(&self, id: &str) -> Result<Option<Snapshot>, ServiceError> {
        let id = id.trim();
        if id.is_empty() {
            return Ok(None);
        }
        Ok(self.store.get_snapshot(id).await?)
    }

    pub async fn snapshots(&self, symbol: Option<&str>, limit: usize, offset: usize) -> Result<Vec<SnapshotSummary>, ServiceError> {
        let symbol = symbol.map(normalise_symbol).transpose()?;
        let filter = SnapshotFilter { symbol, limit, offset };
        Ok(self.store.list_snapshots(&filter).await?)
    }

    pub async fn compare_exchanges(&self, symbol: &str, venues: Option<&[String]>) -> Result<ExchangeComparison, ServiceError> {
        let book = self.full_book(symbol, venues).await?;
        Ok(compare_exchanges(&book))
    }
}

/// Trimmed, upper-cased base symbol.
pub fn normalise_symbol(symbol: &str) -> Result<String, ValidationError> {
    let s = symbol.trim();
    if s.is_empty() {
        return Err(ValidationError::EmptySymbol);
    }
    Ok(s.to_ascii_uppercase())
}

/// Caller venue list, or the defaults when none is given. Unknown ids are
/// dropped with a warning; nothing left is an error.
pub fn resolve_venues(requested: Option<&[String]>, defaults: &[VenueId]) -> Result<Vec<VenueId>, ValidationError> {
    let Some(requested) = requested.filter(|r| !r.is_empty()) else {
        return if defaults.is_empty() {
            Err(ValidationError::NoVenues { rejected: Vec::new() })
        } else {
            Ok(defaults.to_vec())
        };
    };

    let mut venues = Vec::new();
    let mut rejected = Vec::new();
    for raw in requested {
        match raw.parse::<VenueId>() {
            Ok(v) if !venues.contains(&v) => venues.push(v),
            Ok(_) => {}
            Err(_) => {
                warn!(venue = %raw, "dropping unknown venue");
                rejected.push(raw.clone());
            }
        }
    }
    if venues.is_empty() {
        return Err(ValidationError::NoVenues { rejected });
    }
    Ok(venues)
}

pub fn parse_quantity(raw: &str) -> Result<Decimal, ValidationError> {
    let s = raw.trim();
    let q = Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .map_err(|_| ValidationError::InvalidQuantity(raw.to_string()))?;
    if q <= Decimal::ZERO {
        return Err(ValidationError::InvalidQuantity(raw.to_string()));
    }
    Ok(q)
}

pub fn quantity_from_f64(q: f64) -> Result<Decimal, ValidationError> {
    if !q.is_finite() || q <= 0.0 {
        return Err(ValidationError::InvalidQuantity(q.to_string()));
    }
    Decimal::from_f64(q)
        .map(|d| d.normalize())
        .ok_or_else(|| ValidationError::InvalidQuantity(q.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_symbol_normalisation() {
        assert_eq!(normalise_symbol("  btc ").unwrap(), "BTC");
        assert_eq!(normalise_symbol(""), Err(ValidationError::EmptySymbol));
        assert_eq!(normalise_symbol("   "), Err(ValidationError::EmptySymbol));
    }

    #[test]
    fn test_venue_resolution() {
        let defaults = VenueId::DEFAULT_SET;
        assert_eq!(resolve_venues(None, &defaults).unwrap(), defaults.to_vec());
        assert_eq!(resolve_venues(Some(&[][..]), &defaults).unwrap(), defaults.to_vec());

        let asked = vec!["Kraken".to_string(), "mtgox".to_string(), "kraken".to_string(), "okx".to_string()];
        assert_eq!(resolve_venues(Some(asked.as_slice()), &defaults).unwrap(), vec![VenueId::Kraken, VenueId::Okx]);

        let bogus = vec!["mtgox".to_string()];
        assert_eq!(
            resolve_venues(Some(bogus.as_slice()), &defaults),
            Err(ValidationError::NoVenues { rejected: vec!["mtgox".into()] })
        );
    }

    #[test]
    fn test_quantity_parsing() {
        assert_eq!(parse_quantity("1.25").unwrap(), dec!(1.25));
        assert_eq!(parse_quantity(" 2e-3 ").unwrap(), dec!(0.002));
        for bad in ["0", "-1", "abc", ""] {
            assert!(parse_quantity(bad).is_err(), "{bad} should be rejected");
        }

        assert_eq!(quantity_from_f64(0.5).unwrap(), dec!(0.5));
        for bad in [f64::NAN, f64::INFINITY, 0.0, -3.0] {
            assert!(quantity_from_f64(bad).is_err());
        }
        assert_eq!(QuantityInput::from("3").parse().unwrap(), dec!(3));
        assert_eq!(QuantityInput::from(1.5).parse().unwrap(), dec!(1.5));
    }
}
