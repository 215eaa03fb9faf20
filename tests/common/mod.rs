#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use lobx_sor::analytics::metrics::MetricsAnalyzer;
use lobx_sor::market_data::adapters::{AdapterRegistry, ExchangeAdapter};
use lobx_sor::market_data::aggregator::{AggregationEngine, EngineSettings};
use lobx_sor::{PriceLevel, VenueBook, VenueError, VenueId};

/// Counts fetches that were started but never ran to completion.
#[derive(Default)]
pub struct Inflight {
    pub started: AtomicUsize,
    pub finished: AtomicUsize,
    pub dropped: AtomicUsize,
}

struct DropGuard<'a> {
    counters: &'a Inflight,
    done: bool,
}

impl Drop for DropGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.counters.dropped.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Adapter that answers with a canned result after an optional delay.
pub struct StaticAdapter {
    venue: VenueId,
    result: Result<VenueBook, VenueError>,
    delay: Duration,
    pub inflight: Arc<Inflight>,
}

impl StaticAdapter {
    pub fn ok(book: VenueBook) -> Self {
        Self {
            venue: book.venue,
            result: Ok(book),
            delay: Duration::ZERO,
            inflight: Arc::default(),
        }
    }

    pub fn failing(venue: VenueId, error: VenueError) -> Self {
        Self { venue, result: Err(error), delay: Duration::ZERO, inflight: Arc::default() }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl ExchangeAdapter for StaticAdapter {
    fn venue(&self) -> VenueId {
        self.venue
    }

    async fn fetch_book(&self, _symbol: &str, _depth: u32) -> Result<VenueBook, VenueError> {
        self.inflight.started.fetch_add(1, Ordering::SeqCst);
        let mut guard = DropGuard { counters: &self.inflight, done: false };
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        guard.done = true;
        self.inflight.finished.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

pub fn levels(venue: VenueId, rows: &[(Decimal, Decimal)]) -> Vec<PriceLevel> {
    rows.iter().map(|&(p, q)| PriceLevel::new(p, q, venue)).collect()
}

pub fn venue_book(venue: VenueId, bids: &[(Decimal, Decimal)], asks: &[(Decimal, Decimal)]) -> VenueBook {
    VenueBook::from_levels("BTC", venue, levels(venue, bids), levels(venue, asks), 1_000)
}

pub fn engine_with(adapters: Vec<Arc<dyn ExchangeAdapter>>, fetch_timeout: Duration) -> AggregationEngine {
    let registry = adapters
        .into_iter()
        .fold(AdapterRegistry::empty(), |reg, a| reg.with(a));
    AggregationEngine::new(
        registry,
        EngineSettings { fetch_timeout, depth: 50 },
        MetricsAnalyzer::default(),
    )
}
