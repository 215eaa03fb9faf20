// Fan-out/fan-in over the adapter registry, then merge.

use std::future::Future;
use std::time::{Duration, Instant};

use futures::future::join_all;
use itertools::Itertools;
use tracing::{debug, info, instrument, warn};

use crate::analytics::metrics::MetricsAnalyzer;
use crate::error::{AggregationError, ValidationError, VenueError, VenueFailure};
use crate::market_data::adapters::{AdapterRegistry, MAX_REQUEST_DEPTH};
use crate::market_data::types::{now_ms, VenueBook, VenueId};
use crate::market_data::unified_book::{consolidate, AggregatedBook};

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Upper bound on any single venue call, on top of the adapter's own timeout.
    pub fetch_timeout: Duration,
    /// Levels requested per side from each venue.
    pub depth: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self { fetch_timeout: Duration::from_millis(5_000), depth: 100 }
    }
}

pub struct AggregationEngine {
    registry: AdapterRegistry,
    settings: EngineSettings,
    analyzer: MetricsAnalyzer,
}

impl AggregationEngine {
    pub fn new(registry: AdapterRegistry, settings: EngineSettings, analyzer: MetricsAnalyzer) -> Self {
        Self { registry, settings, analyzer }
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn analyzer(&self) -> &MetricsAnalyzer {
        &self.analyzer
    }

    /// Aggregate `symbol` across `venues`. Succeeds as long as one venue answers.
    #[instrument(skip(self, venues), fields(venues = venues.len()))]
    pub async fn aggregate(&self, symbol: &str, venues: &[VenueId]) -> Result<AggregatedBook, AggregationError> {
        self.aggregate_until(symbol, venues, std::future::pending::<()>()).await
    }

    /// Like `aggregate`, but gives up as soon as `cancel` resolves. Every
    /// in-flight venue request is dropped with the fan-in future.
    pub async fn aggregate_until<C>(
        &self,
        symbol: &str,
        venues: &[VenueId],
        cancel: C,
    ) -> Result<AggregatedBook, AggregationError>
    where
        C: Future<Output = ()>,
    {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(ValidationError::EmptySymbol.into());
        }
        let venues: Vec<VenueId> = venues.iter().copied().unique().collect();
        if venues.is_empty() {
            return Err(ValidationError::NoVenues { rejected: Vec::new() }.into());
        }

        let started = Instant::now();
        let outcomes = tokio::select! {
            biased;
            _ = cancel => {
                warn!(symbol, "aggregation cancelled, dropping in-flight venue requests");
                metrics::counter!("lobx_aggregations_total", "outcome" => "cancelled").increment(1);
                return Err(AggregationError::Cancelled);
            }
            outcomes = self.fetch_all(symbol, &venues) => outcomes,
        };

        let (books, failures): (Vec<VenueBook>, Vec<VenueFailure>) = outcomes
            .into_iter()
            .partition_map(|(venue, outcome)| match outcome {
                Ok(book) => itertools::Either::Left(book),
                Err(error) => itertools::Either::Right(VenueFailure { venue, error }),
            });

        if books.is_empty() {
            warn!(symbol, failed = failures.len(), "every venue failed");
            metrics::counter!("lobx_aggregations_total", "outcome" => "no_liquidity").increment(1);
            return Err(AggregationError::NoLiquidityAvailable { symbol: symbol.to_string(), failures });
        }

        let mut book = consolidate(symbol, &books, &failures, now_ms());
        book.metrics = self.analyzer.analyze(&book);

        if book.crossed {
            warn!(symbol, bid = ?book.nbbo.best_bid, ask = ?book.nbbo.best_ask, "consolidated book is crossed");
        }
        let outcome = if failures.is_empty() { "complete" } else { "partial" };
        metrics::counter!("lobx_aggregations_total", "outcome" => outcome).increment(1);
        info!(
            symbol,
            ok = books.len(),
            failed = failures.len(),
            bids = book.bids.len(),
            asks = book.asks.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "aggregated"
        );
        Ok(book)
    }

    /// One venue's normalised book, under the same timeout as a fan-out.
    #[instrument(skip(self))]
    pub async fn fetch_single(&self, venue: VenueId, symbol: &str, depth: u32) -> Result<VenueBook, VenueError> {
        if depth == 0 || depth > MAX_REQUEST_DEPTH {
            return Err(VenueError::InvalidDepth(depth));
        }
        self.fetch_bounded(venue, symbol.trim(), depth).await
    }

    // Futures are joined in place, not spawned, so dropping this future
    // cancels every request it owns. Output order follows `venues`.
    async fn fetch_all(&self, symbol: &str, venues: &[VenueId]) -> Vec<(VenueId, Result<VenueBook, VenueError>)> {
        let depth = self.settings.depth;
        join_all(venues.iter().map(|&venue| async move {
            (venue, self.fetch_bounded(venue, symbol, depth).await)
        }))
        .await
    }

    async fn fetch_bounded(&self, venue: VenueId, symbol: &str, depth: u32) -> Result<VenueBook, VenueError> {
        let started = Instant::now();
        let outcome = match self.registry.get(venue) {
            None => Err(VenueError::NotRegistered),
            Some(adapter) => tokio::time::timeout(self.settings.fetch_timeout, adapter.fetch_book(symbol, depth))
                .await
                .unwrap_or(Err(VenueError::Timeout(self.settings.fetch_timeout))),
        };

        let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;
        metrics::histogram!("lobx_venue_fetch_latency_ms", "venue" => venue.as_str()).record(elapsed_ms);
        match &outcome {
            Ok(book) => {
                metrics::counter!("lobx_venue_fetch_total", "venue" => venue.as_str(), "outcome" => "ok").increment(1);
                debug!(%venue, status = ?book.status, stale = book.stale, "venue ok");
            }
            Err(err) => {
                metrics::counter!("lobx_venue_fetch_total", "venue" => venue.as_str(), "outcome" => err.kind())
                    .increment(1);
                warn!(%venue, error = %err, "venue fetch failed");
            }
        }
        outcome
    }
}
