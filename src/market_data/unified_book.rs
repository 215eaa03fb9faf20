use std::cmp::Ordering;

use itertools::Itertools;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::analytics::metrics::Metrics;
use crate::error::VenueFailure;
use crate::market_data::types::{BookSide, PriceLevel, VenueBook, VenueId, VenueStatus};

/// Top of one side across all venues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestQuote {
    pub price: Decimal,
    pub quantity: Decimal,
    pub venue: VenueId,
}

impl From<&PriceLevel> for BestQuote {
    fn from(l: &PriceLevel) -> Self {
        Self { price: l.price, quantity: l.quantity, venue: l.venue }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nbbo {
    pub best_bid: Option<BestQuote>,
    pub best_ask: Option<BestQuote>,
    /// Negative when the market is crossed.
    pub spread: Option<Decimal>,
    pub spread_pct: Option<Decimal>,
    pub mid: Option<Decimal>,
    pub computed_at_ms: u64,
}

impl Nbbo {
    fn from_heads(bid: Option<&PriceLevel>, ask: Option<&PriceLevel>, computed_at_ms: u64) -> Self {
        let (spread, mid) = match (bid, ask) {
            (Some(b), Some(a)) => (Some(a.price - b.price), Some((a.price + b.price) / Decimal::TWO)),
            _ => (None, None),
        };
        let spread_pct = match (spread, mid) {
            (Some(s), Some(m)) if !m.is_zero() => Some((s / m * Decimal::ONE_HUNDRED).round_dp(6)),
            _ => None,
        };
        Self {
            best_bid: bid.map(BestQuote::from),
            best_ask: ask.map(BestQuote::from),
            spread,
            spread_pct,
            mid,
            computed_at_ms,
        }
    }

    /// Best bid strictly above best ask.
    pub fn is_crossed(&self) -> bool {
        match (&self.best_bid, &self.best_ask) {
            (Some(b), Some(a)) => b.price > a.price,
            _ => false,
        }
    }
}

/// Per-venue comparison row. Failed venues stay visible with status `down`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeSummary {
    pub venue: VenueId,
    pub status: VenueStatus,
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    pub spread: Option<Decimal>,
    pub spread_pct: Option<Decimal>,
    pub mid: Option<Decimal>,
    pub bid_depth5: Decimal,
    pub ask_depth5: Decimal,
    pub bid_depth10: Decimal,
    pub ask_depth10: Decimal,
    pub bid_liquidity: Decimal,
    pub ask_liquidity: Decimal,
    pub bid_levels: usize,
    pub ask_levels: usize,
    pub fetched_at_ms: Option<u64>,
    pub latency_ms: Option<u64>,
    pub stale: bool,
    pub error: Option<String>,
}

impl ExchangeSummary {
    fn from_book(book: &VenueBook) -> Self {
        let s = &book.stats;
        Self {
            venue: book.venue,
            status: book.status,
            best_bid: s.best_bid,
            best_ask: s.best_ask,
            spread: s.spread,
            spread_pct: s.spread_pct,
            mid: s.mid,
            bid_depth5: s.bid_depth5,
            ask_depth5: s.ask_depth5,
            bid_depth10: s.bid_depth10,
            ask_depth10: s.ask_depth10,
            bid_liquidity: s.bid_notional,
            ask_liquidity: s.ask_notional,
            bid_levels: book.bids.len(),
            ask_levels: book.asks.len(),
            fetched_at_ms: Some(book.fetched_at_ms),
            latency_ms: Some(book.latency_ms),
            stale: book.stale,
            error: None,
        }
    }

    fn from_failure(failure: &VenueFailure) -> Self {
        Self {
            venue: failure.venue,
            status: VenueStatus::Down,
            best_bid: None,
            best_ask: None,
            spread: None,
            spread_pct: None,
            mid: None,
            bid_depth5: Decimal::ZERO,
            ask_depth5: Decimal::ZERO,
            bid_depth10: Decimal::ZERO,
            ask_depth10: Decimal::ZERO,
            bid_liquidity: Decimal::ZERO,
            ask_liquidity: Decimal::ZERO,
            bid_levels: 0,
            ask_levels: 0,
            fetched_at_ms: None,
            latency_ms: None,
            stale: false,
            error: Some(failure.error.to_string()),
        }
    }

    pub fn total_liquidity(&self) -> Decimal {
        self.bid_liquidity.saturating_add(self.ask_liquidity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnavailableVenue {
    pub venue: VenueId,
    pub reason: String,
}

/// Consolidated multi-venue view. Ladders keep one entry per venue level so
/// routing knows who owns which slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedBook {
    pub symbol: String,
    /// Venues that responded and contributed levels.
    pub exchanges: Vec<VenueId>,
    pub unavailable: Vec<UnavailableVenue>,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    pub nbbo: Nbbo,
    pub crossed: bool,
    pub exchange_data: Vec<ExchangeSummary>,
    pub metrics: Metrics,
    pub timestamp_ms: u64,
}

impl AggregatedBook {
    pub fn ladder(&self, side: BookSide) -> &[PriceLevel] {
        match side {
            BookSide::Bid => &self.bids,
            BookSide::Ask => &self.asks,
        }
    }

    /// True when any requested venue is missing or degraded.
    pub fn is_degraded(&self) -> bool {
        !self.unavailable.is_empty()
            || self.exchange_data.iter().any(|row| row.status != VenueStatus::Ok)
    }

    /// Same book with each ladder cut to its best `n` entries.
    pub fn trimmed(&self, n: usize) -> AggregatedBook {
        let mut out = self.clone();
        out.bids.truncate(n);
        out.asks.truncate(n);
        out
    }
}

// Strict "a goes before b" for the k-way merge: better price, then larger
// quantity, then fresher fetch, then venue order.
fn precedes(side: BookSide, a: &(&PriceLevel, u64), b: &(&PriceLevel, u64)) -> bool {
    let (la, fetched_a) = a;
    let (lb, fetched_b) = b;
    let by_price = match side {
        BookSide::Bid => lb.price.cmp(&la.price),
        BookSide::Ask => la.price.cmp(&lb.price),
    };
    by_price
        .then_with(|| lb.quantity.cmp(&la.quantity))
        .then_with(|| fetched_b.cmp(fetched_a))
        .then_with(|| la.venue.cmp(&lb.venue))
        == Ordering::Less
}

/// k-way merge of already-sorted venue ladders into one consolidated ladder.
pub fn merge_side(books: &[VenueBook], side: BookSide) -> Vec<PriceLevel> {
    books
        .iter()
        .map(|book| {
            let levels = match side {
                BookSide::Bid => &book.bids,
                BookSide::Ask => &book.asks,
            };
            levels.iter().map(move |l| (l, book.fetched_at_ms))
        })
        .kmerge_by(|a, b| precedes(side, a, b))
        .map(|(level, _)| level.clone())
        .collect()
}

/// Merge contributing venue books into one `AggregatedBook`. Metrics are left
/// at their default; the engine fills them in.
pub fn consolidate(
    symbol: &str,
    books: &[VenueBook],
    failures: &[VenueFailure],
    computed_at_ms: u64,
) -> AggregatedBook {
    let bids = merge_side(books, BookSide::Bid);
    let asks = merge_side(books, BookSide::Ask);
    let nbbo = Nbbo::from_heads(bids.first(), asks.first(), computed_at_ms);
    let crossed = nbbo.is_crossed();

    let exchange_data = books
        .iter()
        .map(ExchangeSummary::from_book)
        .chain(failures.iter().map(ExchangeSummary::from_failure))
        .collect();

    AggregatedBook {
        symbol: symbol.to_string(),
        exchanges: books.iter().map(|b| b.venue).collect(),
        unavailable: failures
            .iter()
            .map(|f| UnavailableVenue { venue: f.venue, reason: f.error.to_string() })
            .collect(),
        bids,
        asks,
        nbbo,
        crossed,
        exchange_data,
        metrics: Metrics::default(),
        timestamp_ms: computed_at_ms,
    }
}
