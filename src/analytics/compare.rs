use std::cmp::Ordering;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::market_data::types::{VenueId, VenueStatus};
use crate::market_data::unified_book::{AggregatedBook, ExchangeSummary, UnavailableVenue};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueRanking {
    pub rank: usize,
    pub venue: VenueId,
    pub status: VenueStatus,
    pub spread: Option<Decimal>,
    pub spread_pct: Option<Decimal>,
    pub total_liquidity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeComparison {
    pub symbol: String,
    /// Tightest relative spread first.
    pub by_spread: Vec<VenueRanking>,
    /// Deepest total notional first.
    pub by_liquidity: Vec<VenueRanking>,
    pub unavailable: Vec<UnavailableVenue>,
    pub timestamp_ms: u64,
}

/// Rank contributing venues. Venues without a two-sided quote sort last in
/// both rankings; ties fall back to venue order.
pub fn compare_exchanges(book: &AggregatedBook) -> ExchangeComparison {
    let rows: Vec<&ExchangeSummary> = book
        .exchange_data
        .iter()
        .filter(|row| row.status != VenueStatus::Down)
        .collect();

    let mut by_spread = rows.clone();
    by_spread.sort_by(|a, b| {
        quoted_last(a, b)
            .then_with(|| a.spread_pct.cmp(&b.spread_pct))
            .then(a.venue.cmp(&b.venue))
    });

    let mut by_liquidity = rows;
    by_liquidity.sort_by(|a, b| {
        quoted_last(a, b)
            .then_with(|| b.total_liquidity().cmp(&a.total_liquidity()))
            .then(a.venue.cmp(&b.venue))
    });

    ExchangeComparison {
        symbol: book.symbol.clone(),
        by_spread: ranked(&by_spread),
        by_liquidity: ranked(&by_liquidity),
        unavailable: book.unavailable.clone(),
        timestamp_ms: book.timestamp_ms,
    }
}

fn quoted_last(a: &ExchangeSummary, b: &ExchangeSummary) -> Ordering {
    a.spread.is_none().cmp(&b.spread.is_none())
}

fn ranked(rows: &[&ExchangeSummary]) -> Vec<VenueRanking> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| VenueRanking {
            rank: i + 1,
            venue: row.venue,
            status: row.status,
            spread: row.spread,
            spread_pct: row.spread_pct,
            total_liquidity: row.total_liquidity(),
        })
        .collect()
}
