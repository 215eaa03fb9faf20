// Convert wire strings/numbers into decimals and raw venue books into
// clean, sorted `VenueBook`s.

use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::VenueError;
use crate::market_data::types::{
    BookSide, PriceLevel, RawBook, RawLevel, VenueBook, VenueId, VenueStatus,
};

/// Parse a decimal as venues print it: plain ("65000.10") or scientific ("1e-5").
pub fn parse_decimal(s: &str) -> Result<Decimal, VenueError> {
    let s = s.trim();
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .map_err(|_| VenueError::Malformed(format!("not a decimal: `{}`", s)))
}

/// Accept either a JSON string or a JSON number.
pub fn decimal_from_value(v: &Value) -> Result<Decimal, VenueError> {
    match v {
        Value::String(s) => parse_decimal(s),
        // Number's Display is the shortest round-trip form, so no float noise.
        Value::Number(n) => parse_decimal(&n.to_string()),
        other => Err(VenueError::Malformed(format!("expected a number, got {}", other))),
    }
}

/// `[[price, qty, ...], ...]` in any mix of strings and numbers; extra
/// columns (order counts, timestamps) are ignored.
pub fn parse_value_levels(levels: &[Vec<Value>]) -> Result<Vec<RawLevel>, VenueError> {
    levels
        .iter()
        .map(|row| match row.as_slice() {
            [px, sz, ..] => Ok(RawLevel {
                price: decimal_from_value(px)?,
                quantity: decimal_from_value(sz)?,
            }),
            _ => Err(VenueError::Malformed(format!("level has {} column(s)", row.len()))),
        })
        .collect()
}

pub fn level_from_strs(px: &str, sz: &str) -> Result<RawLevel, VenueError> {
    Ok(RawLevel { price: parse_decimal(px)?, quantity: parse_decimal(sz)? })
}

/// Largest price or quantity accepted from a venue (1e20).
pub const MAX_WIRE_MAGNITUDE: Decimal = Decimal::from_parts(0x6310_0000, 0x6BC7_5E2D, 0x5, false, 0);

#[derive(Debug, Clone)]
pub struct Normaliser {
    /// Below this many levels on either side the venue is reported degraded.
    pub min_healthy_levels: usize,
    /// Venue timestamps older than this at fetch time mark the book stale.
    pub stale_after_ms: u64,
}

impl Default for Normaliser {
    fn default() -> Self {
        Self { min_healthy_levels: 5, stale_after_ms: 5_000 }
    }
}

impl Normaliser {
    pub fn new(min_healthy_levels: usize, stale_after_ms: u64) -> Self {
        Self { min_healthy_levels, stale_after_ms }
    }

    /// Clean one venue's raw book. Only a book with nothing usable on either
    /// side is an error; thin or old books come back `Degraded`.
    pub fn normalise(
        &self,
        venue: VenueId,
        symbol: &str,
        raw: RawBook,
        depth: usize,
        fetched_at_ms: u64,
    ) -> Result<VenueBook, VenueError> {
        let raw_bid_count = raw.bids.len();
        let raw_ask_count = raw.asks.len();

        let bids = Self::clean_side(raw.bids, BookSide::Bid, venue, depth)?;
        let asks = Self::clean_side(raw.asks, BookSide::Ask, venue, depth)?;

        if bids.is_empty() && asks.is_empty() {
            debug!(%venue, symbol, raw_bid_count, raw_ask_count, "nothing left after cleaning");
            return Err(VenueError::EmptyBook);
        }

        let stale = match raw.exchange_ts_ms {
            Some(ts) => fetched_at_ms.saturating_sub(ts) > self.stale_after_ms,
            None => false,
        };
        let thin = bids.len() < self.min_healthy_levels || asks.len() < self.min_healthy_levels;

        let mut book = VenueBook::from_levels(symbol, venue, bids, asks, fetched_at_ms);
        book.exchange_ts_ms = raw.exchange_ts_ms;
        book.stale = stale;
        book.status = if stale || thin { VenueStatus::Degraded } else { VenueStatus::Ok };

        trace!(
            %venue,
            bids = book.bids.len(),
            asks = book.asks.len(),
            dropped = raw_bid_count + raw_ask_count - book.bids.len() - book.asks.len(),
            status = ?book.status,
            "normalised venue book"
        );
        Ok(book)
    }

    // Drop non-positive levels, merge duplicates, best price first, cap depth.
    // Numbers no decimal arithmetic can carry make the whole book malformed.
    fn clean_side(
        levels: Vec<RawLevel>,
        side: BookSide,
        venue: VenueId,
        depth: usize,
    ) -> Result<Vec<PriceLevel>, VenueError> {
        let mut by_price: BTreeMap<Decimal, Decimal> = BTreeMap::new();
        for lvl in levels {
            if lvl.price <= Decimal::ZERO || lvl.quantity <= Decimal::ZERO {
                continue;
            }
            if lvl.price > MAX_WIRE_MAGNITUDE || lvl.quantity > MAX_WIRE_MAGNITUDE {
                return Err(VenueError::Malformed(format!(
                    "{:?} level out of range: {} x {}",
                    side, lvl.price, lvl.quantity
                )));
            }
            let qty = by_price.entry(lvl.price.normalize()).or_default();
            *qty = qty
                .checked_add(lvl.quantity)
                .filter(|q| *q <= MAX_WIRE_MAGNITUDE)
                .ok_or_else(|| VenueError::Malformed(format!("{:?} quantity overflows at {}", side, lvl.price)))?;
        }

        let to_level = |(p, q): (Decimal, Decimal)| PriceLevel::new(p, q, venue);
        let cleaned: Vec<PriceLevel> = match side {
            BookSide::Bid => by_price.into_iter().rev().take(depth).map(to_level).collect(),
            BookSide::Ask => by_price.into_iter().take(depth).map(to_level).collect(),
        };

        cleaned
            .iter()
            .try_fold(Decimal::ZERO, |acc, l| l.checked_notional().and_then(|n| acc.checked_add(n)))
            .ok_or_else(|| VenueError::Malformed(format!("{:?} notional overflows", side)))?;
        Ok(cleaned)
    }
}
