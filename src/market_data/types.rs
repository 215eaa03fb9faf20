use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Closed set of venues the engine knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VenueId {
    Binance,
    Coinbase,
    Kraken,
    Bitfinex,
    Bitstamp,
    Okx,
    Bybit,
    Kucoin,
    Huobi,
    Gemini,
    Hyperliquid,
}

impl VenueId {
    pub const ALL: [VenueId; 11] = [
        VenueId::Binance,
        VenueId::Coinbase,
        VenueId::Kraken,
        VenueId::Bitfinex,
        VenueId::Bitstamp,
        VenueId::Okx,
        VenueId::Bybit,
        VenueId::Kucoin,
        VenueId::Huobi,
        VenueId::Gemini,
        VenueId::Hyperliquid,
    ];

    /// Venues queried when the caller does not name any.
    pub const DEFAULT_SET: [VenueId; 5] = [
        VenueId::Binance,
        VenueId::Coinbase,
        VenueId::Kraken,
        VenueId::Okx,
        VenueId::Bybit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VenueId::Binance => "binance",
            VenueId::Coinbase => "coinbase",
            VenueId::Kraken => "kraken",
            VenueId::Bitfinex => "bitfinex",
            VenueId::Bitstamp => "bitstamp",
            VenueId::Okx => "okx",
            VenueId::Bybit => "bybit",
            VenueId::Kucoin => "kucoin",
            VenueId::Huobi => "huobi",
            VenueId::Gemini => "gemini",
            VenueId::Hyperliquid => "hyperliquid",
        }
    }
}

impl fmt::Display for VenueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VenueId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        VenueId::ALL
            .iter()
            .copied()
            .find(|v| v.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ValidationError::UnknownVenue(wanted.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookSide {
    Bid,
    Ask,
}

/// One price/quantity pair, tagged with the venue that quoted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub quantity: Decimal,
    pub venue: VenueId,
}

impl PriceLevel {
    pub fn new(price: Decimal, quantity: Decimal, venue: VenueId) -> Self {
        Self { price, quantity, venue }
    }

    /// Saturates at `Decimal::MAX`; the normaliser rejects levels that would.
    pub fn notional(&self) -> Decimal {
        self.price.saturating_mul(self.quantity)
    }

    pub fn checked_notional(&self) -> Option<Decimal> {
        self.price.checked_mul(self.quantity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VenueStatus {
    Ok,
    Degraded,
    Down,
}

/// A level straight off the wire, before any cleaning.
#[derive(Debug, Clone, PartialEq)]
pub struct RawLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

/// What an adapter hands to the normaliser.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBook {
    pub bids: Vec<RawLevel>,
    pub asks: Vec<RawLevel>,
    /// Venue-reported book time, when the payload carries one.
    pub exchange_ts_ms: Option<u64>,
}

/// Single-venue summary numbers, computed once at normalisation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VenueStats {
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    pub spread: Option<Decimal>,
    pub spread_pct: Option<Decimal>,
    pub mid: Option<Decimal>,
    pub bid_notional: Decimal,
    pub ask_notional: Decimal,
    pub bid_depth5: Decimal,
    pub ask_depth5: Decimal,
    pub bid_depth10: Decimal,
    pub ask_depth10: Decimal,
}

impl VenueStats {
    pub fn from_levels(bids: &[PriceLevel], asks: &[PriceLevel]) -> Self {
        let best_bid = bids.first().map(|l| l.price);
        let best_ask = asks.first().map(|l| l.price);
        let (spread, mid) = match (best_bid, best_ask) {
            (Some(b), Some(a)) => (Some(a - b), Some((a + b) / Decimal::TWO)),
            _ => (None, None),
        };
        let spread_pct = match (spread, mid) {
            (Some(s), Some(m)) if !m.is_zero() => Some((s / m * Decimal::ONE_HUNDRED).round_dp(6)),
            _ => None,
        };

        Self {
            best_bid,
            best_ask,
            spread,
            spread_pct,
            mid,
            bid_notional: notional_of(bids.iter()),
            ask_notional: notional_of(asks.iter()),
            bid_depth5: notional_of(bids.iter().take(5)),
            ask_depth5: notional_of(asks.iter().take(5)),
            bid_depth10: notional_of(bids.iter().take(10)),
            ask_depth10: notional_of(asks.iter().take(10)),
        }
    }

    pub fn total_notional(&self) -> Decimal {
        self.bid_notional + self.ask_notional
    }
}

pub(crate) fn notional_of<'a>(levels: impl Iterator<Item = &'a PriceLevel>) -> Decimal {
    saturating_sum(levels.map(PriceLevel::notional))
}

/// Cross-venue totals can exceed what any single venue was checked against.
pub(crate) fn saturating_sum(values: impl IntoIterator<Item = Decimal>) -> Decimal {
    values.into_iter().fold(Decimal::ZERO, |acc, v| acc.saturating_add(v))
}

/// One venue's cleaned book for a symbol. Bids descending, asks ascending,
/// one level per price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueBook {
    pub symbol: String,
    pub venue: VenueId,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    pub fetched_at_ms: u64,
    pub exchange_ts_ms: Option<u64>,
    pub latency_ms: u64,
    pub stale: bool,
    pub status: VenueStatus,
    pub stats: VenueStats,
}

impl VenueBook {
    /// Builds a book from levels that are already ordered and de-duplicated.
    pub fn from_levels(
        symbol: &str,
        venue: VenueId,
        bids: Vec<PriceLevel>,
        asks: Vec<PriceLevel>,
        fetched_at_ms: u64,
    ) -> Self {
        let stats = VenueStats::from_levels(&bids, &asks);
        Self {
            symbol: symbol.to_string(),
            venue,
            bids,
            asks,
            fetched_at_ms,
            exchange_ts_ms: None,
            latency_ms: 0,
            stale: false,
            status: VenueStatus::Ok,
            stats,
        }
    }
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
