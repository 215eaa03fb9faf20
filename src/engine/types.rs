use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::market_data::types::{BookSide, VenueId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The ladder a taker on this side consumes.
    pub fn book_side(self) -> BookSide {
        match self {
            Side::Buy => BookSide::Ask,
            Side::Sell => BookSide::Bid,
        }
    }

    /// How much better `achieved` is than `reference` for this taker, per
    /// unit. Negative when it is worse.
    pub fn price_gain(self, reference: Decimal, achieved: Decimal) -> Decimal {
        match self {
            Side::Buy => reference - achieved,
            Side::Sell => achieved - reference,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        })
    }
}

impl FromStr for Side {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            other => Err(ValidationError::UnknownSide(other.to_string())),
        }
    }
}

// One slice taken from one venue level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteFill {
    pub venue: VenueId,
    pub price: Decimal,
    pub quantity: Decimal,
    pub notional: Decimal,
    pub pct_of_order: Decimal,
}

// Per-venue totals across fills
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueAllocation {
    pub venue: VenueId,
    pub quantity: Decimal,
    pub notional: Decimal,
    pub avg_price: Decimal,
    pub pct_of_order: Decimal,
    pub fills: usize,
}

/// The whole order sent to the venue that owns the touch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Baseline {
    pub venue: Option<VenueId>,
    pub filled_quantity: Decimal,
    pub unfilled_quantity: Decimal,
    pub avg_price: Option<Decimal>,
    pub total_cost: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRecommendation {
    pub symbol: String,
    pub side: Side,
    pub requested_quantity: Decimal,
    pub filled_quantity: Decimal,
    /// Non-zero when the consolidated ladder ran out first.
    pub unfilled_quantity: Decimal,
    pub fills: Vec<RouteFill>,
    pub allocations: Vec<VenueAllocation>,
    pub avg_price: Option<Decimal>,
    pub total_cost: Decimal,
    /// NBBO touch on the walked side.
    pub touch_price: Option<Decimal>,
    pub slippage_pct: Option<Decimal>,
    pub estimated_fees: Decimal,
    pub baseline: Baseline,
    /// Positive when the split beats the baseline.
    pub savings: Option<Decimal>,
    pub savings_bps: Option<Decimal>,
    pub computed_at_ms: u64,
}

impl RouteRecommendation {
    pub fn is_complete(&self) -> bool {
        self.unfilled_quantity.is_zero()
    }
}
