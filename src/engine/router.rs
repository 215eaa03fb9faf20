// Greedy best-price-first walk of the consolidated ladder.

use rust_decimal::Decimal;
use tracing::{debug, instrument, warn};

use crate::engine::types::{Baseline, RouteFill, RouteRecommendation, Side, VenueAllocation};
use crate::error::{RouteError, ValidationError};
use crate::market_data::types::{now_ms, saturating_sum, PriceLevel, VenueId};
use crate::market_data::unified_book::AggregatedBook;

const BPS: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

#[derive(Debug, Clone)]
pub struct RouterSettings {
    pub taker_fee_bps: Decimal,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self { taker_fee_bps: Decimal::TEN }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SmartRouter {
    settings: RouterSettings,
}

// Raw result of walking some levels
struct Walk {
    fills: Vec<(VenueId, Decimal, Decimal)>,
    remaining: Decimal,
}

impl Walk {
    fn filled(&self, requested: Decimal) -> Decimal {
        requested - self.remaining
    }

    fn cost(&self) -> Decimal {
        saturating_sum(self.fills.iter().map(|(_, px, qty)| px.saturating_mul(*qty)))
    }
}

impl SmartRouter {
    pub fn new(settings: RouterSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &RouterSettings {
        &self.settings
    }

    /// Split `quantity` across venues, best price first. Running out of
    /// ladder is reported through `unfilled_quantity`, not as an error.
    #[instrument(level = "debug", skip(self, book), fields(symbol = %book.symbol))]
    pub fn route(&self, book: &AggregatedBook, side: Side, quantity: Decimal) -> Result<RouteRecommendation, RouteError> {
        if quantity <= Decimal::ZERO {
            return Err(ValidationError::InvalidQuantity(quantity.to_string()).into());
        }

        let ladder = book.ladder(side.book_side());
        let walk = walk_levels(ladder, quantity);
        let filled = walk.filled(quantity);
        let total_cost = walk.cost();
        let avg_price = average(total_cost, filled);

        let fills: Vec<RouteFill> = walk
            .fills
            .iter()
            .map(|&(venue, price, qty)| RouteFill {
                venue,
                price,
                quantity: qty,
                notional: price.saturating_mul(qty),
                pct_of_order: share(qty, quantity),
            })
            .collect();
        let allocations = allocate(&fills, quantity);

        let touch = ladder.first();
        let touch_price = touch.map(|l| l.price);
        let slippage_pct = match (avg_price, touch_price) {
            (Some(avg), Some(touch)) => side
                .price_gain(avg, touch)
                .checked_div(touch)
                .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
                .map(|pct| pct.round_dp(6)),
            _ => None,
        };

        // the touch venue walked on its own
        let baseline_venue = touch.map(|l| l.venue);
        let own_levels: Vec<PriceLevel> = ladder
            .iter()
            .filter(|l| Some(l.venue) == baseline_venue)
            .cloned()
            .collect();
        let base_walk = walk_levels(&own_levels, quantity);
        let base_cost = base_walk.cost();
        let baseline = Baseline {
            venue: baseline_venue,
            filled_quantity: base_walk.filled(quantity),
            unfilled_quantity: base_walk.remaining,
            avg_price: average(base_cost, base_walk.filled(quantity)),
            total_cost: base_cost,
        };

        let improvement = avg_price
            .zip(baseline.avg_price)
            .map(|(route, base)| side.price_gain(base, route));
        let savings = improvement.map(|per_unit| per_unit.saturating_mul(filled).round_dp(8));
        let savings_bps = improvement
            .zip(baseline.avg_price)
            .and_then(|(per_unit, base)| per_unit.checked_div(base))
            .and_then(|ratio| ratio.checked_mul(BPS))
            .map(|bps| bps.round_dp(2));

        if !walk.remaining.is_zero() {
            warn!(%side, requested = %quantity, unfilled = %walk.remaining, "insufficient aggregate liquidity");
        }
        debug!(%side, fills = fills.len(), venues = allocations.len(), avg = ?avg_price, "route computed");

        Ok(RouteRecommendation {
            symbol: book.symbol.clone(),
            side,
            requested_quantity: quantity,
            filled_quantity: filled,
            unfilled_quantity: walk.remaining,
            fills,
            allocations,
            avg_price,
            total_cost,
            touch_price,
            slippage_pct,
            estimated_fees: total_cost.saturating_mul(self.settings.taker_fee_bps / BPS).round_dp(8),
            baseline,
            savings,
            savings_bps,
            computed_at_ms: now_ms(),
        })
    }
}

// Take from each level in order until the quantity is gone.
fn walk_levels(levels: &[PriceLevel], quantity: Decimal) -> Walk {
    let mut remaining = quantity;
    let mut fills = Vec::new();
    for level in levels {
        if remaining.is_zero() {
            break;
        }
        let take = remaining.min(level.quantity);
        if take <= Decimal::ZERO {
            continue;
        }
        remaining -= take;
        fills.push((level.venue, level.price, take));
    }
    Walk { fills, remaining }
}

/// Result of spending a fixed quote-currency budget down one ladder.
#[derive(Debug, Clone, PartialEq)]
pub struct NotionalWalk {
    pub spent: Decimal,
    pub quantity: Decimal,
    /// Budget left when the ladder ran out; zero for a complete walk.
    pub unspent: Decimal,
}

impl NotionalWalk {
    pub fn avg_price(&self) -> Option<Decimal> {
        average(self.spent, self.quantity)
    }

    pub fn is_complete(&self) -> bool {
        self.unspent.is_zero()
    }
}

/// Take whole levels while they fit the budget, then a partial slice of the next.
pub fn walk_notional(levels: &[PriceLevel], budget: Decimal) -> NotionalWalk {
    let mut unspent = budget.max(Decimal::ZERO);
    let mut spent = Decimal::ZERO;
    let mut quantity = Decimal::ZERO;
    for level in levels {
        if unspent.is_zero() {
            break;
        }
        let level_notional = level.notional();
        let (take, cost) = if level_notional <= unspent {
            (level.quantity, level_notional)
        } else {
            match unspent.checked_div(level.price) {
                Some(q) => (q, unspent),
                None => break,
            }
        };
        if take <= Decimal::ZERO {
            continue;
        }
        quantity = quantity.saturating_add(take);
        spent += cost;
        unspent -= cost;
    }
    NotionalWalk { spent, quantity, unspent }
}

fn average(cost: Decimal, quantity: Decimal) -> Option<Decimal> {
    cost.checked_div(quantity)
}

fn share(part: Decimal, whole: Decimal) -> Decimal {
    (part / whole * Decimal::ONE_HUNDRED).round_dp(4)
}

// Venue totals in order of first fill.
fn allocate(fills: &[RouteFill], requested: Decimal) -> Vec<VenueAllocation> {
    let mut out: Vec<VenueAllocation> = Vec::new();
    for fill in fills {
        match out.iter_mut().find(|a| a.venue == fill.venue) {
            Some(a) => {
                a.quantity += fill.quantity;
                a.notional = a.notional.saturating_add(fill.notional);
                a.fills += 1;
            }
            None => out.push(VenueAllocation {
                venue: fill.venue,
                quantity: fill.quantity,
                notional: fill.notional,
                avg_price: Decimal::ZERO,
                pct_of_order: Decimal::ZERO,
                fills: 1,
            }),
        }
    }
    for a in &mut out {
        a.avg_price = average(a.notional, a.quantity).unwrap_or_default();
        a.pct_of_order = share(a.quantity, requested);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::types::{BookSide, VenueBook};
    use crate::market_data::unified_book::consolidate;
    use rust_decimal_macros::dec;

    fn btc_book() -> AggregatedBook {
        let a = VenueBook::from_levels(
            "BTC",
            VenueId::Binance,
            vec![
                PriceLevel::new(dec!(64990.0), dec!(0.4), VenueId::Binance),
                PriceLevel::new(dec!(64980.0), dec!(2.0), VenueId::Binance),
            ],
            vec![
                PriceLevel::new(dec!(65000.0), dec!(0.5), VenueId::Binance),
                PriceLevel::new(dec!(65010.0), dec!(1.0), VenueId::Binance),
            ],
            1,
        );
        let b = VenueBook::from_levels(
            "BTC",
            VenueId::Coinbase,
            vec![PriceLevel::new(dec!(64995.0), dec!(0.2), VenueId::Coinbase)],
            vec![PriceLevel::new(dec!(65005.0), dec!(0.3), VenueId::Coinbase)],
            1,
        );
        consolidate("BTC", &[a, b], &[], 1)
    }

    #[test]
    fn test_buy_splits_across_venues() {
        let rec = SmartRouter::default().route(&btc_book(), Side::Buy, dec!(1.0)).unwrap();

        let fills: Vec<_> = rec.fills.iter().map(|f| (f.venue, f.price, f.quantity)).collect();
        assert_eq!(
            fills,
            vec![
                (VenueId::Binance, dec!(65000.0), dec!(0.5)),
                (VenueId::Coinbase, dec!(65005.0), dec!(0.3)),
                (VenueId::Binance, dec!(65010.0), dec!(0.2)),
            ]
        );
        assert_eq!(rec.avg_price, Some(dec!(65003.5)));
        assert_eq!(rec.total_cost, dec!(65003.5));
        assert!(rec.is_complete());
        assert_eq!(rec.filled_quantity, dec!(1.0));
        assert_eq!(rec.touch_price, Some(dec!(65000)));
        assert_eq!(rec.slippage_pct, Some(dec!(0.005385)));
        assert_eq!(rec.estimated_fees, dec!(65.0035));

        assert_eq!(rec.allocations.len(), 2);
        assert_eq!(rec.allocations[0].venue, VenueId::Binance);
        assert_eq!(rec.allocations[0].quantity, dec!(0.7));
        assert_eq!(rec.allocations[0].fills, 2);
        assert_eq!(rec.allocations[1].pct_of_order, dec!(30));
    }

    #[test]
    fn test_baseline_and_savings() {
        let rec = SmartRouter::default().route(&btc_book(), Side::Buy, dec!(1.0)).unwrap();
        // binance alone: 0.5@65000 + 0.5@65010
        assert_eq!(rec.baseline.venue, Some(VenueId::Binance));
        assert_eq!(rec.baseline.avg_price, Some(dec!(65005)));
        assert!(rec.baseline.unfilled_quantity.is_zero());
        assert_eq!(rec.savings, Some(dec!(1.5)));
        assert_eq!(rec.savings_bps, Some(dec!(0.23)));
    }

    #[test]
    fn test_sell_walks_bids_downward() {
        let rec = SmartRouter::default().route(&btc_book(), Side::Sell, dec!(1)).unwrap();
        let prices: Vec<_> = rec.fills.iter().map(|f| f.price).collect();
        assert_eq!(prices, vec![dec!(64995), dec!(64990), dec!(64980)]);
        assert_eq!(rec.fills[2].quantity, dec!(0.4));
        assert_eq!(rec.baseline.venue, Some(VenueId::Coinbase));
        // coinbase alone only has 0.2
        assert_eq!(rec.baseline.unfilled_quantity, dec!(0.8));
    }

    #[test]
    fn test_partial_fill_reports_unfilled() {
        let rec = SmartRouter::default().route(&btc_book(), Side::Buy, dec!(2.5)).unwrap();
        assert_eq!(rec.filled_quantity, dec!(1.8));
        assert_eq!(rec.unfilled_quantity, dec!(0.7));
        assert!(!rec.is_complete());
    }

    #[test]
    fn test_empty_side_is_all_unfilled() {
        let only_bids = VenueBook::from_levels(
            "BTC",
            VenueId::Kraken,
            vec![PriceLevel::new(dec!(1), dec!(1), VenueId::Kraken)],
            vec![],
            1,
        );
        let book = consolidate("BTC", &[only_bids], &[], 1);
        let rec = SmartRouter::default().route(&book, Side::Buy, dec!(3)).unwrap();
        assert!(rec.fills.is_empty());
        assert_eq!(rec.unfilled_quantity, dec!(3));
        assert_eq!(rec.avg_price, None);
        assert_eq!(rec.baseline.venue, None);
        assert_eq!(rec.savings, None);
    }

    #[test]
    fn test_rejects_non_positive_quantity() {
        let router = SmartRouter::default();
        for q in [dec!(0), dec!(-1)] {
            assert!(matches!(
                router.route(&btc_book(), Side::Buy, q),
                Err(RouteError::Validation(ValidationError::InvalidQuantity(_)))
            ));
        }
    }

    #[test]
    fn test_notional_walk_spends_budget_across_levels() {
        let book = btc_book();
        // asks: 65000 x 0.5 (binance), 65005 x 0.3 (coinbase), 65010 x 1.0 (binance)
        let walk = walk_notional(book.ladder(BookSide::Ask), dec!(52001.5));
        assert!(walk.is_complete());
        assert_eq!(walk.spent, dec!(52001.5));
        assert_eq!(walk.quantity, dec!(0.8));
        assert_eq!(walk.avg_price(), Some(dec!(65001.875)));

        let thin = walk_notional(&book.ladder(BookSide::Ask)[..1], dec!(100000));
        assert!(!thin.is_complete());
        assert_eq!(thin.spent, dec!(32500));
        assert_eq!(thin.unspent, dec!(67500));

        let none = walk_notional(&[], dec!(1000));
        assert_eq!(none.avg_price(), None);
    }

    #[test]
    fn test_side_parsing() {
        assert_eq!("BUY".parse::<Side>().unwrap(), Side::Buy);
        assert_eq!(" sell".parse::<Side>().unwrap(), Side::Sell);
        assert!("hold".parse::<Side>().is_err());
        assert!("bid".parse::<Side>().is_err());
        assert!("ask".parse::<Side>().is_err());
        assert_eq!(Side::Buy.price_gain(dec!(10), dec!(9)), dec!(1));
        assert_eq!(Side::Sell.price_gain(dec!(10), dec!(9)), dec!(-1));
    }
}
