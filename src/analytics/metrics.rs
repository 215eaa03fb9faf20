//! Whale, wall and liquidity signals derived from an aggregated book.
//!
//! Everything here is a pure function of the book it is handed.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::engine::router::walk_notional;
use crate::engine::types::Side;
use crate::market_data::types::{notional_of, saturating_sum, BookSide, PriceLevel, VenueId, VenueStatus};
use crate::market_data::unified_book::AggregatedBook;

#[derive(Debug, Clone)]
pub struct AnalyzerSettings {
    /// A level is a whale at this multiple of its side's median quantity.
    pub whale_multiplier: Decimal,
    pub max_whales: usize,
    /// Width of a wall run, in percent of the run's first price.
    pub wall_band_pct: Decimal,
    /// Absolute wall threshold; falls back to a median multiple when unset.
    pub wall_min_quantity: Option<Decimal>,
    pub wall_median_multiplier: Decimal,
    /// Quote-currency order sizes priced by walking each side.
    pub notional_sizes: Vec<Decimal>,
    /// Average 1% liquidity that earns a depth score of 100.
    pub full_depth_notional: Decimal,
    /// Cross-venue gaps narrower than this (percent of the buy price) are ignored.
    pub arbitrage_min_spread_pct: Decimal,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            whale_multiplier: Decimal::from(5),
            max_whales: 10,
            wall_band_pct: Decimal::new(1, 1),
            wall_min_quantity: None,
            wall_median_multiplier: Decimal::TEN,
            notional_sizes: vec![Decimal::from(1_000), Decimal::from(10_000), Decimal::from(100_000)],
            full_depth_notional: Decimal::from(1_000_000),
            arbitrage_min_spread_pct: Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhaleOrder {
    pub side: BookSide,
    pub venue: VenueId,
    pub price: Decimal,
    pub quantity: Decimal,
    pub notional: Decimal,
    /// Quantity over the side median.
    pub size_multiple: Decimal,
    pub pct_of_side: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WallStrength {
    Weak,
    Moderate,
    Strong,
}

impl WallStrength {
    fn from_ratio(ratio: Decimal) -> Self {
        if ratio >= Decimal::from(4) {
            WallStrength::Strong
        } else if ratio >= Decimal::TWO {
            WallStrength::Moderate
        } else {
            WallStrength::Weak
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceWall {
    pub side: BookSide,
    pub price_start: Decimal,
    pub price_end: Decimal,
    pub total_quantity: Decimal,
    pub total_notional: Decimal,
    pub level_count: usize,
    pub venues: Vec<VenueId>,
    pub strength: WallStrength,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueShare {
    pub venue: VenueId,
    pub bid_liquidity: Decimal,
    pub ask_liquidity: Decimal,
    pub share_pct: Decimal,
}

/// Price of a fixed quote-currency order walked down one side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotionalFill {
    pub side: Side,
    pub notional: Decimal,
    /// Volume-weighted fill price; absent when the side is empty.
    pub vwap: Option<Decimal>,
    pub quantity: Decimal,
    pub filled_notional: Decimal,
    /// Adverse distance of the VWAP from the NBBO mid, in percent.
    pub slippage_pct: Option<Decimal>,
    pub complete: bool,
}

/// Best ask on one venue below the best bid on another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrageOpportunity {
    pub buy_venue: VenueId,
    pub sell_venue: VenueId,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    pub spread: Decimal,
    /// Spread over the buy price, in percent.
    pub spread_pct: Decimal,
    /// Smaller of the two top-of-book quantities.
    pub quantity: Decimal,
}

/// Spread dispersion across the contributing venues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadStats {
    pub venues: usize,
    pub average: Decimal,
    pub min: Decimal,
    pub max: Decimal,
    pub std_dev: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub whale_orders: Vec<WhaleOrder>,
    pub price_walls: Vec<PriceWall>,
    pub total_bid_liquidity: Decimal,
    pub total_ask_liquidity: Decimal,
    /// (bid - ask) / (bid + ask); absent for an empty book.
    pub imbalance: Option<Decimal>,
    pub bid_liquidity_1pct: Decimal,
    pub ask_liquidity_1pct: Decimal,
    pub bid_liquidity_2pct: Decimal,
    pub ask_liquidity_2pct: Decimal,
    pub venue_shares: Vec<VenueShare>,
    pub spread_stats: Option<SpreadStats>,
    /// 0 to 100, scaled by average liquidity within 1% of mid.
    #[serde(default)]
    pub depth_score: Decimal,
    #[serde(default)]
    pub notional_fills: Vec<NotionalFill>,
    #[serde(default)]
    pub arbitrage: Vec<ArbitrageOpportunity>,
}

#[derive(Debug, Clone, Default)]
pub struct MetricsAnalyzer {
    settings: AnalyzerSettings,
}

impl MetricsAnalyzer {
    pub fn new(settings: AnalyzerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    pub fn analyze(&self, book: &AggregatedBook) -> Metrics {
        let total_bid_liquidity = notional_of(book.bids.iter());
        let total_ask_liquidity = notional_of(book.asks.iter());
        let total = total_bid_liquidity.saturating_add(total_ask_liquidity);
        let imbalance = (!total.is_zero())
            .then(|| ((total_bid_liquidity - total_ask_liquidity) / total).round_dp(6));

        let mid = book.nbbo.mid;
        let mut whale_orders = self.whales(&book.bids, BookSide::Bid, total_bid_liquidity);
        whale_orders.extend(self.whales(&book.asks, BookSide::Ask, total_ask_liquidity));
        whale_orders.sort_by(|a, b| b.notional.cmp(&a.notional));
        whale_orders.truncate(self.settings.max_whales);

        let mut price_walls = self.walls(&book.bids, BookSide::Bid);
        price_walls.extend(self.walls(&book.asks, BookSide::Ask));

        let bid_liquidity_1pct = within_pct(&book.bids, BookSide::Bid, mid, Decimal::ONE);
        let ask_liquidity_1pct = within_pct(&book.asks, BookSide::Ask, mid, Decimal::ONE);

        Metrics {
            whale_orders,
            price_walls,
            total_bid_liquidity,
            total_ask_liquidity,
            imbalance,
            bid_liquidity_1pct,
            ask_liquidity_1pct,
            bid_liquidity_2pct: within_pct(&book.bids, BookSide::Bid, mid, Decimal::TWO),
            ask_liquidity_2pct: within_pct(&book.asks, BookSide::Ask, mid, Decimal::TWO),
            venue_shares: venue_shares(book, total),
            spread_stats: spread_stats(book),
            depth_score: self.depth_score(bid_liquidity_1pct, ask_liquidity_1pct),
            notional_fills: self.notional_fills(book),
            arbitrage: self.arbitrage(book),
        }
    }

    fn depth_score(&self, bid_1pct: Decimal, ask_1pct: Decimal) -> Decimal {
        let average = bid_1pct / Decimal::TWO + ask_1pct / Decimal::TWO;
        average
            .checked_div(self.settings.full_depth_notional)
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
            .map_or(Decimal::ZERO, |score| score.min(Decimal::ONE_HUNDRED).round_dp(2))
    }

    // Buy walks the asks, sell walks the bids, for every configured size.
    fn notional_fills(&self, book: &AggregatedBook) -> Vec<NotionalFill> {
        let mid = book.nbbo.mid;
        self.settings
            .notional_sizes
            .iter()
            .filter(|size| **size > Decimal::ZERO)
            .flat_map(|&size| [Side::Buy, Side::Sell].map(|side| (side, size)))
            .map(|(side, notional)| {
                let walk = walk_notional(book.ladder(side.book_side()), notional);
                let vwap = walk.avg_price();
                let slippage_pct = vwap.zip(mid).and_then(|(vwap, mid)| {
                    side.price_gain(vwap, mid)
                        .checked_div(mid)
                        .and_then(|r| r.checked_mul(Decimal::ONE_HUNDRED))
                        .map(|p| p.round_dp(6))
                });
                NotionalFill {
                    side,
                    notional,
                    vwap: vwap.map(|v| v.round_dp(8)),
                    quantity: walk.quantity,
                    filled_notional: walk.spent,
                    slippage_pct,
                    complete: walk.is_complete(),
                }
            })
            .collect()
    }

    // Every ordered pair of live venues whose quotes overlap.
    fn arbitrage(&self, book: &AggregatedBook) -> Vec<ArbitrageOpportunity> {
        let live: Vec<_> = book
            .exchange_data
            .iter()
            .filter(|row| row.status != VenueStatus::Down)
            .collect();
        let top_qty = |ladder: &[PriceLevel], venue: VenueId| {
            ladder.iter().find(|l| l.venue == venue).map(|l| l.quantity)
        };

        let mut found = Vec::new();
        for buy in &live {
            for sell in &live {
                if buy.venue == sell.venue {
                    continue;
                }
                let (Some(buy_price), Some(sell_price)) = (buy.best_ask, sell.best_bid) else {
                    continue;
                };
                let spread = sell_price - buy_price;
                if spread <= Decimal::ZERO {
                    continue;
                }
                let Some(spread_pct) = spread
                    .checked_div(buy_price)
                    .and_then(|r| r.checked_mul(Decimal::ONE_HUNDRED))
                    .map(|p| p.round_dp(6))
                else {
                    continue;
                };
                if spread_pct < self.settings.arbitrage_min_spread_pct {
                    continue;
                }
                let quantity = top_qty(&book.asks, buy.venue)
                    .zip(top_qty(&book.bids, sell.venue))
                    .map_or(Decimal::ZERO, |(a, b)| a.min(b));
                found.push(ArbitrageOpportunity {
                    buy_venue: buy.venue,
                    sell_venue: sell.venue,
                    buy_price,
                    sell_price,
                    spread,
                    spread_pct,
                    quantity,
                });
            }
        }
        found.sort_by(|a, b| {
            b.spread_pct
                .cmp(&a.spread_pct)
                .then(a.buy_venue.cmp(&b.buy_venue))
                .then(a.sell_venue.cmp(&b.sell_venue))
        });
        found
    }

    fn whales(&self, ladder: &[PriceLevel], side: BookSide, side_notional: Decimal) -> Vec<WhaleOrder> {
        let Some(median) = median_quantity(ladder) else {
            return Vec::new();
        };
        let threshold = median.saturating_mul(self.settings.whale_multiplier);
        ladder
            .iter()
            .filter(|l| l.quantity >= threshold)
            .map(|l| {
                let notional = l.notional();
                WhaleOrder {
                    side,
                    venue: l.venue,
                    price: l.price,
                    quantity: l.quantity,
                    notional,
                    size_multiple: l.quantity.checked_div(median).unwrap_or(Decimal::MAX).round_dp(2),
                    pct_of_side: pct(notional, side_notional),
                }
            })
            .collect()
    }

    // Contiguous runs within the band of the run's first price; one pass, no overlap.
    fn walls(&self, ladder: &[PriceLevel], side: BookSide) -> Vec<PriceWall> {
        let threshold = match (self.settings.wall_min_quantity, median_quantity(ladder)) {
            (Some(min), _) => min,
            (None, Some(median)) => median.saturating_mul(self.settings.wall_median_multiplier),
            (None, None) => return Vec::new(),
        };

        let mut walls = Vec::new();
        let mut start = 0;
        while start < ladder.len() {
            let anchor = ladder[start].price;
            let band = anchor.saturating_mul(self.settings.wall_band_pct) / Decimal::ONE_HUNDRED;
            let len = ladder[start..]
                .iter()
                .take_while(|l| (l.price - anchor).abs() <= band)
                .count();
            let run = &ladder[start..start + len];

            let total_quantity = saturating_sum(run.iter().map(|l| l.quantity));
            if total_quantity > threshold {
                let strength = total_quantity
                    .checked_div(threshold)
                    .map(WallStrength::from_ratio)
                    .unwrap_or(WallStrength::Strong);
                let venues: BTreeSet<VenueId> = run.iter().map(|l| l.venue).collect();
                walls.push(PriceWall {
                    side,
                    price_start: anchor,
                    price_end: run[len - 1].price,
                    total_quantity,
                    total_notional: notional_of(run.iter()),
                    level_count: len,
                    venues: venues.into_iter().collect(),
                    strength,
                });
            }
            start += len;
        }
        walls
    }
}

/// Median level quantity; mean of the middle pair for an even count.
pub fn median_quantity(ladder: &[PriceLevel]) -> Option<Decimal> {
    if ladder.is_empty() {
        return None;
    }
    let mut qty: Vec<Decimal> = ladder.iter().map(|l| l.quantity).collect();
    qty.sort_unstable();
    let mid = qty.len() / 2;
    Some(if qty.len() % 2 == 0 {
        (qty[mid - 1] + qty[mid]) / Decimal::TWO
    } else {
        qty[mid]
    })
}

fn pct(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        Decimal::ZERO
    } else {
        part.checked_div(whole)
            .map_or(Decimal::ZERO, |r| (r * Decimal::ONE_HUNDRED).round_dp(2))
    }
}

fn within_pct(ladder: &[PriceLevel], side: BookSide, mid: Option<Decimal>, pct: Decimal) -> Decimal {
    let Some(mid) = mid else {
        return Decimal::ZERO;
    };
    let offset = mid * pct / Decimal::ONE_HUNDRED;
    let in_band = |l: &&PriceLevel| match side {
        BookSide::Bid => l.price >= mid - offset,
        BookSide::Ask => l.price <= mid + offset,
    };
    // ladders are best-first, so the band is a prefix
    notional_of(ladder.iter().take_while(in_band))
}

fn venue_shares(book: &AggregatedBook, total: Decimal) -> Vec<VenueShare> {
    let mut by_venue: BTreeMap<VenueId, (Decimal, Decimal)> = BTreeMap::new();
    for l in &book.bids {
        let entry = by_venue.entry(l.venue).or_default();
        entry.0 = entry.0.saturating_add(l.notional());
    }
    for l in &book.asks {
        let entry = by_venue.entry(l.venue).or_default();
        entry.1 = entry.1.saturating_add(l.notional());
    }

    let mut shares: Vec<VenueShare> = by_venue
        .into_iter()
        .map(|(venue, (bid, ask))| VenueShare {
            venue,
            bid_liquidity: bid,
            ask_liquidity: ask,
            share_pct: pct(bid.saturating_add(ask), total),
        })
        .collect();
    shares.sort_by(|a, b| {
        (b.bid_liquidity.saturating_add(b.ask_liquidity))
            .cmp(&a.bid_liquidity.saturating_add(a.ask_liquidity))
            .then(a.venue.cmp(&b.venue))
    });
    shares
}

fn spread_stats(book: &AggregatedBook) -> Option<SpreadStats> {
    let spreads: Vec<Decimal> = book.exchange_data.iter().filter_map(|row| row.spread).collect();
    let n = Decimal::from(spreads.len());
    let min = spreads.iter().copied().min()?;
    let max = spreads.iter().copied().max()?;
    let average = saturating_sum(spreads.iter().copied()) / n;
    let variance = saturating_sum(spreads.iter().map(|s| (*s - average).saturating_mul(*s - average))) / n;

    Some(SpreadStats {
        venues: spreads.len(),
        average: average.round_dp(8),
        min,
        max,
        std_dev: variance.sqrt().unwrap_or_default().round_dp(8),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::types::VenueBook;
    use crate::market_data::unified_book::consolidate;
    use rust_decimal_macros::dec;

    fn lv(price: Decimal, quantity: Decimal, venue: VenueId) -> PriceLevel {
        PriceLevel::new(price, quantity, venue)
    }

    fn aggregated(books: Vec<VenueBook>) -> AggregatedBook {
        consolidate("BTC", &books, &[], 1)
    }

    #[test]
    fn median_handles_odd_and_even_counts() {
        let odd = [lv(dec!(1), dec!(3), VenueId::Okx), lv(dec!(2), dec!(1), VenueId::Okx), lv(dec!(3), dec!(2), VenueId::Okx)];
        assert_eq!(median_quantity(&odd), Some(dec!(2)));
        assert_eq!(median_quantity(&odd[..2]), Some(dec!(2)));
        assert_eq!(median_quantity(&[]), None);
    }

    #[test]
    fn flags_whales_relative_to_side_median() {
        let bids = vec![
            lv(dec!(100), dec!(1), VenueId::Binance),
            lv(dec!(99), dec!(1), VenueId::Binance),
            lv(dec!(98), dec!(10), VenueId::Binance),
        ];
        let asks = vec![lv(dec!(101), dec!(1), VenueId::Binance), lv(dec!(102), dec!(1), VenueId::Binance)];
        let book = aggregated(vec![VenueBook::from_levels("BTC", VenueId::Binance, bids, asks, 1)]);

        let metrics = MetricsAnalyzer::default().analyze(&book);
        assert_eq!(metrics.whale_orders.len(), 1);
        let whale = &metrics.whale_orders[0];
        assert_eq!(whale.side, BookSide::Bid);
        assert_eq!(whale.price, dec!(98));
        assert_eq!(whale.notional, dec!(980));
        assert_eq!(whale.size_multiple, dec!(10));
        assert_eq!(whale.pct_of_side, dec!(83.12));
    }

    #[test]
    fn finds_walls_inside_the_band() {
        // three venues stacked within 0.1% of 1000, then a lone far level
        let book = aggregated(vec![
            VenueBook::from_levels("BTC", VenueId::Binance, vec![], vec![lv(dec!(1000), dec!(4), VenueId::Binance)], 1),
            VenueBook::from_levels("BTC", VenueId::Kraken, vec![], vec![lv(dec!(1000.5), dec!(4), VenueId::Kraken)], 1),
            VenueBook::from_levels(
                "BTC",
                VenueId::Okx,
                vec![],
                vec![lv(dec!(1001), dec!(4), VenueId::Okx), lv(dec!(1100), dec!(1), VenueId::Okx)],
                1,
            ),
        ]);
        let analyzer = MetricsAnalyzer::new(AnalyzerSettings { wall_min_quantity: Some(dec!(5)), ..Default::default() });
        let metrics = analyzer.analyze(&book);

        assert_eq!(metrics.price_walls.len(), 1);
        let wall = &metrics.price_walls[0];
        assert_eq!(wall.side, BookSide::Ask);
        assert_eq!(wall.price_start, dec!(1000));
        assert_eq!(wall.price_end, dec!(1001));
        assert_eq!(wall.total_quantity, dec!(12));
        assert_eq!(wall.level_count, 3);
        assert_eq!(wall.venues, vec![VenueId::Binance, VenueId::Kraken, VenueId::Okx]);
        assert_eq!(wall.strength, WallStrength::Moderate);
    }

    #[test]
    fn liquidity_totals_imbalance_and_shares() {
        let book = aggregated(vec![
            VenueBook::from_levels(
                "BTC",
                VenueId::Binance,
                vec![lv(dec!(99), dec!(2), VenueId::Binance)],
                vec![lv(dec!(101), dec!(1), VenueId::Binance)],
                1,
            ),
            VenueBook::from_levels(
                "BTC",
                VenueId::Coinbase,
                vec![lv(dec!(98), dec!(1), VenueId::Coinbase)],
                vec![lv(dec!(103), dec!(1), VenueId::Coinbase)],
                1,
            ),
        ]);
        let m = MetricsAnalyzer::default().analyze(&book);

        assert_eq!(m.total_bid_liquidity, dec!(296));
        assert_eq!(m.total_ask_liquidity, dec!(204));
        assert_eq!(m.imbalance, Some(dec!(0.184)));
        // mid 100: 1% band is [99, 101]
        assert_eq!(m.bid_liquidity_1pct, dec!(198));
        assert_eq!(m.ask_liquidity_1pct, dec!(101));
        assert_eq!(m.bid_liquidity_2pct, dec!(296));
        assert_eq!(m.ask_liquidity_2pct, dec!(101));

        assert_eq!(m.venue_shares[0].venue, VenueId::Binance);
        assert_eq!(m.venue_shares[0].share_pct, dec!(59.8));
        assert_eq!(m.venue_shares[1].share_pct, dec!(40.2));

        let spreads = m.spread_stats.unwrap();
        assert_eq!(spreads.venues, 2);
        assert_eq!(spreads.min, dec!(2));
        assert_eq!(spreads.max, dec!(5));
        assert_eq!(spreads.average, dec!(3.5));
        assert_eq!(spreads.std_dev, dec!(1.5));
    }

    #[test]
    fn empty_sides_produce_empty_signals() {
        let book = aggregated(vec![VenueBook::from_levels(
            "BTC",
            VenueId::Gemini,
            vec![lv(dec!(10), dec!(1), VenueId::Gemini)],
            vec![],
            1,
        )]);
        let m = MetricsAnalyzer::default().analyze(&book);
        assert!(m.whale_orders.is_empty());
        assert!(m.price_walls.is_empty());
        assert_eq!(m.ask_liquidity_1pct, Decimal::ZERO);
        assert_eq!(m.imbalance, Some(dec!(1)));
        assert!(m.spread_stats.is_none());
    }

    fn two_venue_book() -> AggregatedBook {
        aggregated(vec![
            VenueBook::from_levels(
                "BTC",
                VenueId::Binance,
                vec![lv(dec!(99), dec!(2), VenueId::Binance)],
                vec![lv(dec!(101), dec!(1), VenueId::Binance)],
                1,
            ),
            VenueBook::from_levels(
                "BTC",
                VenueId::Coinbase,
                vec![lv(dec!(98), dec!(1), VenueId::Coinbase)],
                vec![lv(dec!(103), dec!(1), VenueId::Coinbase)],
                1,
            ),
        ])
    }

    #[test]
    fn prices_fixed_notional_orders_against_mid() {
        let analyzer = MetricsAnalyzer::new(AnalyzerSettings {
            notional_sizes: vec![dec!(152.5), dec!(10000)],
            ..Default::default()
        });
        let fills = analyzer.analyze(&two_venue_book()).notional_fills;
        assert_eq!(fills.len(), 4);

        // 101 x 1 whole, then 51.5 of quote at 103
        let buy = &fills[0];
        assert_eq!(buy.side, Side::Buy);
        assert!(buy.complete);
        assert_eq!(buy.quantity, dec!(1.5));
        assert_eq!(buy.vwap, Some(dec!(101.66666667)));
        assert_eq!(buy.slippage_pct, Some(dec!(1.666667)));

        let sell = &fills[1];
        assert_eq!(sell.side, Side::Sell);
        assert!(sell.complete);
        assert_eq!(sell.vwap, Some(dec!(99)));
        assert_eq!(sell.slippage_pct, Some(dec!(1)));

        let too_big = &fills[2];
        assert!(!too_big.complete);
        assert_eq!(too_big.filled_notional, dec!(204));
        assert_eq!(too_big.quantity, dec!(2));
        assert_eq!(too_big.vwap, Some(dec!(102)));
    }

    #[test]
    fn depth_score_scales_and_caps() {
        // 1% liquidity: bids 198, asks 101
        let book = two_venue_book();
        let scaled = MetricsAnalyzer::new(AnalyzerSettings { full_depth_notional: dec!(1000), ..Default::default() });
        assert_eq!(scaled.analyze(&book).depth_score, dec!(14.95));
        let capped = MetricsAnalyzer::new(AnalyzerSettings { full_depth_notional: dec!(100), ..Default::default() });
        assert_eq!(capped.analyze(&book).depth_score, dec!(100));
        let broken = MetricsAnalyzer::new(AnalyzerSettings { full_depth_notional: Decimal::ZERO, ..Default::default() });
        assert_eq!(broken.analyze(&book).depth_score, Decimal::ZERO);
    }

    #[test]
    fn finds_cross_venue_arbitrage() {
        let book = aggregated(vec![
            VenueBook::from_levels(
                "BTC",
                VenueId::Binance,
                vec![lv(dec!(101), dec!(1), VenueId::Binance)],
                vec![lv(dec!(102), dec!(0.4), VenueId::Binance)],
                1,
            ),
            VenueBook::from_levels(
                "BTC",
                VenueId::Kraken,
                vec![lv(dec!(103), dec!(2), VenueId::Kraken)],
                vec![lv(dec!(104), dec!(1), VenueId::Kraken)],
                1,
            ),
        ]);
        let arb = MetricsAnalyzer::default().analyze(&book).arbitrage;
        assert_eq!(arb.len(), 1);
        let opp = &arb[0];
        assert_eq!((opp.buy_venue, opp.sell_venue), (VenueId::Binance, VenueId::Kraken));
        assert_eq!((opp.buy_price, opp.sell_price), (dec!(102), dec!(103)));
        assert_eq!(opp.spread, dec!(1));
        assert_eq!(opp.spread_pct, dec!(0.980392));
        assert_eq!(opp.quantity, dec!(0.4));

        let strict = MetricsAnalyzer::new(AnalyzerSettings { arbitrage_min_spread_pct: dec!(1), ..Default::default() });
        assert!(strict.analyze(&book).arbitrage.is_empty());
        assert!(MetricsAnalyzer::default().analyze(&two_venue_book()).arbitrage.is_empty());
    }

    #[test]
    fn extreme_size_multiples_saturate() {
        let dust = dec!(0.000000001);
        let mut bids = vec![lv(dec!(100), dec!(100000000000000000000), VenueId::Okx)];
        bids.extend((1..=4).map(|i| lv(dec!(100) - Decimal::from(i), dust, VenueId::Okx)));
        let book = aggregated(vec![VenueBook::from_levels("BTC", VenueId::Okx, bids, vec![], 1)]);

        let m = MetricsAnalyzer::default().analyze(&book);
        assert_eq!(m.whale_orders.len(), 1);
        assert_eq!(m.whale_orders[0].size_multiple, Decimal::MAX);
    }
}
