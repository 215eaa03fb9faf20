// Cumulative depth series for charting.

use std::io;

use itertools::Itertools;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::market_data::types::{BookSide, PriceLevel};
use crate::market_data::unified_book::AggregatedBook;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthPoint {
    pub price: Decimal,
    /// Quantity at this price summed across venues.
    pub quantity: Decimal,
    pub cumulative_quantity: Decimal,
    pub cumulative_notional: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthChart {
    pub symbol: String,
    pub mid: Option<Decimal>,
    pub bids: Vec<DepthPoint>,
    pub asks: Vec<DepthPoint>,
    pub timestamp_ms: u64,
}

pub fn depth_chart(book: &AggregatedBook) -> DepthChart {
    DepthChart {
        symbol: book.symbol.clone(),
        mid: book.nbbo.mid,
        bids: cumulate(&book.bids),
        asks: cumulate(&book.asks),
        timestamp_ms: book.timestamp_ms,
    }
}

impl DepthChart {
    /// Keeps the first `points` merged prices per side.
    pub fn trimmed(mut self, points: usize) -> Self {
        self.bids.truncate(points);
        self.asks.truncate(points);
        self
    }
}

// Ladders are price-sorted, so equal prices are adjacent.
fn cumulate(ladder: &[PriceLevel]) -> Vec<DepthPoint> {
    let mut cum_qty = Decimal::ZERO;
    let mut cum_notional = Decimal::ZERO;
    ladder
        .iter()
        .map(|l| (l.price, l.quantity))
        .coalesce(|a, b| if a.0 == b.0 { Ok((a.0, a.1 + b.1)) } else { Err((a, b)) })
        .map(|(price, quantity)| {
            cum_qty = cum_qty.saturating_add(quantity);
            cum_notional = cum_notional.saturating_add(price.saturating_mul(quantity));
            DepthPoint {
                price,
                quantity,
                cumulative_quantity: cum_qty,
                cumulative_notional: cum_notional,
            }
        })
        .collect()
}

// csv cannot serialize nested structs, so rows are flat.
#[derive(Serialize)]
struct CsvRow {
    side: BookSide,
    price: Decimal,
    quantity: Decimal,
    cumulative_quantity: Decimal,
    cumulative_notional: Decimal,
}

impl CsvRow {
    fn new(side: BookSide, p: &DepthPoint) -> Self {
        Self {
            side,
            price: p.price,
            quantity: p.quantity,
            cumulative_quantity: p.cumulative_quantity,
            cumulative_notional: p.cumulative_notional,
        }
    }
}

/// One CSV row per depth point, bids first.
pub fn write_csv<W: io::Write>(chart: &DepthChart, out: W) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(out);
    let rows = chart
        .bids
        .iter()
        .map(|p| CsvRow::new(BookSide::Bid, p))
        .chain(chart.asks.iter().map(|p| CsvRow::new(BookSide::Ask, p)));
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::types::{VenueBook, VenueId};
    use crate::market_data::unified_book::consolidate;
    use rust_decimal_macros::dec;

    fn sample() -> AggregatedBook {
        let a = VenueBook::from_levels(
            "ETH",
            VenueId::Binance,
            vec![PriceLevel::new(dec!(10), dec!(1), VenueId::Binance)],
            vec![
                PriceLevel::new(dec!(11), dec!(2), VenueId::Binance),
                PriceLevel::new(dec!(12), dec!(1), VenueId::Binance),
            ],
            1,
        );
        let b = VenueBook::from_levels(
            "ETH",
            VenueId::Kraken,
            vec![PriceLevel::new(dec!(9), dec!(3), VenueId::Kraken)],
            vec![PriceLevel::new(dec!(11), dec!(1), VenueId::Kraken)],
            1,
        );
        consolidate("ETH", &[a, b], &[], 42)
    }

    #[test]
    fn cumulates_and_merges_equal_prices() {
        let chart = depth_chart(&sample());
        assert_eq!(chart.mid, Some(dec!(10.5)));

        let asks: Vec<_> = chart.asks.iter().map(|p| (p.price, p.quantity, p.cumulative_quantity)).collect();
        assert_eq!(asks, vec![(dec!(11), dec!(3), dec!(3)), (dec!(12), dec!(1), dec!(4))]);
        assert_eq!(chart.asks[1].cumulative_notional, dec!(45));

        let bids: Vec<_> = chart.bids.iter().map(|p| p.cumulative_quantity).collect();
        assert_eq!(bids, vec![dec!(1), dec!(4)]);
        assert_eq!(chart.bids[1].cumulative_notional, dec!(37));
    }

    #[test]
    fn trims_after_merging_equal_prices() {
        let book = sample();
        let chart = depth_chart(&book).trimmed(1);
        let asks: Vec<_> = chart.asks.iter().map(|p| (p.price, p.quantity, p.cumulative_quantity)).collect();
        assert_eq!(asks, vec![(dec!(11), dec!(3), dec!(3))]);
        assert_eq!(chart.bids.len(), 1);

        // cutting the raw ladder first drops Kraken's share of the 11 level
        let early = depth_chart(&book.trimmed(1));
        assert_eq!(early.asks[0].quantity, dec!(2));
    }

    #[test]
    fn csv_has_header_and_one_row_per_point() {
        let chart = depth_chart(&sample());
        let mut buf = Vec::new();
        write_csv(&chart, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "side,price,quantity,cumulative_quantity,cumulative_notional");
        assert_eq!(lines.len(), 1 + 4);
        assert_eq!(lines[1], "bid,10,1,1,10");
        assert_eq!(lines[3], "ask,11,3,3,33");
    }
}
