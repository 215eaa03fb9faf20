// Bitfinex v2: GET /v2/book/{pair}/P0

use rust_decimal::Decimal;
use serde_json::Value;

use super::{lookup_pair, VenueApi};
use crate::error::VenueError;
use crate::market_data::normaliser::decimal_from_value;
use crate::market_data::types::{RawBook, RawLevel, VenueId};

const PAIRS: &[(&str, &str)] = &[
    ("BTC", "tBTCUSD"),
    ("ETH", "tETHUSD"),
    ("SOL", "tSOLUSD"),
    ("XRP", "tXRPUSD"),
    ("ADA", "tADAUSD"),
    ("DOGE", "tDOGE:USD"),
    ("AVAX", "tAVAX:USD"),
];

pub struct BitfinexApi {
    pub base_url: String,
}

impl Default for BitfinexApi {
    fn default() -> Self {
        Self { base_url: "https://api-pub.bitfinex.com".into() }
    }
}

// The endpoint only accepts these lengths.
fn book_len(depth: u32) -> u32 {
    match depth {
        0..=1 => 1,
        2..=25 => 25,
        _ => 100,
    }
}

impl VenueApi for BitfinexApi {
    const VENUE: VenueId = VenueId::Bitfinex;
    const MAX_DEPTH: u32 = 100;

    fn pair(&self, symbol: &str) -> Option<String> {
        lookup_pair(PAIRS, symbol)
    }

    fn request(&self, client: &reqwest::Client, pair: &str, depth: u32) -> reqwest::RequestBuilder {
        client
            .get(format!("{}/v2/book/{}/P0", self.base_url, pair))
            .query(&[("len", book_len(depth))])
    }

    /// Rows are `[price, count, amount]`; positive amount is a bid, negative an ask.
    fn parse(&self, body: &[u8]) -> Result<RawBook, VenueError> {
        let rows: Vec<Vec<Value>> = serde_json::from_slice(body)?;
        let mut book = RawBook::default();
        for row in &rows {
            let [price, _count, amount, ..] = row.as_slice() else {
                return Err(VenueError::Malformed(format!("row has {} column(s)", row.len())));
            };
            let price = decimal_from_value(price)?;
            let amount = decimal_from_value(amount)?;
            let level = RawLevel { price, quantity: amount.abs() };
            if amount > Decimal::ZERO {
                book.bids.push(level);
            } else if amount < Decimal::ZERO {
                book.asks.push(level);
            }
        }
        Ok(book)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn splits_sides_by_amount_sign() {
        let body = br#"[[65000,3,0.75],[64999,1,1.5],[65001,2,-0.4]]"#;
        let raw = BitfinexApi::default().parse(body).unwrap();
        assert_eq!(raw.bids.len(), 2);
        assert_eq!(raw.asks.len(), 1);
        assert_eq!(raw.asks[0].price, dec!(65001));
        assert_eq!(raw.asks[0].quantity, dec!(0.4));
    }

    #[test]
    fn error_envelope_is_malformed() {
        let body = br#"["error",10020,"symbol: invalid"]"#;
        assert!(BitfinexApi::default().parse(body).is_err());
    }

    #[test]
    fn rounds_depth_up_to_allowed_length() {
        assert_eq!(book_len(1), 1);
        assert_eq!(book_len(20), 25);
        assert_eq!(book_len(60), 100);
    }
}
