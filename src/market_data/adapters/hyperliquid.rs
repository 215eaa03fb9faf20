// Hyperliquid: POST /info {"type":"l2Book","coin":..}

use super::hyperliquid_types::{L2Book, L2BookRequest, L2Level};
use super::{lookup_pair, VenueApi};
use crate::error::VenueError;
use crate::market_data::normaliser::level_from_strs;
use crate::market_data::types::{RawBook, RawLevel, VenueId};

// Perp coins are addressed by their bare ticker.
const COINS: &[(&str, &str)] = &[
    ("BTC", "BTC"),
    ("ETH", "ETH"),
    ("SOL", "SOL"),
    ("BNB", "BNB"),
    ("XRP", "XRP"),
    ("ADA", "ADA"),
    ("DOGE", "DOGE"),
    ("AVAX", "AVAX"),
];

pub struct HyperliquidApi {
    pub info_url: String, // "https://api.hyperliquid.xyz/info"
}

impl Default for HyperliquidApi {
    fn default() -> Self {
        Self { info_url: "https://api.hyperliquid.xyz/info".into() }
    }
}

impl HyperliquidApi {
    // px and sz are strings; convert without going through floats.
    fn norm_side(side: &[L2Level]) -> Result<Vec<RawLevel>, VenueError> {
        side.iter().map(|lvl| level_from_strs(&lvl.px, &lvl.sz)).collect()
    }
}

impl VenueApi for HyperliquidApi {
    const VENUE: VenueId = VenueId::Hyperliquid;
    // l2Book snapshots are fixed at 20 levels per side.
    const MAX_DEPTH: u32 = 20;

    fn pair(&self, symbol: &str) -> Option<String> {
        lookup_pair(COINS, symbol)
    }

    fn request(&self, client: &reqwest::Client, pair: &str, _depth: u32) -> reqwest::RequestBuilder {
        client
            .post(&self.info_url)
            .json(&L2BookRequest { kind: "l2Book", coin: pair })
    }

    fn parse(&self, body: &[u8]) -> Result<RawBook, VenueError> {
        let book: L2Book = serde_json::from_slice(body)?;
        Ok(RawBook {
            bids: Self::norm_side(&book.levels.0)?,
            asks: Self::norm_side(&book.levels.1)?,
            exchange_ts_ms: Some(book.time),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_l2_book() {
        let body = br#"{"coin":"ETH","time":1714521600000,"levels":[[{"px":"3050.1","sz":"12.5","n":4}],[{"px":"3050.2","sz":"0.8","n":1},{"px":"3050.5","sz":"3","n":2}]]}"#;
        let raw = HyperliquidApi::default().parse(body).unwrap();
        assert_eq!(raw.bids.len(), 1);
        assert_eq!(raw.asks.len(), 2);
        assert_eq!(raw.bids[0].price, dec!(3050.1));
        assert_eq!(raw.asks[1].quantity, dec!(3));
        assert_eq!(raw.exchange_ts_ms, Some(1_714_521_600_000));
    }

    #[test]
    fn only_price_size_and_time_are_required() {
        let body = br#"{"time":5,"levels":[[{"px":"10","sz":"1"}],[]]}"#;
        let raw = HyperliquidApi::default().parse(body).unwrap();
        assert_eq!(raw.bids[0].price, dec!(10));
        assert!(raw.asks.is_empty());
    }

    #[test]
    fn request_body_names_the_coin() {
        let body = serde_json::to_value(L2BookRequest { kind: "l2Book", coin: "BTC" }).unwrap();
        assert_eq!(body, serde_json::json!({"type": "l2Book", "coin": "BTC"}));
    }
}
