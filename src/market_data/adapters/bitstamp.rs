// Bitstamp: GET /api/v2/order_book/{pair}/

use serde::Deserialize;
use serde_json::Value;

use super::{lookup_pair, VenueApi};
use crate::error::VenueError;
use crate::market_data::normaliser::parse_value_levels;
use crate::market_data::types::{RawBook, VenueId};

const PAIRS: &[(&str, &str)] = &[
    ("BTC", "btcusd"),
    ("ETH", "ethusd"),
    ("SOL", "solusd"),
    ("XRP", "xrpusd"),
    ("ADA", "adausd"),
    ("DOGE", "dogeusd"),
    ("AVAX", "avaxusd"),
];

pub struct BitstampApi {
    pub base_url: String,
}

impl Default for BitstampApi {
    fn default() -> Self {
        Self { base_url: "https://www.bitstamp.net".into() }
    }
}

#[derive(Debug, Deserialize)]
struct OrderBookResponse {
    /// Unix seconds, as a string.
    timestamp: Option<String>,
    bids: Vec<Vec<Value>>,
    asks: Vec<Vec<Value>>,
}

impl VenueApi for BitstampApi {
    const VENUE: VenueId = VenueId::Bitstamp;
    // Full book only; trimmed after parsing.
    const MAX_DEPTH: u32 = 500;

    fn pair(&self, symbol: &str) -> Option<String> {
        lookup_pair(PAIRS, symbol)
    }

    fn request(&self, client: &reqwest::Client, pair: &str, _depth: u32) -> reqwest::RequestBuilder {
        client.get(format!("{}/api/v2/order_book/{}/", self.base_url, pair))
    }

    fn parse(&self, body: &[u8]) -> Result<RawBook, VenueError> {
        let resp: OrderBookResponse = serde_json::from_slice(body)?;
        let exchange_ts_ms = resp
            .timestamp
            .as_deref()
            .and_then(|s| s.parse::<u64>().ok())
            .map(|secs| secs.saturating_mul(1_000));
        Ok(RawBook {
            bids: parse_value_levels(&resp.bids)?,
            asks: parse_value_levels(&resp.asks)?,
            exchange_ts_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_book_and_timestamp() {
        let body = br#"{"timestamp":"1714521600","microtimestamp":"1714521600123456","bids":[["64990","0.2"]],"asks":[["65010","0.3"]]}"#;
        let raw = BitstampApi::default().parse(body).unwrap();
        assert_eq!(raw.exchange_ts_ms, Some(1_714_521_600_000));
        assert_eq!(raw.bids[0].price, dec!(64990));
        assert_eq!(raw.asks[0].quantity, dec!(0.3));
    }

    #[test]
    fn absurd_timestamp_saturates() {
        let body = br#"{"timestamp":"18446744073709551615","bids":[],"asks":[]}"#;
        let raw = BitstampApi::default().parse(body).unwrap();
        assert_eq!(raw.exchange_ts_ms, Some(u64::MAX));
    }
}
