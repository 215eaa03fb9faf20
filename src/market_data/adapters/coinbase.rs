// Coinbase Exchange: GET /products/{pair}/book?level=2

use serde::Deserialize;
use serde_json::Value;

use super::{lookup_pair, VenueApi};
use crate::error::VenueError;
use crate::market_data::normaliser::parse_value_levels;
use crate::market_data::types::{RawBook, VenueId};

const PAIRS: &[(&str, &str)] = &[
    ("BTC", "BTC-USD"),
    ("ETH", "ETH-USD"),
    ("SOL", "SOL-USD"),
    ("XRP", "XRP-USD"),
    ("ADA", "ADA-USD"),
    ("DOGE", "DOGE-USD"),
    ("AVAX", "AVAX-USD"),
];

pub struct CoinbaseApi {
    pub base_url: String,
}

impl Default for CoinbaseApi {
    fn default() -> Self {
        Self { base_url: "https://api.exchange.coinbase.com".into() }
    }
}

// Levels are [price, size, num_orders].
#[derive(Debug, Deserialize)]
struct BookResponse {
    bids: Vec<Vec<Value>>,
    asks: Vec<Vec<Value>>,
}

impl VenueApi for CoinbaseApi {
    const VENUE: VenueId = VenueId::Coinbase;
    // level=2 returns the full aggregated book; the normaliser trims it.
    const MAX_DEPTH: u32 = 500;

    fn pair(&self, symbol: &str) -> Option<String> {
        lookup_pair(PAIRS, symbol)
    }

    fn request(&self, client: &reqwest::Client, pair: &str, _depth: u32) -> reqwest::RequestBuilder {
        client
            .get(format!("{}/products/{}/book", self.base_url, pair))
            .query(&[("level", "2")])
    }

    fn parse(&self, body: &[u8]) -> Result<RawBook, VenueError> {
        let resp: BookResponse = serde_json::from_slice(body)?;
        Ok(RawBook {
            bids: parse_value_levels(&resp.bids)?,
            asks: parse_value_levels(&resp.asks)?,
            exchange_ts_ms: None,
        })
    }
}
