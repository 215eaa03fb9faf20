// Binance spot: GET /api/v3/depth

use serde::Deserialize;
use serde_json::Value;

use super::{lookup_pair, VenueApi};
use crate::error::VenueError;
use crate::market_data::normaliser::parse_value_levels;
use crate::market_data::types::{RawBook, VenueId};

const PAIRS: &[(&str, &str)] = &[
    ("BTC", "BTCUSDT"),
    ("ETH", "ETHUSDT"),
    ("SOL", "SOLUSDT"),
    ("BNB", "BNBUSDT"),
    ("XRP", "XRPUSDT"),
    ("ADA", "ADAUSDT"),
    ("DOGE", "DOGEUSDT"),
    ("AVAX", "AVAXUSDT"),
];

pub struct BinanceApi {
    pub base_url: String,
}

impl Default for BinanceApi {
    fn default() -> Self {
        Self { base_url: "https://api.binance.com".into() }
    }
}

#[derive(Debug, Deserialize)]
struct DepthResponse {
    bids: Vec<Vec<Value>>,
    asks: Vec<Vec<Value>>,
}

impl VenueApi for BinanceApi {
    const VENUE: VenueId = VenueId::Binance;
    const MAX_DEPTH: u32 = 500;

    fn pair(&self, symbol: &str) -> Option<String> {
        lookup_pair(PAIRS, symbol)
    }

    fn request(&self, client: &reqwest::Client, pair: &str, depth: u32) -> reqwest::RequestBuilder {
        client
            .get(format!("{}/api/v3/depth", self.base_url))
            .query(&[("symbol", pair.to_string()), ("limit", depth.to_string())])
    }

    fn parse(&self, body: &[u8]) -> Result<RawBook, VenueError> {
        let resp: DepthResponse = serde_json::from_slice(body)?;
        Ok(RawBook {
            bids: parse_value_levels(&resp.bids)?,
            asks: parse_value_levels(&resp.asks)?,
            exchange_ts_ms: None,
        })
    }
}
