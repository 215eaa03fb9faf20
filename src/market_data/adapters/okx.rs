// OKX v5: GET /api/v5/market/books

use serde::Deserialize;
use serde_json::Value;

use super::{lookup_pair, VenueApi};
use crate::error::VenueError;
use crate::market_data::normaliser::parse_value_levels;
use crate::market_data::types::{RawBook, VenueId};

const PAIRS: &[(&str, &str)] = &[
    ("BTC", "BTC-USDT"),
    ("ETH", "ETH-USDT"),
    ("SOL", "SOL-USDT"),
    ("BNB", "BNB-USDT"),
    ("XRP", "XRP-USDT"),
    ("ADA", "ADA-USDT"),
    ("DOGE", "DOGE-USDT"),
    ("AVAX", "AVAX-USDT"),
];

pub struct OkxApi {
    pub base_url: String,
}

impl Default for OkxApi {
    fn default() -> Self {
        Self { base_url: "https://www.okx.com".into() }
    }
}

#[derive(Debug, Deserialize)]
struct BooksResponse {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Vec<BookData>,
}

// Levels are [price, size, "0", order_count].
#[derive(Debug, Deserialize)]
struct BookData {
    bids: Vec<Vec<Value>>,
    asks: Vec<Vec<Value>>,
    ts: Option<String>,
}

impl VenueApi for OkxApi {
    const VENUE: VenueId = VenueId::Okx;
    const MAX_DEPTH: u32 = 400;

    fn pair(&self, symbol: &str) -> Option<String> {
        lookup_pair(PAIRS, symbol)
    }

    fn request(&self, client: &reqwest::Client, pair: &str, depth: u32) -> reqwest::RequestBuilder {
        client
            .get(format!("{}/api/v5/market/books", self.base_url))
            .query(&[("instId", pair.to_string()), ("sz", depth.to_string())])
    }

    fn parse(&self, body: &[u8]) -> Result<RawBook, VenueError> {
        let resp: BooksResponse = serde_json::from_slice(body)?;
        if resp.code != "0" {
            return Err(VenueError::Api(format!("{} {}", resp.code, resp.msg)));
        }
        let data = resp
            .data
            .into_iter()
            .next()
            .ok_or_else(|| VenueError::Malformed("empty data array".into()))?;
        Ok(RawBook {
            bids: parse_value_levels(&data.bids)?,
            asks: parse_value_levels(&data.asks)?,
            exchange_ts_ms: data.ts.and_then(|ts| ts.parse().ok()),
        })
    }
}
