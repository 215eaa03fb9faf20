// Gemini: GET /v1/book/{pair}

use serde::Deserialize;

use super::{lookup_pair, VenueApi};
use crate::error::VenueError;
use crate::market_data::normaliser::level_from_strs;
use crate::market_data::types::{RawBook, RawLevel, VenueId};

const PAIRS: &[(&str, &str)] = &[
    ("BTC", "btcusd"),
    ("ETH", "ethusd"),
    ("SOL", "solusd"),
    ("XRP", "xrpusd"),
    ("DOGE", "dogeusd"),
    ("AVAX", "avaxusd"),
];

pub struct GeminiApi {
    pub base_url: String,
}

impl Default for GeminiApi {
    fn default() -> Self {
        Self { base_url: "https://api.gemini.com".into() }
    }
}

#[derive(Debug, Deserialize)]
struct BookResponse {
    bids: Vec<BookEntry>,
    asks: Vec<BookEntry>,
}

#[derive(Debug, Deserialize)]
struct BookEntry {
    price: String,
    amount: String,
}

fn entries(side: &[BookEntry]) -> Result<Vec<RawLevel>, VenueError> {
    side.iter().map(|e| level_from_strs(&e.price, &e.amount)).collect()
}

impl VenueApi for GeminiApi {
    const VENUE: VenueId = VenueId::Gemini;
    const MAX_DEPTH: u32 = 500;

    fn pair(&self, symbol: &str) -> Option<String> {
        lookup_pair(PAIRS, symbol)
    }

    fn request(&self, client: &reqwest::Client, pair: &str, depth: u32) -> reqwest::RequestBuilder {
        client
            .get(format!("{}/v1/book/{}", self.base_url, pair))
            .query(&[("limit_bids", depth), ("limit_asks", depth)])
    }

    fn parse(&self, body: &[u8]) -> Result<RawBook, VenueError> {
        let resp: BookResponse = serde_json::from_slice(body)?;
        Ok(RawBook {
            bids: entries(&resp.bids)?,
            asks: entries(&resp.asks)?,
            exchange_ts_ms: None,
        })
    }
}
