// Kraken: GET /0/public/Depth

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use super::{lookup_pair, VenueApi};
use crate::error::VenueError;
use crate::market_data::normaliser::parse_value_levels;
use crate::market_data::types::{RawBook, VenueId};

const PAIRS: &[(&str, &str)] = &[
    ("BTC", "XXBTZUSD"),
    ("ETH", "XETHZUSD"),
    ("SOL", "SOLUSD"),
    ("XRP", "XXRPZUSD"),
    ("ADA", "ADAUSD"),
    ("DOGE", "XDGUSD"),
    ("AVAX", "AVAXUSD"),
];

pub struct KrakenApi {
    pub base_url: String,
}

impl Default for KrakenApi {
    fn default() -> Self {
        Self { base_url: "https://api.kraken.com".into() }
    }
}

#[derive(Debug, Deserialize)]
struct DepthResponse {
    #[serde(default)]
    error: Vec<String>,
    result: Option<BTreeMap<String, PairBook>>,
}

// Levels are [price, volume, timestamp].
#[derive(Debug, Deserialize)]
struct PairBook {
    bids: Vec<Vec<Value>>,
    asks: Vec<Vec<Value>>,
}

impl VenueApi for KrakenApi {
    const VENUE: VenueId = VenueId::Kraken;
    const MAX_DEPTH: u32 = 500;

    fn pair(&self, symbol: &str) -> Option<String> {
        lookup_pair(PAIRS, symbol)
    }

    fn request(&self, client: &reqwest::Client, pair: &str, depth: u32) -> reqwest::RequestBuilder {
        client
            .get(format!("{}/0/public/Depth", self.base_url))
            .query(&[("pair", pair.to_string()), ("count", depth.to_string())])
    }

    fn parse(&self, body: &[u8]) -> Result<RawBook, VenueError> {
        let resp: DepthResponse = serde_json::from_slice(body)?;
        if !resp.error.is_empty() {
            return Err(VenueError::Api(resp.error.join("; ")));
        }
        // The result is keyed by Kraken's canonical pair name, which may not
        // match the alias that was requested.
        let book = resp
            .result
            .and_then(|r| r.into_values().next())
            .ok_or_else(|| VenueError::Malformed("missing result".into()))?;
        Ok(RawBook {
            bids: parse_value_levels(&book.bids)?,
            asks: parse_value_levels(&book.asks)?,
            exchange_ts_ms: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_depth_payload() {
        let body = br#"{"error":[],"result":{"XXBTZUSD":{"asks":[["65010.00000","0.750",1714521600]],"bids":[["65000.00000","1.000",1714521599]]}}}"#;
        let raw = KrakenApi::default().parse(body).unwrap();
        assert_eq!(raw.asks[0].price, dec!(65010));
        assert_eq!(raw.bids[0].quantity, dec!(1));
    }

    #[test]
    fn api_errors_are_surfaced() {
        let body = br#"{"error":["EQuery:Unknown asset pair"]}"#;
        let err = KrakenApi::default().parse(body).unwrap_err();
        assert_eq!(err, VenueError::Api("EQuery:Unknown asset pair".into()));
    }

    #[test]
    fn uses_kraken_asset_codes() {
        assert_eq!(KrakenApi::default().pair("BTC").as_deref(), Some("XXBTZUSD"));
        assert_eq!(KrakenApi::default().pair("DOGE").as_deref(), Some("XDGUSD"));
    }
}
