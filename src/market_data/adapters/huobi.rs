// HTX (Huobi): GET /market/depth

use serde::Deserialize;
use serde_json::Value;

use super::{lookup_pair, VenueApi};
use crate::error::VenueError;
use crate::market_data::normaliser::parse_value_levels;
use crate::market_data::types::{RawBook, VenueId};

const PAIRS: &[(&str, &str)] = &[
    ("BTC", "btcusdt"),
    ("ETH", "ethusdt"),
    ("SOL", "solusdt"),
    ("XRP", "xrpusdt"),
    ("ADA", "adausdt"),
    ("DOGE", "dogeusdt"),
    ("AVAX", "avaxusdt"),
];

pub struct HuobiApi {
    pub base_url: String,
}

impl Default for HuobiApi {
    fn default() -> Self {
        Self { base_url: "https://api.huobi.pro".into() }
    }
}

#[derive(Debug, Deserialize)]
struct DepthResponse {
    status: String,
    #[serde(rename = "err-msg", default)]
    err_msg: Option<String>,
    tick: Option<Tick>,
}

// Levels are [price, amount] as JSON numbers.
#[derive(Debug, Deserialize)]
struct Tick {
    bids: Vec<Vec<Value>>,
    asks: Vec<Vec<Value>>,
    ts: Option<u64>,
}

impl VenueApi for HuobiApi {
    const VENUE: VenueId = VenueId::Huobi;
    const MAX_DEPTH: u32 = 150;

    fn pair(&self, symbol: &str) -> Option<String> {
        lookup_pair(PAIRS, symbol)
    }

    fn request(&self, client: &reqwest::Client, pair: &str, depth: u32) -> reqwest::RequestBuilder {
        let req = client
            .get(format!("{}/market/depth", self.base_url))
            .query(&[("symbol", pair), ("type", "step0")]);
        // Only 5/10/20 are accepted; leaving it out returns 150 levels.
        match depth {
            0..=5 => req.query(&[("depth", 5)]),
            6..=10 => req.query(&[("depth", 10)]),
            11..=20 => req.query(&[("depth", 20)]),
            _ => req,
        }
    }

    fn parse(&self, body: &[u8]) -> Result<RawBook, VenueError> {
        let resp: DepthResponse = serde_json::from_slice(body)?;
        if resp.status != "ok" {
            return Err(VenueError::Api(resp.err_msg.unwrap_or(resp.status)));
        }
        let tick = resp.tick.ok_or_else(|| VenueError::Malformed("missing tick".into()))?;
        Ok(RawBook {
            bids: parse_value_levels(&tick.bids)?,
            asks: parse_value_levels(&tick.asks)?,
            exchange_ts_ms: tick.ts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_numeric_levels() {
        let body = br#"{"ch":"market.btcusdt.depth.step0","status":"ok","ts":1714521600100,"tick":{"bids":[[64998.5,0.1234]],"asks":[[64998.6,2.5]],"version":1,"ts":1714521600000}}"#;
        let raw = HuobiApi::default().parse(body).unwrap();
        assert_eq!(raw.bids[0].price, dec!(64998.5));
        assert_eq!(raw.bids[0].quantity, dec!(0.1234));
        assert_eq!(raw.exchange_ts_ms, Some(1_714_521_600_000));
    }

    #[test]
    fn error_status_is_api_error() {
        let body = br#"{"status":"error","err-code":"invalid-parameter","err-msg":"invalid symbol"}"#;
        let err = HuobiApi::default().parse(body).unwrap_err();
        assert_eq!(err, VenueError::Api("invalid symbol".into()));
    }
}
