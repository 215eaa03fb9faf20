// KuCoin: GET /api/v1/market/orderbook/level2_{20,100}

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

const OK_CODE: &str = "200000";

pub struct KucoinApi {
    pub base_url: String,
}

impl Default for KucoinApi {
    fn default() -> Self {
        Self { base_url: "https://api.kucoin.com".into() }
    }
}

#[derive(Debug, Deserialize)]
struct Level2Response {
    code: String,
    #[serde(default)]
    msg: String,
    data: Option<Level2Data>,
}

#[derive(Debug, Deserialize)]
struct Level2Data {
    time: Option<u64>,
    bids: Vec<Vec<Value>>,
    asks: Vec<Vec<Value>>,
}

impl VenueApi for KucoinApi {
    const VENUE: VenueId = VenueId::Kucoin;
    const MAX_DEPTH: u32 = 100;

    fn pair(&self, symbol: &str) -> Option<String> {
        lookup_pair(PAIRS, symbol)
    }

    fn request(&self, client: &reqwest::Client, pair: &str, depth: u32) -> reqwest::RequestBuilder {
        let snapshot = if depth <= 20 { "level2_20" } else { "level2_100" };
        client
            .get(format!("{}/api/v1/market/orderbook/{}", self.base_url, snapshot))
            .query(&[("symbol", pair)])
    }

    fn parse(&self, body: &[u8]) -> Result<RawBook, VenueError> {
        let resp: Level2Response = serde_json::from_slice(body)?;
        if resp.code != OK_CODE {
            return Err(VenueError::Api(format!("{} {}", resp.code, resp.msg)));
        }
        let data = resp
            .data
            .ok_or_else(|| VenueError::Malformed("missing data".into()))?;
        Ok(RawBook {
            bids: parse_value_levels(&data.bids)?,
            asks: parse_value_levels(&data.asks)?,
            exchange_ts_ms: data.time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_level2_payload() {
        let body = br#"{"code":"200000","data":{"time":1714521600000,"sequence":"14610502970","bids":[["64995.1","0.02"]],"asks":[["64995.2","0.6"]]}}"#;
        let raw = KucoinApi::default().parse(body).unwrap();
        assert_eq!(raw.bids[0].price, dec!(64995.1));
        assert_eq!(raw.asks[0].quantity, dec!(0.6));
        assert_eq!(raw.exchange_ts_ms, Some(1_714_521_600_000));
    }

    #[test]
    fn error_code_is_api_error() {
        let body = br#"{"code":"400100","msg":"This pair is not provided at present"}"#;
        assert!(matches!(KucoinApi::default().parse(body), Err(VenueError::Api(_))));
    }
}
