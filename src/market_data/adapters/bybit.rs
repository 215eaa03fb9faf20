// Bybit v5: GET /v5/market/orderbook (spot)

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

pub struct BybitApi {
    pub base_url: String,
}

impl Default for BybitApi {
    fn default() -> Self {
        Self { base_url: "https://api.bybit.com".into() }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderbookResponse {
    ret_code: i64,
    #[serde(default)]
    ret_msg: String,
    result: Option<OrderbookResult>,
}

#[derive(Debug, Deserialize)]
struct OrderbookResult {
    #[serde(default)]
    b: Vec<Vec<Value>>,
    #[serde(default)]
    a: Vec<Vec<Value>>,
    ts: Option<u64>,
}

impl VenueApi for BybitApi {
    const VENUE: VenueId = VenueId::Bybit;
    const MAX_DEPTH: u32 = 200;

    fn pair(&self, symbol: &str) -> Option<String> {
        lookup_pair(PAIRS, symbol)
    }

    fn request(&self, client: &reqwest::Client, pair: &str, depth: u32) -> reqwest::RequestBuilder {
        client
            .get(format!("{}/v5/market/orderbook", self.base_url))
            .query(&[
                ("category", "spot".to_string()),
                ("symbol", pair.to_string()),
                ("limit", depth.to_string()),
            ])
    }

    fn parse(&self, body: &[u8]) -> Result<RawBook, VenueError> {
        let resp: OrderbookResponse = serde_json::from_slice(body)?;
        if resp.ret_code != 0 {
            return Err(VenueError::Api(format!("{} {}", resp.ret_code, resp.ret_msg)));
        }
        let result = resp
            .result
            .ok_or_else(|| VenueError::Malformed("missing result".into()))?;
        Ok(RawBook {
            bids: parse_value_levels(&result.b)?,
            asks: parse_value_levels(&result.a)?,
            exchange_ts_ms: result.ts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_orderbook_payload() {
        let body = br#"{"retCode":0,"retMsg":"OK","result":{"s":"BTCUSDT","b":[["65000","0.9"]],"a":[["65002","0.4"],["65003","1"]],"ts":1714521600000,"u":18521288},"time":1714521600001}"#;
        let raw = BybitApi::default().parse(body).unwrap();
        assert_eq!(raw.bids[0].quantity, dec!(0.9));
        assert_eq!(raw.asks.len(), 2);
        assert_eq!(raw.exchange_ts_ms, Some(1_714_521_600_000));
    }

    #[test]
    fn non_zero_ret_code_is_api_error() {
        let body = br#"{"retCode":10001,"retMsg":"params error","result":{},"time":1}"#;
        let err = BybitApi::default().parse(body).unwrap_err();
        assert_eq!(err, VenueError::Api("10001 params error".into()));
    }
}
