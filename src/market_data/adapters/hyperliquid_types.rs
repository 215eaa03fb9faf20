// Source: https://api.hyperliquid.xyz/info ({"type": "l2Book"})
// Same level shape as the l2Book websocket channel. `coin` and the per-level
// order count `n` are not read.
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct L2BookRequest<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str, // always "l2Book"
    pub coin: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct L2Book {
    pub levels: (Vec<L2Level>, Vec<L2Level>), // (bids, asks)
    pub time: u64,
}

#[derive(Debug, Deserialize)]
pub struct L2Level {
    pub px: String, // price string, e.g. "1234.56"
    pub sz: String, // size string, e.g. "0.01"
}
