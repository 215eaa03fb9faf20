// Shared capability trait + registry for venue adapters

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::error::VenueError;
use crate::market_data::normaliser::Normaliser;
use crate::market_data::types::{now_ms, RawBook, VenueBook, VenueId};

pub mod binance;
pub mod bitfinex;
pub mod bitstamp;
pub mod bybit;
pub mod coinbase;
pub mod gemini;
pub mod huobi;
pub mod hyperliquid;
pub mod hyperliquid_types;
pub mod kraken;
pub mod kucoin;
pub mod okx;

/// Largest depth any caller may ask for, whatever the venue supports.
pub const MAX_REQUEST_DEPTH: u32 = 500;

/// The one capability the aggregation engine needs from a venue.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    fn venue(&self) -> VenueId;

    /// Fetch and normalise one book. Never returns a partially built book.
    async fn fetch_book(&self, symbol: &str, depth: u32) -> Result<VenueBook, VenueError>;
}

/// Venue-specific half of a REST adapter: symbol table, endpoint, wire format.
pub trait VenueApi: Send + Sync {
    const VENUE: VenueId;
    /// Deepest book the venue will return per side.
    const MAX_DEPTH: u32;

    /// Venue trading pair for a base symbol, if listed.
    fn pair(&self, symbol: &str) -> Option<String>;

    fn request(&self, client: &reqwest::Client, pair: &str, depth: u32) -> reqwest::RequestBuilder;

    fn parse(&self, body: &[u8]) -> Result<RawBook, VenueError>;
}

pub(crate) fn lookup_pair(table: &[(&str, &str)], symbol: &str) -> Option<String> {
    table
        .iter()
        .find(|(base, _)| base.eq_ignore_ascii_case(symbol.trim()))
        .map(|(_, pair)| pair.to_string())
}

/// Generic HTTP adapter driving a `VenueApi`.
pub struct RestAdapter<A> {
    api: A,
    client: reqwest::Client,
    timeout: Duration,
    normaliser: Normaliser,
}

impl<A: VenueApi> RestAdapter<A> {
    pub fn new(api: A, client: reqwest::Client, timeout: Duration, normaliser: Normaliser) -> Self {
        Self { api, client, timeout, normaliser }
    }

    fn transport_error(&self, err: reqwest::Error) -> VenueError {
        if err.is_timeout() {
            VenueError::Timeout(self.timeout)
        } else if let Some(status) = err.status() {
            VenueError::Http(status.as_u16())
        } else {
            VenueError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl<A: VenueApi + 'static> ExchangeAdapter for RestAdapter<A> {
    fn venue(&self) -> VenueId {
        A::VENUE
    }

    #[instrument(level = "debug", skip(self), fields(venue = %A::VENUE))]
    async fn fetch_book(&self, symbol: &str, depth: u32) -> Result<VenueBook, VenueError> {
        if depth == 0 || depth > MAX_REQUEST_DEPTH {
            return Err(VenueError::InvalidDepth(depth));
        }
        let pair = self
            .api
            .pair(symbol)
            .ok_or_else(|| VenueError::UnsupportedSymbol(symbol.to_string()))?;
        let depth = depth.min(A::MAX_DEPTH);

        let started = Instant::now();
        let response = self
            .api
            .request(&self.client, &pair, depth)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VenueError::Http(status.as_u16()));
        }
        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let raw = self.api.parse(&body)?;
        let mut book = self
            .normaliser
            .normalise(A::VENUE, symbol, raw, depth as usize, now_ms())?;
        book.latency_ms = latency_ms;

        debug!(pair = %pair, latency_ms, bids = book.bids.len(), asks = book.asks.len(), "fetched book");
        Ok(book)
    }
}

/// HTTP client knobs shared by every REST adapter.
#[derive(Debug, Clone)]
pub struct AdapterSettings {
    pub timeout: Duration,
    pub user_agent: String,
    pub normaliser: Normaliser,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(4_000),
            user_agent: concat!("lobx-sor/", env!("CARGO_PKG_VERSION")).to_string(),
            normaliser: Normaliser::default(),
        }
    }
}

/// Fixed venue -> adapter table, selected by `VenueId`.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: BTreeMap<VenueId, Arc<dyn ExchangeAdapter>>,
}

impl AdapterRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every supported venue wired to its live REST endpoint.
    pub fn standard(settings: &AdapterSettings) -> Result<Self, VenueError> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.timeout)
            .gzip(true)
            .build()
            .map_err(|e| VenueError::Transport(e.to_string()))?;

        fn rest<A: VenueApi + 'static>(
            api: A,
            client: &reqwest::Client,
            settings: &AdapterSettings,
        ) -> Arc<dyn ExchangeAdapter> {
            Arc::new(RestAdapter::new(api, client.clone(), settings.timeout, settings.normaliser.clone()))
        }

        Ok(Self::empty()
            .with(rest(binance::BinanceApi::default(), &client, settings))
            .with(rest(coinbase::CoinbaseApi::default(), &client, settings))
            .with(rest(kraken::KrakenApi::default(), &client, settings))
            .with(rest(bitfinex::BitfinexApi::default(), &client, settings))
            .with(rest(bitstamp::BitstampApi::default(), &client, settings))
            .with(rest(okx::OkxApi::default(), &client, settings))
            .with(rest(bybit::BybitApi::default(), &client, settings))
            .with(rest(kucoin::KucoinApi::default(), &client, settings))
            .with(rest(huobi::HuobiApi::default(), &client, settings))
            .with(rest(gemini::GeminiApi::default(), &client, settings))
            .with(rest(hyperliquid::HyperliquidApi::default(), &client, settings)))
    }

    /// Replaces any adapter already registered for the same venue.
    pub fn register(&mut self, adapter: Arc<dyn ExchangeAdapter>) {
        self.adapters.insert(adapter.venue(), adapter);
    }

    pub fn with(mut self, adapter: Arc<dyn ExchangeAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn get(&self, venue: VenueId) -> Option<&Arc<dyn ExchangeAdapter>> {
        self.adapters.get(&venue)
    }

    pub fn venues(&self) -> impl Iterator<Item = VenueId> + '_ {
        self.adapters.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_covers_every_venue() {
        let registry = AdapterRegistry::standard(&AdapterSettings::default()).unwrap();
        let venues: Vec<_> = registry.venues().collect();
        assert_eq!(venues, VenueId::ALL.to_vec());
        for venue in VenueId::ALL {
            assert_eq!(registry.get(venue).unwrap().venue(), venue);
        }
    }

    #[test]
    fn pair_lookup_ignores_case() {
        let table = [("BTC", "BTCUSDT"), ("ETH", "ETHUSDT")];
        assert_eq!(lookup_pair(&table, "btc").as_deref(), Some("BTCUSDT"));
        assert_eq!(lookup_pair(&table, "DOGE"), None);
    }

    #[tokio::test]
    async fn rest_adapter_rejects_bad_input_before_network() {
        let adapter = RestAdapter::new(
            binance::BinanceApi { base_url: "http://127.0.0.1:9".into() },
            reqwest::Client::new(),
            Duration::from_millis(50),
            Normaliser::default(),
        );
        assert_eq!(adapter.fetch_book("BTC", 0).await.unwrap_err(), VenueError::InvalidDepth(0));
        assert_eq!(adapter.fetch_book("BTC", 501).await.unwrap_err(), VenueError::InvalidDepth(501));
        assert_eq!(
            adapter.fetch_book("NOPE", 10).await.unwrap_err(),
            VenueError::UnsupportedSymbol("NOPE".into())
        );
    }
}
