//! Error taxonomy shared across the crate.
//!
//! Validation problems never reach the network. Per-venue failures are data
//! until every venue has failed, at which point the aggregation itself fails.

use std::time::Duration;

use thiserror::Error;

use crate::market_data::types::VenueId;
use crate::persist::PersistanceError;

/// Bad caller input, rejected before any venue is contacted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol is required")]
    EmptySymbol,

    #[error("no supported venues requested (rejected: {rejected:?})")]
    NoVenues { rejected: Vec<String> },

    #[error("unknown venue `{0}`")]
    UnknownVenue(String),

    #[error("depth {depth} outside 1..={max}")]
    InvalidDepth { depth: u32, max: u32 },

    #[error("quantity must be a positive finite number, got `{0}`")]
    InvalidQuantity(String),

    #[error("unknown side `{0}` (expected buy or sell)")]
    UnknownSide(String),
}

/// A single venue fetch that did not produce a book.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VenueError {
    #[error("symbol `{0}` is not listed on this venue")]
    UnsupportedSymbol(String),

    #[error("depth {0} is out of range")]
    InvalidDepth(u32),

    #[error("no adapter registered")]
    NotRegistered,

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("HTTP status {0}")]
    Http(u16),

    #[error("venue rejected request: {0}")]
    Api(String),

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("book is empty after normalisation")]
    EmptyBook,
}

impl VenueError {
    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            VenueError::UnsupportedSymbol(_) => "unsupported_symbol",
            VenueError::InvalidDepth(_) => "invalid_depth",
            VenueError::NotRegistered => "not_registered",
            VenueError::Timeout(_) => "timeout",
            VenueError::Transport(_) => "transport",
            VenueError::Http(_) => "http",
            VenueError::Api(_) => "api",
            VenueError::Malformed(_) => "malformed",
            VenueError::EmptyBook => "empty_book",
        }
    }
}

impl From<serde_json::Error> for VenueError {
    fn from(err: serde_json::Error) -> Self {
        VenueError::Malformed(err.to_string())
    }
}

/// Typed per-venue outcome for the failure half of a fan-out.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{venue}: {error}")]
pub struct VenueFailure {
    pub venue: VenueId,
    pub error: VenueError,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("no liquidity available for {symbol}: all {} venue(s) failed", .failures.len())]
    NoLiquidityAvailable {
        symbol: String,
        failures: Vec<VenueFailure>,
    },

    #[error("aggregation cancelled")]
    Cancelled,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RouteError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Everything the external operations can fail with.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    #[error("{venue}: {source}")]
    Venue {
        venue: VenueId,
        #[source]
        source: VenueError,
    },

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Persist(#[from] PersistanceError),
}
