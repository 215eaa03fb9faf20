//! Multi-venue order book aggregation and smart order routing.
//!
//! Books are fetched from every requested venue concurrently, normalised,
//! k-way merged into one venue-tagged ladder per side, analysed, and
//! optionally walked to plan a cross-venue execution.

pub mod analytics;
pub mod config;
pub mod engine;
pub mod error;
pub mod market_data;
pub mod persist;
pub mod service;
pub mod telemetry;

pub use error::{AggregationError, RouteError, ServiceError, ValidationError, VenueError, VenueFailure};
pub use market_data::types::{BookSide, PriceLevel, VenueBook, VenueId, VenueStatus};
pub use market_data::unified_book::AggregatedBook;
