// Pure derived views over an AggregatedBook
pub mod compare;   // per-venue rankings
pub mod depth;     // cumulative depth-chart series
pub mod metrics;   // whales, walls, liquidity
