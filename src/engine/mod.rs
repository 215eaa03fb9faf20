// Execution planning over the consolidated book
pub mod router;  // greedy cross-venue book walk
pub mod types;   // side, fills, recommendation
