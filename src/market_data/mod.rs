// Market data module entrypoint
pub mod adapters;       // venue-specific REST fetchers behind one trait
pub mod aggregator;     // concurrent fan-out + consolidation
pub mod normaliser;     // wire numbers -> decimals, raw books -> VenueBook
pub mod types;
pub mod unified_book;   // k-way merged multi-venue book + NBBO
