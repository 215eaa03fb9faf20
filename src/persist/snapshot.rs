//! Pure conversions between `AggregatedBook` and the stored snapshot types.
//!
//! Nothing in here talks to a backend.

use rand::Rng;
use serde::Deserialize;
use tracing::warn;

use crate::market_data::types::now_ms;
use crate::market_data::unified_book::AggregatedBook;
use crate::persist::types::{
    PersistResult, PersistanceError, Snapshot, SnapshotFilter, SnapshotSummary, SNAPSHOT_SCHEMA_VERSION,
};

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

/// `obs_<base36 millis>_<5 random base36 chars>`
pub fn new_snapshot_id(timestamp_ms: u64) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..5)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("obs_{}_{}", base36(timestamp_ms), suffix)
}

/// Wrap a book for saving, stamped with the current time.
pub fn from_book(book: &AggregatedBook) -> Snapshot {
    let timestamp_ms = now_ms();
    Snapshot {
        id: new_snapshot_id(timestamp_ms),
        symbol: book.symbol.clone(),
        timestamp_ms,
        schema_version: SNAPSHOT_SCHEMA_VERSION,
        book: book.clone(),
    }
}

pub fn to_json(snapshot: &Snapshot) -> PersistResult<Vec<u8>> {
    Ok(serde_json::to_vec(snapshot)?)
}

#[derive(Deserialize)]
struct VersionHeader {
    schema_version: u32,
}

/// Decode a stored snapshot, refusing other schema versions before touching the book.
pub fn from_json(bytes: &[u8]) -> PersistResult<Snapshot> {
    let header: VersionHeader = serde_json::from_slice(bytes)?;
    check_version(header.schema_version)?;
    Ok(serde_json::from_slice(bytes)?)
}

pub fn check_version(found: u32) -> PersistResult<()> {
    if found != SNAPSHOT_SCHEMA_VERSION {
        return Err(PersistanceError::FormatMismatch { found, expected: SNAPSHOT_SCHEMA_VERSION });
    }
    Ok(())
}

pub fn summarize(snapshot: &Snapshot) -> SnapshotSummary {
    SnapshotSummary {
        id: snapshot.id.clone(),
        symbol: snapshot.symbol.clone(),
        timestamp_ms: snapshot.timestamp_ms,
        schema_version: snapshot.schema_version,
        exchanges: snapshot.book.exchanges.len(),
        bid_levels: snapshot.book.bids.len(),
        ask_levels: snapshot.book.asks.len(),
        crossed: snapshot.book.crossed,
    }
}

pub fn summary_to_json(summary: &SnapshotSummary) -> PersistResult<Vec<u8>> {
    Ok(serde_json::to_vec(summary)?)
}

/// Decode a stored listing row. Rows that are unreadable or from another
/// schema version are logged and skipped.
pub fn listable_summary(key: &[u8], bytes: &[u8]) -> Option<SnapshotSummary> {
    match serde_json::from_slice::<SnapshotSummary>(bytes) {
        Ok(summary) if summary.schema_version == SNAPSHOT_SCHEMA_VERSION => Some(summary),
        Ok(summary) => {
            warn!(id = %summary.id, found = summary.schema_version, "skipping snapshot from another schema version");
            None
        }
        Err(err) => {
            warn!(key = %String::from_utf8_lossy(key), %err, "skipping unreadable snapshot summary");
            None
        }
    }
}

pub fn matches(filter: &SnapshotFilter, symbol: &str) -> bool {
    filter
        .symbol
        .as_deref()
        .map_or(true, |wanted| wanted.eq_ignore_ascii_case(symbol))
}

/// Apply symbol filter, newest-first order and pagination.
pub fn select(summaries: impl IntoIterator<Item = SnapshotSummary>, filter: &SnapshotFilter) -> Vec<SnapshotSummary> {
    let mut rows: Vec<SnapshotSummary> = summaries
        .into_iter()
        .filter(|s| matches(filter, &s.symbol))
        .collect();
    rows.sort_by(|a, b| b.timestamp_ms.cmp(&a.timestamp_ms).then_with(|| b.id.cmp(&a.id)));
    rows.into_iter().skip(filter.offset).take(filter.limit).collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::market_data::types::{PriceLevel, VenueBook, VenueId};
    use crate::market_data::unified_book::consolidate;
    use rust_decimal_macros::dec;

    pub(crate) fn sample_book(symbol: &str) -> AggregatedBook {
        let venue = VenueBook::from_levels(
            symbol,
            VenueId::Kraken,
            vec![PriceLevel::new(dec!(100), dec!(1.5), VenueId::Kraken)],
            vec![PriceLevel::new(dec!(101), dec!(2), VenueId::Kraken)],
            7,
        );
        consolidate(symbol, &[venue], &[], 7)
    }

    pub(crate) fn snapshot_at(symbol: &str, id: &str, timestamp_ms: u64) -> Snapshot {
        Snapshot {
            id: id.to_string(),
            symbol: symbol.to_string(),
            timestamp_ms,
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            book: sample_book(symbol),
        }
    }

    #[test]
    fn test_id_format() {
        let id = new_snapshot_id(1_700_000_000_000);
        let parts: Vec<_> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "obs");
        assert_eq!(parts[1], base36(1_700_000_000_000));
        assert_eq!(parts[2].len(), 5);
        assert!(parts[2].bytes().all(|b| BASE36.contains(&b)));
        assert_eq!(base36(0), "0");
        assert_eq!(base36(35), "z");
        assert_eq!(base36(36), "10");
    }

    #[test]
    fn test_json_keeps_decimals_exact() {
        let snap = from_book(&sample_book("BTC"));
        let back = from_json(&to_json(&snap).unwrap()).unwrap();
        assert_eq!(back, snap);
        assert_eq!(back.book.bids[0].quantity, dec!(1.5));
    }

    #[test]
    fn test_rejects_other_schema_versions() {
        let mut snap = from_book(&sample_book("BTC"));
        snap.schema_version = SNAPSHOT_SCHEMA_VERSION + 1;
        let err = from_json(&to_json(&snap).unwrap()).unwrap_err();
        assert!(matches!(err, PersistanceError::FormatMismatch { .. }));
    }

    #[test]
    fn test_listing_skips_foreign_rows() {
        let good = summarize(&snapshot_at("BTC", "good", 1));
        let bytes = summary_to_json(&good).unwrap();
        assert_eq!(listable_summary(b"good", &bytes), Some(good.clone()));

        let old = SnapshotSummary { schema_version: 0, ..good };
        assert_eq!(listable_summary(b"old", &summary_to_json(&old).unwrap()), None);
        assert_eq!(listable_summary(b"junk", b"{not json"), None);
    }

    #[test]
    fn test_select_filters_sorts_and_pages() {
        let rows = vec![
            summarize(&snapshot_at("BTC", "a", 1)),
            summarize(&snapshot_at("ETH", "b", 2)),
            summarize(&snapshot_at("BTC", "c", 3)),
            summarize(&snapshot_at("BTC", "d", 4)),
        ];
        let filter = SnapshotFilter { symbol: Some("btc".into()), limit: 2, offset: 1 };
        let ids: Vec<_> = select(rows, &filter).into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["c", "a"]);
    }
}
