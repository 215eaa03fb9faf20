use async_trait::async_trait;
use sqlx::Row;
use tracing::info;

use crate::persist::snapshot;
use crate::persist::types::{
    PersistResult, PersistanceError, Snapshot, SnapshotFilter, SnapshotSummary, SNAPSHOT_SCHEMA_VERSION,
};
use crate::persist::SnapshotStore;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS book_snapshots (
        id              TEXT PRIMARY KEY,
        symbol          TEXT NOT NULL,
        timestamp_ms    BIGINT NOT NULL,
        schema_version  INTEGER NOT NULL,
        exchanges       INTEGER NOT NULL DEFAULT 0,
        bid_levels      INTEGER NOT NULL DEFAULT 0,
        ask_levels      INTEGER NOT NULL DEFAULT 0,
        crossed         BOOLEAN NOT NULL DEFAULT FALSE,
        snapshot_json   TEXT NOT NULL
    )
"#;

// Tables created before the summary columns existed.
const ADD_SUMMARY_COLUMNS: &str = r#"
    ALTER TABLE book_snapshots
        ADD COLUMN IF NOT EXISTS exchanges  INTEGER NOT NULL DEFAULT 0,
        ADD COLUMN IF NOT EXISTS bid_levels INTEGER NOT NULL DEFAULT 0,
        ADD COLUMN IF NOT EXISTS ask_levels INTEGER NOT NULL DEFAULT 0,
        ADD COLUMN IF NOT EXISTS crossed    BOOLEAN NOT NULL DEFAULT FALSE
"#;

const CREATE_INDEX: &str = r#"
    CREATE INDEX IF NOT EXISTS book_snapshots_symbol_ts
    ON book_snapshots (symbol, timestamp_ms DESC)
"#;

pub struct PostgresSnapshotStore {
    connection_pool: sqlx::PgPool,
}

impl PostgresSnapshotStore {
    pub async fn connect(database_url: &str) -> PersistResult<Self> {
        let pool = sqlx::PgPool::connect(database_url).await?;
        let store = Self { connection_pool: pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn from_pool(pool: sqlx::PgPool) -> Self {
        Self { connection_pool: pool }
    }

    pub async fn ensure_schema(&self) -> PersistResult<()> {
        sqlx::query(CREATE_TABLE).execute(&self.connection_pool).await?;
        sqlx::query(ADD_SUMMARY_COLUMNS).execute(&self.connection_pool).await?;
        sqlx::query(CREATE_INDEX).execute(&self.connection_pool).await?;
        info!("snapshot schema ready");
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for PostgresSnapshotStore {
    async fn save_snapshot(&self, snap: &Snapshot) -> PersistResult<()> {
        snapshot::check_version(snap.schema_version)?;
        let snapshot_json = String::from_utf8(snapshot::to_json(snap)?)
            .map_err(|e| PersistanceError::Other(e.to_string()))?;
        let summary = snapshot::summarize(snap);

        let inserted = sqlx::query(
            r#"
            INSERT INTO book_snapshots
                (id, symbol, timestamp_ms, schema_version, exchanges, bid_levels, ask_levels, crossed, snapshot_json)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&snap.id)
        .bind(&snap.symbol)
        .bind(snap.timestamp_ms as i64)
        .bind(snap.schema_version as i32)
        .bind(summary.exchanges as i32)
        .bind(summary.bid_levels as i32)
        .bind(summary.ask_levels as i32)
        .bind(summary.crossed)
        .bind(&snapshot_json)
        .execute(&self.connection_pool)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(PersistanceError::DuplicateId(snap.id.clone()));
        }
        Ok(())
    }

    async fn get_snapshot(&self, id: &str) -> PersistResult<Option<Snapshot>> {
        let row = sqlx::query(
            r#"
            SELECT schema_version, snapshot_json
            FROM book_snapshots
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.connection_pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let schema_version: i32 = row.try_get("schema_version")?;
        snapshot::check_version(schema_version as u32)?;
        let snapshot_json: String = row.try_get("snapshot_json")?;
        Ok(Some(snapshot::from_json(snapshot_json.as_bytes())?))
    }

    async fn list_snapshots(&self, filter: &SnapshotFilter) -> PersistResult<Vec<SnapshotSummary>> {
        // other schema versions are never listed; `get_snapshot` reports them
        let rows = sqlx::query(
            r#"
            SELECT id, symbol, timestamp_ms, schema_version, exchanges, bid_levels, ask_levels, crossed
            FROM book_snapshots
            WHERE ($1::TEXT IS NULL OR upper(symbol) = upper($1))
              AND schema_version = $4
            ORDER BY timestamp_ms DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(filter.symbol.as_deref())
        .bind(filter.limit as i64)
        .bind(filter.offset as i64)
        .bind(SNAPSHOT_SCHEMA_VERSION as i32)
        .fetch_all(&self.connection_pool)
        .await?;

        rows.iter()
            .map(|row| -> PersistResult<SnapshotSummary> {
                Ok(SnapshotSummary {
                    id: row.try_get("id")?,
                    symbol: row.try_get("symbol")?,
                    timestamp_ms: row.try_get::<i64, _>("timestamp_ms")? as u64,
                    schema_version: row.try_get::<i32, _>("schema_version")? as u32,
                    exchanges: row.try_get::<i32, _>("exchanges")? as usize,
                    bid_levels: row.try_get::<i32, _>("bid_levels")? as usize,
                    ask_levels: row.try_get::<i32, _>("ask_levels")? as usize,
                    crossed: row.try_get("crossed")?,
                })
            })
            .collect()
    }
}
