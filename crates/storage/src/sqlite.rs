use std::{str::FromStr, time::Duration};

use async_trait::async_trait;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};
use tracing::info;

use crate::{
    BlockSummary, Store, StoreError, TrackedTransaction, WatchedAddress,
    models::{BlockRow, TransactionRow, from_column, to_column},
    schema::{INDEXES, TABLE_SCHEMAS, TableSchema},
};

/// How long a connection waits on a locked database before failing a write
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// [`Store`] backed by a `SQLite` connection pool
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `url` and apply the schema
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool =
            SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;

        let store = Self { pool };
        store.init_schema().await?;
        info!(url, "Database ready");
        Ok(store)
    }

    /// Private in-memory database, kept alive on a single pooled connection
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn create_table(&self, schema: &TableSchema) -> Result<(), StoreError> {
        let query = format!("CREATE TABLE IF NOT EXISTS {} ({})", schema.name, schema.columns);
        sqlx::query(&query).execute(&self.pool).await?;
        Ok(())
    }

    /// Create all tables and indexes that do not exist yet
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        for schema in TABLE_SCHEMAS {
            self.create_table(schema).await?;
        }
        for index in INDEXES {
            sqlx::query(index).execute(&self.pool).await?;
        }
        Ok(())
    }
}

fn insert_error(table: &'static str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            StoreError::ConstraintViolation { table, message: db.message().to_owned() }
        }
        other => StoreError::Database(other),
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_address(&self, address: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO watched_addresses (address) VALUES (?)")
            .bind(address)
            .execute(&self.pool)
            .await
            .map_err(|e| insert_error("watched_addresses", e))?;
        Ok(())
    }

    async fn find_address(&self, address: &str) -> Result<Option<WatchedAddress>, StoreError> {
        let row = sqlx::query_as::<_, WatchedAddress>(
            "SELECT address FROM watched_addresses WHERE address = ?",
        )
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn all_addresses(&self) -> Result<Vec<WatchedAddress>, StoreError> {
        let rows = sqlx::query_as::<_, WatchedAddress>(
            "SELECT address FROM watched_addresses ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn create_transaction(&self, tx: &TrackedTransaction) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO tracked_transactions
                (hash, value, raw_encoded, from_address, to_address, block_number)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&tx.hash)
        .bind(&tx.value)
        .bind(&tx.raw_encoded)
        .bind(&tx.from)
        .bind(&tx.to)
        .bind(to_column(tx.block_number, "block_number")?)
        .execute(&self.pool)
        .await
        .map_err(|e| insert_error("tracked_transactions", e))?;
        Ok(())
    }

    async fn find_transaction(
        &self,
        hash: &str,
    ) -> Result<Option<TrackedTransaction>, StoreError> {
        let row = sqlx::query_as::<_, TransactionRow>(
            "SELECT hash, value, raw_encoded, from_address, to_address, block_number
             FROM tracked_transactions WHERE hash = ?",
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TrackedTransaction::try_from).transpose()
    }

    async fn all_transactions(&self) -> Result<Vec<TrackedTransaction>, StoreError> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            "SELECT hash, value, raw_encoded, from_address, to_address, block_number
             FROM tracked_transactions ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TrackedTransaction::try_from).collect()
    }

    async fn count_transactions(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tracked_transactions")
            .fetch_one(&self.pool)
            .await?;
        from_column(count, "count")
    }

    async fn create_block(&self, block: &BlockSummary) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO block_summaries (block_number, block_hash, transaction_count)
             VALUES (?, ?, ?)",
        )
        .bind(to_column(block.block_number, "block_number")?)
        .bind(&block.block_hash)
        .bind(to_column(block.transaction_count, "transaction_count")?)
        .execute(&self.pool)
        .await
        .map_err(|e| insert_error("block_summaries", e))?;
        Ok(())
    }

    async fn find_block(&self, number: u64) -> Result<Option<BlockSummary>, StoreError> {
        let row = sqlx::query_as::<_, BlockRow>(
            "SELECT block_number, block_hash, transaction_count
             FROM block_summaries WHERE block_number = ?",
        )
        .bind(to_column(number, "block_number")?)
        .fetch_optional(&self.pool)
        .await?;
        row.map(BlockSummary::try_from).transpose()
    }

    async fn latest_block(&self) -> Result<Option<BlockSummary>, StoreError> {
        let row = sqlx::query_as::<_, BlockRow>(
            "SELECT block_number, block_hash, transaction_count
             FROM block_summaries ORDER BY block_number DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        row.map(BlockSummary::try_from).transpose()
    }

    async fn count_blocks(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM block_summaries")
            .fetch_one(&self.pool)
            .await?;
        from_column(count, "count")
    }
}
