//! Schema definitions for `SQLite` tables

/// Table schema definition
#[derive(Debug)]
pub struct TableSchema {
    /// Table name
    pub name: &'static str,
    /// Column definitions
    pub columns: &'static str,
}

/// Schema definitions for tables
pub const TABLE_SCHEMAS: &[TableSchema] = &[
    TableSchema {
        name: "watched_addresses",
        columns: "id INTEGER PRIMARY KEY AUTOINCREMENT,
                 address TEXT NOT NULL UNIQUE,
                 created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))",
    },
    TableSchema {
        name: "tracked_transactions",
        columns: "id INTEGER PRIMARY KEY AUTOINCREMENT,
                 hash TEXT NOT NULL UNIQUE,
                 value TEXT NOT NULL,
                 raw_encoded TEXT NOT NULL,
                 from_address TEXT NOT NULL,
                 to_address TEXT NOT NULL,
                 block_number INTEGER NOT NULL,
                 created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))",
    },
    TableSchema {
        name: "block_summaries",
        columns: "id INTEGER PRIMARY KEY AUTOINCREMENT,
                 block_number INTEGER NOT NULL UNIQUE,
                 block_hash TEXT NOT NULL,
                 transaction_count INTEGER NOT NULL,
                 created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))",
    },
];

/// Secondary indexes
pub const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_tracked_transactions_from ON tracked_transactions(from_address)",
    "CREATE INDEX IF NOT EXISTS idx_tracked_transactions_to ON tracked_transactions(to_address)",
    "CREATE INDEX IF NOT EXISTS idx_tracked_transactions_block ON tracked_transactions(block_number)",
];
