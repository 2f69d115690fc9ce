//! Shared SQLite handle and schema bootstrap.
//!
//! One connection, guarded by a tokio mutex so async handlers can hold it
//! across `.await` points inside a transaction without blocking the
//! executor thread. WAL mode lets signage polling reads proceed while a
//! webhook write is in flight.

use rusqlite::Connection;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct Db {
    pub conn: Arc<Mutex<Connection>>,
}

impl Db {
    pub fn open(path: &str) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS groups (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sites (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                group_id INTEGER NOT NULL REFERENCES groups(id),
                name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS stores (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                site_id INTEGER NOT NULL REFERENCES sites(id),
                group_id INTEGER NOT NULL REFERENCES groups(id),
                name TEXT NOT NULL,
                token TEXT NOT NULL UNIQUE,
                tax_id TEXT,
                biller_id TEXT
            );

            CREATE TABLE IF NOT EXISTS banking_profiles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                scope TEXT NOT NULL CHECK (scope IN ('store', 'site', 'group')),
                scope_id INTEGER NOT NULL,
                rail TEXT NOT NULL,
                biller_id TEXT,
                credentials_json TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                UNIQUE(scope, scope_id, rail)
            );

            CREATE TABLE IF NOT EXISTS fcids (
                id TEXT PRIMARY KEY,
                customer_id TEXT,
                initial_satang INTEGER NOT NULL,
                balance_satang INTEGER NOT NULL,
                payment_method TEXT NOT NULL,
                status TEXT NOT NULL,
                counter_id INTEGER,
                counter_user_id INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS counter_transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                fcid TEXT NOT NULL REFERENCES fcids(id),
                counter_id INTEGER,
                counter_user_id INTEGER,
                amount_satang INTEGER NOT NULL,
                payment_method TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS store_transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                fcid TEXT NOT NULL REFERENCES fcids(id),
                store_id INTEGER NOT NULL REFERENCES stores(id),
                amount_satang INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS back_transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ref1 TEXT NOT NULL,
                ref2 TEXT,
                ref3 TEXT,
                amount_satang INTEGER NOT NULL,
                paid_at TEXT NOT NULL,
                slip_reference TEXT UNIQUE,
                bank_account TEXT,
                store_id INTEGER REFERENCES stores(id),
                rail TEXT NOT NULL,
                raw_payload TEXT,
                status TEXT NOT NULL DEFAULT 'received',
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_back_transactions_store_paid_at
                ON back_transactions(store_id, paid_at);

            CREATE TABLE IF NOT EXISTS payment_transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                customer_id TEXT,
                merchant_id INTEGER REFERENCES stores(id),
                amount_satang INTEGER NOT NULL,
                payment_method TEXT NOT NULL,
                status TEXT NOT NULL,
                receipt_number TEXT NOT NULL UNIQUE,
                fcid TEXT REFERENCES fcids(id),
                ref1 TEXT,
                ref2 TEXT,
                ref3 TEXT,
                bank_account TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS settlements (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                store_id INTEGER NOT NULL REFERENCES stores(id),
                settlement_date TEXT NOT NULL,
                amount_satang INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                transferred_at TEXT,
                notified_at TEXT,
                receipt_printed_at TEXT,
                UNIQUE(store_id, settlement_date)
            );
            ",
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> rusqlite::Result<Self> {
        Self::open(":memory:")
    }
}
