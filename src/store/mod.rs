//! SQLite-backed relational store shared by every component.

pub mod accounts;
pub mod categories;
pub mod investments;
pub mod salary;
pub mod transactions;

use crate::core::{Error, Result};
use rust_decimal::Decimal;
use rusqlite::types::Type;
use rusqlite::{Connection, Row, Transaction, TransactionBehavior, params};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

/// Categories seeded into an empty database.
const DEFAULT_CATEGORIES: &[(&str, &str, &str, &str)] = &[
    ("Salary", "income", "#10B981", "💼"),
    ("Freelance", "income", "#10B981", "💻"),
    ("Investment Returns", "income", "#10B981", "📈"),
    ("Gifts", "income", "#10B981", "🎁"),
    ("Other Income", "income", "#10B981", "💰"),
    ("Food", "expense", "#EF4444", "🍔"),
    ("Transport", "expense", "#EF4444", "🚗"),
    ("Housing", "expense", "#EF4444", "🏠"),
    ("Health", "expense", "#EF4444", "🏥"),
    ("Education", "expense", "#EF4444", "📚"),
    ("Leisure", "expense", "#EF4444", "🎮"),
    ("Clothing", "expense", "#EF4444", "👕"),
    ("Bills", "expense", "#EF4444", "💳"),
    ("Other Expenses", "expense", "#EF4444", "💸"),
];

/// Cloneable handle to the database.
///
/// All access goes through one connection guarded by a mutex, so a closure passed to
/// [`Store::with_transaction`] observes and writes a consistent state.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::StorageFailure(format!(
                    "Failed to create directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        let mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |r| r.get(0))?;
        if !mode.eq_ignore_ascii_case("wal") {
            warn!("Could not enable WAL journal, running in {mode} mode");
        }
        debug!("Opened database at {}", path.display());
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        seed_categories(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// A panic while the guard was held leaves the mutex poisoned, but the open
    /// transaction was rolled back when it was dropped, so the connection is reused.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| {
            warn!("Recovering database connection after a panic");
            self.conn.clear_poison();
            poisoned.into_inner()
        })
    }

    /// Runs read-only or single-statement work.
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.lock();
        f(&conn)
    }

    /// Runs `f` inside an immediate transaction; any error rolls every write back.
    pub fn with_transaction<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS accounts(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        type TEXT NOT NULL,
        balance TEXT NOT NULL DEFAULT '0',
        color TEXT NOT NULL DEFAULT '#3B82F6',
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS categories(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        type TEXT NOT NULL CHECK(type IN ('income','expense')),
        color TEXT NOT NULL DEFAULT '#6B7280',
        icon TEXT NOT NULL DEFAULT '💰',
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS transactions(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        account_id INTEGER NOT NULL,
        category_id INTEGER,
        type TEXT NOT NULL CHECK(type IN ('income','expense')),
        amount TEXT NOT NULL,
        description TEXT,
        date TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(account_id) REFERENCES accounts(id) ON DELETE CASCADE,
        FOREIGN KEY(category_id) REFERENCES categories(id) ON DELETE SET NULL
    );
    CREATE INDEX IF NOT EXISTS idx_transactions_account ON transactions(account_id);
    CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);

    CREATE TABLE IF NOT EXISTS salary_config(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        amount TEXT NOT NULL,
        account_id INTEGER NOT NULL,
        category_id INTEGER,
        last_paid_month TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(account_id) REFERENCES accounts(id) ON DELETE CASCADE,
        FOREIGN KEY(category_id) REFERENCES categories(id) ON DELETE SET NULL
    );

    CREATE TABLE IF NOT EXISTS investments(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ticker TEXT NOT NULL,
        name TEXT NOT NULL,
        type TEXT NOT NULL,
        quantity TEXT NOT NULL,
        average_price TEXT NOT NULL,
        total_invested TEXT NOT NULL,
        current_price TEXT,
        current_value TEXT,
        profit_loss TEXT,
        profit_loss_percent TEXT,
        notes TEXT,
        ledger_transaction_id INTEGER,
        ledger_linked INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(ledger_transaction_id) REFERENCES transactions(id) ON DELETE SET NULL
    );
    CREATE INDEX IF NOT EXISTS idx_investments_ticker ON investments(ticker);
    "#,
    )?;
    migrate_ledger_linked(conn)
}

/// Databases created before `ledger_linked` existed get the column, with every row
/// that still holds a link marked as linked.
fn migrate_ledger_linked(conn: &Connection) -> Result<()> {
    let present: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM pragma_table_info('investments') WHERE name='ledger_linked'",
        [],
        |r| r.get(0),
    )?;
    if present {
        return Ok(());
    }
    conn.execute_batch(
        "ALTER TABLE investments ADD COLUMN ledger_linked INTEGER NOT NULL DEFAULT 0;
         UPDATE investments SET ledger_linked=1 WHERE ledger_transaction_id IS NOT NULL;",
    )?;
    debug!("Added ledger_linked column to investments");
    Ok(())
}

fn seed_categories(conn: &Connection) -> Result<()> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM categories", [], |r| r.get(0))?;
    if count > 0 {
        return Ok(());
    }
    let mut stmt =
        conn.prepare("INSERT INTO categories(name, type, color, icon) VALUES (?1, ?2, ?3, ?4)")?;
    for (name, kind, color, icon) in DEFAULT_CATEGORIES {
        stmt.execute(params![name, kind, color, icon])?;
    }
    debug!("Seeded {} default categories", DEFAULT_CATEGORIES.len());
    Ok(())
}

pub(crate) fn decimal_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    parse_decimal(idx, &raw)
}

pub(crate) fn opt_decimal_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| parse_decimal(idx, &s)).transpose()
}

fn parse_decimal(idx: usize, raw: &str) -> rusqlite::Result<Decimal> {
    raw.parse::<Decimal>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn enum_at<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
