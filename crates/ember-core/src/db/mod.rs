//! SQLite incident store.
//!
//! Runtime defaults:
//! - `journal_mode = WAL` so readers never block the single writer
//! - `busy_timeout = 5s` to ride out short lock contention
//! - `foreign_keys = ON` so status posts and timeline rows follow their incident
//!
//! Every mutation runs inside a `BEGIN IMMEDIATE` transaction (see
//! [`write_tx`]); multi-statement reads share one deferred snapshot (see
//! [`read_snapshot`]).

pub mod directory;
pub mod incidents;
pub mod migrations;
pub mod playbooks;
pub mod query;
pub mod schema;
pub mod stats;
pub mod timeline;

use anyhow::Context;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::{path::Path, time::Duration};

use crate::error::{Error, Result};

/// Busy timeout used for store connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (or create) the store, apply runtime pragmas, and migrate the schema
/// to the latest version.
///
/// # Errors
///
/// Returns an error if opening, configuring or migrating the database fails.
pub fn open_store(path: &Path) -> anyhow::Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create store directory {}", parent.display()))?;
    }

    let conn = Connection::open(path)
        .with_context(|| format!("open incident store {}", path.display()))?;

    configure_connection(&conn).context("configure sqlite pragmas")?;
    migrations::migrate(&conn).context("apply store migrations")?;

    Ok(conn)
}

/// Open an existing store without creating it.
///
/// Returns `Ok(None)` when the file does not exist, which callers surface as
/// "not initialized".
///
/// # Errors
///
/// Returns an error if the file exists but cannot be opened or migrated.
pub fn try_open_store(path: &Path) -> anyhow::Result<Option<Connection>> {
    if !path.exists() {
        return Ok(None);
    }
    open_store(path).map(Some)
}

/// Fresh in-memory store with the full schema. Used by tests and benches.
///
/// # Errors
///
/// Returns an error if migration fails.
pub fn open_memory_store() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory().context("open in-memory store")?;
    conn.pragma_update(None, "foreign_keys", "ON")
        .context("enable foreign keys")?;
    migrations::migrate(&conn).context("apply store migrations")?;
    Ok(conn)
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// Run `f` inside a `BEGIN IMMEDIATE` transaction, committing on success.
///
/// Nested calls reuse the outer transaction. Any error rolls back every write
/// made by `f`.
///
/// # Errors
///
/// Returns the error from `f`, or [`Error::TransactionFailure`] when the
/// transaction cannot begin or commit.
pub fn write_tx<T>(conn: &Connection, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
    if !conn.is_autocommit() {
        return f(conn);
    }
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .map_err(|source| Error::TransactionFailure { stage: "begin", source })?;
    let out = f(&tx)?;
    tx.commit()
        .map_err(|source| Error::TransactionFailure { stage: "commit", source })?;
    Ok(out)
}

/// Run `f` against one consistent read snapshot.
///
/// # Errors
///
/// Returns the error from `f`, or [`Error::TransactionFailure`].
pub fn read_snapshot<T>(conn: &Connection, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
    if !conn.is_autocommit() {
        return f(conn);
    }
    let tx = conn
        .unchecked_transaction()
        .map_err(|source| Error::TransactionFailure { stage: "begin", source })?;
    let out = f(&tx)?;
    tx.commit()
        .map_err(|source| Error::TransactionFailure { stage: "commit", source })?;
    Ok(out)
}

/// Case-folded incident name, as stored in `incidents.name_lower` and as
/// search terms are compared against it.
pub(crate) fn fold_name(name: &str) -> String {
    name.to_lowercase()
}

/// `?1, ?2, ...` placeholders starting at `first`.
pub(crate) fn placeholders(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}
