// Vehicle ledger - the storage collaborator
// The ledger exclusively owns persisted sessions. The contract is a
// plain key-value table keyed by plate: insert with a uniqueness
// constraint, point lookup, delete reporting affected rows, and a
// full scan ordered by entry time descending.

use rusqlite::{params, Connection};
use thiserror::Error;
use tracing::warn;

/// Storage-boundary failures. A uniqueness violation is expected
/// control flow (re-entry attempt); everything else carries the
/// backend message verbatim for display.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("vehicle is already recorded in the ledger")]
    UniqueViolation,

    #[error("{0}")]
    Backend(String),
}

/// One row of the open-session scan, timestamps still in wire format.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRow {
    pub vehicle_id: String,
    pub entry_time: String,
}

/// Contract of the persisted session table. Implementations own the
/// records; callers never cache results across operations.
pub trait VehicleLedger {
    /// Insert a new open session. Fails with `UniqueViolation` if the
    /// vehicle already has one.
    fn insert(&self, vehicle_id: &str, entry_time: &str) -> Result<(), LedgerError>;

    /// Entry time of the open session for this vehicle, if any.
    fn entry_time_of(&self, vehicle_id: &str) -> Result<Option<String>, LedgerError>;

    /// Delete the open session, returning the number of rows removed.
    /// Zero means the record was gone by the time the delete ran.
    fn remove(&self, vehicle_id: &str) -> Result<usize, LedgerError>;

    /// Snapshot of all open sessions, ordered by entry time
    /// descending (most recent first).
    fn scan_open(&self) -> Result<Vec<LedgerRow>, LedgerError>;
}

/// SQLite-backed ledger.
pub struct SqliteLedger {
    conn: Connection,
}

impl SqliteLedger {
    pub fn new(conn: Connection) -> Result<Self, LedgerError> {
        setup_database(&conn)?;
        Ok(Self { conn })
    }
}

pub fn setup_database(conn: &Connection) -> Result<(), LedgerError> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")
        .map_err(backend)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS vehicles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            vehicle_number TEXT UNIQUE NOT NULL,
            entry_time TEXT NOT NULL
        )",
        [],
    )
    .map_err(backend)?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_entry_time ON vehicles(entry_time)",
        [],
    )
    .map_err(backend)?;

    Ok(())
}

fn backend(err: rusqlite::Error) -> LedgerError {
    LedgerError::Backend(err.to_string())
}

impl VehicleLedger for SqliteLedger {
    fn insert(&self, vehicle_id: &str, entry_time: &str) -> Result<(), LedgerError> {
        let result = self.conn.execute(
            "INSERT INTO vehicles (vehicle_number, entry_time) VALUES (?1, ?2)",
            params![vehicle_id, entry_time],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(LedgerError::UniqueViolation)
            }
            Err(e) => {
                warn!(vehicle_id, error = %e, "ledger insert failed");
                Err(backend(e))
            }
        }
    }

    fn entry_time_of(&self, vehicle_id: &str) -> Result<Option<String>, LedgerError> {
        let result = self.conn.query_row(
            "SELECT entry_time FROM vehicles WHERE vehicle_number = ?1",
            params![vehicle_id],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(entry_time) => Ok(Some(entry_time)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => {
                warn!(vehicle_id, error = %e, "ledger lookup failed");
                Err(backend(e))
            }
        }
    }

    fn remove(&self, vehicle_id: &str) -> Result<usize, LedgerError> {
        self.conn
            .execute(
                "DELETE FROM vehicles WHERE vehicle_number = ?1",
                params![vehicle_id],
            )
            .map_err(|e| {
                warn!(vehicle_id, error = %e, "ledger delete failed");
                backend(e)
            })
    }

    fn scan_open(&self) -> Result<Vec<LedgerRow>, LedgerError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT vehicle_number, entry_time FROM vehicles
                 ORDER BY entry_time DESC",
            )
            .map_err(backend)?;

        let rows = stmt
            .query_map([], |row| {
                Ok(LedgerRow {
                    vehicle_id: row.get(0)?,
                    entry_time: row.get(1)?,
                })
            })
            .map_err(backend)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(backend)?;

        Ok(rows)
    }
}
