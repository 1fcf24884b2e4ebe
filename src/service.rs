// Parking service - the business rules
// Entry recording (uniqueness delegated to the ledger), exit
// processing (lookup, fee, delete), and the dashboard projection.
// Every operation re-reads ledger state; nothing is cached across
// calls, so each decision is made against current data.

use std::fmt;

use chrono::{Duration, NaiveDateTime};
use thiserror::Error;
use tracing::{info, warn};

use crate::fee::Tariff;
use crate::ledger::{LedgerError, VehicleLedger};
use crate::session::{format_wire_time, parse_wire_time, Receipt, Session};

/// Business-rule failures, returned as values and shown to the
/// operator as actionable messages. None of them leave the ledger in
/// an inconsistent state: every mutation is a single atomic call.
#[derive(Debug, Error, PartialEq)]
pub enum ParkError {
    /// Re-entry of a vehicle that already has an open session.
    /// Expected control flow, user-correctable.
    #[error("vehicle {0} is already marked as parked")]
    AlreadyParked(String),

    /// Exit requested for a vehicle with no open session.
    #[error("vehicle {0} not found in records")]
    NotFound(String),

    /// The delete removed zero rows: the session vanished between
    /// lookup and delete. The exit is NOT processed and no receipt is
    /// issued.
    #[error("vehicle {0} could not be removed from the ledger")]
    RemovalFailed(String),

    /// Transport/service failure, backend message preserved verbatim.
    /// Not retried.
    #[error("cloud error: {0}")]
    Storage(String),
}

impl From<LedgerError> for ParkError {
    fn from(err: LedgerError) -> Self {
        match err {
            // Callers with a vehicle in hand remap this to AlreadyParked
            LedgerError::UniqueViolation => ParkError::Storage(err.to_string()),
            LedgerError::Backend(msg) => ParkError::Storage(msg),
        }
    }
}

/// Per-row duration on the dashboard. A malformed stored timestamp
/// degrades that row to `Unknown` without aborting the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParkedFor {
    Elapsed { hours: i64, minutes: i64 },
    Unknown,
}

impl fmt::Display for ParkedFor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParkedFor::Elapsed { hours, minutes } => write!(f, "{}h {}m", hours, minutes),
            ParkedFor::Unknown => write!(f, "Error"),
        }
    }
}

/// One dashboard row: plate, stored entry time (verbatim wire text),
/// and the duration derived at listing time.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenRow {
    pub vehicle_id: String,
    pub entry_time: String,
    pub parked_for: ParkedFor,
}

/// The session lifecycle orchestrator. Owns nothing but its
/// collaborators: ledger access goes through the trait, pricing
/// through the tariff.
pub struct ParkingService<L: VehicleLedger> {
    ledger: L,
    tariff: Tariff,
}

impl<L: VehicleLedger> ParkingService<L> {
    pub fn new(ledger: L, tariff: Tariff) -> Self {
        Self { ledger, tariff }
    }

    /// Record a vehicle entry at `now`.
    ///
    /// `vehicle_id` must already be normalized (trimmed, uppercased,
    /// non-empty) - see `session::normalize_plate`. The uniqueness
    /// check is delegated to the ledger's constraint: a violation
    /// means the vehicle is already parked and is rejected, not
    /// overwritten.
    pub fn record_entry(
        &self,
        vehicle_id: &str,
        now: NaiveDateTime,
    ) -> Result<Session, ParkError> {
        match self.ledger.insert(vehicle_id, &format_wire_time(now)) {
            Ok(()) => {
                info!(vehicle_id, "entry recorded");
                Ok(Session {
                    vehicle_id: vehicle_id.to_string(),
                    entry_time: now,
                })
            }
            Err(LedgerError::UniqueViolation) => {
                Err(ParkError::AlreadyParked(vehicle_id.to_string()))
            }
            Err(LedgerError::Backend(msg)) => Err(ParkError::Storage(msg)),
        }
    }

    /// Process a vehicle exit at `now`: lookup, price, delete, and
    /// only then issue the receipt.
    ///
    /// The fee is computed from the entry time fetched by the lookup,
    /// not re-read after deletion, so the priced duration is stable
    /// however long the delete takes. A delete that removes zero rows
    /// (lost race with a concurrent removal) fails closed with
    /// `RemovalFailed`: no receipt, nothing to charge.
    pub fn process_exit(
        &self,
        vehicle_id: &str,
        now: NaiveDateTime,
    ) -> Result<Receipt, ParkError> {
        let entry_text = self
            .ledger
            .entry_time_of(vehicle_id)?
            .ok_or_else(|| ParkError::NotFound(vehicle_id.to_string()))?;

        let entry_time = parse_wire_time(&entry_text).ok_or_else(|| {
            warn!(vehicle_id, entry_time = %entry_text, "stored entry time is malformed");
            ParkError::Storage(format!("stored entry time is malformed: {entry_text}"))
        })?;

        let fee = self.tariff.fee(entry_time, now);

        if self.ledger.remove(vehicle_id)? == 0 {
            warn!(vehicle_id, "exit lost race with a concurrent removal");
            return Err(ParkError::RemovalFailed(vehicle_id.to_string()));
        }

        info!(vehicle_id, fee, "exit processed");

        let duration = (now - entry_time).max(Duration::zero());
        Ok(Receipt {
            vehicle_id: vehicle_id.to_string(),
            entry_time,
            exit_time: now,
            duration,
            fee,
        })
    }

    /// Snapshot of all open sessions for the dashboard, most recent
    /// entry first (ledger scan order, preserved). Durations are
    /// derived per row at call time; a row whose stored timestamp
    /// does not parse reports `ParkedFor::Unknown` while every other
    /// row still renders.
    pub fn list_open_sessions(&self, now: NaiveDateTime) -> Result<Vec<OpenRow>, ParkError> {
        let rows = self.ledger.scan_open()?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let parked_for = match parse_wire_time(&row.entry_time) {
                    Some(entry) => {
                        let total_seconds = (now - entry).num_seconds().max(0);
                        ParkedFor::Elapsed {
                            hours: total_seconds / 3600,
                            minutes: (total_seconds % 3600) / 60,
                        }
                    }
                    None => {
                        warn!(
                            vehicle_id = %row.vehicle_id,
                            entry_time = %row.entry_time,
                            "unparseable entry time in listing"
                        );
                        ParkedFor::Unknown
                    }
                };

                OpenRow {
                    vehicle_id: row.vehicle_id,
                    entry_time: row.entry_time,
                    parked_for,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{LedgerRow, SqliteLedger};
    use rusqlite::Connection;

    fn t(text: &str) -> NaiveDateTime {
        parse_wire_time(text).unwrap()
    }

    fn sqlite_service() -> ParkingService<SqliteLedger> {
        let conn = Connection::open_in_memory().unwrap();
        ParkingService::new(SqliteLedger::new(conn).unwrap(), Tariff::default())
    }

    #[test]
    fn test_double_entry_rejected() {
        let service = sqlite_service();

        service
            .record_entry("KA01AB1234", t("2025-01-05 09:00:00"))
            .unwrap();

        let second = service.record_entry("KA01AB1234", t("2025-01-05 09:05:00"));
        assert_eq!(
            second.unwrap_err(),
            ParkError::AlreadyParked("KA01AB1234".to_string())
        );
    }

    #[test]
    fn test_exit_unknown_vehicle_not_found() {
        let service = sqlite_service();

        let result = service.process_exit("ZZ99ZZ9999", t("2025-01-05 12:00:00"));
        assert_eq!(
            result.unwrap_err(),
            ParkError::NotFound("ZZ99ZZ9999".to_string())
        );
    }

    #[test]
    fn test_exit_prices_and_removes() {
        let service = sqlite_service();

        service
            .record_entry("KA01AB1234", t("2025-01-05 09:00:00"))
            .unwrap();

        let receipt = service
            .process_exit("KA01AB1234", t("2025-01-05 12:00:00"))
            .unwrap();

        assert_eq!(receipt.fee, 60.0);
        assert_eq!(receipt.duration, Duration::hours(3));
        assert_eq!(receipt.entry_time, t("2025-01-05 09:00:00"));
        assert_eq!(receipt.exit_time, t("2025-01-05 12:00:00"));

        // Session is gone: a second exit is NotFound
        let again = service.process_exit("KA01AB1234", t("2025-01-05 12:01:00"));
        assert_eq!(
            again.unwrap_err(),
            ParkError::NotFound("KA01AB1234".to_string())
        );
    }

    #[test]
    fn test_short_stay_charged_minimum() {
        let service = sqlite_service();

        service
            .record_entry("KA01AB1234", t("2025-01-05 09:00:00"))
            .unwrap();

        let receipt = service
            .process_exit("KA01AB1234", t("2025-01-05 09:30:00"))
            .unwrap();

        assert_eq!(receipt.fee, 20.0);
    }

    #[test]
    fn test_clock_skew_exit_still_succeeds() {
        let service = sqlite_service();

        service
            .record_entry("KA01AB1234", t("2025-01-05 09:00:00"))
            .unwrap();

        // Exit "before" entry: minimum fee, zero duration, no error
        let receipt = service
            .process_exit("KA01AB1234", t("2025-01-05 08:00:00"))
            .unwrap();

        assert_eq!(receipt.fee, 20.0);
        assert_eq!(receipt.duration, Duration::zero());
    }

    #[test]
    fn test_listing_orders_and_derives_durations() {
        let service = sqlite_service();

        service
            .record_entry("OLD1X", t("2025-01-05 08:00:00"))
            .unwrap();
        service
            .record_entry("NEW3X", t("2025-01-05 11:45:00"))
            .unwrap();
        service
            .record_entry("MID2X", t("2025-01-05 10:15:00"))
            .unwrap();

        let rows = service.list_open_sessions(t("2025-01-05 12:00:00")).unwrap();

        let order: Vec<&str> = rows.iter().map(|r| r.vehicle_id.as_str()).collect();
        assert_eq!(order, vec!["NEW3X", "MID2X", "OLD1X"]);

        assert_eq!(
            rows[0].parked_for,
            ParkedFor::Elapsed { hours: 0, minutes: 15 }
        );
        assert_eq!(
            rows[2].parked_for,
            ParkedFor::Elapsed { hours: 4, minutes: 0 }
        );
    }

    #[test]
    fn test_malformed_row_isolated_in_listing() {
        let conn = Connection::open_in_memory().unwrap();
        let ledger = SqliteLedger::new(conn).unwrap();

        // One healthy row, one corrupted row written behind the
        // service's back
        ledger.insert("GOOD1", "2025-01-05 10:00:00").unwrap();
        ledger.insert("BAD02", "garbage-timestamp").unwrap();

        let service = ParkingService::new(ledger, Tariff::default());
        let rows = service.list_open_sessions(t("2025-01-05 12:00:00")).unwrap();

        assert_eq!(rows.len(), 2);
        for row in &rows {
            match row.vehicle_id.as_str() {
                "GOOD1" => assert_eq!(
                    row.parked_for,
                    ParkedFor::Elapsed { hours: 2, minutes: 0 }
                ),
                "BAD02" => assert_eq!(row.parked_for, ParkedFor::Unknown),
                other => panic!("unexpected row {other}"),
            }
        }
    }

    #[test]
    fn test_parked_for_display() {
        let elapsed = ParkedFor::Elapsed { hours: 3, minutes: 7 };
        assert_eq!(elapsed.to_string(), "3h 7m");
        assert_eq!(ParkedFor::Unknown.to_string(), "Error");
    }

    // Ledger double that simulates losing the delete race: the lookup
    // sees a session but the delete affects zero rows.
    struct VanishingLedger;

    impl VehicleLedger for VanishingLedger {
        fn insert(&self, _: &str, _: &str) -> Result<(), LedgerError> {
            Ok(())
        }

        fn entry_time_of(&self, _: &str) -> Result<Option<String>, LedgerError> {
            Ok(Some("2025-01-05 09:00:00".to_string()))
        }

        fn remove(&self, _: &str) -> Result<usize, LedgerError> {
            Ok(0)
        }

        fn scan_open(&self) -> Result<Vec<LedgerRow>, LedgerError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_lost_delete_race_fails_closed() {
        let service = ParkingService::new(VanishingLedger, Tariff::default());

        let result = service.process_exit("KA01AB1234", t("2025-01-05 12:00:00"));
        assert_eq!(
            result.unwrap_err(),
            ParkError::RemovalFailed("KA01AB1234".to_string())
        );
    }

    #[test]
    fn test_storage_failure_surfaces_verbatim() {
        struct BrokenLedger;

        impl VehicleLedger for BrokenLedger {
            fn insert(&self, _: &str, _: &str) -> Result<(), LedgerError> {
                Err(LedgerError::Backend("connection reset".to_string()))
            }

            fn entry_time_of(&self, _: &str) -> Result<Option<String>, LedgerError> {
                Err(LedgerError::Backend("connection reset".to_string()))
            }

            fn remove(&self, _: &str) -> Result<usize, LedgerError> {
                Err(LedgerError::Backend("connection reset".to_string()))
            }

            fn scan_open(&self) -> Result<Vec<LedgerRow>, LedgerError> {
                Err(LedgerError::Backend("connection reset".to_string()))
            }
        }

        let service = ParkingService::new(BrokenLedger, Tariff::default());

        let err = service
            .record_entry("KA01AB1234", t("2025-01-05 09:00:00"))
            .unwrap_err();
        assert_eq!(err, ParkError::Storage("connection reset".to_string()));
        assert_eq!(err.to_string(), "cloud error: connection reset");
    }
}
