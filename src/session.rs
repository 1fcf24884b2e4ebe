// Session data model
// A session is one vehicle's open parking stay: created on entry,
// deleted exactly once on exit, never updated in place.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Textual timestamp format used at the storage boundary.
/// Local time, must round-trip exactly.
pub const WIRE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One vehicle's open parking stay. Also returned by
/// `record_entry` as the confirmation of the freshly created record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    /// Normalized plate (uppercase alphanumeric) - natural key,
    /// unique among currently-open sessions.
    pub vehicle_id: String,

    /// Set at creation, immutable thereafter.
    pub entry_time: NaiveDateTime,
}

/// Derived summary of a completed exit. Never persisted; consumed by
/// the presentation layer and discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    pub vehicle_id: String,
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    /// Non-negative: clock skew clamps to zero rather than going
    /// backwards in time.
    pub duration: Duration,
    /// Currency units, already rounded to 2 decimals and floored at
    /// the tariff minimum.
    pub fee: f64,
}

/// Normalize operator input into a plate identifier: trim whitespace
/// and uppercase. Callers must apply this before invoking the service.
pub fn normalize_plate(input: &str) -> String {
    input.trim().to_uppercase()
}

/// Format a timestamp in the storage wire format.
pub fn format_wire_time(time: NaiveDateTime) -> String {
    time.format(WIRE_TIME_FORMAT).to_string()
}

/// Parse a stored wire-format timestamp. Returns None on malformed
/// input so callers can decide between row-level sentinels and errors.
pub fn parse_wire_time(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, WIRE_TIME_FORMAT).ok()
}
