// Fee formula - the pricing rules
// Linear hourly rate with a minimum charge. Pure and deterministic so
// the same entry/exit pair always prices identically.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Pricing parameters. Defaults match the site's posted tariff:
/// 20 currency units per hour, 20 minimum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tariff {
    #[serde(default = "default_rate")]
    pub rate_per_hour: f64,

    #[serde(default = "default_minimum")]
    pub minimum_fee: f64,
}

fn default_rate() -> f64 {
    20.0
}

fn default_minimum() -> f64 {
    20.0
}

impl Default for Tariff {
    fn default() -> Self {
        Tariff {
            rate_per_hour: default_rate(),
            minimum_fee: default_minimum(),
        }
    }
}

impl Tariff {
    /// Fee for a stay from `entry` to `exit`.
    ///
    /// `raw = (exit - entry) in hours * rate_per_hour`, rounded to
    /// 2 decimals half-up (away from zero), then floored at
    /// `minimum_fee`. An exit earlier than the entry (clock skew)
    /// yields a negative raw fee which the floor clamps to the
    /// minimum; skew is never an error.
    pub fn fee(&self, entry: NaiveDateTime, exit: NaiveDateTime) -> f64 {
        let duration_hours = (exit - entry).num_seconds() as f64 / 3600.0;
        let raw = round_2dp(duration_hours * self.rate_per_hour);
        if raw < self.minimum_fee {
            self.minimum_fee
        } else {
            raw
        }
    }
}

/// Round to 2 decimal places, half away from zero.
fn round_2dp(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
