// Configuration as data
// Site-specific knobs (tariff, payee, database path, capture command)
// live in a JSON file next to the binary; every field has a default
// so a missing or partial file still yields a working setup.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::fee::Tariff;

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default)]
    pub tariff: Tariff,

    #[serde(default)]
    pub payment: PaymentConfig,

    #[serde(default)]
    pub capture: CaptureConfig,
}

fn default_db_path() -> String {
    "parkdesk.db".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            db_path: default_db_path(),
            tariff: Tariff::default(),
            payment: PaymentConfig::default(),
            capture: CaptureConfig::default(),
        }
    }
}

/// Payee identity baked into the payment URI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    #[serde(default = "default_payee_id")]
    pub payee_id: String,

    #[serde(default = "default_payee_name")]
    pub payee_name: String,
}

fn default_payee_id() -> String {
    "YOUR_UPI_ID@yourbank".to_string()
}

fn default_payee_name() -> String {
    "Mall Parking".to_string()
}

impl Default for PaymentConfig {
    fn default() -> Self {
        PaymentConfig {
            payee_id: default_payee_id(),
            payee_name: default_payee_name(),
        }
    }
}

/// External plate-scanner command. `None` means the capture feature
/// is reported as unavailable rather than failing at use time.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CaptureConfig {
    #[serde(default)]
    pub command: Option<String>,
}

impl AppConfig {
    /// Load configuration from a JSON file. A missing file is not an
    /// error: defaults apply.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}
