// Parkdesk - Single-Site Parking Management
// Exposes all modules for use in the CLI, the TUI, and tests

pub mod capture;
pub mod config;
pub mod fee;
pub mod ledger;
pub mod qr;
pub mod receipt;
pub mod service;
pub mod session;

// Only compile the dashboard when the TUI feature is enabled
#[cfg(feature = "tui")]
pub mod ui;

// Re-export commonly used types
pub use capture::{clean_plate_text, CaptureOutcome, CommandCapture, PlateCapture};
pub use config::{AppConfig, CaptureConfig, PaymentConfig};
pub use fee::Tariff;
pub use ledger::{setup_database, LedgerError, LedgerRow, SqliteLedger, VehicleLedger};
pub use qr::render_payment_qr;
pub use receipt::{format_duration, payment_uri, receipt_details, receipt_lines};
pub use service::{OpenRow, ParkError, ParkedFor, ParkingService};
pub use session::{
    format_wire_time, normalize_plate, parse_wire_time, Receipt, Session, WIRE_TIME_FORMAT,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
