use anyhow::{Context, Result};
use chrono::Local;
use rusqlite::Connection;
use std::env;
use std::path::Path;
use tracing_subscriber::EnvFilter;

use parkdesk::{
    normalize_plate, payment_uri, receipt_lines, render_payment_qr, AppConfig, ParkingService,
    SqliteLedger,
};

const CONFIG_FILE: &str = "parkdesk.json";

fn main() -> Result<()> {
    // Quiet by default; RUST_LOG opts into diagnostics. Logs go to
    // stderr so the dashboard screen stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::load(Path::new(CONFIG_FILE))?;
    let conn = Connection::open(&config.db_path)
        .with_context(|| format!("Failed to open database {}", config.db_path))?;
    let ledger = SqliteLedger::new(conn).context("Failed to set up database")?;
    let service = ParkingService::new(ledger, config.tariff.clone());

    let args: Vec<String> = env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("list") => run_list(&service),
        Some("enter") => run_enter(&service, args.get(2)),
        Some("exit") => run_exit(&service, &config, args.get(2)),
        Some(other) => {
            eprintln!("Unknown command: {other}");
            eprintln!("Usage: parkdesk [list | enter <PLATE> | exit <PLATE>]");
            std::process::exit(2);
        }
        None => run_ui_mode(service, config),
    }
}

fn run_list(service: &ParkingService<SqliteLedger>) -> Result<()> {
    let rows = service.list_open_sessions(Local::now().naive_local())?;

    println!("🅿️  Open parking sessions");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("{:<14} {:<20} {:<10}", "Vehicle No", "Entry Time", "Duration");
    for row in &rows {
        println!(
            "{:<14} {:<20} {:<10}",
            row.vehicle_id,
            row.entry_time,
            row.parked_for.to_string()
        );
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Parked: {}", rows.len());

    Ok(())
}

fn run_enter(service: &ParkingService<SqliteLedger>, plate_arg: Option<&String>) -> Result<()> {
    let plate = normalize_plate(plate_arg.map(String::as_str).unwrap_or(""));
    if plate.is_empty() {
        eprintln!("❌ Please provide a vehicle number: parkdesk enter <PLATE>");
        std::process::exit(2);
    }

    match service.record_entry(&plate, Local::now().naive_local()) {
        Ok(confirmation) => {
            println!(
                "✓ Entry recorded for {} at {}",
                confirmation.vehicle_id,
                confirmation.entry_time.format("%H:%M:%S")
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ {e}");
            std::process::exit(1);
        }
    }
}

fn run_exit(
    service: &ParkingService<SqliteLedger>,
    config: &AppConfig,
    plate_arg: Option<&String>,
) -> Result<()> {
    let plate = normalize_plate(plate_arg.map(String::as_str).unwrap_or(""));
    if plate.is_empty() {
        eprintln!("❌ Please provide a vehicle number: parkdesk exit <PLATE>");
        std::process::exit(2);
    }

    match service.process_exit(&plate, Local::now().naive_local()) {
        Ok(receipt) => {
            println!();
            for line in receipt_lines(&receipt) {
                println!("{line}");
            }
            println!();

            let uri = payment_uri(&receipt, &config.payment);
            match render_payment_qr(&uri) {
                Ok(block) => println!("{block}"),
                Err(e) => eprintln!("QR unavailable: {e}"),
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ {e}");
            std::process::exit(1);
        }
    }
}

#[cfg(feature = "tui")]
fn run_ui_mode(service: ParkingService<SqliteLedger>, config: AppConfig) -> Result<()> {
    let capture = parkdesk::CommandCapture::new(&config.capture);
    let mut app = parkdesk::ui::App::new(service, capture, config.payment.clone());
    parkdesk::ui::run_ui(&mut app)
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_service: ParkingService<SqliteLedger>, _config: AppConfig) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the CLI: parkdesk [list | enter <PLATE> | exit <PLATE>]");
    std::process::exit(1);
}
