// Receipt presentation
// Pure string assembly: display times, duration, the printable
// receipt block, and the payment URI handed to the QR encoder. The
// URI is opaque downstream; it is never parsed back.

use chrono::Duration;

use crate::config::PaymentConfig;
use crate::session::Receipt;

/// Clock display format on the printed receipt.
const RECEIPT_TIME_FORMAT: &str = "%H:%M %d/%m";

/// Format a stay duration as whole hours and minutes, truncating the
/// sub-minute remainder.
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.num_seconds().max(0);
    format!("{}h {}m", total_seconds / 3600, (total_seconds % 3600) / 60)
}

/// Payment request string in the form
/// `upi://pay?pa=<payee>&pn=<name>&am=<fee 2dp>&tn=<note>`.
pub fn payment_uri(receipt: &Receipt, payment: &PaymentConfig) -> String {
    format!(
        "upi://pay?pa={}&pn={}&am={:.2}&tn=Park fee {}",
        payment.payee_id, payment.payee_name, receipt.fee, receipt.vehicle_id
    )
}

/// Labelled detail rows, in print order.
pub fn receipt_details(receipt: &Receipt) -> Vec<(String, String)> {
    vec![
        ("Vehicle No:".to_string(), receipt.vehicle_id.clone()),
        (
            "Entry Time:".to_string(),
            receipt.entry_time.format(RECEIPT_TIME_FORMAT).to_string(),
        ),
        (
            "Exit Time:".to_string(),
            receipt.exit_time.format(RECEIPT_TIME_FORMAT).to_string(),
        ),
        ("Duration:".to_string(), format_duration(receipt.duration)),
        ("Amount:".to_string(), format!("Rs {:.2}", receipt.fee)),
    ]
}

/// Full printable receipt block, one string per line.
pub fn receipt_lines(receipt: &Receipt) -> Vec<String> {
    let mut lines = vec![
        "MALL PARKING RECEIPT".to_string(),
        "-".repeat(32),
    ];

    for (label, value) in receipt_details(receipt) {
        lines.push(format!("{:<12}{:>20}", label, value));
    }

    lines.push("-".repeat(32));
    lines.push(format!("TOTAL PAYABLE: Rs {:.2}", receipt.fee));
    lines.push("Scan to Pay via UPI".to_string());

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::parse_wire_time;

    fn sample_receipt() -> Receipt {
        let entry = parse_wire_time("2025-01-05 09:00:00").unwrap();
        let exit = parse_wire_time("2025-01-05 12:30:45").unwrap();
        Receipt {
            vehicle_id: "KA01AB1234".to_string(),
            entry_time: entry,
            exit_time: exit,
            duration: exit - entry,
            fee: 70.25,
        }
    }

    #[test]
    fn test_format_duration_truncates() {
        assert_eq!(format_duration(Duration::seconds(3 * 3600 + 25 * 60 + 59)), "3h 25m");
        assert_eq!(format_duration(Duration::seconds(59)), "0h 0m");
        // Negative durations never leave the service, but the
        // formatter still degrades safely
        assert_eq!(format_duration(Duration::seconds(-10)), "0h 0m");
    }

    #[test]
    fn test_payment_uri_shape() {
        let uri = payment_uri(&sample_receipt(), &PaymentConfig::default());
        assert_eq!(
            uri,
            "upi://pay?pa=YOUR_UPI_ID@yourbank&pn=Mall Parking&am=70.25&tn=Park fee KA01AB1234"
        );
    }

    #[test]
    fn test_payment_uri_always_two_decimals() {
        let mut receipt = sample_receipt();
        receipt.fee = 20.0;

        let uri = payment_uri(&receipt, &PaymentConfig::default());
        assert!(uri.contains("&am=20.00&"), "got {uri}");
    }

    #[test]
    fn test_receipt_detail_rows() {
        let details = receipt_details(&sample_receipt());

        let values: Vec<&str> = details.iter().map(|(_, v)| v.as_str()).collect();
        assert_eq!(
            values,
            vec!["KA01AB1234", "09:00 05/01", "12:30 05/01", "3h 30m", "Rs 70.25"]
        );
    }

    #[test]
    fn test_receipt_block_layout() {
        let lines = receipt_lines(&sample_receipt());

        assert_eq!(lines.first().unwrap(), "MALL PARKING RECEIPT");
        assert!(lines.contains(&"TOTAL PAYABLE: Rs 70.25".to_string()));
        assert_eq!(lines.last().unwrap(), "Scan to Pay via UPI");
    }
}
