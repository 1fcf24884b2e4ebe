// QR rendering - the external encoder collaborator
// Turns the payment URI into a scannable block of half-height unicode
// cells suitable for a terminal. The URI content is opaque here.

use anyhow::{Context, Result};
use qrcode::render::unicode;
use qrcode::QrCode;

/// Render a payment URI as a multi-line unicode QR block.
pub fn render_payment_qr(uri: &str) -> Result<String> {
    let code = QrCode::new(uri.as_bytes()).context("Failed to encode payment QR")?;

    Ok(code
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Dark)
        .light_color(unicode::Dense1x2::Light)
        .quiet_zone(true)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renders_nonempty_block() {
        let block =
            render_payment_qr("upi://pay?pa=lot@bank&pn=Mall Parking&am=60.00&tn=Park fee KA01")
                .unwrap();

        assert!(!block.is_empty());
        // Multi-line square-ish block
        assert!(block.lines().count() > 10);
    }

    #[test]
    fn test_deterministic_for_same_uri() {
        let uri = "upi://pay?pa=lot@bank&pn=Mall Parking&am=20.00&tn=Park fee MH12DE4321";
        assert_eq!(render_payment_qr(uri).unwrap(), render_payment_qr(uri).unwrap());
    }
}
