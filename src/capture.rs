// Plate capture - the vision collaborator
// Camera + OCR live outside this process behind a configurable
// command. Each capture delivers exactly one outcome over a one-shot
// channel; results only ever populate an input field that a human
// still has to submit, so nothing here touches ledger state.

use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;

use tracing::{info, warn};

use crate::config::CaptureConfig;

/// A recognized plate must keep at least this many characters after
/// cleanup to count as a usable read.
pub const MIN_PLATE_LEN: usize = 5;

/// Scanner commands signal operator cancellation with this exit code.
const CANCELLED_EXIT_CODE: i32 = 2;

/// Result of one capture attempt. Informational, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Cleaned plate text, ready for the input field.
    Plate(String),
    /// Camera/OCR problem or an unusable read.
    Failed(String),
    /// Operator abandoned the scan.
    Cancelled,
    /// No scanner backend configured or it could not start.
    Unavailable(String),
}

/// Asynchronous plate recognition. `begin_capture` returns a one-shot
/// receiver carrying exactly one `CaptureOutcome`; at most one capture
/// runs at a time (a second call while busy resolves immediately with
/// `Failed`).
pub trait PlateCapture {
    fn begin_capture(&self) -> Receiver<CaptureOutcome>;
}

/// Strip everything that cannot appear on a plate: uppercase, then
/// keep only A-Z and 0-9.
pub fn clean_plate_text(raw: &str) -> String {
    raw.to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Capture backed by an external scanner command. The command prints
/// the recognized text to stdout and exits 0; exit code 2 means the
/// operator cancelled at the scanner window.
pub struct CommandCapture {
    command: Option<String>,
    running: Arc<AtomicBool>,
}

impl CommandCapture {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            command: config.command.clone(),
            running: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl PlateCapture for CommandCapture {
    fn begin_capture(&self) -> Receiver<CaptureOutcome> {
        let (tx, rx) = mpsc::channel();

        let Some(command_line) = self.command.clone() else {
            let _ = tx.send(CaptureOutcome::Unavailable(
                "No scanner command configured.".to_string(),
            ));
            return rx;
        };

        // One capture at a time; a concurrent request resolves
        // immediately instead of queueing behind the camera.
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            let _ = tx.send(CaptureOutcome::Failed(
                "A scan is already in progress.".to_string(),
            ));
            return rx;
        }

        let running = Arc::clone(&self.running);
        thread::spawn(move || {
            let outcome = run_scanner(&command_line);
            running.store(false, Ordering::SeqCst);
            // Receiver may be gone (operator moved on); a late result
            // is simply discarded.
            let _ = tx.send(outcome);
        });

        rx
    }
}

fn run_scanner(command_line: &str) -> CaptureOutcome {
    let mut parts = command_line.split_whitespace();
    let Some(program) = parts.next() else {
        return CaptureOutcome::Unavailable("Scanner command is empty.".to_string());
    };

    let output = match Command::new(program).args(parts).output() {
        Ok(output) => output,
        Err(e) => {
            warn!(command = command_line, error = %e, "scanner failed to start");
            return CaptureOutcome::Unavailable(format!("Scanner not accessible: {e}"));
        }
    };

    interpret_scan(
        output.status.code(),
        output.status.success(),
        &String::from_utf8_lossy(&output.stdout),
        &String::from_utf8_lossy(&output.stderr),
    )
}

/// Map scanner process output to an outcome.
fn interpret_scan(code: Option<i32>, success: bool, stdout: &str, stderr: &str) -> CaptureOutcome {
    if code == Some(CANCELLED_EXIT_CODE) {
        info!("scan cancelled by operator");
        return CaptureOutcome::Cancelled;
    }

    if !success {
        let reason = stderr.trim().to_string();
        warn!(%reason, "scanner exited with failure");
        return CaptureOutcome::Failed(if reason.is_empty() {
            "Scanner reported a failure.".to_string()
        } else {
            reason
        });
    }

    let cleaned = clean_plate_text(stdout);
    if cleaned.len() >= MIN_PLATE_LEN {
        info!(plate = %cleaned, "plate captured");
        CaptureOutcome::Plate(cleaned)
    } else {
        CaptureOutcome::Failed("Plate text unclear, try again.".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture_with(command: &str) -> CommandCapture {
        CommandCapture::new(&CaptureConfig {
            command: Some(command.to_string()),
        })
    }

    #[test]
    fn test_clean_plate_text() {
        assert_eq!(clean_plate_text("ka-01 ab.1234\n"), "KA01AB1234");
        assert_eq!(clean_plate_text("  MH 12 DE 4321 "), "MH12DE4321");
        assert_eq!(clean_plate_text("!!??"), "");
    }

    #[test]
    fn test_unconfigured_backend_is_unavailable() {
        let capture = CommandCapture::new(&CaptureConfig { command: None });

        let outcome = capture.begin_capture().recv().unwrap();
        assert!(matches!(outcome, CaptureOutcome::Unavailable(_)));
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let capture = capture_with("definitely-not-a-real-scanner-binary");

        let outcome = capture.begin_capture().recv().unwrap();
        assert!(matches!(outcome, CaptureOutcome::Unavailable(_)));
    }

    #[test]
    fn test_successful_scan_delivers_cleaned_plate() {
        let capture = capture_with("echo ka-01-ab-1234");

        let rx = capture.begin_capture();
        assert_eq!(
            rx.recv().unwrap(),
            CaptureOutcome::Plate("KA01AB1234".to_string())
        );

        // One-shot: exactly one message, then the channel closes
        assert!(rx.recv().is_err());
    }

    #[test]
    fn test_short_read_is_unusable() {
        let capture = capture_with("echo AB1");

        let outcome = capture.begin_capture().recv().unwrap();
        assert!(matches!(outcome, CaptureOutcome::Failed(_)));
    }

    #[test]
    fn test_cancel_exit_code() {
        let outcome = interpret_scan(Some(2), false, "", "");
        assert_eq!(outcome, CaptureOutcome::Cancelled);
    }

    #[test]
    fn test_scanner_failure_carries_stderr() {
        let outcome = interpret_scan(Some(1), false, "", "Camera not accessible.\n");
        assert_eq!(
            outcome,
            CaptureOutcome::Failed("Camera not accessible.".to_string())
        );
    }

    #[test]
    fn test_busy_guard_resolves_second_request() {
        let capture = capture_with("sleep 1");

        let first = capture.begin_capture();
        let second = capture.begin_capture();

        assert_eq!(
            second.recv().unwrap(),
            CaptureOutcome::Failed("A scan is already in progress.".to_string())
        );

        // First capture still completes on its own (empty stdout is
        // an unusable read)
        assert!(matches!(first.recv().unwrap(), CaptureOutcome::Failed(_)));
    }
}
