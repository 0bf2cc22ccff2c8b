//! Audible notifications.

use std::io::Write;
use std::process::{Command, Stdio};
use tracing::debug;

/// What happened when a beep was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeepOutcome {
    /// The external `beep` program ran successfully.
    Played,
    /// The terminal bell was rung instead; the message explains why.
    Bell(String),
}

/// Beep for `length` seconds at `frequency` Hz.
///
/// On Linux this runs the `beep` program. Anywhere else, or when the program
/// is missing or fails, the terminal bell is rung.
pub fn beep(length: f64, frequency: f64) -> BeepOutcome {
    if cfg!(target_os = "linux") {
        let millis = (length * 1e3).round().max(0.0) as u64;
        let status = Command::new("beep")
            .arg("-f")
            .arg(frequency.to_string())
            .arg("-l")
            .arg(millis.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(status) if status.success() => return BeepOutcome::Played,
            Ok(status) => debug!(%status, "beep program exited with failure"),
            Err(e) => debug!(error = %e, "beep program could not be started"),
        }
        ring_bell();
        return BeepOutcome::Bell(
            "The program \"beep\" had a problem. Maybe it is not installed?".to_string(),
        );
    }

    ring_bell();
    BeepOutcome::Bell("No controllable beep available on this platform".to_string())
}

fn ring_bell() {
    let mut stdout = std::io::stdout();
    let _ = stdout.write_all(b"\x07");
    let _ = stdout.flush();
}
