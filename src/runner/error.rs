//! Error types for sequence execution
//!
//! Devices report failures as [`DeviceError`]; the runner lifts those into
//! [`RunError`] with the runner instance and operation attached, and decides
//! per variant whether to skip the command or unwind.

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use crate::sequence::SequenceError;

/// Failure reported by a device capability.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The device does not provide this capability.
    #[error("{0} is not implemented")]
    NotImplemented(String),

    /// The capability exists but failed.
    #[error("{kind}: {message}")]
    Fault {
        /// Short classification of the fault (e.g. "timeout", "io").
        kind: String,
        /// Human-readable description.
        message: String,
    },

    /// The device noticed an abort request while blocking.
    #[error("aborted by device")]
    Aborted,
}

impl DeviceError {
    /// Capability-not-implemented error for `capability`.
    pub fn not_implemented(capability: impl Into<String>) -> Self {
        DeviceError::NotImplemented(capability.into())
    }

    /// Fault of the given kind.
    pub fn fault(kind: impl Into<String>, message: impl Into<String>) -> Self {
        DeviceError::Fault {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Convenience result alias for device capabilities.
pub type DeviceResult<T> = std::result::Result<T, DeviceError>;

/// Errors surfaced while running a sequence.
#[derive(Debug, Error)]
pub enum RunError {
    /// Execution was stopped; unwinds to the nearest `run()`.
    #[error("sequence aborted")]
    Aborted,

    /// A capability needed by the current command is missing.
    #[error("{0} is not implemented")]
    NotImplemented(String),

    /// A device call failed unexpectedly.
    #[error("runner {runner}: {operation} failed ({kind}): {message}")]
    Fault {
        /// Runner instance that issued the call.
        runner: Uuid,
        /// Device operation being performed.
        operation: &'static str,
        /// Fault classification reported by the device.
        kind: String,
        /// Fault description reported by the device.
        message: String,
    },

    /// A chained sequence could not be parsed or scan set-points could not be built.
    #[error("sequence error: {0}")]
    Sequence(#[from] SequenceError),

    /// A script could not be loaded.
    #[error("script {path:?}: {message}")]
    Script {
        /// Script path after resolution.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },
}

impl RunError {
    /// Whether the runner should report this error and continue with the next command.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RunError::NotImplemented(_) | RunError::Fault { .. } | RunError::Script { .. }
        )
    }
}

/// Convenience result alias for sequence execution.
pub type RunResult<T> = std::result::Result<T, RunError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_errors_are_classified() {
        assert!(RunError::NotImplemented("shutdown".into()).is_recoverable());
        assert!(
            RunError::Fault {
                runner: Uuid::nil(),
                operation: "set_field",
                kind: "timeout".into(),
                message: "magnet did not respond".into(),
            }
            .is_recoverable()
        );
        assert!(!RunError::Aborted.is_recoverable());
        assert!(!RunError::Sequence(SequenceError::InvalidStepCount(1)).is_recoverable());
    }

    #[test]
    fn device_error_messages_name_the_capability() {
        let err = DeviceError::not_implemented("chamber_seal");
        assert_eq!(err.to_string(), "chamber_seal is not implemented");
        let err = DeviceError::fault("io", "bus error");
        assert_eq!(err.to_string(), "io: bus error");
    }
}
