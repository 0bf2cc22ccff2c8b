//! The capability surface a runner drives.
//!
//! Every method has a default body returning
//! [`DeviceError::NotImplemented`], so an implementation only provides the
//! instruments it actually has. The runner treats a missing capability as a
//! recoverable condition: the user is told and the next command runs.

use std::path::Path;
use std::time::Duration;
use tracing::{error, info, warn};

use super::error::{DeviceError, DeviceResult};
use super::resistivity::{Aggregate, Reading};
use crate::sequence::command::SequenceMessage;
use crate::sequence::{ApproachMode, BridgeChannel, DataFlags, DatafileMode, EndMode, MessageType, Spacing};

/// Expected direction of travel when checking a set-point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Value should be decreasing.
    Falling,
    /// No information, or not sweeping.
    Steady,
    /// Value should be increasing.
    Rising,
}

impl Direction {
    /// Direction matching the sign of `delta`.
    pub fn from_delta(delta: f64) -> Self {
        if delta > 0.0 {
            Direction::Rising
        } else if delta < 0.0 {
            Direction::Falling
        } else {
            Direction::Steady
        }
    }

    /// Numeric form: -1, 0 or 1.
    pub fn signum(self) -> i8 {
        match self {
            Direction::Falling => -1,
            Direction::Steady => 0,
            Direction::Rising => 1,
        }
    }
}

/// Continuous chamber actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinuousAction {
    /// Keep pumping.
    Pumping,
    /// Keep venting.
    Venting,
}

/// A continuous ramp the device should run on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepProgram {
    /// First value of the ramp.
    pub start: f64,
    /// Last value of the ramp.
    pub end: f64,
    /// Number of checkpoints the runner will wait for.
    pub n_steps: usize,
    /// Checkpoints in the order they will be passed.
    pub setpoints: Vec<f64>,
    /// Ramp rate in device units per minute (unused for position sweeps).
    pub rate: f64,
    /// Spacing of the checkpoints.
    pub spacing: Spacing,
}

/// Instrument capabilities used by sequence commands.
///
/// Blocking checks receive an optional timeout. With `None` they block until
/// the condition holds; with `Some(limit)` they return `Ok(false)` once the
/// limit expires so the caller can poll for pause and abort.
#[allow(unused_variables)]
pub trait Device: Send + Sync {
    /// Drive the temperature controller to `temperature`.
    fn set_temperature(&self, temperature: f64) -> DeviceResult<()> {
        Err(DeviceError::not_implemented("set_temperature"))
    }

    /// Current control temperature.
    fn get_temperature(&self) -> DeviceResult<f64> {
        Err(DeviceError::not_implemented("get_temperature"))
    }

    /// Whether the temperature has arrived at (or passed) `target`.
    fn check_stable_temp(
        &self,
        target: f64,
        direction: Direction,
        approach: ApproachMode,
        timeout: Option<Duration>,
    ) -> DeviceResult<bool> {
        Err(DeviceError::not_implemented("check_stable_temp"))
    }

    /// Start a temperature ramp.
    fn program_temperature_sweep(&self, sweep: &SweepProgram) -> DeviceResult<()> {
        Err(DeviceError::not_implemented("program_temperature_sweep"))
    }

    /// Drive the magnet to `field`, leaving it in `end_mode`.
    fn set_field(&self, field: f64, end_mode: EndMode) -> DeviceResult<()> {
        Err(DeviceError::not_implemented("set_field"))
    }

    /// Put the magnet into `end_mode` at its present field.
    fn set_field_end_mode(&self, end_mode: EndMode) -> DeviceResult<()> {
        Err(DeviceError::not_implemented("set_field_end_mode"))
    }

    /// Current field.
    fn get_field(&self) -> DeviceResult<f64> {
        Err(DeviceError::not_implemented("get_field"))
    }

    /// Whether the field has arrived at (or passed) `target`.
    fn check_field(
        &self,
        target: f64,
        direction: Direction,
        approach: ApproachMode,
        timeout: Option<Duration>,
    ) -> DeviceResult<bool> {
        Err(DeviceError::not_implemented("check_field"))
    }

    /// Start a field ramp.
    fn program_field_sweep(&self, sweep: &SweepProgram, end_mode: EndMode) -> DeviceResult<()> {
        Err(DeviceError::not_implemented("program_field_sweep"))
    }

    /// Move the sample rotator.
    fn set_position(&self, position: f64, speed_index: i64) -> DeviceResult<()> {
        Err(DeviceError::not_implemented("set_position"))
    }

    /// Current sample position.
    fn get_position(&self) -> DeviceResult<f64> {
        Err(DeviceError::not_implemented("get_position"))
    }

    /// Whether the position has arrived at (or passed) `target`.
    fn check_position(
        &self,
        target: f64,
        direction: Direction,
        approach: ApproachMode,
        timeout: Option<Duration>,
    ) -> DeviceResult<bool> {
        Err(DeviceError::not_implemented("check_position"))
    }

    /// Start a continuous position sweep.
    fn program_position_sweep(&self, sweep: &SweepProgram, speed_index: i64) -> DeviceResult<()> {
        Err(DeviceError::not_implemented("program_position_sweep"))
    }

    /// Chamber status, comparable to a chamber operation code.
    fn get_chamber(&self) -> DeviceResult<f64> {
        Err(DeviceError::not_implemented("get_chamber"))
    }

    /// Seal the chamber; blocks until sealed.
    fn chamber_seal(&self) -> DeviceResult<()> {
        Err(DeviceError::not_implemented("chamber_seal"))
    }

    /// Purge the chamber; blocks until purged.
    fn chamber_purge(&self) -> DeviceResult<()> {
        Err(DeviceError::not_implemented("chamber_purge"))
    }

    /// Vent the chamber; blocks until vented.
    fn chamber_vent(&self) -> DeviceResult<()> {
        Err(DeviceError::not_implemented("chamber_vent"))
    }

    /// Pump or vent continuously.
    fn chamber_continuous(&self, action: ContinuousAction) -> DeviceResult<()> {
        Err(DeviceError::not_implemented("chamber_continuous"))
    }

    /// Pump to high vacuum; blocks until reached.
    fn chamber_high_vacuum(&self) -> DeviceResult<()> {
        Err(DeviceError::not_implemented("chamber_high_vacuum"))
    }

    /// Bring all instruments into a safe standby configuration.
    fn shutdown(&self) -> DeviceResult<()> {
        Err(DeviceError::not_implemented("shutdown"))
    }

    /// Take one flat reading from the resistivity bridge.
    fn res_measure(&self, dataflags: &DataFlags, bridge: &[BridgeChannel]) -> DeviceResult<Reading> {
        Err(DeviceError::not_implemented("res_measure"))
    }

    /// Persist aggregated readings to `datafile`.
    fn measuring_store_data(&self, data: &Aggregate, datafile: &str) -> DeviceResult<()> {
        Err(DeviceError::not_implemented("measuring_store_data"))
    }

    /// Write a comment line into `datafile`.
    fn res_datafile_comment(&self, comment: &str, datafile: &str) -> DeviceResult<()> {
        Err(DeviceError::not_implemented("res_datafile_comment"))
    }

    /// Switch to a new data file.
    fn res_change_datafile(&self, datafile: &str, mode: DatafileMode) -> DeviceResult<()> {
        Err(DeviceError::not_implemented("res_change_datafile"))
    }

    /// Run an external script whose text has already been decoded.
    fn exec_script(&self, path: &Path, source: &str) -> DeviceResult<()> {
        Err(DeviceError::not_implemented("exec_script"))
    }

    /// Deliver a message to the operator. Defaults to the log.
    fn message_to_user(&self, message: &str) {
        info!(target: "measure_seq::user", "{message}");
    }

    /// Deliver a sequence message. Defaults to logging at the message's severity.
    fn execute_sequence_message(&self, message: &SequenceMessage) -> DeviceResult<()> {
        match message.message_type {
            MessageType::Information => info!(target: "measure_seq::user", "{}", message.message),
            MessageType::Warning => warn!(target: "measure_seq::user", "{}", message.message),
            MessageType::Error => error!(target: "measure_seq::user", "{}", message.message),
        }
        Ok(())
    }
}
