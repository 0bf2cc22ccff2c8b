//! A device that performs no I/O and logs every call.
//!
//! Getters echo back whatever was last set, stability checks succeed
//! immediately, and the bridge returns a fixed reading. Used for dry runs and
//! tests; the recorded call log makes executions comparable.

use parking_lot::Mutex;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use super::device::{ContinuousAction, Device, Direction, SweepProgram};
use super::error::DeviceResult;
use super::resistivity::{Aggregate, Reading, ReadingValue};
use crate::sequence::{ApproachMode, BridgeChannel, DataFlags, DatafileMode, EndMode, SequenceMessage};

#[derive(Debug, Default)]
struct DummyState {
    temperature: f64,
    field: f64,
    position: f64,
    chamber: f64,
}

/// Logging stand-in for real instruments.
#[derive(Debug, Default)]
pub struct DummyDevice {
    state: Mutex<DummyState>,
    calls: Mutex<Vec<String>>,
    messages: Mutex<Vec<String>>,
    stored: Mutex<Vec<(Aggregate, String)>>,
}

impl DummyDevice {
    /// A device at zero temperature, field and position.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every capability call so far, formatted as `name(args)`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Messages delivered to the user.
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    /// Aggregates handed to the data store, with their data file.
    pub fn stored(&self) -> Vec<(Aggregate, String)> {
        self.stored.lock().clone()
    }

    fn record(&self, call: String) {
        info!(device = "dummy", "{call}");
        self.calls.lock().push(call);
    }
}

impl Device for DummyDevice {
    fn set_temperature(&self, temperature: f64) -> DeviceResult<()> {
        self.record(format!("set_temperature({temperature})"));
        self.state.lock().temperature = temperature;
        Ok(())
    }

    fn get_temperature(&self) -> DeviceResult<f64> {
        Ok(self.state.lock().temperature)
    }

    fn check_stable_temp(
        &self,
        target: f64,
        direction: Direction,
        approach: ApproachMode,
        _timeout: Option<Duration>,
    ) -> DeviceResult<bool> {
        self.record(format!(
            "check_stable_temp({target}, {}, {approach})",
            direction.signum()
        ));
        Ok(true)
    }

    fn program_temperature_sweep(&self, sweep: &SweepProgram) -> DeviceResult<()> {
        self.record(format!(
            "program_temperature_sweep({}, {}, {}, {})",
            sweep.start, sweep.end, sweep.n_steps, sweep.rate
        ));
        self.state.lock().temperature = sweep.end;
        Ok(())
    }

    fn set_field(&self, field: f64, end_mode: EndMode) -> DeviceResult<()> {
        self.record(format!("set_field({field}, {end_mode})"));
        self.state.lock().field = field;
        Ok(())
    }

    fn set_field_end_mode(&self, end_mode: EndMode) -> DeviceResult<()> {
        self.record(format!("set_field_end_mode({end_mode})"));
        Ok(())
    }

    fn get_field(&self) -> DeviceResult<f64> {
        Ok(self.state.lock().field)
    }

    fn check_field(
        &self,
        target: f64,
        direction: Direction,
        approach: ApproachMode,
        _timeout: Option<Duration>,
    ) -> DeviceResult<bool> {
        self.record(format!("check_field({target}, {}, {approach})", direction.signum()));
        Ok(true)
    }

    fn program_field_sweep(&self, sweep: &SweepProgram, end_mode: EndMode) -> DeviceResult<()> {
        self.record(format!(
            "program_field_sweep({}, {}, {}, {}, {end_mode})",
            sweep.start, sweep.end, sweep.n_steps, sweep.rate
        ));
        self.state.lock().field = sweep.end;
        Ok(())
    }

    fn set_position(&self, position: f64, speed_index: i64) -> DeviceResult<()> {
        self.record(format!("set_position({position}, {speed_index})"));
        self.state.lock().position = position;
        Ok(())
    }

    fn get_position(&self) -> DeviceResult<f64> {
        Ok(self.state.lock().position)
    }

    fn check_position(
        &self,
        target: f64,
        direction: Direction,
        approach: ApproachMode,
        _timeout: Option<Duration>,
    ) -> DeviceResult<bool> {
        self.record(format!("check_position({target}, {}, {approach})", direction.signum()));
        Ok(true)
    }

    fn program_position_sweep(&self, sweep: &SweepProgram, speed_index: i64) -> DeviceResult<()> {
        self.record(format!(
            "program_position_sweep({}, {}, {}, {speed_index})",
            sweep.start, sweep.end, sweep.n_steps
        ));
        self.state.lock().position = sweep.end;
        Ok(())
    }

    fn get_chamber(&self) -> DeviceResult<f64> {
        Ok(self.state.lock().chamber)
    }

    fn chamber_seal(&self) -> DeviceResult<()> {
        self.record("chamber_seal()".to_string());
        self.state.lock().chamber = 0.0;
        Ok(())
    }

    fn chamber_purge(&self) -> DeviceResult<()> {
        self.record("chamber_purge()".to_string());
        self.state.lock().chamber = 1.0;
        Ok(())
    }

    fn chamber_vent(&self) -> DeviceResult<()> {
        self.record("chamber_vent()".to_string());
        self.state.lock().chamber = 2.0;
        Ok(())
    }

    fn chamber_continuous(&self, action: ContinuousAction) -> DeviceResult<()> {
        self.record(format!("chamber_continuous({action:?})"));
        self.state.lock().chamber = match action {
            ContinuousAction::Pumping => 3.0,
            ContinuousAction::Venting => 4.0,
        };
        Ok(())
    }

    fn chamber_high_vacuum(&self) -> DeviceResult<()> {
        self.record("chamber_high_vacuum()".to_string());
        self.state.lock().chamber = 5.0;
        Ok(())
    }

    fn shutdown(&self) -> DeviceResult<()> {
        self.record("shutdown()".to_string());
        Ok(())
    }

    fn res_measure(&self, dataflags: &DataFlags, bridge: &[BridgeChannel]) -> DeviceResult<Reading> {
        self.record(format!(
            "res_measure({} flags, {} channels)",
            dataflags.enabled().len(),
            bridge.iter().filter(|c| c.enabled).count()
        ));
        Ok([("res1", 5.0), ("exc1", 10.0), ("res2", 8.0), ("exc2", 10.0)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), ReadingValue::Number(v)))
            .collect())
    }

    fn measuring_store_data(&self, data: &Aggregate, datafile: &str) -> DeviceResult<()> {
        self.record(format!("measuring_store_data({datafile:?})"));
        self.stored.lock().push((data.clone(), datafile.to_string()));
        Ok(())
    }

    fn res_datafile_comment(&self, comment: &str, datafile: &str) -> DeviceResult<()> {
        self.record(format!("res_datafile_comment({comment:?}, {datafile:?})"));
        Ok(())
    }

    fn res_change_datafile(&self, datafile: &str, mode: DatafileMode) -> DeviceResult<()> {
        self.record(format!("res_change_datafile({datafile:?}, {mode:?})"));
        Ok(())
    }

    fn exec_script(&self, path: &Path, source: &str) -> DeviceResult<()> {
        self.record(format!("exec_script({:?}, {} bytes)", path, source.len()));
        Ok(())
    }

    fn message_to_user(&self, message: &str) {
        info!(device = "dummy", "message: {message}");
        self.messages.lock().push(message.to_string());
    }

    fn execute_sequence_message(&self, message: &SequenceMessage) -> DeviceResult<()> {
        self.record(format!(
            "execute_sequence_message({}, {:?})",
            message.message_type, message.message
        ));
        Ok(())
    }
}
