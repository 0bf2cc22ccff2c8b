//! Sequence execution against a device.
//!
//! A [`SequenceRunner`] walks a parsed command tree in order and turns each
//! command into calls on a [`Device`]. Execution is cooperative: every
//! command starts with a cancellation check, and every blocking wait polls
//! the shared [`RunFlags`] so a stop or pause takes effect promptly, including
//! inside chained sequences.
//!
//! Errors are sorted by kind. Missing capabilities, device faults and script
//! failures are reported to the user and the next command runs; an abort
//! unwinds to the nearest `run()`; anything else ends the run with an error.

pub mod beep;
pub mod config;
pub mod control;
pub mod device;
pub mod dummy;
pub mod error;
pub mod resistivity;
pub mod script;
pub mod timer;

mod scan;

pub use config::{RunnerConfig, Thresholds, TimeScanPolicy, load_config, write_config};
pub use control::{RunFlags, Setpoints};
pub use device::{ContinuousAction, Device, Direction, SweepProgram};
pub use dummy::DummyDevice;
pub use error::{DeviceError, DeviceResult, RunError, RunResult};
pub use resistivity::{Aggregate, AggregateReport, Reading, ReadingValue, aggregate};

use parking_lot::Mutex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::sequence::command::{
    ChangeDatafile, DatafileComment, ExecPython, ResistivityMeasure, SetPosition,
};
use crate::sequence::{
    ChainSequence, ChamberOperation, Command, CommandKind, EndMode, ParsedSequence, PositionMode,
    Wait, parse_file,
};
use beep::BeepOutcome;

/// How a call to [`SequenceRunner::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every command ran (some may have been skipped as not implemented).
    Finished,
    /// Execution was stopped.
    Aborted,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Finished => "Sequence finished!",
            Outcome::Aborted => "Aborted!",
        })
    }
}

/// Which set-points a wait covers.
#[derive(Debug, Clone, Copy, Default)]
struct WaitChannels {
    temperature: bool,
    field: bool,
    position: bool,
    chamber: bool,
}

impl From<&Wait> for WaitChannels {
    fn from(wait: &Wait) -> Self {
        Self {
            temperature: wait.temperature,
            field: wait.field,
            position: wait.position,
            chamber: wait.chamber,
        }
    }
}

/// Executes one command tree against a device.
pub struct SequenceRunner {
    id: Uuid,
    commands: Vec<Command>,
    base_dir: Option<PathBuf>,
    device: Arc<dyn Device>,
    config: Arc<RunnerConfig>,
    flags: Arc<RunFlags>,
    setpoints: Arc<Mutex<Setpoints>>,
    datafile: Mutex<String>,
    subrunner: Mutex<Option<Arc<SequenceRunner>>>,
    exec_lock: Mutex<()>,
    gate: Mutex<()>,
}

impl fmt::Debug for SequenceRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceRunner")
            .field("id", &self.id)
            .field("commands", &self.commands.len())
            .field("base_dir", &self.base_dir)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

impl SequenceRunner {
    /// Runner with the default configuration.
    pub fn new(sequence: ParsedSequence, device: Arc<dyn Device>) -> Self {
        Self::with_config(sequence, device, RunnerConfig::default())
    }

    /// Runner with an explicit configuration.
    pub fn with_config(
        sequence: ParsedSequence,
        device: Arc<dyn Device>,
        config: RunnerConfig,
    ) -> Self {
        let base_dir = sequence.base_dir().map(Path::to_path_buf);
        Self::build(
            sequence.commands,
            base_dir,
            device,
            Arc::new(config),
            Arc::new(RunFlags::new()),
            Arc::new(Mutex::new(Setpoints::default())),
        )
    }

    fn build(
        commands: Vec<Command>,
        base_dir: Option<PathBuf>,
        device: Arc<dyn Device>,
        config: Arc<RunnerConfig>,
        flags: Arc<RunFlags>,
        setpoints: Arc<Mutex<Setpoints>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            commands,
            base_dir,
            device,
            config,
            flags,
            setpoints,
            datafile: Mutex::new(String::new()),
            subrunner: Mutex::new(None),
            exec_lock: Mutex::new(()),
            gate: Mutex::new(()),
        }
    }

    /// Instance identifier used in logs and fault reports.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Root-level commands this runner executes.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Configuration in effect.
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Last commanded set-points, shared with any chained child.
    pub fn setpoints(&self) -> Setpoints {
        *self.setpoints.lock()
    }

    /// Data file that measurements and comments currently go to.
    pub fn current_datafile(&self) -> String {
        self.datafile.lock().clone()
    }

    /// Whether a chained sequence is executing right now.
    pub fn has_subrunner(&self) -> bool {
        self.subrunner.lock().is_some()
    }

    /// Whether the runner has not been stopped.
    pub fn is_running(&self) -> bool {
        self.flags.is_running()
    }

    /// Whether the runner is paused.
    pub fn is_paused(&self) -> bool {
        self.flags.is_paused()
    }

    /// Execute the whole sequence.
    ///
    /// Holds the runner's execution lock for the duration, so concurrent
    /// calls run one after another.
    pub fn run(&self) -> RunResult<Outcome> {
        let _guard = self.exec_lock.lock();
        info!(runner = %self.id, commands = self.commands.len(), "sequence started");

        match self.execute_all(&self.commands) {
            Ok(()) => {
                info!(runner = %self.id, "sequence finished");
                Ok(Outcome::Finished)
            }
            Err(RunError::Aborted) => {
                info!(runner = %self.id, "sequence aborted");
                Ok(Outcome::Aborted)
            }
            Err(e) => {
                error!(runner = %self.id, error = %e, "sequence failed");
                Err(e)
            }
        }
    }

    /// Request an abort, here and in any running chained sequence.
    pub fn stop(&self) {
        info!(runner = %self.id, "stop requested");
        self.flags.stop();
        if let Some(child) = self.subrunner.lock().as_ref() {
            child.stop();
        }
    }

    /// Park execution at the next cancellation point.
    pub fn pause(&self) {
        info!(runner = %self.id, "pause requested");
        self.flags.pause();
        if let Some(child) = self.subrunner.lock().as_ref() {
            child.pause();
        }
    }

    /// Continue after a pause.
    pub fn resume(&self) {
        info!(runner = %self.id, "resume requested");
        self.flags.resume();
        if let Some(child) = self.subrunner.lock().as_ref() {
            child.resume();
        }
    }

    /// Cancellation point: waits while paused, fails once stopped.
    pub fn check_running(&self) -> RunResult<()> {
        loop {
            if !self.flags.is_running() {
                return Err(RunError::Aborted);
            }
            if !self.flags.is_paused() {
                return Ok(());
            }
            thread::sleep(self.config.pause_poll().max(Duration::from_millis(1)));
        }
    }

    fn execute_all(&self, commands: &[Command]) -> RunResult<()> {
        for command in commands {
            if let Err(e) = self.execute_one(command) {
                self.recover(command.kind(), e)?;
            }
        }
        Ok(())
    }

    /// Report a recoverable error to the user and swallow it; pass anything else on.
    fn recover(&self, kind: CommandKind, e: RunError) -> RunResult<()> {
        if !e.is_recoverable() {
            return Err(e);
        }
        match e {
            RunError::NotImplemented(what) => {
                warn!(runner = %self.id, kind = %kind, capability = %what, "not implemented; skipping");
                self.device.message_to_user(&format!(
                    "An error occurred: {what} is not implemented. Did you maybe try to call \
                     a capability which the device does not provide?"
                ));
                Ok(())
            }
            RunError::Fault {
                runner,
                operation,
                kind: fault,
                message,
            } => {
                warn!(runner = %runner, operation, kind = %fault, message = %message, "device fault; skipping");
                self.device.message_to_user(&format!(
                    "An error occurred during {operation} ({fault}): {message}"
                ));
                Ok(())
            }
            e => {
                warn!(runner = %self.id, kind = %kind, error = %e, "script failed; skipping");
                self.device.message_to_user(&format!("An error occurred: {e}"));
                Ok(())
            }
        }
    }

    fn execute_one(&self, command: &Command) -> RunResult<()> {
        self.check_running()?;
        debug!(runner = %self.id, kind = %command.kind(), "{}", command.display().trim());

        match command {
            Command::Shutdown(_) => self.call("shutdown", |d| d.shutdown()),
            Command::Wait(wait) => self.wait(WaitChannels::from(wait), wait.delay),
            Command::Beep(b) => {
                if let BeepOutcome::Bell(notice) = beep::beep(b.length, b.frequency) {
                    self.device.message_to_user(&notice);
                }
                Ok(())
            }
            Command::ChamberOp(op) => self.execute_chamber(op.operation),
            Command::ScanTemperature(scan) => self.execute_scan_temperature(scan),
            Command::ScanField(scan) => self.execute_scan_field(scan),
            Command::ScanPosition(scan) => self.execute_scan_position(scan),
            Command::ScanTime(scan) => self.execute_scan_time(scan),
            Command::SetTemperature(set) => self.execute_set_temperature(set),
            Command::SetField(set) => self.execute_set_field(set),
            Command::SetPosition(set) => self.execute_set_position(set),
            Command::ChainSequence(chain) => self.execute_chain(chain),
            Command::ChangeDatafile(change) => self.execute_change_datafile(change),
            Command::DatafileComment(comment) => self.execute_datafile_comment(comment),
            Command::ResistivityMeasure(res) => self.execute_res_measure(res),
            Command::ResistivityExcitationScan(_) => {
                debug!(runner = %self.id, "excitation scans are not executed");
                Ok(())
            }
            Command::Remark(remark) => {
                self.device.message_to_user(&format!("remark: {}", remark.text));
                Ok(())
            }
            Command::SequenceMessage(message) => {
                self.call("execute_sequence_message", |d| d.execute_sequence_message(message))
            }
            Command::ExecPythonSingle(script) => self.execute_script(script),
            Command::ExecPythonMultiple(multiple) => {
                for script in &multiple.scripts {
                    self.check_running()?;
                    if let Err(e) = self.execute_script(script) {
                        self.recover(CommandKind::ExecPythonSingle, e)?;
                    }
                }
                Ok(())
            }
        }
    }

    /// Call the device, attaching this runner and `operation` to any failure.
    fn call<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&dyn Device) -> DeviceResult<T>,
    ) -> RunResult<T> {
        f(self.device.as_ref()).map_err(|e| match e {
            DeviceError::NotImplemented(what) => RunError::NotImplemented(what),
            DeviceError::Fault { kind, message } => RunError::Fault {
                runner: self.id,
                operation,
                kind,
                message,
            },
            DeviceError::Aborted => RunError::Aborted,
        })
    }

    fn set_temperature(&self, temperature: f64) -> RunResult<()> {
        self.setpoints.lock().temperature = Some(temperature);
        self.call("set_temperature", |d| d.set_temperature(temperature))
    }

    fn set_field(&self, field: f64, end_mode: EndMode) -> RunResult<()> {
        self.setpoints.lock().field = Some(field);
        self.call("set_field", |d| d.set_field(field, end_mode))
    }

    fn set_position(&self, position: f64, speed_index: i64) -> RunResult<()> {
        self.setpoints.lock().position = Some(position);
        self.call("set_position", |d| d.set_position(position, speed_index))
    }

    /// Wait for each selected channel to reach its set-point, then sleep `delay` seconds.
    fn wait(&self, channels: WaitChannels, delay: f64) -> RunResult<()> {
        let setpoints = self.setpoints();
        let thresholds = self.config.thresholds;

        if channels.temperature {
            self.wait_for("temperature", setpoints.temperature, thresholds.temperature, |d| {
                d.get_temperature()
            })?;
        }
        if channels.field {
            self.wait_for("field", setpoints.field, thresholds.field, |d| d.get_field())?;
        }
        if channels.position {
            self.wait_for("position", setpoints.position, thresholds.position, |d| {
                d.get_position()
            })?;
        }
        if channels.chamber {
            self.wait_for("chamber", setpoints.chamber, 0.0, |d| d.get_chamber())?;
        }
        self.sleep_checked(delay)
    }

    fn wait_for(
        &self,
        channel: &'static str,
        target: Option<f64>,
        threshold: f64,
        get: impl Fn(&dyn Device) -> DeviceResult<f64>,
    ) -> RunResult<()> {
        let Some(target) = target else {
            self.device.message_to_user(&format!(
                "No {channel} set-point has been commanded yet; not waiting for it"
            ));
            return Ok(());
        };

        let mut value = self.call("wait_for", &get)?;
        while (value - target).abs() > threshold {
            self.check_running()?;
            thread::sleep(self.config.poll_interval());
            value = self.call("wait_for", &get)?;
        }
        debug!(runner = %self.id, channel, target, value, "set-point reached");
        Ok(())
    }

    /// Sleep for `seconds`, checking for pause and abort every wait step.
    fn sleep_checked(&self, seconds: f64) -> RunResult<()> {
        let step = self.config.wait_step().max(Duration::from_millis(1));
        let total = Duration::try_from_secs_f64(seconds).unwrap_or(Duration::ZERO);
        let mut elapsed = Duration::ZERO;
        while elapsed < total {
            self.check_running()?;
            thread::sleep(step);
            elapsed += step;
        }
        Ok(())
    }

    fn execute_chamber(&self, operation: ChamberOperation) -> RunResult<()> {
        self.setpoints.lock().chamber = Some(f64::from(operation.code()));
        match operation {
            ChamberOperation::SealImmediate => self.call("chamber_seal", |d| d.chamber_seal()),
            ChamberOperation::PurgeThenSeal => {
                self.call("chamber_purge", |d| d.chamber_purge())?;
                self.call("chamber_seal", |d| d.chamber_seal())
            }
            ChamberOperation::VentThenSeal => {
                self.call("chamber_vent", |d| d.chamber_vent())?;
                self.call("chamber_seal", |d| d.chamber_seal())
            }
            ChamberOperation::PumpContinuous => self.call("chamber_continuous", |d| {
                d.chamber_continuous(ContinuousAction::Pumping)
            }),
            ChamberOperation::VentContinuous => self.call("chamber_continuous", |d| {
                d.chamber_continuous(ContinuousAction::Venting)
            }),
            ChamberOperation::HighVacuum => {
                self.call("chamber_high_vacuum", |d| d.chamber_high_vacuum())
            }
        }
    }

    fn execute_set_position(&self, set: &SetPosition) -> RunResult<()> {
        match set.mode {
            PositionMode::MoveToPosition => self.set_position(set.position, set.speed_index),
            mode => Err(RunError::NotImplemented(format!("position mode \"{mode}\""))),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path.trim());
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    fn execute_chain(&self, chain: &ChainSequence) -> RunResult<()> {
        let path = self.resolve(&chain.path);
        let parsed = match parse_file(&path, &self.config.parser_options()) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(runner = %self.id, path = %path.display(), error = %e, "chained sequence could not be loaded");
                self.device.message_to_user(&format!(
                    "Could not load chained sequence {}: {e}",
                    path.display()
                ));
                return Ok(());
            }
        };

        let child = Arc::new(Self::build(
            parsed.commands,
            path.parent().map(Path::to_path_buf),
            Arc::clone(&self.device),
            Arc::clone(&self.config),
            Arc::clone(&self.flags),
            Arc::clone(&self.setpoints),
        ));
        *child.datafile.lock() = self.current_datafile();
        info!(runner = %self.id, child = %child.id, path = %path.display(), "running chained sequence");

        *self.subrunner.lock() = Some(Arc::clone(&child));
        let outcome = child.run();
        *self.subrunner.lock() = None;

        match outcome? {
            Outcome::Finished => Ok(()),
            Outcome::Aborted => Err(RunError::Aborted),
        }
    }

    fn execute_change_datafile(&self, change: &ChangeDatafile) -> RunResult<()> {
        *self.datafile.lock() = change.path.clone();
        self.call("res_change_datafile", |d| d.res_change_datafile(&change.path, change.mode))
    }

    fn execute_datafile_comment(&self, comment: &DatafileComment) -> RunResult<()> {
        let datafile = self.current_datafile();
        self.call("res_datafile_comment", |d| {
            d.res_datafile_comment(&comment.comment, &datafile)
        })
    }

    fn execute_res_measure(&self, res: &ResistivityMeasure) -> RunResult<()> {
        if res.reading_count == 0 {
            self.device
                .message_to_user("Resistivity measurement asked for zero readings; nothing stored");
            return Ok(());
        }

        let mut readings = Vec::with_capacity(res.reading_count);
        for _ in 0..res.reading_count {
            self.check_running()?;
            readings.push(self.call("res_measure", |d| d.res_measure(&res.dataflags, &res.bridge))?);
        }

        let report = aggregate(&readings);
        for field in &report.corrupted {
            warn!(runner = %self.id, field = %field, "reading field missing from some readings");
            self.device.message_to_user(&format!(
                "An error occurred: field {field:?} is missing from some readings. \
                 Something went wrong in the resistivity measuring procedure."
            ));
        }

        let datafile = self.current_datafile();
        self.call("measuring_store_data", |d| {
            d.measuring_store_data(&report.aggregate, &datafile)
        })
    }

    fn execute_script(&self, script: &ExecPython) -> RunResult<()> {
        let loaded = script::load_script(&self.resolve(&script.file))?;
        debug!(
            runner = %self.id,
            path = %loaded.path.display(),
            encoding = ?loaded.encoding,
            "executing script"
        );
        self.call("exec_script", |d| d.exec_script(&loaded.path, &loaded.source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::{ParserOptions, parse_str};

    fn runner(text: &str) -> (SequenceRunner, Arc<DummyDevice>) {
        let device = Arc::new(DummyDevice::new());
        let parsed = parse_str(text, &ParserOptions::default()).unwrap();
        let config = RunnerConfig {
            approach_settle_secs: 0.0,
            poll_interval_secs: 0.001,
            ..RunnerConfig::default()
        };
        (SequenceRunner::with_config(parsed, device.clone(), config), device)
    }

    #[test]
    fn chamber_operations_expand_to_primitives() {
        let (runner, device) = runner("CMB CHAMBER 1\nCMB CHAMBER 3");
        assert_eq!(runner.run().unwrap(), Outcome::Finished);
        assert_eq!(
            device.calls(),
            vec!["chamber_purge()", "chamber_seal()", "chamber_continuous(Pumping)"]
        );
        assert_eq!(runner.setpoints().chamber, Some(3.0));
    }

    #[test]
    fn waiting_uses_recorded_setpoints() {
        let (runner, device) = runner("TMP TEMP 4.2,0,0\nWAITFOR 0,1,0,0,0");
        assert_eq!(runner.run().unwrap(), Outcome::Finished);
        assert_eq!(runner.setpoints().temperature, Some(4.2));
        assert!(device.messages().is_empty());
    }

    #[test]
    fn waiting_without_setpoint_informs_user() {
        let (runner, device) = runner("WAITFOR 0,0,1,0,0");
        assert_eq!(runner.run().unwrap(), Outcome::Finished);
        assert_eq!(device.messages().len(), 1);
        assert!(device.messages()[0].contains("field"));
    }

    #[test]
    fn datafile_changes_are_tracked() {
        let (runner, device) = runner("CDF \"run.dat\" 0\nDFC \"hello\"");
        runner.run().unwrap();
        assert_eq!(runner.current_datafile(), "run.dat");
        assert_eq!(
            device.calls(),
            vec![
                "res_change_datafile(\"run.dat\", Write)",
                "res_datafile_comment(\"hello\", \"run.dat\")",
            ]
        );
    }

    #[test]
    fn unsupported_position_modes_are_skipped() {
        let (runner, device) = runner("MVP MOVE 10,2,1 \"fast\"\nSHT SHUTDOWN");
        assert_eq!(runner.run().unwrap(), Outcome::Finished);
        assert_eq!(device.calls(), vec!["shutdown()"]);
        assert!(device.messages()[0].contains("redefine present position"));
    }

    #[test]
    fn stopped_runner_aborts_before_first_command() {
        let (runner, device) = runner("SHT SHUTDOWN");
        runner.stop();
        assert_eq!(runner.run().unwrap(), Outcome::Aborted);
        assert!(device.calls().is_empty());
    }

    #[test]
    fn remarks_reach_the_user() {
        let (runner, device) = runner("REM check dewar level");
        runner.run().unwrap();
        assert_eq!(device.messages(), vec!["remark: check dewar level"]);
    }

    #[test]
    fn missing_chained_file_is_reported() {
        let (runner, device) = runner("CHN /nonexistent/child.seq\nSHT SHUTDOWN");
        assert_eq!(runner.run().unwrap(), Outcome::Finished);
        assert_eq!(device.calls(), vec!["shutdown()"]);
        assert!(device.messages()[0].contains("child.seq"));
    }
}
