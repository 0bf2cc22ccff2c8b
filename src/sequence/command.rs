use serde::{Deserialize, Serialize};
use std::fmt;

/// Names of the bridge data channels, indexed by bit position in a data-flag word.
pub const DATAFLAG_NAMES: [&str; 30] = [
    "General Status",
    "Temperature",
    "Magnetic Field",
    "Sample Position",
    "Chan 1 Resistivity",
    "Chan 1 Excitation",
    "Chan 2 Resistivity",
    "Chan 2 Excitation",
    "Chan 3 Resistivity",
    "Chan 3 Excitation",
    "Chan 4 Resistivity",
    "Chan 4 Excitation",
    "Sig Ch-1 Input Voltage",
    "Sig Ch-2 Input Voltage",
    "Digital Inputs",
    "Dr Ch-1 Current",
    "Dr Ch-1 Power",
    "Dr Ch-2 Current",
    "Dr Ch-2 Power",
    "Sample Pressure",
    "Map 20",
    "Map 21",
    "Map 22",
    "Map 23",
    "Map 24",
    "Map 25",
    "Map 26",
    "Map 27",
    "Map 28",
    "Map 29",
];

/// One node of a parsed sequence.
///
/// Only the four scan variants own children; every other variant is a leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Wait for set-points to be reached, then an extra delay.
    Wait(Wait),
    /// Bring the instruments into a safe standby configuration.
    Shutdown(Shutdown),
    /// Audible beep.
    Beep(Beep),
    /// Chamber operation (seal, purge, vent, ...).
    ChamberOp(ChamberOp),
    /// Temperature scan with a nested body.
    ScanTemperature(ScanTemperature),
    /// Field scan with a nested body.
    ScanField(ScanField),
    /// Sample position scan with a nested body.
    ScanPosition(ScanPosition),
    /// Timed repetition of a nested body.
    ScanTime(ScanTime),
    /// Single temperature set-point.
    SetTemperature(SetTemperature),
    /// Single field set-point.
    SetField(SetField),
    /// Single position move.
    SetPosition(SetPosition),
    /// Run another sequence file.
    ChainSequence(ChainSequence),
    /// Switch the data file used for stored measurements.
    ChangeDatafile(ChangeDatafile),
    /// Write a comment into the current data file.
    DatafileComment(DatafileComment),
    /// Take and aggregate resistivity readings.
    ResistivityMeasure(ResistivityMeasure),
    /// Excitation scan on the resistivity bridge (parsed, not executed).
    ResistivityExcitationScan(ResistivityExcitationScan),
    /// Free-text remark.
    Remark(Remark),
    /// Execute one external script file.
    ExecPythonSingle(ExecPython),
    /// Execute several external script files in order.
    ExecPythonMultiple(ExecPythonMultiple),
    /// Notification point for the operator.
    SequenceMessage(SequenceMessage),
}

/// Kind tag for a [`Command`]; `EndOfScan` only appears in display lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    /// [`Command::Wait`].
    Wait,
    /// [`Command::Shutdown`].
    Shutdown,
    /// [`Command::Beep`].
    Beep,
    /// [`Command::ChamberOp`].
    ChamberOp,
    /// [`Command::ScanTemperature`].
    ScanTemperature,
    /// [`Command::ScanField`].
    ScanField,
    /// [`Command::ScanPosition`].
    ScanPosition,
    /// [`Command::ScanTime`].
    ScanTime,
    /// [`Command::SetTemperature`].
    SetTemperature,
    /// [`Command::SetField`].
    SetField,
    /// [`Command::SetPosition`].
    SetPosition,
    /// [`Command::ChainSequence`].
    ChainSequence,
    /// [`Command::ChangeDatafile`].
    ChangeDatafile,
    /// [`Command::DatafileComment`].
    DatafileComment,
    /// [`Command::ResistivityMeasure`].
    ResistivityMeasure,
    /// [`Command::ResistivityExcitationScan`].
    ResistivityExcitationScan,
    /// [`Command::Remark`].
    Remark,
    /// [`Command::ExecPythonSingle`].
    ExecPythonSingle,
    /// [`Command::ExecPythonMultiple`].
    ExecPythonMultiple,
    /// [`Command::SequenceMessage`].
    SequenceMessage,
    /// Closing line of a scan block.
    EndOfScan,
}

impl Command {
    /// Kind tag of this command.
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Wait(_) => CommandKind::Wait,
            Command::Shutdown(_) => CommandKind::Shutdown,
            Command::Beep(_) => CommandKind::Beep,
            Command::ChamberOp(_) => CommandKind::ChamberOp,
            Command::ScanTemperature(_) => CommandKind::ScanTemperature,
            Command::ScanField(_) => CommandKind::ScanField,
            Command::ScanPosition(_) => CommandKind::ScanPosition,
            Command::ScanTime(_) => CommandKind::ScanTime,
            Command::SetTemperature(_) => CommandKind::SetTemperature,
            Command::SetField(_) => CommandKind::SetField,
            Command::SetPosition(_) => CommandKind::SetPosition,
            Command::ChainSequence(_) => CommandKind::ChainSequence,
            Command::ChangeDatafile(_) => CommandKind::ChangeDatafile,
            Command::DatafileComment(_) => CommandKind::DatafileComment,
            Command::ResistivityMeasure(_) => CommandKind::ResistivityMeasure,
            Command::ResistivityExcitationScan(_) => CommandKind::ResistivityExcitationScan,
            Command::Remark(_) => CommandKind::Remark,
            Command::ExecPythonSingle(_) => CommandKind::ExecPythonSingle,
            Command::ExecPythonMultiple(_) => CommandKind::ExecPythonMultiple,
            Command::SequenceMessage(_) => CommandKind::SequenceMessage,
        }
    }

    /// Human-readable, indentation-prefixed display string.
    pub fn display(&self) -> &str {
        match self {
            Command::Wait(c) => &c.display,
            Command::Shutdown(c) => &c.display,
            Command::Beep(c) => &c.display,
            Command::ChamberOp(c) => &c.display,
            Command::ScanTemperature(c) => &c.display,
            Command::ScanField(c) => &c.display,
            Command::ScanPosition(c) => &c.display,
            Command::ScanTime(c) => &c.display,
            Command::SetTemperature(c) => &c.display,
            Command::SetField(c) => &c.display,
            Command::SetPosition(c) => &c.display,
            Command::ChainSequence(c) => &c.display,
            Command::ChangeDatafile(c) => &c.display,
            Command::DatafileComment(c) => &c.display,
            Command::ResistivityMeasure(c) => &c.display,
            Command::ResistivityExcitationScan(c) => &c.display,
            Command::Remark(c) => &c.display,
            Command::ExecPythonSingle(c) => &c.display,
            Command::ExecPythonMultiple(c) => &c.display,
            Command::SequenceMessage(c) => &c.display,
        }
    }

    /// Nested body of a scan; empty for leaves.
    pub fn children(&self) -> &[Command] {
        match self {
            Command::ScanTemperature(c) => &c.children,
            Command::ScanField(c) => &c.children,
            Command::ScanPosition(c) => &c.children,
            Command::ScanTime(c) => &c.children,
            _ => &[],
        }
    }

    /// Whether this command owns a nested body.
    pub fn is_scan(&self) -> bool {
        matches!(
            self,
            Command::ScanTemperature(_)
                | Command::ScanField(_)
                | Command::ScanPosition(_)
                | Command::ScanTime(_)
        )
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<Command>> {
        match self {
            Command::ScanTemperature(c) => Some(&mut c.children),
            Command::ScanField(c) => Some(&mut c.children),
            Command::ScanPosition(c) => Some(&mut c.children),
            Command::ScanTime(c) => Some(&mut c.children),
            _ => None,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Strategy for reaching a target value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApproachMode {
    /// Set the target directly and wait for it.
    Fast,
    /// Ramp up to the target without passing it.
    NoOvershoot,
    /// Program a continuous sweep and check points as they pass.
    Sweep,
    /// Field only.
    Linear,
    /// Field only.
    Oscillate,
    /// Position scans: stop at every step.
    Pause,
}

impl fmt::Display for ApproachMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApproachMode::Fast => "Fast",
            ApproachMode::NoOvershoot => "No-Overshoot",
            ApproachMode::Sweep => "Sweep",
            ApproachMode::Linear => "Linear",
            ApproachMode::Oscillate => "Oscillate",
            ApproachMode::Pause => "Pause",
        };
        f.write_str(name)
    }
}

/// Shape used to distribute scan set-points between start and end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Spacing {
    /// Evenly spaced.
    Uniform,
    /// Follows `x²`.
    Squared,
    /// Follows `√x`.
    Sqrt,
    /// Follows `1/x`.
    Reciprocal,
    /// Follows `ln x`.
    Log,
}

impl Spacing {
    /// Reference function whose shape the set-points follow.
    pub fn shape(self, x: f64) -> f64 {
        match self {
            Spacing::Uniform => x,
            Spacing::Squared => x * x,
            Spacing::Sqrt => x.sqrt(),
            Spacing::Reciprocal => 1.0 / x,
            Spacing::Log => x.ln(),
        }
    }
}

impl fmt::Display for Spacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Spacing::Uniform => "uniform",
            Spacing::Squared => "squared",
            Spacing::Sqrt => "sqrt",
            Spacing::Reciprocal => "reciprocal",
            Spacing::Log => "log",
        };
        f.write_str(name)
    }
}

/// Terminal state of the field source after a field operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndMode {
    /// Magnet left in persistent mode with the supply ramped down.
    Persistent,
    /// Supply keeps driving the magnet.
    Driven,
}

impl fmt::Display for EndMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EndMode::Persistent => "persistent",
            EndMode::Driven => "driven",
        })
    }
}

/// How a position command interprets its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionMode {
    /// Move to an absolute position.
    MoveToPosition,
    /// Move to the index switch, then define the position there.
    MoveToIndexAndDefine,
    /// Relabel the current position without moving.
    RedefinePresentPosition,
}

impl fmt::Display for PositionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PositionMode::MoveToPosition => "move to position",
            PositionMode::MoveToIndexAndDefine => "move to index and define",
            PositionMode::RedefinePresentPosition => "redefine present position",
        })
    }
}

/// Symbolic chamber operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChamberOperation {
    /// Code 0.
    SealImmediate,
    /// Code 1.
    PurgeThenSeal,
    /// Code 2.
    VentThenSeal,
    /// Code 3.
    PumpContinuous,
    /// Code 4.
    VentContinuous,
    /// Code 5.
    HighVacuum,
}

impl ChamberOperation {
    /// Numeric code as written in sequence files.
    pub fn code(self) -> u8 {
        match self {
            ChamberOperation::SealImmediate => 0,
            ChamberOperation::PurgeThenSeal => 1,
            ChamberOperation::VentThenSeal => 2,
            ChamberOperation::PumpContinuous => 3,
            ChamberOperation::VentContinuous => 4,
            ChamberOperation::HighVacuum => 5,
        }
    }
}

impl fmt::Display for ChamberOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChamberOperation::SealImmediate => "seal immediate",
            ChamberOperation::PurgeThenSeal => "purge then seal",
            ChamberOperation::VentThenSeal => "vent then seal",
            ChamberOperation::PumpContinuous => "pump continuous",
            ChamberOperation::VentContinuous => "vent continuous",
            ChamberOperation::HighVacuum => "high vacuum",
        })
    }
}

/// Whether a new data file is appended to or overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatafileMode {
    /// Keep existing content.
    Append,
    /// Truncate first.
    Write,
}

/// Severity of a sequence message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    /// Code 0.
    Information,
    /// Code 1.
    Warning,
    /// Code 2.
    Error,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Bridge excitation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Excitation {
    /// Alternating current.
    Ac,
    /// Direct current.
    Dc,
}

/// Bridge calibration mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalibrationMode {
    /// Full calibration before each reading.
    Standard,
    /// Reuse the last calibration.
    Fast,
}

/// Spacing of an excitation range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExcitationSpacing {
    /// Evenly spaced.
    Linear,
    /// Logarithmically spaced.
    Log,
    /// Power-law spaced.
    Power,
}

/// Decoded data-flag word: which channels to record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DataFlags {
    /// One entry per bit, least significant first.
    pub bits: Vec<bool>,
}

impl DataFlags {
    /// Whether the named channel is selected.
    pub fn is_set(&self, name: &str) -> bool {
        DATAFLAG_NAMES
            .iter()
            .position(|candidate| *candidate == name)
            .and_then(|index| self.bits.get(index).copied())
            .unwrap_or(false)
    }

    /// Names of all selected channels, in bit order.
    pub fn enabled(&self) -> Vec<&'static str> {
        DATAFLAG_NAMES
            .iter()
            .zip(self.bits.iter())
            .filter(|(_, on)| **on)
            .map(|(name, _)| *name)
            .collect()
    }
}

/// Per-channel configuration of the resistivity bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeChannel {
    /// Whether the channel is read at all.
    pub enabled: bool,
    /// µA. Absent for excitation-scan setups, which scan the current instead.
    pub current_limit_ua: Option<f64>,
    /// µW.
    pub power_limit_uw: f64,
    /// mV.
    pub voltage_limit_mv: f64,
    /// Excitation type.
    pub excitation: Excitation,
    /// Calibration mode.
    pub calibration: CalibrationMode,
}

/// Excitation range scanned on one bridge channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcitationRange {
    /// First excitation.
    pub start: f64,
    /// Last excitation.
    pub end: f64,
    /// Distribution between `start` and `end`.
    pub spacing: ExcitationSpacing,
}

/// Body of [`Command::Wait`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wait {
    /// Wait for the temperature set-point.
    pub temperature: bool,
    /// Wait for the field set-point.
    pub field: bool,
    /// Wait for the position set-point.
    pub position: bool,
    /// Wait for the chamber operation.
    pub chamber: bool,
    /// Extra delay in seconds after all selected channels settled.
    pub delay: f64,
    /// Display-list text.
    pub display: String,
}

/// Body of [`Command::Shutdown`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shutdown {
    /// Display-list text.
    pub display: String,
}

/// Body of [`Command::Beep`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beep {
    /// Seconds.
    pub length: f64,
    /// Hertz.
    pub frequency: f64,
    /// Display-list text.
    pub display: String,
}

/// Body of [`Command::ChamberOp`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChamberOp {
    /// Operation to perform.
    pub operation: ChamberOperation,
    /// Display-list text.
    pub display: String,
}

/// Body of [`Command::ScanTemperature`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanTemperature {
    /// First set-point.
    pub start: f64,
    /// Last set-point.
    pub end: f64,
    /// K/min.
    pub sweep_rate: f64,
    /// Number of set-points, at least two.
    pub n_steps: usize,
    /// Distribution of set-points between `start` and `end`.
    pub spacing: Spacing,
    /// How each set-point is reached.
    pub approach: ApproachMode,
    /// Commands run at every step.
    pub children: Vec<Command>,
    /// Display-list text.
    pub display: String,
}

/// Body of [`Command::ScanField`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanField {
    /// First set-point.
    pub start: f64,
    /// Last set-point.
    pub end: f64,
    /// T/min.
    pub sweep_rate: f64,
    /// Number of set-points, at least two.
    pub n_steps: usize,
    /// Distribution of set-points between `start` and `end`.
    pub spacing: Spacing,
    /// How each set-point is reached.
    pub approach: ApproachMode,
    /// Magnet state after the operation.
    pub end_mode: EndMode,
    /// Commands run at every step.
    pub children: Vec<Command>,
    /// Display-list text.
    pub display: String,
}

/// Body of [`Command::ScanPosition`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanPosition {
    /// First position.
    pub start: f64,
    /// Last position.
    pub end: f64,
    /// Index into the mover's speed table.
    pub speed_index: i64,
    /// Number of set-points, at least two.
    pub n_steps: usize,
    /// `Pause` or `Sweep`.
    pub approach: ApproachMode,
    /// Commands run at every step.
    pub children: Vec<Command>,
    /// Display-list text.
    pub display: String,
}

/// Body of [`Command::ScanTime`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanTime {
    /// Total duration in seconds; zero repeats the body until aborted.
    pub total: f64,
    /// Number of repetitions, at least two.
    pub n_steps: usize,
    /// `Uniform` or `Log`.
    pub spacing: Spacing,
    /// Commands run at every step.
    pub children: Vec<Command>,
    /// Display-list text.
    pub display: String,
}

/// Body of [`Command::SetTemperature`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetTemperature {
    /// Target, K.
    pub temperature: f64,
    /// K/min; zero means hard-set.
    pub sweep_rate: f64,
    /// How each set-point is reached.
    pub approach: ApproachMode,
    /// Display-list text.
    pub display: String,
}

/// Body of [`Command::SetField`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetField {
    /// Target, T.
    pub field: f64,
    /// T/min; zero means hard-set.
    pub sweep_rate: f64,
    /// How each set-point is reached.
    pub approach: ApproachMode,
    /// Magnet state after the operation.
    pub end_mode: EndMode,
    /// Display-list text.
    pub display: String,
}

/// Body of [`Command::SetPosition`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetPosition {
    /// Target position.
    pub position: f64,
    /// How `position` is interpreted.
    pub mode: PositionMode,
    /// Index into the mover's speed table.
    pub speed_index: i64,
    /// Speed as written in the sequence.
    pub speed_text: String,
    /// Display-list text.
    pub display: String,
}

/// Body of [`Command::ChainSequence`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainSequence {
    /// Path of the chained file, as written in the sequence.
    pub path: String,
    /// Display-list text.
    pub display: String,
}

/// Body of [`Command::ChangeDatafile`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeDatafile {
    /// New data file.
    pub path: String,
    /// Append to or overwrite the file.
    pub mode: DatafileMode,
    /// Display-list text.
    pub display: String,
}

/// Body of [`Command::DatafileComment`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatafileComment {
    /// Comment text.
    pub comment: String,
    /// Display-list text.
    pub display: String,
}

/// Body of [`Command::ResistivityMeasure`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResistivityMeasure {
    /// Channels to record.
    pub dataflags: DataFlags,
    /// Readings taken and aggregated.
    pub reading_count: usize,
    /// Four bridge channels.
    pub bridge: Vec<BridgeChannel>,
    /// Display-list text.
    pub display: String,
}

/// Body of [`Command::ResistivityExcitationScan`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResistivityExcitationScan {
    /// Four excitation ranges, one per channel.
    pub ranges: Vec<ExcitationRange>,
    /// Number of set-points, at least two.
    pub n_steps: usize,
    /// Readings taken and aggregated.
    pub reading_count: usize,
    /// Channels to record.
    pub dataflags: DataFlags,
    /// Four bridge channels.
    pub bridge: Vec<BridgeChannel>,
    /// Display-list text.
    pub display: String,
}

/// Body of [`Command::Remark`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Remark {
    /// Remark text.
    pub text: String,
    /// Display-list text.
    pub display: String,
}

/// One script reference; body of [`Command::ExecPythonSingle`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecPython {
    /// Script path, as written in the sequence.
    pub file: String,
    /// Display-list text.
    pub display: String,
}

/// Body of [`Command::ExecPythonMultiple`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecPythonMultiple {
    /// Scripts in execution order.
    pub scripts: Vec<ExecPython>,
    /// Display-list text.
    pub display: String,
}

/// Body of [`Command::SequenceMessage`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceMessage {
    /// Minutes the message blocks before execution continues.
    pub timeout_minutes: f64,
    /// Severity.
    pub message_type: MessageType,
    /// Text shown directly to the operator.
    pub message: String,
    /// E-mail recipient.
    pub email_receiver: String,
    /// E-mail subject.
    pub email_subject: String,
    /// E-mail CC list.
    pub email_cc: String,
    /// E-mail body.
    pub email_message: String,
    /// Files attached to the e-mail.
    pub attachments: Vec<String>,
    /// Display-list text.
    pub display: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataflags_report_enabled_channels() {
        let flags = DataFlags {
            bits: vec![true, false, true],
        };
        assert!(flags.is_set("General Status"));
        assert!(!flags.is_set("Temperature"));
        assert!(flags.is_set("Magnetic Field"));
        assert!(!flags.is_set("Sample Position"));
        assert_eq!(flags.enabled(), vec!["General Status", "Magnetic Field"]);
    }

    #[test]
    fn spacing_shapes_are_monotonic_on_base_grid() {
        for spacing in [
            Spacing::Uniform,
            Spacing::Squared,
            Spacing::Sqrt,
            Spacing::Reciprocal,
            Spacing::Log,
        ] {
            let a = spacing.shape(2.0);
            let b = spacing.shape(3.0);
            assert_ne!(a, b, "{spacing} must distinguish grid points");
        }
    }

    #[test]
    fn leaves_have_no_children() {
        let cmd = Command::Shutdown(Shutdown {
            display: "Shutdown".into(),
        });
        assert!(cmd.children().is_empty());
        assert!(!cmd.is_scan());
        assert_eq!(cmd.kind(), CommandKind::Shutdown);
    }
}
