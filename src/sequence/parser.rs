use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::command::*;
use super::decode::{parse_dataflags, parse_strings, read_numbers};
use super::{Result, SequenceError};

/// Line prefixes, one capture group each. The group index selects the decoder.
const PREFIXES: [&str; 16] = [
    r"TMP TEMP(.*?)$",
    r"FLD FIELD(.*?)$",
    r"SCAN(.*?)$",
    r"WAITFOR(.*?)$",
    r"CHN(.*?)$",
    r"CDF(.*?)$",
    r"DFC(.*?)$",
    r"LPI(.*?)$",
    r"SHT(.*?)DOWN",
    r"(EN.*?|\.\.\.)EOS$",
    r"RES(.*?)$",
    r"BEP BEEP(.*?)$",
    r"CMB CHAMBER(.*?)$",
    r"REM(.*?)$",
    r"MVP MOVE(.*?)$",
    r"MES(.*?)$",
];

const SET_TEMP: usize = 1;
const SET_FIELD: usize = 2;
const SCAN: usize = 3;
const WAITFOR: usize = 4;
const CHAIN: usize = 5;
const CHANGE_DATAFILE: usize = 6;
const DATAFILE_COMMENT: usize = 7;
const EXCITATION_SCAN: usize = 8;
const SHUTDOWN: usize = 9;
const END_OF_SCAN: usize = 10;
const RES_MEASURE: usize = 11;
const BEEP: usize = 12;
const CHAMBER: usize = 13;
const REMARK: usize = 14;
const MOVE: usize = 15;
const MESSAGE: usize = 16;

static LINE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(&PREFIXES.join("|")).expect("line pattern is valid"));

/// Options controlling how display strings are produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParserOptions {
    /// Indentation unit repeated once per nesting level.
    pub nesting_unit: String,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            nesting_unit: "   ".to_string(),
        }
    }
}

/// One entry of the flattened display list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayLine {
    /// Kind of the command this line represents.
    pub kind: CommandKind,
    /// Indented display text.
    pub text: String,
}

/// Result of parsing a whole sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSequence {
    /// Root-level commands in execution order.
    pub commands: Vec<Command>,
    /// Depth-first display list, including nested commands and scan ends.
    pub display: Vec<DisplayLine>,
    /// File the sequence was read from, if any.
    pub source: Option<PathBuf>,
}

impl ParsedSequence {
    /// Directory against which relative chained paths resolve.
    pub fn base_dir(&self) -> Option<&Path> {
        self.source.as_deref().and_then(Path::parent)
    }
}

/// Parse a sequence file from disk.
pub fn parse_file(path: impl AsRef<Path>, options: &ParserOptions) -> Result<ParsedSequence> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let mut parsed = parse_str(&text, options)?;
    parsed.source = Some(path.to_path_buf());
    debug!(path = %path.display(), commands = parsed.commands.len(), "parsed sequence file");
    Ok(parsed)
}

/// Parse sequence text held in memory.
pub fn parse_str(text: &str, options: &ParserOptions) -> Result<ParsedSequence> {
    let lines: Vec<&str> = text.lines().collect();
    parse_lines(&lines, options)
}

/// Parse a list of raw sequence lines.
pub fn parse_lines<S: AsRef<str>>(lines: &[S], options: &ParserOptions) -> Result<ParsedSequence> {
    let lines: Vec<&str> = lines.iter().map(|line| line.as_ref()).collect();
    let mut parser = Parser::new(&lines, options);
    let block = parser.parse_block()?;
    debug_assert!(!block.closed, "top-level blocks never close");
    let display = flatten(&block.commands, options);
    Ok(ParsedSequence {
        commands: block.commands,
        display,
        source: None,
    })
}

/// Depth-first display list for a command tree.
pub fn flatten(commands: &[Command], options: &ParserOptions) -> Vec<DisplayLine> {
    let mut out = Vec::new();
    flatten_into(commands, 0, options, &mut out);
    out
}

fn flatten_into(
    commands: &[Command],
    depth: usize,
    options: &ParserOptions,
    out: &mut Vec<DisplayLine>,
) {
    for command in commands {
        out.push(DisplayLine {
            kind: command.kind(),
            text: command.display().to_string(),
        });
        match command {
            Command::ExecPythonMultiple(multiple) => {
                out.extend(multiple.scripts.iter().map(|script| DisplayLine {
                    kind: CommandKind::ExecPythonSingle,
                    text: script.display.clone(),
                }));
            }
            _ if command.is_scan() => {
                flatten_into(command.children(), depth + 1, options, out);
                out.push(DisplayLine {
                    kind: CommandKind::EndOfScan,
                    text: format!("{}EOS", options.nesting_unit.repeat(depth)),
                });
            }
            _ => {}
        }
    }
}

/// Outcome of decoding one line.
enum LineOutcome {
    Command(Command),
    EndOfScan,
    Skip,
}

/// Commands collected at one nesting level.
struct Block {
    commands: Vec<Command>,
    /// Whether the block ended on an end-of-scan sentinel rather than end of input.
    closed: bool,
}

struct Parser<'a> {
    lines: &'a [&'a str],
    index: usize,
    depth: usize,
    options: &'a ParserOptions,
}

impl<'a> Parser<'a> {
    fn new(lines: &'a [&'a str], options: &'a ParserOptions) -> Self {
        Self {
            lines,
            index: 0,
            depth: 0,
            options,
        }
    }

    fn next_line(&mut self) -> Option<(usize, &'a str)> {
        let line = *self.lines.get(self.index)?;
        self.index += 1;
        Some((self.index, line.trim_end()))
    }

    fn parse_block(&mut self) -> Result<Block> {
        let mut commands = Vec::new();
        while let Some((number, line)) = self.next_line() {
            match self.parse_line(line, number)? {
                LineOutcome::Command(command) => commands.push(command),
                LineOutcome::Skip => {}
                LineOutcome::EndOfScan => {
                    if self.depth == 0 {
                        return Err(SequenceError::UnexpectedEndOfScan { line: number });
                    }
                    return Ok(Block {
                        commands,
                        closed: true,
                    });
                }
            }
        }
        Ok(Block {
            commands,
            closed: false,
        })
    }

    fn parse_line(&mut self, line: &str, number: usize) -> Result<LineOutcome> {
        let Some(caps) = LINE_PATTERN.captures(line) else {
            return Ok(LineOutcome::Skip);
        };
        let Some(group) = (1..=PREFIXES.len()).find(|i| caps.get(*i).is_some()) else {
            return Ok(LineOutcome::Skip);
        };
        let payload = payload(&caps, group);

        let command = match group {
            SET_TEMP => self.set_temperature(line, number)?,
            SET_FIELD => self.set_field(line, number)?,
            SCAN => self.scan(payload, line, number)?,
            WAITFOR => self.waiting(line, number)?,
            CHAIN => self.chain_sequence(payload),
            CHANGE_DATAFILE => self.change_datafile(line, number)?,
            DATAFILE_COMMENT => self.datafile_comment(line, number)?,
            EXCITATION_SCAN => self.excitation_scan(line, number)?,
            SHUTDOWN => Command::Shutdown(Shutdown {
                display: format!("{}Shutdown", self.indent()),
            }),
            END_OF_SCAN => return Ok(LineOutcome::EndOfScan),
            RES_MEASURE => self.res_measure(line, number)?,
            BEEP => self.beep(line, number)?,
            CHAMBER => self.chamber(line, number)?,
            REMARK => self.remark(payload),
            MOVE => self.set_position(line, number)?,
            MESSAGE => self.sequence_message(line, number)?,
            _ => return Ok(LineOutcome::Skip),
        };
        Ok(LineOutcome::Command(command))
    }

    fn indent(&self) -> String {
        self.options.nesting_unit.repeat(self.depth)
    }

    fn scan(&mut self, payload: &str, line: &str, number: usize) -> Result<Command> {
        let letter = payload.trim_start().chars().next();
        let mut command = match letter {
            Some('T') => self.scan_temperature(line, number)?,
            Some('H') => self.scan_field(line, number)?,
            Some('P') => self.scan_position(line, number)?,
            Some('C') => self.scan_time(line, number)?,
            other => {
                return Err(SequenceError::UnknownScanType {
                    letter: other.map(String::from).unwrap_or_default(),
                    line: number,
                });
            }
        };

        self.depth += 1;
        let block = self.parse_block()?;
        self.depth -= 1;
        if !block.closed {
            warn!(line = number, "scan block not terminated before end of input");
        }
        if let Some(children) = command.children_mut() {
            *children = block.commands;
        }
        Ok(command)
    }

    fn scan_temperature(&self, line: &str, number: usize) -> Result<Command> {
        let nums = numbers(line, 6, "temperature scan", number)?;
        let spacing = match code(nums[4]) {
            0 => Spacing::Uniform,
            1 => Spacing::Reciprocal,
            2 => Spacing::Log,
            other => return Err(invalid("temperature spacing", other, number)),
        };
        let approach = temperature_approach(code(nums[5]), number)?;
        let (start, end, sweep_rate, n_steps) = (nums[0], nums[1], nums[2], steps(nums[3]));
        Ok(Command::ScanTemperature(ScanTemperature {
            start,
            end,
            sweep_rate,
            n_steps,
            spacing,
            approach,
            children: Vec::new(),
            display: format!(
                "{}Scan Temperature from {start} to {end} in {n_steps} steps, {sweep_rate}K/min, {approach}, {spacing}",
                self.indent()
            ),
        }))
    }

    fn scan_field(&self, line: &str, number: usize) -> Result<Command> {
        let nums = numbers(line, 7, "field scan", number)?;
        let spacing = match code(nums[4]) {
            0 => Spacing::Uniform,
            1 => Spacing::Squared,
            2 => Spacing::Sqrt,
            3 => Spacing::Reciprocal,
            4 => Spacing::Log,
            other => return Err(invalid("field spacing", other, number)),
        };
        let approach = match code(nums[5]) {
            0 => ApproachMode::Linear,
            1 => ApproachMode::NoOvershoot,
            2 => ApproachMode::Oscillate,
            3 => ApproachMode::Sweep,
            other => return Err(invalid("field approach mode", other, number)),
        };
        let end_mode = end_mode(code(nums[6]), number)?;
        let (start, end, sweep_rate, n_steps) = (nums[0], nums[1], nums[2], steps(nums[3]));
        Ok(Command::ScanField(ScanField {
            start,
            end,
            sweep_rate,
            n_steps,
            spacing,
            approach,
            end_mode,
            children: Vec::new(),
            display: format!(
                "{}Scan Field from {start} to {end} in {n_steps} steps, {sweep_rate}T/min, {approach}, {spacing}, {end_mode}",
                self.indent()
            ),
        }))
    }

    fn scan_position(&self, line: &str, number: usize) -> Result<Command> {
        let nums = numbers(line, 4, "position scan", number)?;
        let approach = match nums.get(4).map(|v| code(*v)) {
            Some(1) => ApproachMode::Sweep,
            _ => ApproachMode::Pause,
        };
        let (start, end, speed_index, n_steps) = (nums[0], nums[1], code(nums[2]), steps(nums[3]));
        Ok(Command::ScanPosition(ScanPosition {
            start,
            end,
            speed_index,
            n_steps,
            approach,
            children: Vec::new(),
            display: format!(
                "{}Scan Position from {start} to {end} in {n_steps} steps, {speed_index}, {approach}",
                self.indent()
            ),
        }))
    }

    fn scan_time(&self, line: &str, number: usize) -> Result<Command> {
        let nums = numbers(line, 3, "time scan", number)?;
        let spacing = match code(nums[2]) {
            0 => Spacing::Uniform,
            1 => Spacing::Log,
            other => return Err(invalid("time spacing", other, number)),
        };
        let (total, n_steps) = (nums[0], steps(nums[1]));
        Ok(Command::ScanTime(ScanTime {
            total,
            n_steps,
            spacing,
            children: Vec::new(),
            display: format!(
                "{}Scan Time {total}secs in {n_steps} steps, {spacing}",
                self.indent()
            ),
        }))
    }

    fn set_temperature(&self, line: &str, number: usize) -> Result<Command> {
        let nums = numbers(line, 3, "set temperature", number)?;
        let approach = temperature_approach(code(nums[2]), number)?;
        let (temperature, sweep_rate) = (nums[0], nums[1]);
        Ok(Command::SetTemperature(SetTemperature {
            temperature,
            sweep_rate,
            approach,
            display: format!(
                "{}Set Temperature to {temperature} at {sweep_rate}K/min, {approach}",
                self.indent()
            ),
        }))
    }

    fn set_field(&self, line: &str, number: usize) -> Result<Command> {
        let nums = numbers(line, 4, "set field", number)?;
        let approach = match code(nums[2]) {
            0 => ApproachMode::Linear,
            1 => ApproachMode::NoOvershoot,
            2 => ApproachMode::Oscillate,
            other => return Err(invalid("field approach mode", other, number)),
        };
        let end_mode = end_mode(code(nums[3]), number)?;
        let (field, sweep_rate) = (nums[0], nums[1]);
        Ok(Command::SetField(SetField {
            field,
            sweep_rate,
            approach,
            end_mode,
            display: format!(
                "{}Set Field to {field} at {sweep_rate}T/min, {approach}, {end_mode}",
                self.indent()
            ),
        }))
    }

    fn set_position(&self, line: &str, number: usize) -> Result<Command> {
        let nums = numbers(line, 3, "set position", number)?;
        let mode = match code(nums[1]) {
            0 => PositionMode::MoveToPosition,
            1 => PositionMode::MoveToIndexAndDefine,
            2 => PositionMode::RedefinePresentPosition,
            other => return Err(invalid("position mode", other, number)),
        };
        let speed_text = parse_strings(line).into_iter().next().unwrap_or_default();
        let (position, speed_index) = (nums[0], code(nums[2]));
        Ok(Command::SetPosition(SetPosition {
            position,
            mode,
            speed_index,
            display: format!(
                "{}Move Sample Position to {position} with SpeedIndex {speed_index} ({speed_text}), Mode: {mode}",
                self.indent()
            ),
            speed_text,
        }))
    }

    fn waiting(&self, line: &str, number: usize) -> Result<Command> {
        let nums = numbers(line, 5, "wait", number)?;
        let wait = Wait {
            delay: nums[0],
            temperature: code(nums[1]) != 0,
            field: code(nums[2]) != 0,
            position: code(nums[3]) != 0,
            chamber: code(nums[4]) != 0,
            display: String::new(),
        };
        let channels: Vec<&str> = [
            (wait.temperature, "Temperature"),
            (wait.field, "Field"),
            (wait.position, "Position"),
            (wait.chamber, "Chamber"),
        ]
        .into_iter()
        .filter(|(on, _)| *on)
        .map(|(_, name)| name)
        .collect();
        let text = if channels.is_empty() {
            format!("Wait {} seconds", wait.delay)
        } else {
            format!("Wait for {} & {} seconds more", channels.join(", "), wait.delay)
        };
        Ok(Command::Wait(Wait {
            display: format!("{}{text}", self.indent()),
            ..wait
        }))
    }

    fn chain_sequence(&self, payload: &str) -> Command {
        let path = payload.trim().to_string();
        Command::ChainSequence(ChainSequence {
            display: format!("{}Chain sequence: {path}", self.indent()),
            path,
        })
    }

    fn change_datafile(&self, line: &str, number: usize) -> Result<Command> {
        let path = first_string(line, "data file path", number)?;
        let mode = if line.trim_end().ends_with('1') {
            DatafileMode::Append
        } else {
            DatafileMode::Write
        };
        Ok(Command::ChangeDatafile(ChangeDatafile {
            display: format!("{}Change data file: {path}", self.indent()),
            path,
            mode,
        }))
    }

    fn datafile_comment(&self, line: &str, number: usize) -> Result<Command> {
        let comment = first_string(line, "data file comment", number)?;
        Ok(Command::DatafileComment(DatafileComment {
            display: format!("{}Datafile Comment: {comment}", self.indent()),
            comment,
        }))
    }

    fn res_measure(&self, line: &str, number: usize) -> Result<Command> {
        let nums = numbers(line, 26, "resistivity measurement", number)?;
        let dataflags = parse_dataflags(nums[0].max(0.0) as u64);
        let reading_count = steps(nums[1]);
        let bridge = nums[2..26]
            .chunks(6)
            .map(|c| BridgeChannel {
                enabled: code(c[0]) == 2,
                current_limit_ua: Some(c[1]),
                power_limit_uw: c[2],
                excitation: excitation(c[3]),
                calibration: calibration(c[4]),
                voltage_limit_mv: c[5],
            })
            .collect::<Vec<_>>();

        let channels: Vec<String> = bridge
            .iter()
            .enumerate()
            .map(|(i, channel)| match (channel.enabled, channel.current_limit_ua) {
                (true, Some(current)) => format!("Ch{} {current}uA", i + 1),
                _ => format!("Ch{} Off", i + 1),
            })
            .collect();

        Ok(Command::ResistivityMeasure(ResistivityMeasure {
            dataflags,
            reading_count,
            bridge,
            display: format!("{}Resistivity {}", self.indent(), channels.join(", ")),
        }))
    }

    fn excitation_scan(&self, line: &str, number: usize) -> Result<Command> {
        let nums = numbers(line, 35, "excitation scan", number)?;
        let mut ranges = Vec::with_capacity(4);
        for c in nums[0..12].chunks(3) {
            let spacing = match code(c[2]) {
                0 => ExcitationSpacing::Linear,
                1 => ExcitationSpacing::Log,
                2 => ExcitationSpacing::Power,
                other => return Err(invalid("excitation spacing", other, number)),
            };
            ranges.push(ExcitationRange {
                start: c[0],
                end: c[1],
                spacing,
            });
        }
        let bridge = nums[15..35]
            .chunks(5)
            .map(|c| BridgeChannel {
                enabled: code(c[0]) == 2,
                current_limit_ua: None,
                power_limit_uw: c[1],
                excitation: excitation(c[2]),
                calibration: calibration(c[3]),
                voltage_limit_mv: c[4],
            })
            .collect();

        Ok(Command::ResistivityExcitationScan(ResistivityExcitationScan {
            ranges,
            n_steps: steps(nums[12]),
            reading_count: steps(nums[13]),
            dataflags: parse_dataflags(nums[14].max(0.0) as u64),
            bridge,
            display: format!("{}Scanning RES Excitation", self.indent()),
        }))
    }

    fn beep(&self, line: &str, number: usize) -> Result<Command> {
        let nums = numbers(line, 2, "beep", number)?;
        let (length, frequency) = (nums[0], nums[1]);
        Ok(Command::Beep(Beep {
            length,
            frequency,
            display: format!("{}Beep for {length}secs at {frequency}Hz", self.indent()),
        }))
    }

    fn chamber(&self, line: &str, number: usize) -> Result<Command> {
        let nums = numbers(line, 1, "chamber operation", number)?;
        let operation = match code(nums[0]) {
            0 => ChamberOperation::SealImmediate,
            1 => ChamberOperation::PurgeThenSeal,
            2 => ChamberOperation::VentThenSeal,
            3 => ChamberOperation::PumpContinuous,
            4 => ChamberOperation::VentContinuous,
            5 => ChamberOperation::HighVacuum,
            other => return Err(invalid("chamber operation", other, number)),
        };
        Ok(Command::ChamberOp(ChamberOp {
            operation,
            display: format!("{}Chamber Op: {operation}", self.indent()),
        }))
    }

    fn remark(&self, payload: &str) -> Command {
        let text = payload.trim();
        if text.starts_with("python") {
            let script_indent = self.options.nesting_unit.repeat(self.depth + 1);
            let scripts = parse_strings(payload)
                .into_iter()
                .map(|file| ExecPython {
                    display: format!("{script_indent}Exec: {file}"),
                    file,
                })
                .collect();
            return Command::ExecPythonMultiple(ExecPythonMultiple {
                scripts,
                display: format!("{}Execute python scripts:", self.indent()),
            });
        }
        Command::Remark(Remark {
            text: text.to_string(),
            display: format!("{}{text}", self.indent()),
        })
    }

    fn sequence_message(&self, line: &str, number: usize) -> Result<Command> {
        let nums = numbers(line, 2, "sequence message", number)?;
        let message_type = match code(nums[1]) {
            0 => MessageType::Information,
            1 => MessageType::Warning,
            2 => MessageType::Error,
            other => return Err(invalid("message type", other, number)),
        };
        let mut strings = parse_strings(line).into_iter();
        let mut next = || strings.next().unwrap_or_default();
        let message = next();
        let email_receiver = next();
        let email_subject = next();
        let email_cc = next();
        let email_message = next();
        let attachments: Vec<String> = strings.collect();
        let timeout_minutes = nums[0];

        let display = format!(
            "{}SeqMes {timeout_minutes}min, {message_type}, {message}, Email To {email_receiver}, {email_cc}, {email_subject}, {email_message}, attachments: {}",
            self.indent(),
            attachments.join(", ")
        );
        Ok(Command::SequenceMessage(SequenceMessage {
            timeout_minutes,
            message_type,
            message,
            email_receiver,
            email_subject,
            email_cc,
            email_message,
            attachments,
            display,
        }))
    }
}

fn payload<'t>(caps: &Captures<'t>, group: usize) -> &'t str {
    caps.get(group).map(|m| m.as_str()).unwrap_or_default()
}

fn numbers(line: &str, required: usize, kind: &'static str, number: usize) -> Result<Vec<f64>> {
    let nums = read_numbers(line);
    if nums.len() < required {
        return Err(SequenceError::NotEnoughNumbers {
            kind,
            required,
            found: nums.len(),
            line: number,
        });
    }
    Ok(nums)
}

fn first_string(line: &str, what: &'static str, number: usize) -> Result<String> {
    parse_strings(line)
        .into_iter()
        .next()
        .ok_or(SequenceError::MissingString { what, line: number })
}

/// Integer code of a numeric field, truncating like the instrument software does.
fn code(value: f64) -> i64 {
    value as i64
}

fn steps(value: f64) -> usize {
    value.round().max(0.0) as usize
}

fn invalid(field: &'static str, code: i64, line: usize) -> SequenceError {
    SequenceError::InvalidCode { field, code, line }
}

fn temperature_approach(value: i64, number: usize) -> Result<ApproachMode> {
    match value {
        0 => Ok(ApproachMode::Fast),
        1 => Ok(ApproachMode::NoOvershoot),
        2 => Ok(ApproachMode::Sweep),
        other => Err(invalid("temperature approach mode", other, number)),
    }
}

fn end_mode(value: i64, number: usize) -> Result<EndMode> {
    match value {
        0 => Ok(EndMode::Persistent),
        1 => Ok(EndMode::Driven),
        other => Err(invalid("field end mode", other, number)),
    }
}

fn excitation(value: f64) -> Excitation {
    if code(value) == 0 { Excitation::Ac } else { Excitation::Dc }
}

fn calibration(value: f64) -> CalibrationMode {
    if code(value) == 0 {
        CalibrationMode::Standard
    } else {
        CalibrationMode::Fast
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ParsedSequence {
        parse_str(text, &ParserOptions::default()).expect("parse")
    }

    #[test]
    fn parses_single_set_temperature() {
        let parsed = parse("TMP TEMP 10,1,0");
        assert_eq!(parsed.commands.len(), 1);
        match &parsed.commands[0] {
            Command::SetTemperature(set) => {
                assert_eq!(set.temperature, 10.0);
                assert_eq!(set.sweep_rate, 1.0);
                assert_eq!(set.approach, ApproachMode::Fast);
                assert_eq!(set.display, "Set Temperature to 10 at 1K/min, Fast");
            }
            other => panic!("expected SetTemperature, got {other:?}"),
        }
    }

    #[test]
    fn nests_commands_inside_scans() {
        let parsed = parse("SCAN T 0,10,1,2,0,0\nTMP TEMP 5,1,0\nENDSCAN EOS\nSHT SHUTDOWN");
        assert_eq!(parsed.commands.len(), 2);
        let scan = &parsed.commands[0];
        assert_eq!(scan.kind(), CommandKind::ScanTemperature);
        assert_eq!(scan.children().len(), 1);
        assert_eq!(scan.children()[0].kind(), CommandKind::SetTemperature);
        assert_eq!(scan.children()[0].display(), "   Set Temperature to 5 at 1K/min, Fast");
        assert_eq!(parsed.commands[1].kind(), CommandKind::Shutdown);
        assert_eq!(parsed.commands[1].display(), "Shutdown");
    }

    #[test]
    fn accepts_bare_sentinel() {
        let parsed = parse("SCAN T 0,10,1,2,0,0\nTMP TEMP 5,1,0\n...EOS");
        assert_eq!(parsed.commands.len(), 1);
        assert_eq!(parsed.commands[0].children().len(), 1);
    }

    #[test]
    fn nested_scans_unwind_one_level_per_sentinel() {
        let text = "SCAN H 0,1,0.1,2,0,0,0\n\
                    SCAN T 2,4,1,3,0,0\n\
                    RES 1,2,2,10,1,0,0,5,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0\n\
                    ENDSCAN EOS\n\
                    BEP BEEP 1,440\n\
                    ENDSCAN EOS\n\
                    REM done";
        let parsed = parse(text);
        assert_eq!(parsed.commands.len(), 2);
        let outer = &parsed.commands[0];
        assert_eq!(outer.children().len(), 2);
        assert_eq!(outer.children()[0].children().len(), 1);
        assert_eq!(outer.children()[1].kind(), CommandKind::Beep);

        let kinds: Vec<CommandKind> = parsed.display.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![
                CommandKind::ScanField,
                CommandKind::ScanTemperature,
                CommandKind::ResistivityMeasure,
                CommandKind::EndOfScan,
                CommandKind::Beep,
                CommandKind::EndOfScan,
                CommandKind::Remark,
            ]
        );
        assert_eq!(parsed.display[3].text, "   EOS");
        assert_eq!(parsed.display[5].text, "EOS");
    }

    #[test]
    fn short_scan_lines_are_structural_errors() {
        let err = parse_str("SCAN T 0,10,1", &ParserOptions::default()).unwrap_err();
        match err {
            SequenceError::NotEnoughNumbers {
                kind,
                required,
                found,
                line,
            } => {
                assert_eq!(kind, "temperature scan");
                assert_eq!(required, 6);
                assert_eq!(found, 3);
                assert_eq!(line, 1);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn stray_sentinel_is_rejected() {
        let err = parse_str("REM x\nENDSCAN EOS", &ParserOptions::default()).unwrap_err();
        assert!(matches!(err, SequenceError::UnexpectedEndOfScan { line: 2 }));
    }

    #[test]
    fn unrecognized_lines_are_skipped() {
        let parsed = parse("\nnonsense here\nBEP BEEP 0.5,880\n");
        assert_eq!(parsed.commands.len(), 1);
        assert_eq!(parsed.commands[0].display(), "Beep for 0.5secs at 880Hz");
    }

    #[test]
    fn decodes_wait_and_chamber() {
        let parsed = parse("WAITFOR 5,1,1,0,0\nCMB CHAMBER 1");
        match &parsed.commands[0] {
            Command::Wait(wait) => {
                assert!(wait.temperature && wait.field);
                assert!(!wait.position && !wait.chamber);
                assert_eq!(wait.delay, 5.0);
                assert_eq!(wait.display, "Wait for Temperature, Field & 5 seconds more");
            }
            other => panic!("expected Wait, got {other:?}"),
        }
        match &parsed.commands[1] {
            Command::ChamberOp(op) => {
                assert_eq!(op.operation, ChamberOperation::PurgeThenSeal);
                assert_eq!(op.display, "Chamber Op: purge then seal");
            }
            other => panic!("expected ChamberOp, got {other:?}"),
        }
    }

    #[test]
    fn decodes_datafile_commands() {
        let parsed = parse("CDF \"run1.dat\" 1\nCDF \"run2.dat\" 0\nDFC \"cooling down\"");
        match (&parsed.commands[0], &parsed.commands[1], &parsed.commands[2]) {
            (
                Command::ChangeDatafile(first),
                Command::ChangeDatafile(second),
                Command::DatafileComment(comment),
            ) => {
                assert_eq!(first.path, "run1.dat");
                assert_eq!(first.mode, DatafileMode::Append);
                assert_eq!(second.mode, DatafileMode::Write);
                assert_eq!(comment.comment, "cooling down");
            }
            other => panic!("unexpected commands {other:?}"),
        }
    }

    #[test]
    fn python_remarks_become_script_lists() {
        let parsed = parse("REM python \"a.py\" 'b.py'");
        match &parsed.commands[0] {
            Command::ExecPythonMultiple(multiple) => {
                let files: Vec<&str> = multiple.scripts.iter().map(|s| s.file.as_str()).collect();
                assert_eq!(files, vec!["a.py", "b.py"]);
                assert_eq!(multiple.scripts[0].display, "   Exec: a.py");
            }
            other => panic!("expected ExecPythonMultiple, got {other:?}"),
        }
        assert_eq!(parsed.display.len(), 3);
    }

    #[test]
    fn decodes_field_and_position_commands() {
        let parsed = parse("FLD FIELD 2.5,0.1,2,1\nMVP MOVE 90,0,3 \"Slow\"\nSCAN P 0,180,2,5,1\nENDSCAN EOS");
        match &parsed.commands[0] {
            Command::SetField(set) => {
                assert_eq!(set.approach, ApproachMode::Oscillate);
                assert_eq!(set.end_mode, EndMode::Driven);
            }
            other => panic!("expected SetField, got {other:?}"),
        }
        match &parsed.commands[1] {
            Command::SetPosition(set) => {
                assert_eq!(set.position, 90.0);
                assert_eq!(set.mode, PositionMode::MoveToPosition);
                assert_eq!(set.speed_index, 3);
                assert_eq!(set.speed_text, "Slow");
            }
            other => panic!("expected SetPosition, got {other:?}"),
        }
        match &parsed.commands[2] {
            Command::ScanPosition(scan) => {
                assert_eq!(scan.approach, ApproachMode::Sweep);
                assert_eq!(scan.n_steps, 5);
            }
            other => panic!("expected ScanPosition, got {other:?}"),
        }
    }

    #[test]
    fn decodes_sequence_message() {
        let parsed = parse(
            "MES 5 1 \"check the dewar\" \"lab@example.org\" \"Level\" \"\" \"low helium\" \"log.txt\"",
        );
        match &parsed.commands[0] {
            Command::SequenceMessage(msg) => {
                assert_eq!(msg.timeout_minutes, 5.0);
                assert_eq!(msg.message_type, MessageType::Warning);
                assert_eq!(msg.message, "check the dewar");
                assert_eq!(msg.email_receiver, "lab@example.org");
                assert_eq!(msg.email_message, "low helium");
                assert_eq!(msg.attachments, vec!["log.txt"]);
            }
            other => panic!("expected SequenceMessage, got {other:?}"),
        }
    }

    #[test]
    fn decodes_resistivity_bridge_configuration() {
        let parsed = parse("RES 17,3,2,10,1,0,0,5,0,20,1,1,1,5,2,0.5,1,0,0,5,0,0,0,0,0,0");
        match &parsed.commands[0] {
            Command::ResistivityMeasure(res) => {
                assert_eq!(res.reading_count, 3);
                assert!(res.dataflags.is_set("General Status"));
                assert!(res.dataflags.is_set("Chan 1 Resistivity"));
                assert_eq!(res.bridge.len(), 4);
                assert!(res.bridge[0].enabled);
                assert_eq!(res.bridge[0].current_limit_ua, Some(10.0));
                assert!(!res.bridge[1].enabled);
                assert_eq!(res.bridge[1].excitation, Excitation::Dc);
                assert!(res.bridge[2].enabled);
                assert_eq!(res.display, "Resistivity Ch1 10uA, Ch2 Off, Ch3 0.5uA, Ch4 Off");
            }
            other => panic!("expected ResistivityMeasure, got {other:?}"),
        }
    }

    #[test]
    fn invalid_codes_are_reported() {
        let err = parse_str("TMP TEMP 10,1,7", &ParserOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            SequenceError::InvalidCode {
                field: "temperature approach mode",
                code: 7,
                line: 1
            }
        ));
    }
}
