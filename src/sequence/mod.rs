//! Sequence language front end.
//!
//! Measurement sequences are flat text files: one instruction per line, with
//! scan blocks opened by a `SCAN…` line and closed by an end-of-scan sentinel.
//! This module turns such files into a tree of typed [`Command`] nodes, builds
//! the flattened display list used by viewers, and persists parsed trees to
//! derived binary and JSON documents.

/// Typed command tree produced by the parser.
pub mod command;
/// Helpers that pull numbers, strings and flags out of a single line.
pub mod decode;
/// Shape mapping for scan set-point generation.
pub mod mapping;
/// Recursive-descent parser over the line stream.
pub mod parser;
/// Derived binary/JSON documents for parsed sequences.
pub mod storage;

pub use command::{
    ApproachMode, BridgeChannel, ChainSequence, ChamberOperation, Command, CommandKind,
    DataFlags, DatafileMode, EndMode, MessageType, PositionMode, ScanField, ScanPosition,
    ScanTemperature, ScanTime, SequenceMessage, SetField, SetPosition, SetTemperature, Spacing,
    Wait,
};
pub use decode::{parse_binary, parse_strings, read_numbers};
pub use mapping::map_to_shape;
pub use parser::{
    DisplayLine, ParsedSequence, ParserOptions, flatten, parse_file, parse_lines, parse_str,
};
pub use storage::{SequenceDocument, SequencePaths, export, hash_text};

use thiserror::Error;

/// Convenience result alias for sequence parsing and persistence.
pub type Result<T> = std::result::Result<T, SequenceError>;

/// Errors surfaced while parsing or persisting a sequence.
#[derive(Debug, Error)]
pub enum SequenceError {
    /// A line carried fewer numeric fields than its command kind requires.
    #[error("line {line}: not enough specifying numbers for {kind} (required {required}, found {found})")]
    NotEnoughNumbers {
        /// Command kind being decoded.
        kind: &'static str,
        /// Minimum number of numeric fields.
        required: usize,
        /// Number of numeric fields present.
        found: usize,
        /// One-based line number.
        line: usize,
    },

    /// A numeric code does not map to any known symbolic value.
    #[error("line {line}: invalid {field} code {code}")]
    InvalidCode {
        /// Name of the enumerated field.
        field: &'static str,
        /// Offending code.
        code: i64,
        /// One-based line number.
        line: usize,
    },

    /// A line lacks a required quoted string.
    #[error("line {line}: missing quoted {what}")]
    MissingString {
        /// Description of the missing string.
        what: &'static str,
        /// One-based line number.
        line: usize,
    },

    /// A scan line names a scan kind we do not know.
    #[error("line {line}: unknown scan type {letter:?}")]
    UnknownScanType {
        /// Type letter found after `SCAN`.
        letter: String,
        /// One-based line number.
        line: usize,
    },

    /// An end-of-scan sentinel appeared outside any scan block.
    #[error("line {line}: end of scan without an open scan block")]
    UnexpectedEndOfScan {
        /// One-based line number.
        line: usize,
    },

    /// The shape mapper needs at least two points.
    #[error("step count must be at least 2, got {0}")]
    InvalidStepCount(usize),

    /// A derived document no longer matches its source file.
    #[error("derived document is stale: source hash {expected} does not match {found}")]
    StaleDocument {
        /// Hash recorded in the document.
        expected: String,
        /// Hash of the current source text.
        found: String,
    },

    /// Reading a sequence file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary (preserves) encoding or decoding failed.
    #[error("binary document error: {0}")]
    Encoding(String),

    /// Writing or reading a derived document failed.
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
