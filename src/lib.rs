//! Measurement Sequence Runner – parse and execute cryostat measurement sequences
//!
//! This crate implements:
//! - A parser for line-oriented `.seq` files into a typed command tree
//! - Binary and JSON export of parsed sequences, with staleness detection
//! - A cooperative runner that drives a [`runner::Device`] through the tree,
//!   with pause, resume and stop, chained sub-sequences, and scan policies
//! - A logging [`runner::DummyDevice`] for dry runs

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Sequence files: command model, parser, set-point mapping, export
pub mod sequence;

/// Sequence execution against a device
pub mod runner;

pub use runner::{Device, Outcome, RunError, RunnerConfig, SequenceRunner};
pub use sequence::{Command, ParsedSequence, ParserOptions, SequenceError, parse_file, parse_str};

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
