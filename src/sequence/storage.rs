//! Derived documents for parsed sequences.
//!
//! A parsed command tree can be written next to its `.seq` source in two
//! forms: a compact preserves-packed `.seqb` file and a pretty-printed `.json`
//! file. Both carry a hash of the source text so readers can tell when the
//! derived file no longer matches the sequence it came from.

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::command::Command;
use super::parser::{ParserOptions, parse_str};
use super::{Result, SequenceError};

/// Extension of the binary derived document.
pub const BINARY_EXTENSION: &str = "seqb";
/// Extension of the JSON derived document.
pub const JSON_EXTENSION: &str = "json";

/// Locations of a sequence file and its derived documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencePaths {
    /// The `.seq` source file.
    pub sequence: PathBuf,
    /// Preserves-packed document.
    pub binary: PathBuf,
    /// Pretty JSON document.
    pub json: PathBuf,
}

impl SequencePaths {
    /// Derived paths sitting next to `sequence`.
    pub fn for_sequence(sequence: impl AsRef<Path>) -> Self {
        let sequence = sequence.as_ref().to_path_buf();
        Self {
            binary: sequence.with_extension(BINARY_EXTENSION),
            json: sequence.with_extension(JSON_EXTENSION),
            sequence,
        }
    }
}

/// Serialized form of a parsed sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceDocument {
    /// Path of the source file, as given when exporting.
    pub source: String,
    /// blake3 hex digest of the source text.
    pub source_hash: String,
    /// When the document was produced.
    pub exported_at: DateTime<Utc>,
    /// Root-level commands.
    pub commands: Vec<Command>,
}

impl SequenceDocument {
    /// Wrap a parsed tree together with the text it came from.
    pub fn from_source(source: impl Into<String>, text: &str, commands: Vec<Command>) -> Self {
        Self {
            source: source.into(),
            source_hash: hash_text(text),
            exported_at: Utc::now(),
            commands,
        }
    }

    /// Whether this document was derived from `text`.
    pub fn is_current(&self, text: &str) -> bool {
        self.source_hash == hash_text(text)
    }

    /// Encode with the preserves packed codec.
    pub fn to_binary(&self) -> Result<Vec<u8>> {
        use preserves::PackedWriter;
        let mut buf = Vec::new();
        let mut writer = PackedWriter::new(&mut buf);
        preserves::serde::to_writer(&mut writer, self)
            .map_err(|e| SequenceError::Encoding(e.to_string()))?;
        Ok(buf)
    }

    /// Decode from the preserves packed codec.
    pub fn from_binary(data: &[u8]) -> Result<Self> {
        preserves::serde::from_bytes(data).map_err(|e| SequenceError::Encoding(e.to_string()))
    }

    /// Write the binary form atomically.
    pub fn save_binary(&self, path: &Path) -> Result<()> {
        let data = self.to_binary()?;
        write_atomic(path, &data)?;
        debug!(path = %path.display(), bytes = data.len(), "wrote binary sequence document");
        Ok(())
    }

    /// Write the JSON form atomically.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &data)?;
        debug!(path = %path.display(), bytes = data.len(), "wrote JSON sequence document");
        Ok(())
    }

    /// Read a document, choosing the codec from the file extension.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read(path)
            .with_context(|| format!("Failed to read document: {:?}", path))?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(JSON_EXTENSION) => Ok(serde_json::from_slice(&data)?),
            _ => Self::from_binary(&data),
        }
    }

    /// Read a document and reject it if it does not match `text`.
    pub fn load_checked(path: &Path, text: &str) -> Result<Self> {
        let document = Self::load(path)?;
        let found = hash_text(text);
        if document.source_hash != found {
            return Err(SequenceError::StaleDocument {
                expected: document.source_hash,
                found,
            });
        }
        Ok(document)
    }
}

/// Parse a sequence file and write both derived documents next to it.
pub fn export(sequence: &Path, options: &ParserOptions) -> Result<(SequenceDocument, SequencePaths)> {
    let text = fs::read_to_string(sequence)?;
    let parsed = parse_str(&text, options)?;
    let paths = SequencePaths::for_sequence(sequence);
    let document = SequenceDocument::from_source(sequence.display().to_string(), &text, parsed.commands);

    document.save_binary(&paths.binary)?;
    document.save_json(&paths.json)?;
    info!(
        sequence = %sequence.display(),
        commands = document.commands.len(),
        "exported sequence documents"
    );
    Ok((document, paths))
}

/// blake3 hex digest of sequence text.
pub fn hash_text(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

/// Write data atomically: temp file, sync, rename, then sync the directory.
pub fn write_atomic(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let temp_path = path.with_extension("tmp");

    let mut file = File::create(&temp_path)
        .with_context(|| format!("Failed to create temp file: {:?}", temp_path))?;
    file.write_all(data).context("Failed to write data")?;
    file.sync_all().context("Failed to sync file")?;
    drop(file);

    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename {:?} to {:?}", temp_path, path))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        let dir = OpenOptions::new()
            .read(true)
            .open(parent)
            .with_context(|| format!("Failed to open directory: {:?}", parent))?;
        dir.sync_all().context("Failed to sync directory")?;
    }

    Ok(())
}
