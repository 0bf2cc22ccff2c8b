//! Loading external script files.

use std::fs;
use std::path::{Path, PathBuf};

use super::error::{RunError, RunResult};

/// Text encoding detected for a script file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// UTF-8 without a byte-order mark.
    Utf8,
    /// UTF-8 with a leading byte-order mark.
    Utf8Bom,
    /// UTF-16, little endian, detected by its byte-order mark.
    Utf16Le,
    /// UTF-16, big endian, detected by its byte-order mark.
    Utf16Be,
    /// Fallback for bytes that are not valid UTF-8.
    Latin1,
}

/// A script file read from disk and decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedScript {
    /// Path the script was read from.
    pub path: PathBuf,
    /// Encoding the bytes were decoded with.
    pub encoding: TextEncoding,
    /// Decoded text, without byte-order mark.
    pub source: String,
}

/// Read `path` and decode it.
pub fn load_script(path: &Path) -> RunResult<LoadedScript> {
    let bytes = fs::read(path).map_err(|e| RunError::Script {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let (source, encoding) = decode_text(&bytes);
    Ok(LoadedScript {
        path: path.to_path_buf(),
        encoding,
        source,
    })
}

/// Decode bytes by byte-order mark, then UTF-8 validity, falling back to Latin-1.
pub fn decode_text(bytes: &[u8]) -> (String, TextEncoding) {
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return (String::from_utf8_lossy(rest).into_owned(), TextEncoding::Utf8Bom);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        return (decode_utf16(rest, u16::from_le_bytes), TextEncoding::Utf16Le);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return (decode_utf16(rest, u16::from_be_bytes), TextEncoding::Utf16Be);
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => (text.to_string(), TextEncoding::Utf8),
        Err(_) => (bytes.iter().map(|b| char::from(*b)).collect(), TextEncoding::Latin1),
    }
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> String {
    let units = bytes.chunks_exact(2).map(|pair| unit([pair[0], pair[1]]));
    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}
