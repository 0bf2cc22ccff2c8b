//! Stateless helpers for decoding the payload of a single sequence line.

use once_cell::sync::Lazy;
use regex::Regex;

use super::command::{DATAFLAG_NAMES, DataFlags};

static NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-?[0-9]+(?:\.[0-9]*)?").expect("number pattern is valid"));

// Double quotes, a pair of single quotes, or single quotes; only one of the
// alternatives participates in any given match.
static QUOTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""(.*?)"|''(.*?)''|'(.*?)'"#).expect("string pattern is valid")
});

/// All numeric literals in `line`, in order of appearance.
pub fn read_numbers(line: &str) -> Vec<f64> {
    NUMBER
        .find_iter(line)
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .collect()
}

/// All quoted string literals in `line`, in order of appearance.
pub fn parse_strings(line: &str) -> Vec<String> {
    QUOTED
        .captures_iter(line)
        .map(|caps| {
            (1..=3)
                .filter_map(|group| caps.get(group))
                .map(|m| m.as_str().to_string())
                .find(|s| !s.is_empty())
                .unwrap_or_default()
        })
        .collect()
}

/// Bits of `number`, least significant first.
///
/// Zero yields `[false]`, matching the one-digit binary representation.
pub fn parse_binary(number: u64) -> Vec<bool> {
    let width = (u64::BITS - number.leading_zeros()).max(1);
    (0..width).map(|bit| (number >> bit) & 1 == 1).collect()
}

/// Decode a data-flag word into the named channel selection.
pub fn parse_dataflags(number: u64) -> DataFlags {
    let mut bits = parse_binary(number);
    bits.resize(DATAFLAG_NAMES.len().max(bits.len()), false);
    DataFlags { bits }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_numbers_in_order() {
        assert_eq!(
            read_numbers("SCAN T 0,10,1.5,2,0,0"),
            vec![0.0, 10.0, 1.5, 2.0, 0.0, 0.0]
        );
        assert_eq!(read_numbers("FLD FIELD -9.0 0.5"), vec![-9.0, 0.5]);
        assert!(read_numbers("SHT SHUTDOWN").is_empty());
    }

    #[test]
    fn parses_all_quoting_conventions() {
        let line = r#"MES 1 0 "hello" ''twice'' 'once'"#;
        assert_eq!(parse_strings(line), vec!["hello", "twice", "once"]);
        assert_eq!(parse_strings(r#"DFC """#), vec![""]);
        assert!(parse_strings("no strings here").is_empty());
    }

    #[test]
    fn binary_flags_read_back_to_front() {
        assert_eq!(parse_binary(5), vec![true, false, true]);
        assert_eq!(parse_binary(6), vec![false, true, true]);
        assert_eq!(parse_binary(0), vec![false]);
    }

    #[test]
    fn dataflags_cover_every_named_channel() {
        let flags = parse_dataflags(0b1_0001);
        assert_eq!(flags.bits.len(), DATAFLAG_NAMES.len());
        assert!(flags.is_set("General Status"));
        assert!(flags.is_set("Chan 1 Resistivity"));
        assert!(!flags.is_set("Temperature"));
    }
}
