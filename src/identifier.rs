//! Process identifiers: `prefix/sequence/year`.
//!
//! The portal only understands the canonical form, with the prefix padded to
//! three digits and the sequence to six (`018/000123/2025`). Identifiers typed
//! without separators (`0180001232025`) are sliced at those fixed offsets.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::{Error, Result};

pub const PREFIX_WIDTH: usize = 3;
pub const SEQUENCE_WIDTH: usize = 6;
pub const MAX_SEQUENCE: u32 = 999_999;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProcessIdentifier {
    prefix: String,
    sequence: u32,
    year: String,
}

impl ProcessIdentifier {
    /// Builds an identifier from its parts, zero-padding the prefix.
    pub fn new(prefix: &str, sequence: u32, year: &str) -> Result<Self> {
        let prefix = normalize_prefix(prefix)?;
        let year = normalize_year(year)?;
        if sequence > MAX_SEQUENCE {
            return Err(Error::Validation(format!(
                "sequence {sequence} does not fit in {SEQUENCE_WIDTH} digits"
            )));
        }
        Ok(Self {
            prefix,
            sequence,
            year,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn year(&self) -> &str {
        &self.year
    }

    /// Same prefix and year, another sequence. Callers keep `sequence` within range.
    pub(crate) fn with_sequence(&self, sequence: u32) -> Self {
        debug_assert!(sequence <= MAX_SEQUENCE);
        Self {
            prefix: self.prefix.clone(),
            sequence,
            year: self.year.clone(),
        }
    }

    pub fn canonical(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ProcessIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{:0width$}/{}",
            self.prefix,
            self.sequence,
            self.year,
            width = SEQUENCE_WIDTH
        )
    }
}

impl Serialize for ProcessIdentifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl FromStr for ProcessIdentifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (prefix, sequence, year) = if s.contains('/') {
            let mut parts = s.split('/');
            match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(p), Some(n), Some(y), None) => (p, n, y),
                _ => {
                    return Err(Error::Validation(format!(
                        "identifier '{s}' must have exactly three segments"
                    )))
                }
            }
        } else {
            // Fixed-offset slicing: PPP SSSSSS YYYY...
            let min_len = PREFIX_WIDTH + SEQUENCE_WIDTH + 1;
            if s.len() < min_len || !s.is_ascii() {
                return Err(Error::Validation(format!(
                    "identifier '{s}' is too short to split into prefix/sequence/year"
                )));
            }
            (
                &s[..PREFIX_WIDTH],
                &s[PREFIX_WIDTH..PREFIX_WIDTH + SEQUENCE_WIDTH],
                &s[PREFIX_WIDTH + SEQUENCE_WIDTH..],
            )
        };

        let sequence = parse_digits(sequence, "sequence")?
            .parse::<u32>()
            .map_err(|_| Error::Validation(format!("sequence '{sequence}' is out of range")))?;
        Self::new(prefix, sequence, year)
    }
}

fn parse_digits<'a>(segment: &'a str, what: &str) -> Result<&'a str> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::Validation(format!(
            "{what} '{segment}' must be a non-empty numeric string"
        )));
    }
    Ok(segment)
}

/// Pads a numeric prefix to three digits. `"18"` becomes `"018"`.
pub fn normalize_prefix(prefix: &str) -> Result<String> {
    let prefix = parse_digits(prefix.trim(), "prefix")?;
    if prefix.len() > PREFIX_WIDTH {
        return Err(Error::Validation(format!(
            "prefix '{prefix}' is longer than {PREFIX_WIDTH} digits"
        )));
    }
    Ok(format!("{:0>width$}", prefix, width = PREFIX_WIDTH))
}

pub fn normalize_year(year: &str) -> Result<String> {
    parse_digits(year.trim(), "year").map(str::to_string)
}
