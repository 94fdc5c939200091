//! Record decoding: one line of JSON in, one record out.
//!
//! Two policies share the same primitive. [`parse_record`] is strict and
//! reports every failure. [`Records`] walks a stream of lines and, in
//! [`DecodeMode::Tolerant`], drops lines that fail to decode so a single
//! corrupt line cannot sink a whole log.

use std::{fmt, io, str, str::FromStr};

// Trait must be in scope for `.split()` on BufRead readers.
use io::BufRead;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

/// A decoded log line: string keys in their original order.
pub type Record = Map<String, Value>;

/// Errors that can occur while decoding records.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid UTF-8: {0}")]
    Utf8(#[from] str::Utf8Error),

    #[error("expected a JSON object, found {found}")]
    NotAnObject { found: &'static str },

    #[error("line {line}: {source}")]
    Line {
        line: usize,
        #[source]
        source: Box<DecodeError>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// How a stream of lines treats lines that fail to decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeMode {
    /// The first undecodable line ends the stream with an error.
    Strict,

    /// Undecodable lines are dropped and decoding carries on.
    #[default]
    Tolerant,
}

impl FromStr for DecodeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strict" => Ok(Self::Strict),
            "tolerant" => Ok(Self::Tolerant),
            other => Err(format!(
                "unknown decode mode '{other}' (expected 'strict' or 'tolerant')"
            )),
        }
    }
}

impl fmt::Display for DecodeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Strict => "strict",
            Self::Tolerant => "tolerant",
        })
    }
}

/// Decode a single line into a record.
pub fn parse_record(line: &str) -> Result<Record, DecodeError> {
    match serde_json::from_str::<Value>(line)? {
        Value::Object(record) => Ok(record),
        other => Err(DecodeError::NotAnObject {
            found: json_type_name(&other),
        }),
    }
}

/// Decode every line that parses, silently dropping the rest.
pub fn parse_json_stream<I, S>(lines: I) -> impl Iterator<Item = Record>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .enumerate()
        .filter_map(|(index, line)| match parse_record(line.as_ref().trim()) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!(line = index + 1, error = %e, "dropping undecodable line");
                None
            }
        })
}

/// Decode a raw line, which must be UTF-8, into a record.
pub fn parse_record_bytes(line: &[u8]) -> Result<Record, DecodeError> {
    parse_record(str::from_utf8(line)?)
}

/// Iterator of records decoded from a stream of raw lines.
///
/// Lines are bytes so that invalid UTF-8 is a decode failure of its line
/// rather than a read error. Blank lines are skipped in both modes. Read
/// errors always surface and end the stream, as does a decode failure in
/// strict mode.
pub struct Records<I> {
    lines: I,
    mode: DecodeMode,
    line: usize,
    skipped: usize,
    done: bool,
}

impl<I> Records<I> {
    pub fn new(lines: I, mode: DecodeMode) -> Self {
        Self {
            lines,
            mode,
            line: 0,
            skipped: 0,
            done: false,
        }
    }

    /// Number of lines dropped so far in tolerant mode.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl<R: BufRead> Records<io::Split<R>> {
    /// Decode records from a buffered reader, one per line.
    pub fn from_reader(reader: R, mode: DecodeMode) -> Self {
        Self::new(reader.split(b'\n'), mode)
    }
}

impl<I, L> Iterator for Records<I>
where
    I: Iterator<Item = io::Result<L>>,
    L: AsRef<[u8]>,
{
    type Item = Result<Record, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            };
            self.line += 1;

            let trimmed = line.as_ref().trim_ascii();
            if trimmed.is_empty() {
                continue;
            }

            match parse_record_bytes(trimmed) {
                Ok(record) => return Some(Ok(record)),
                Err(e) => match self.mode {
                    DecodeMode::Strict => {
                        self.done = true;
                        return Some(Err(DecodeError::Line {
                            line: self.line,
                            source: Box::new(e),
                        }));
                    }
                    DecodeMode::Tolerant => {
                        self.skipped += 1;
                        debug!(line = self.line, error = %e, "skipping undecodable line");
                    }
                },
            }
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
