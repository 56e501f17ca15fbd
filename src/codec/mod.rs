// Text codec - the pipe/newline encoding shared by every project file
//
// Every persisted component is a list of records, one per line, fields
// separated by '|', and closed by a terminator line. Numbers are rounded to
// a fixed number of decimals before they are written so that a decoded
// value encodes back to the exact same text. Undo history diffs files
// byte-for-byte, so decoding never tries to recover from a bad record.

use std::fmt;
use std::str::FromStr;

/// Last line of every encoded file
pub const TERMINATOR: &str = "\\";

/// Field separator
pub const SEPARATOR: char = '|';

/// Decimal places for beat positions and lengths
pub const BEAT_DECIMALS: u32 = 6;

/// Decimal places for automation beats and values
pub const AUTOMATION_DECIMALS: u32 = 4;

/// Decimal places for tempo
pub const TEMPO_DECIMALS: u32 = 1;

/// A record violates its encoding contract
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct FormatError {
    /// 1-based line number, 0 when the error concerns the whole file
    pub line: usize,
    pub message: String,
}

impl FormatError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }

    /// Error that is not tied to one record
    pub fn file(message: impl Into<String>) -> Self {
        Self::new(0, message)
    }
}

/// Encode/decode contract implemented by every persisted component
pub trait TextCodec: Sized {
    /// Encode the whole component, terminator included
    fn encode(&self) -> String;

    /// Decode a whole file; any violation fails the entire decode
    fn decode(text: &str) -> Result<Self, FormatError>;
}

/// Round to a fixed number of decimals
///
/// Idempotent: rounding an already rounded value returns the same bits,
/// which is what makes encode/decode stable.
#[inline]
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    let rounded = (value * scale).round() / scale;
    // Normalise negative zero so it never reaches the text as "-0"
    if rounded == 0.0 { 0.0 } else { rounded }
}

#[inline]
pub fn round_beat(value: f64) -> f64 {
    round_to(value, BEAT_DECIMALS)
}

/// Format a float that has already been rounded
///
/// `Display` for f64 prints the shortest text that parses back to the same
/// value, so no precision is lost here.
pub fn fmt_float(value: f64) -> String {
    format!("{}", value)
}

/// Round then format; the canonical text of a float field
pub fn fmt_rounded(value: f64, decimals: u32) -> String {
    fmt_float(round_to(value, decimals))
}

/// Canonical text of a beat-precision field
pub fn fmt_beat(value: f64) -> String {
    fmt_rounded(value, BEAT_DECIMALS)
}

/// Format a bool as 0/1
pub fn fmt_bool(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

/// Join fields with the separator
pub fn join_fields<I, T>(fields: I) -> String
where
    I: IntoIterator<Item = T>,
    T: fmt::Display,
{
    let mut out = String::new();
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            out.push(SEPARATOR);
        }
        out.push_str(&field.to_string());
    }
    out
}

/// Join encoded records into a file body and append the terminator
pub fn finish_file(records: Vec<String>) -> String {
    let mut out = String::new();
    for record in records {
        out.push_str(&record);
        out.push('\n');
    }
    out.push_str(TERMINATOR);
    out.push('\n');
    out
}

/// Iterate over the records of an encoded file
///
/// Yields `(line_number, line)` for every line before the terminator.
/// Fails if the terminator is missing or followed by anything but blank
/// lines. Blank lines before the terminator are rejected too.
pub fn records(text: &str) -> Result<Vec<(usize, &str)>, FormatError> {
    let mut out = Vec::new();
    let mut terminated = false;

    for (i, raw) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = raw.trim_end_matches('\r');
        if terminated {
            if !line.trim().is_empty() {
                return Err(FormatError::new(line_no, "content after terminator"));
            }
            continue;
        }
        if line == TERMINATOR {
            terminated = true;
            continue;
        }
        if line.is_empty() {
            return Err(FormatError::new(line_no, "empty record"));
        }
        out.push((line_no, line));
    }

    if !terminated {
        return Err(FormatError::file("missing terminator line"));
    }
    Ok(out)
}

/// Split a record into exactly `expected` fields
pub fn split_exact(line_no: usize, line: &str, expected: usize) -> Result<Vec<&str>, FormatError> {
    let fields: Vec<&str> = line.split(SEPARATOR).collect();
    if fields.len() != expected {
        return Err(FormatError::new(
            line_no,
            format!("expected {} fields, found {}", expected, fields.len()),
        ));
    }
    Ok(fields)
}

/// Parse one field, naming it in the error
pub fn parse_field<T: FromStr>(line_no: usize, name: &str, raw: &str) -> Result<T, FormatError> {
    raw.parse::<T>()
        .map_err(|_| FormatError::new(line_no, format!("invalid {}: '{}'", name, raw)))
}

/// Parse a float field and require it to be finite
pub fn parse_float(line_no: usize, name: &str, raw: &str) -> Result<f64, FormatError> {
    let value: f64 = parse_field(line_no, name, raw)?;
    if !value.is_finite() {
        return Err(FormatError::new(line_no, format!("{} is not finite", name)));
    }
    Ok(value)
}

/// Parse a float field that must already be in canonical rounded form
pub fn parse_rounded(
    line_no: usize,
    name: &str,
    raw: &str,
    decimals: u32,
) -> Result<f64, FormatError> {
    let value = parse_float(line_no, name, raw)?;
    if round_to(value, decimals) != value {
        return Err(FormatError::new(
            line_no,
            format!("{} has more than {} decimals: '{}'", name, decimals, raw),
        ));
    }
    Ok(value)
}

/// Parse a 0/1 flag
pub fn parse_bool(line_no: usize, name: &str, raw: &str) -> Result<bool, FormatError> {
    match raw {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(FormatError::new(
            line_no,
            format!("invalid {} flag: '{}'", name, raw),
        )),
    }
}

/// Check a parsed value against an inclusive range
pub fn check_range<T: PartialOrd + fmt::Display>(
    line_no: usize,
    name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<T, FormatError> {
    if value < min || value > max {
        return Err(FormatError::new(
            line_no,
            format!("{} {} out of range {}..={}", name, value, min, max),
        ));
    }
    Ok(value)
}
