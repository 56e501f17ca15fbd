// Automation point - a timestamped target value for one plugin port

use crate::codec::{
    AUTOMATION_DECIMALS, FormatError, check_range, fmt_bool, fmt_rounded, join_fields, parse_bool,
    parse_field, parse_rounded, round_to,
};
use std::cmp::Ordering;

/// Highest automation value
pub const MAX_AUTOMATION_VALUE: f64 = 127.0;

/// Automation point
///
/// Beat and value are kept at 4 decimals. `curve` is stored and written back
/// but has no effect on playback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutomationPoint {
    /// Absolute position in beats
    pub beat: f64,

    /// Plugin parameter index
    pub port_num: u32,

    /// Target value (0-127)
    pub value: f64,

    pub plugin_uid: u32,
    pub plugin_type: u32,

    /// Do not interpolate from this point to the next
    pub break_after: bool,

    pub curve: u8,
}

impl AutomationPoint {
    pub fn new(beat: f64, port_num: u32, value: f64, plugin_uid: u32, plugin_type: u32) -> Self {
        Self {
            beat: round_to(beat.max(0.0), AUTOMATION_DECIMALS),
            port_num,
            value: round_to(value.clamp(0.0, MAX_AUTOMATION_VALUE), AUTOMATION_DECIMALS),
            plugin_uid,
            plugin_type,
            break_after: false,
            curve: 0,
        }
    }

    /// Same point moved to another beat
    pub fn at_beat(&self, beat: f64) -> Self {
        Self {
            beat: round_to(beat.max(0.0), AUTOMATION_DECIMALS),
            ..*self
        }
    }

    /// Plugin, then port, then beat
    pub fn cmp_position(&self, other: &AutomationPoint) -> Ordering {
        self.plugin_uid
            .cmp(&other.plugin_uid)
            .then(self.port_num.cmp(&other.port_num))
            .then(self.beat.total_cmp(&other.beat))
    }

    pub(crate) fn encode_fields(&self) -> String {
        join_fields([
            "a".to_string(),
            fmt_rounded(self.beat, AUTOMATION_DECIMALS),
            self.port_num.to_string(),
            fmt_rounded(self.value, AUTOMATION_DECIMALS),
            self.plugin_uid.to_string(),
            self.plugin_type.to_string(),
            fmt_bool(self.break_after).to_string(),
            self.curve.to_string(),
        ])
    }

    pub(crate) fn decode_fields(line_no: usize, fields: &[&str]) -> Result<Self, FormatError> {
        if fields[0] != "a" {
            return Err(FormatError::new(
                line_no,
                format!("unknown automation record type '{}'", fields[0]),
            ));
        }
        let beat = parse_rounded(line_no, "beat", fields[1], AUTOMATION_DECIMALS)?;
        let port_num: u32 = parse_field(line_no, "port", fields[2])?;
        let value = parse_rounded(line_no, "value", fields[3], AUTOMATION_DECIMALS)?;
        let plugin_uid: u32 = parse_field(line_no, "plugin uid", fields[4])?;
        let plugin_type: u32 = parse_field(line_no, "plugin type", fields[5])?;
        let break_after = parse_bool(line_no, "break", fields[6])?;
        let curve: u8 = parse_field(line_no, "curve", fields[7])?;
        check_range(line_no, "beat", beat, 0.0, f64::MAX)?;
        check_range(line_no, "value", value, 0.0, MAX_AUTOMATION_VALUE)?;
        Ok(Self {
            beat,
            port_num,
            value,
            plugin_uid,
            plugin_type,
            break_after,
            curve,
        })
    }
}
