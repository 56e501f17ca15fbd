// Markers - tempo, loop and text markers placed on the timeline

use crate::codec::{
    BEAT_DECIMALS, FormatError, TEMPO_DECIMALS, check_range, fmt_beat, fmt_rounded, join_fields,
    parse_field, parse_rounded, round_beat, round_to,
};
use crate::error::{ProjectError, ProjectResult};
use std::fmt;

/// Time signature (numerator/denominator)
/// Example: 4/4 time = TimeSignature { numerator: 4, denominator: 4 }
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TimeSignature {
    pub numerator: u8,   // Beats per bar (typically 3, 4, 5, 6, 7)
    pub denominator: u8, // Note value (4 = quarter note, 8 = eighth note)
}

impl TimeSignature {
    /// Creates a new time signature
    ///
    /// The numerator must be non-zero and the denominator a power of two.
    pub fn new(numerator: u8, denominator: u8) -> ProjectResult<Self> {
        if numerator == 0 || !denominator.is_power_of_two() {
            return Err(ProjectError::InvalidValue(format!(
                "invalid time signature {}/{}",
                numerator, denominator
            )));
        }
        Ok(Self {
            numerator,
            denominator,
        })
    }

    /// Common 4/4 time signature
    pub const fn four_four() -> Self {
        Self {
            numerator: 4,
            denominator: 4,
        }
    }

    /// Number of beats per bar
    pub fn beats_per_bar(&self) -> f64 {
        self.numerator as f64
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::four_four()
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Marker discriminant; second half of the timeline marker key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MarkerKind {
    Tempo,
    Loop,
    Text,
}

impl MarkerKind {
    fn tag(&self) -> &'static str {
        match self {
            MarkerKind::Tempo => "t",
            MarkerKind::Loop => "l",
            MarkerKind::Text => "x",
        }
    }
}

/// A tempo change, in effect until the next tempo marker
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoMarker {
    pub beat: f64,
    /// Beats per minute (1 decimal)
    pub bpm: f64,
    pub tsig: TimeSignature,
}

impl TempoMarker {
    pub fn new(beat: f64, bpm: f64, tsig: TimeSignature) -> Self {
        Self {
            beat: round_beat(beat.max(0.0)),
            bpm: round_to(bpm, TEMPO_DECIMALS),
            tsig,
        }
    }

    /// Quarter notes per minute once the time signature denominator is applied
    pub fn real_tempo(&self) -> f64 {
        (self.tsig.denominator as f64 / 4.0) * self.bpm
    }

    /// Seconds per beat at this tempo
    pub fn seconds_per_beat(&self) -> f64 {
        60.0 / self.real_tempo()
    }
}

/// Timeline marker
///
/// A Loop marker sits at the loop end; `start_beat` is where the loop starts.
#[derive(Debug, Clone, PartialEq)]
pub enum Marker {
    Tempo(TempoMarker),
    Loop { beat: f64, start_beat: f64 },
    Text { beat: f64, text: String },
}

impl Marker {
    pub fn tempo(beat: f64, bpm: f64, tsig: TimeSignature) -> Self {
        Marker::Tempo(TempoMarker::new(beat, bpm, tsig))
    }

    pub fn loop_region(start_beat: f64, end_beat: f64) -> Self {
        Marker::Loop {
            beat: round_beat(end_beat.max(0.0)),
            start_beat: round_beat(start_beat.max(0.0)),
        }
    }

    /// Text marker; separators and line breaks are replaced by spaces
    pub fn text(beat: f64, text: &str) -> Self {
        Marker::Text {
            beat: round_beat(beat.max(0.0)),
            text: text.replace(['|', '\n', '\r'], " "),
        }
    }

    pub fn beat(&self) -> f64 {
        match self {
            Marker::Tempo(tempo) => tempo.beat,
            Marker::Loop { beat, .. } | Marker::Text { beat, .. } => *beat,
        }
    }

    pub fn kind(&self) -> MarkerKind {
        match self {
            Marker::Tempo(_) => MarkerKind::Tempo,
            Marker::Loop { .. } => MarkerKind::Loop,
            Marker::Text { .. } => MarkerKind::Text,
        }
    }

    /// Check the values a caller supplied before the marker goes on the timeline
    pub fn validate(&self) -> ProjectResult<()> {
        match self {
            Marker::Tempo(tempo) if !(tempo.bpm > 0.0 && tempo.bpm.is_finite()) => Err(
                ProjectError::InvalidValue(format!("invalid tempo {}", tempo.bpm)),
            ),
            Marker::Loop { beat, start_beat } if start_beat >= beat => {
                Err(ProjectError::InvalidValue(format!(
                    "loop start {} is not before loop end {}",
                    start_beat, beat
                )))
            }
            _ => Ok(()),
        }
    }

    pub(crate) fn encode_fields(&self) -> String {
        let head = ["m".to_string(), fmt_beat(self.beat()), self.kind().tag().to_string()];
        match self {
            Marker::Tempo(tempo) => join_fields(head.into_iter().chain([
                fmt_rounded(tempo.bpm, TEMPO_DECIMALS),
                tempo.tsig.numerator.to_string(),
                tempo.tsig.denominator.to_string(),
            ])),
            Marker::Loop { start_beat, .. } => {
                join_fields(head.into_iter().chain([fmt_beat(*start_beat)]))
            }
            Marker::Text { text, .. } => join_fields(head.into_iter().chain([text.clone()])),
        }
    }

    pub(crate) fn decode_fields(line_no: usize, line: &str) -> Result<Self, FormatError> {
        let fields: Vec<&str> = line.splitn(4, '|').collect();
        if fields.len() < 4 || fields[0] != "m" {
            return Err(FormatError::new(line_no, "malformed marker record"));
        }
        let beat = parse_rounded(line_no, "marker beat", fields[1], BEAT_DECIMALS)?;
        check_range(line_no, "marker beat", beat, 0.0, f64::MAX)?;

        let marker = match fields[2] {
            "t" => {
                let values: Vec<&str> = fields[3].split('|').collect();
                if values.len() != 3 {
                    return Err(FormatError::new(line_no, "tempo marker needs bpm|num|den"));
                }
                let bpm = parse_rounded(line_no, "bpm", values[0], TEMPO_DECIMALS)?;
                let numerator: u8 = parse_field(line_no, "tsig numerator", values[1])?;
                let denominator: u8 = parse_field(line_no, "tsig denominator", values[2])?;
                let tsig = TimeSignature::new(numerator, denominator)
                    .map_err(|e| FormatError::new(line_no, e.to_string()))?;
                Marker::Tempo(TempoMarker { beat, bpm, tsig })
            }
            "l" => {
                let start_beat = parse_rounded(line_no, "loop start", fields[3], BEAT_DECIMALS)?;
                Marker::Loop { beat, start_beat }
            }
            "x" => Marker::Text {
                beat,
                text: fields[3].to_string(),
            },
            other => {
                return Err(FormatError::new(
                    line_no,
                    format!("unknown marker type '{}'", other),
                ));
            }
        };

        marker
            .validate()
            .map_err(|e| FormatError::new(line_no, e.to_string()))?;
        Ok(marker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_signature_validation() {
        assert!(TimeSignature::new(4, 4).is_ok());
        assert!(TimeSignature::new(7, 8).is_ok());
        assert!(TimeSignature::new(0, 4).is_err());
        assert!(TimeSignature::new(4, 6).is_err());
        assert_eq!(TimeSignature::default().to_string(), "4/4");
    }

    #[test]
    fn test_real_tempo_uses_denominator() {
        let tsig = TimeSignature::new(6, 8).unwrap();
        let marker = TempoMarker::new(0.0, 120.0, tsig);
        assert_eq!(marker.real_tempo(), 240.0);
        assert_eq!(marker.seconds_per_beat(), 0.25);
    }

    #[test]
    fn test_tempo_rounded_to_one_decimal() {
        let marker = TempoMarker::new(0.0, 128.04, TimeSignature::four_four());
        assert_eq!(marker.bpm, 128.0);
    }

    #[test]
    fn test_marker_records_round_trip() {
        let markers = [
            Marker::tempo(8.0, 97.5, TimeSignature::new(3, 4).unwrap()),
            Marker::loop_region(4.0, 12.5),
            Marker::text(2.25, "chorus | take 2"),
        ];
        for marker in markers {
            let line = marker.encode_fields();
            assert_eq!(Marker::decode_fields(1, &line).unwrap(), marker);
        }
    }

    #[test]
    fn test_text_marker_sanitized() {
        let Marker::Text { text, .. } = Marker::text(0.0, "a|b\nc") else {
            panic!("expected text marker");
        };
        assert_eq!(text, "a b c");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(Marker::loop_region(8.0, 4.0).validate().is_err());
        assert!(Marker::tempo(0.0, 0.0, TimeSignature::four_four()).validate().is_err());
        assert!(Marker::decode_fields(1, "m|0|t|120|4|5").is_err());
        assert!(Marker::decode_fields(1, "m|0|q|1").is_err());
    }
}
