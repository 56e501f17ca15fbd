// Event primitives - the musical events stored inside an Item
// Note, ControlChange and Pitchbend are small value types positioned in beats
// relative to the start of their Item.

use crate::codec::{
    BEAT_DECIMALS, FormatError, check_range, fmt_beat, join_fields, parse_field, parse_rounded,
    round_beat,
};
use std::cmp::Ordering;

/// Highest note number an Item may hold
pub const MAX_NOTE_NUM: u8 = 120;

/// Notes shorter than this (in beats) are purged by `Item::fix_overlaps`
pub const MIN_NOTE_LENGTH: f64 = 4.0 / 129.0;

/// A musical note
///
/// Start and length are kept rounded to 6 decimals so that equality is
/// structural on the persisted representation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
    /// Start in beats, relative to the Item
    pub start: f64,

    /// Length in beats
    pub length: f64,

    /// Note number (0-120, 60 = C4)
    pub note_num: u8,

    /// Velocity (1-127)
    pub velocity: u8,
}

impl Note {
    /// Creates a new note, rounding times and clipping to the legal ranges
    pub fn new(start: f64, length: f64, note_num: u8, velocity: u8) -> Self {
        Self {
            start: round_beat(start.max(0.0)),
            length: round_beat(length.max(0.0)),
            note_num: note_num.min(MAX_NOTE_NUM),
            velocity: velocity.clamp(1, 127),
        }
    }

    /// End position in beats
    pub fn end(&self) -> f64 {
        round_beat(self.start + self.length)
    }

    /// Whether two notes of the same pitch overlap in `[start, end)`
    pub fn overlaps(&self, other: &Note) -> bool {
        self.note_num == other.note_num && self.start < other.end() && other.start < self.end()
    }

    /// Check if this note sounds at a given beat
    pub fn contains_beat(&self, beat: f64) -> bool {
        beat >= self.start && beat < self.end()
    }

    /// Sort order inside an Item: start, then pitch, then length
    pub fn cmp_position(&self, other: &Note) -> Ordering {
        self.start
            .total_cmp(&other.start)
            .then(self.note_num.cmp(&other.note_num))
            .then(self.length.total_cmp(&other.length))
            .then(self.velocity.cmp(&other.velocity))
    }

    /// Get the note name (e.g., "C4", "A#5")
    pub fn note_name(&self) -> String {
        const NOTE_NAMES: [&str; 12] = [
            "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
        ];

        let octave = (self.note_num / 12) as i32 - 1;
        let note_index = (self.note_num % 12) as usize;

        format!("{}{}", NOTE_NAMES[note_index], octave)
    }

    pub(crate) fn encode_fields(&self) -> String {
        join_fields([
            "n".to_string(),
            fmt_beat(self.start),
            fmt_beat(self.length),
            self.note_num.to_string(),
            self.velocity.to_string(),
        ])
    }

    pub(crate) fn decode_fields(line_no: usize, fields: &[&str]) -> Result<Self, FormatError> {
        let start = parse_rounded(line_no, "note start", fields[1], BEAT_DECIMALS)?;
        let length = parse_rounded(line_no, "note length", fields[2], BEAT_DECIMALS)?;
        let note_num: u8 = parse_field(line_no, "note number", fields[3])?;
        let velocity: u8 = parse_field(line_no, "velocity", fields[4])?;
        check_range(line_no, "note start", start, 0.0, f64::MAX)?;
        check_range(line_no, "note length", length, 0.0, f64::MAX)?;
        check_range(line_no, "note number", note_num, 0, MAX_NOTE_NUM)?;
        check_range(line_no, "velocity", velocity, 1, 127)?;
        Ok(Self {
            start,
            length,
            note_num,
            velocity,
        })
    }
}

/// A MIDI control change
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlChange {
    /// Position in beats, relative to the Item
    pub start: f64,

    /// Controller number (0-127)
    pub cc_num: u8,

    /// Controller value (0-127, 6 decimals)
    pub cc_val: f64,
}

impl ControlChange {
    pub fn new(start: f64, cc_num: u8, cc_val: f64) -> Self {
        Self {
            start: round_beat(start.max(0.0)),
            cc_num: cc_num.min(127),
            cc_val: round_beat(cc_val.clamp(0.0, 127.0)),
        }
    }

    pub fn cmp_position(&self, other: &ControlChange) -> Ordering {
        self.start
            .total_cmp(&other.start)
            .then(self.cc_num.cmp(&other.cc_num))
            .then(self.cc_val.total_cmp(&other.cc_val))
    }

    pub(crate) fn encode_fields(&self) -> String {
        join_fields([
            "c".to_string(),
            fmt_beat(self.start),
            self.cc_num.to_string(),
            fmt_beat(self.cc_val),
        ])
    }

    pub(crate) fn decode_fields(line_no: usize, fields: &[&str]) -> Result<Self, FormatError> {
        let start = parse_rounded(line_no, "cc start", fields[1], BEAT_DECIMALS)?;
        let cc_num: u8 = parse_field(line_no, "cc number", fields[2])?;
        let cc_val = parse_rounded(line_no, "cc value", fields[3], BEAT_DECIMALS)?;
        check_range(line_no, "cc start", start, 0.0, f64::MAX)?;
        check_range(line_no, "cc number", cc_num, 0, 127)?;
        check_range(line_no, "cc value", cc_val, 0.0, 127.0)?;
        Ok(Self {
            start,
            cc_num,
            cc_val,
        })
    }
}

/// A pitchbend event
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pitchbend {
    /// Position in beats, relative to the Item
    pub start: f64,

    /// Bend amount (-1.0 to 1.0, 6 decimals)
    pub pb_val: f64,
}

impl Pitchbend {
    pub fn new(start: f64, pb_val: f64) -> Self {
        Self {
            start: round_beat(start.max(0.0)),
            pb_val: round_beat(pb_val.clamp(-1.0, 1.0)),
        }
    }

    pub fn cmp_position(&self, other: &Pitchbend) -> Ordering {
        self.start
            .total_cmp(&other.start)
            .then(self.pb_val.total_cmp(&other.pb_val))
    }

    pub(crate) fn encode_fields(&self) -> String {
        join_fields(["p".to_string(), fmt_beat(self.start), fmt_beat(self.pb_val)])
    }

    pub(crate) fn decode_fields(line_no: usize, fields: &[&str]) -> Result<Self, FormatError> {
        let start = parse_rounded(line_no, "pitchbend start", fields[1], BEAT_DECIMALS)?;
        let pb_val = parse_rounded(line_no, "pitchbend value", fields[2], BEAT_DECIMALS)?;
        check_range(line_no, "pitchbend start", start, 0.0, f64::MAX)?;
        check_range(line_no, "pitchbend value", pb_val, -1.0, 1.0)?;
        Ok(Self { start, pb_val })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_creation_clips_ranges() {
        let note = Note::new(0.1234567, 1.0, 127, 0);
        assert_eq!(note.start, 0.123457);
        assert_eq!(note.note_num, MAX_NOTE_NUM);
        assert_eq!(note.velocity, 1);
    }

    #[test]
    fn test_note_end_position() {
        let note = Note::new(1.5, 0.25, 60, 100);
        assert_eq!(note.end(), 1.75);
    }

    #[test]
    fn test_note_contains_beat() {
        let note = Note::new(0.0, 1.0, 60, 100);

        assert!(note.contains_beat(0.0));
        assert!(note.contains_beat(0.5));
        assert!(!note.contains_beat(1.0));
    }

    #[test]
    fn test_note_overlap_requires_same_pitch() {
        let a = Note::new(0.0, 2.0, 60, 100);
        let b = Note::new(1.0, 2.0, 60, 90);
        let c = Note::new(1.0, 2.0, 61, 90);
        let d = Note::new(2.0, 1.0, 60, 90);

        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        // Touching is not overlapping
        assert!(!a.overlaps(&d));
    }

    #[test]
    fn test_note_name() {
        assert_eq!(Note::new(0.0, 1.0, 60, 100).note_name(), "C4");
        assert_eq!(Note::new(0.0, 1.0, 69, 100).note_name(), "A4");
        assert_eq!(Note::new(0.0, 1.0, 73, 100).note_name(), "C#5");
    }

    #[test]
    fn test_note_fields_round_trip() {
        let note = Note::new(3.333333, 0.5, 64, 90);
        let text = note.encode_fields();
        let fields: Vec<&str> = text.split('|').collect();
        assert_eq!(Note::decode_fields(1, &fields).unwrap(), note);
    }

    #[test]
    fn test_cc_and_pitchbend_clamp() {
        let cc = ControlChange::new(0.0, 200, 300.0);
        assert_eq!(cc.cc_num, 127);
        assert_eq!(cc.cc_val, 127.0);

        let pb = Pitchbend::new(0.0, -4.0);
        assert_eq!(pb.pb_val, -1.0);
    }

    #[test]
    fn test_decode_rejects_out_of_range_velocity() {
        let fields = ["n", "0", "1", "60", "0"];
        assert!(Note::decode_fields(1, &fields).is_err());
    }
}
