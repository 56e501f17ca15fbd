// Item - a reusable clip of notes, controller events and audio
// An Item is referenced from the Timeline by SequencerItems; many
// placements can share the same Item.

use crate::codec::{FormatError, TextCodec, check_range, finish_file, records, round_beat};
use crate::error::{ProjectError, ProjectResult};
use crate::sampler::SamplePool;
use crate::sequencer::audio_clip::{AUDIO_CLIP_FIELDS, AudioClip, FxControl, MAX_FX_PER_SLOT, MAX_LANES};
use crate::sequencer::events::{ControlChange, MIN_NOTE_LENGTH, MAX_NOTE_NUM, Note, Pitchbend};
use crate::sequencer::quantize::{grid_to_beats, snap};
use crate::sequencer::timeline::SequencerItem;
use std::collections::BTreeMap;

/// Unique identifier for items
pub type ItemUid = u32;

/// Audio slots available in one Item
pub const MAX_AUDIO_SLOTS: usize = 256;

/// Bulk velocity edit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VelocityEdit {
    /// Add (or subtract) a fixed amount
    Add(i32),
    /// Set every note to one velocity
    Set(u8),
    /// Linear ramp across the edited notes, by start position
    Ramp { from: u8, to: u8 },
}

/// One decoded line of an Item file
#[derive(Debug, Clone, PartialEq)]
enum ItemRecord {
    Note(Note),
    Cc(ControlChange),
    Pitchbend(Pitchbend),
    Audio(usize, AudioClip),
    Fx(usize, Vec<FxControl>),
}

impl ItemRecord {
    fn parse(line_no: usize, line: &str) -> Result<Self, FormatError> {
        let fields: Vec<&str> = line.split('|').collect();
        let expect = |count: usize| {
            if fields.len() == count {
                Ok(())
            } else {
                Err(FormatError::new(
                    line_no,
                    format!("expected {} fields, found {}", count, fields.len()),
                ))
            }
        };

        match fields[0] {
            "n" => {
                expect(5)?;
                Ok(ItemRecord::Note(Note::decode_fields(line_no, &fields)?))
            }
            "c" => {
                expect(4)?;
                Ok(ItemRecord::Cc(ControlChange::decode_fields(line_no, &fields)?))
            }
            "p" => {
                expect(3)?;
                Ok(ItemRecord::Pitchbend(Pitchbend::decode_fields(line_no, &fields)?))
            }
            "a" => {
                expect(AUDIO_CLIP_FIELDS)?;
                let (index, clip) = AudioClip::decode_fields(line_no, &fields)?;
                Ok(ItemRecord::Audio(index, clip))
            }
            "f" => {
                let (index, controls) = FxControl::decode_slot(line_no, &fields)?;
                Ok(ItemRecord::Fx(index, controls))
            }
            other => Err(FormatError::new(
                line_no,
                format!("unknown item record type '{}'", other),
            )),
        }
    }
}

/// A clip containing musical events and audio
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Item {
    pub uid: ItemUid,

    /// Sorted by start, then pitch
    notes: Vec<Note>,

    /// Sorted by start
    ccs: Vec<ControlChange>,

    /// Sorted by start
    pitchbends: Vec<Pitchbend>,

    /// Audio clips keyed by slot index (0-255)
    audio_clips: BTreeMap<usize, AudioClip>,

    /// Per-slot effect settings, independent of the clip in the slot
    fx: BTreeMap<usize, Vec<FxControl>>,
}

fn is_selected(note: &Note, selected: Option<&[Note]>) -> bool {
    selected.is_none_or(|sel| sel.contains(note))
}

/// Resolve overlaps between notes sharing one note number
///
/// Notes starting together keep the shorter one in place; the longer one is
/// moved to start where the shorter ends and goes through another pass.
/// Exact duplicates are dropped.
fn resolve_pitch_overlaps(mut pending: Vec<Note>) -> Vec<Note> {
    loop {
        pending.sort_by(|a, b| {
            a.start
                .total_cmp(&b.start)
                .then(a.length.total_cmp(&b.length))
        });

        let mut kept: Vec<Note> = Vec::with_capacity(pending.len());
        let mut deferred = Vec::new();

        for note in pending {
            match kept.last_mut() {
                Some(prev) if prev.start == note.start => {
                    if note.length > prev.length {
                        let end = note.end();
                        let mut moved = note;
                        moved.start = prev.end();
                        moved.length = round_beat(end - moved.start);
                        deferred.push(moved);
                    }
                }
                Some(prev) if prev.end() > note.start => {
                    prev.length = round_beat(note.start - prev.start);
                    kept.push(note);
                }
                _ => kept.push(note),
            }
        }

        if deferred.is_empty() {
            return kept;
        }
        kept.extend(deferred);
        pending = kept;
    }
}

impl Item {
    /// Create a new empty item
    pub fn new(uid: ItemUid) -> Self {
        Self {
            uid,
            ..Default::default()
        }
    }

    /// Decode an item file; the uid comes from the file name
    pub fn decode_with_uid(uid: ItemUid, text: &str) -> Result<Self, FormatError> {
        let mut item = <Item as TextCodec>::decode(text)?;
        item.uid = uid;
        Ok(item)
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn ccs(&self) -> &[ControlChange] {
        &self.ccs
    }

    pub fn pitchbends(&self) -> &[Pitchbend] {
        &self.pitchbends
    }

    pub fn audio_clips(&self) -> &BTreeMap<usize, AudioClip> {
        &self.audio_clips
    }

    pub fn audio_clip(&self, index: usize) -> Option<&AudioClip> {
        self.audio_clips.get(&index)
    }

    pub fn audio_clip_mut(&mut self, index: usize) -> Option<&mut AudioClip> {
        self.audio_clips.get_mut(&index)
    }

    pub fn fx(&self, index: usize) -> Option<&[FxControl]> {
        self.fx.get(&index).map(|v| v.as_slice())
    }

    /// Check if the item holds no events at all
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
            && self.ccs.is_empty()
            && self.pitchbends.is_empty()
            && self.audio_clips.is_empty()
    }

    /// Add a note, keeping notes sorted
    ///
    /// With `check`, a note overlapping an existing note of the same pitch is
    /// rejected and `false` is returned.
    pub fn add_note(&mut self, note: Note, check: bool) -> bool {
        if check && self.notes.iter().any(|n| n.overlaps(&note)) {
            return false;
        }
        let insert_pos = self
            .notes
            .binary_search_by(|n| n.cmp_position(&note))
            .unwrap_or_else(|pos| pos);
        self.notes.insert(insert_pos, note);
        true
    }

    /// Remove the first note structurally equal to `note`
    pub fn remove_note(&mut self, note: &Note) -> bool {
        if let Some(index) = self.notes.iter().position(|n| n == note) {
            self.notes.remove(index);
            true
        } else {
            false
        }
    }

    /// Add a control change; duplicates are rejected
    pub fn add_cc(&mut self, cc: ControlChange) -> bool {
        if self.ccs.contains(&cc) {
            return false;
        }
        let insert_pos = self
            .ccs
            .binary_search_by(|c| c.cmp_position(&cc))
            .unwrap_or_else(|pos| pos);
        self.ccs.insert(insert_pos, cc);
        true
    }

    pub fn remove_cc(&mut self, cc: &ControlChange) -> bool {
        let before = self.ccs.len();
        self.ccs.retain(|c| c != cc);
        self.ccs.len() < before
    }

    /// Add a pitchbend; duplicates are rejected
    pub fn add_pb(&mut self, pb: Pitchbend) -> bool {
        if self.pitchbends.contains(&pb) {
            return false;
        }
        let insert_pos = self
            .pitchbends
            .binary_search_by(|p| p.cmp_position(&pb))
            .unwrap_or_else(|pos| pos);
        self.pitchbends.insert(insert_pos, pb);
        true
    }

    pub fn remove_pb(&mut self, pb: &Pitchbend) -> bool {
        let before = self.pitchbends.len();
        self.pitchbends.retain(|p| p != pb);
        self.pitchbends.len() < before
    }

    /// Find notes sounding anywhere in `[start, end)`
    pub fn notes_in_range(&self, start: f64, end: f64) -> Vec<&Note> {
        self.notes
            .iter()
            .filter(|n| n.start < end && n.end() > start)
            .collect()
    }

    /// Beat where the last event ends (audio clips count from their start)
    pub fn length_beats(&self) -> f64 {
        let notes = self.notes.iter().map(|n| n.end());
        let ccs = self.ccs.iter().map(|c| c.start);
        let pbs = self.pitchbends.iter().map(|p| p.start);
        let audio = self.audio_clips.values().map(|a| a.start_beats());
        notes.chain(ccs).chain(pbs).chain(audio).fold(0.0, f64::max)
    }

    /// Remove overlaps between notes of the same pitch and purge tiny notes
    ///
    /// Idempotent: running it twice leaves the notes unchanged.
    pub fn fix_overlaps(&mut self) {
        let before = self.notes.len();
        let mut by_pitch: BTreeMap<u8, Vec<Note>> = BTreeMap::new();
        for note in self.notes.drain(..) {
            if note.length >= MIN_NOTE_LENGTH {
                by_pitch.entry(note.note_num).or_default().push(note);
            }
        }

        let mut fixed: Vec<Note> = by_pitch
            .into_values()
            .flat_map(resolve_pitch_overlaps)
            .filter(|n| n.length >= MIN_NOTE_LENGTH)
            .collect();
        fixed.sort_by(|a, b| a.cmp_position(b));

        if fixed.len() != before {
            log::debug!(
                "Item {}: fix_overlaps removed {} note(s)",
                self.uid,
                before - fixed.len()
            );
        }
        self.notes = fixed;
    }

    /// Snap note starts and lengths to a grid such as "1/16"
    ///
    /// Limited to `selected` notes when given. Overlaps created by snapping
    /// are resolved afterwards.
    pub fn quantize(&mut self, grid: &str, selected: Option<&[Note]>) -> ProjectResult<()> {
        let grid = grid_to_beats(grid)?;
        let mut notes = std::mem::take(&mut self.notes);

        for note in notes.iter_mut().filter(|n| is_selected(n, selected)) {
            note.start = round_beat(snap(note.start, grid).max(0.0));
            let length = round_beat(snap(note.length, grid));
            note.length = if length <= 0.0 { round_beat(grid) } else { length };
        }

        self.notes = notes;
        self.fix_overlaps();
        Ok(())
    }

    /// Shift notes by `semitones`, clipped to 0-120
    ///
    /// With `duplicate` the originals are kept. Returns the transposed notes.
    pub fn transpose(
        &mut self,
        semitones: i32,
        selected: Option<&[Note]>,
        duplicate: bool,
    ) -> Vec<Note> {
        let mut result = Vec::with_capacity(self.notes.len());
        let mut transposed = Vec::new();

        for note in &self.notes {
            if !is_selected(note, selected) {
                result.push(*note);
                continue;
            }
            let mut moved = *note;
            moved.note_num = (note.note_num as i32)
                .saturating_add(semitones)
                .clamp(0, MAX_NOTE_NUM as i32) as u8;
            if duplicate {
                result.push(*note);
            }
            result.push(moved);
            transposed.push(moved);
        }

        self.notes = result;
        self.fix_overlaps();
        transposed
    }

    /// Apply a velocity edit, clipped to 1-127
    pub fn velocity_mod(&mut self, edit: VelocityEdit, selected: Option<&[Note]>) {
        let starts: Vec<f64> = self
            .notes
            .iter()
            .filter(|n| is_selected(n, selected))
            .map(|n| n.start)
            .collect();
        let first = starts.iter().copied().fold(f64::INFINITY, f64::min);
        let last = starts.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        for note in self.notes.iter_mut() {
            if !is_selected(note, selected) {
                continue;
            }
            let velocity = match edit {
                VelocityEdit::Add(amount) => (note.velocity as i32).saturating_add(amount),
                VelocityEdit::Set(value) => value as i32,
                VelocityEdit::Ramp { from, to } => {
                    let pos = if last > first {
                        (note.start - first) / (last - first)
                    } else {
                        0.0
                    };
                    (from as f64 + (to as f64 - from as f64) * pos).round() as i32
                }
            };
            note.velocity = velocity.clamp(1, 127) as u8;
        }
    }

    /// First free audio slot, or `None` when all 256 are taken
    pub fn get_next_index(&self) -> Option<usize> {
        (0..MAX_AUDIO_SLOTS).find(|i| !self.audio_clips.contains_key(i))
    }

    /// First lane not used by any audio clip, or `None` when all 24 are taken
    pub fn get_next_lane(&self) -> Option<u8> {
        (0..MAX_LANES).find(|lane| self.audio_clips.values().all(|c| c.lane_num != *lane))
    }

    /// Put an audio clip in the first free slot and return the slot
    pub fn add_audio_clip(&mut self, mut clip: AudioClip, auto_lane: bool) -> ProjectResult<usize> {
        let index = self
            .get_next_index()
            .ok_or_else(|| ProjectError::capacity("audio slot", MAX_AUDIO_SLOTS))?;
        if auto_lane {
            clip.lane_num = self
                .get_next_lane()
                .ok_or_else(|| ProjectError::capacity("lane", MAX_LANES as usize))?;
        }
        self.audio_clips.insert(index, clip);
        Ok(index)
    }

    /// Put an audio clip in a specific slot, replacing what was there
    pub fn set_audio_clip(&mut self, index: usize, clip: AudioClip) -> ProjectResult<()> {
        if index >= MAX_AUDIO_SLOTS {
            return Err(ProjectError::capacity("audio slot", MAX_AUDIO_SLOTS));
        }
        self.audio_clips.insert(index, clip);
        Ok(())
    }

    /// Remove the clip in a slot along with its effect settings
    pub fn remove_audio_clip(&mut self, index: usize) -> Option<AudioClip> {
        self.fx.remove(&index);
        self.audio_clips.remove(&index)
    }

    /// Set the effect tuples for an audio slot (at most 8)
    pub fn set_fx(&mut self, index: usize, controls: Vec<FxControl>) -> ProjectResult<()> {
        if index >= MAX_AUDIO_SLOTS {
            return Err(ProjectError::capacity("audio slot", MAX_AUDIO_SLOTS));
        }
        if controls.len() > MAX_FX_PER_SLOT {
            return Err(ProjectError::capacity("effect slot", MAX_FX_PER_SLOT));
        }
        self.fx.insert(index, controls);
        Ok(())
    }

    pub fn clear_fx(&mut self, index: usize) -> bool {
        self.fx.remove(&index).is_some()
    }

    /// Confine audio clips to the part of the item a placement plays
    ///
    /// `window` is read in item beats: `[start_offset, start_offset +
    /// length_beats)`. Clips outside are dropped; clips crossing an edge have
    /// their sample window trimmed by the time that lies outside.
    /// Nothing changes if a sample uid cannot be resolved.
    pub fn confine_audio_items(
        &mut self,
        window: &SequencerItem,
        tempo: f64,
        pool: &dyn SamplePool,
    ) -> ProjectResult<()> {
        if tempo <= 0.0 || !tempo.is_finite() {
            return Err(ProjectError::InvalidValue(format!("invalid tempo {}", tempo)));
        }
        let start = window.start_offset;
        let end = round_beat(window.start_offset + window.length_beats);
        let spb = 60.0 / tempo;

        let mut kept = BTreeMap::new();
        for (index, clip) in &self.audio_clips {
            let clip_start = clip.start_beats();
            let clip_end = clip_start + clip.length_beats(pool, tempo)?;
            if clip_start >= end || clip_end <= start {
                log::debug!("Item {}: dropping audio slot {} outside window", self.uid, index);
                continue;
            }

            let length_seconds = clip.sample_length_seconds(pool)?;
            let mut clip = clip.clone();
            if clip_start < start {
                let seconds = spb * (start - clip_start);
                let offset = seconds / length_seconds * 1000.0;
                clip.sample_start = round_beat((clip.sample_start + offset).min(clip.sample_end));
                clip.set_start_beats(start);
            }
            if clip_end > end {
                let seconds = spb * (clip_end - end);
                let offset = seconds / length_seconds * 1000.0;
                clip.sample_end = round_beat((clip.sample_end - offset).max(clip.sample_start));
            }
            kept.insert(*index, clip);
        }

        self.fx.retain(|index, _| kept.contains_key(index));
        self.audio_clips = kept;
        Ok(())
    }

    /// Glue the part of `other` played by `other_window` onto this item
    ///
    /// The confined content is shifted so that the window start lands on
    /// `at_beat`. Audio clips take fresh slots; if the slots run out the
    /// item is left untouched.
    pub fn extend(
        &mut self,
        other: &Item,
        other_window: &SequencerItem,
        at_beat: f64,
        tempo: f64,
        pool: &dyn SamplePool,
    ) -> ProjectResult<()> {
        let mut incoming = other.clone();
        incoming.confine_audio_items(other_window, tempo, pool)?;

        let start = other_window.start_offset;
        let end = round_beat(other_window.start_offset + other_window.length_beats);
        let shift = at_beat - start;
        let inside = |beat: f64| beat >= start && beat < end;

        let mut merged = self.clone();
        for note in incoming.notes.iter().filter(|n| inside(n.start)) {
            let length = note.end().min(end) - note.start;
            merged.notes.push(Note::new(
                note.start + shift,
                length,
                note.note_num,
                note.velocity,
            ));
        }
        for cc in incoming.ccs.iter().filter(|c| inside(c.start)) {
            merged.add_cc(ControlChange::new(cc.start + shift, cc.cc_num, cc.cc_val));
        }
        for pb in incoming.pitchbends.iter().filter(|p| inside(p.start)) {
            merged.add_pb(Pitchbend::new(pb.start + shift, pb.pb_val));
        }
        for (old_index, clip) in &incoming.audio_clips {
            let index = merged
                .get_next_index()
                .ok_or_else(|| ProjectError::capacity("audio slot", MAX_AUDIO_SLOTS))?;
            let mut clip = clip.clone();
            clip.set_start_beats(clip.start_beats() + shift);
            merged.audio_clips.insert(index, clip);
            if let Some(fx) = incoming.fx.get(old_index) {
                merged.fx.insert(index, fx.clone());
            }
        }

        merged.notes.sort_by(|a, b| a.cmp_position(b));
        merged.fix_overlaps();
        *self = merged;
        Ok(())
    }
}

impl TextCodec for Item {
    fn encode(&self) -> String {
        let mut lines = Vec::new();
        lines.extend(self.notes.iter().map(|n| n.encode_fields()));
        lines.extend(self.ccs.iter().map(|c| c.encode_fields()));
        lines.extend(self.pitchbends.iter().map(|p| p.encode_fields()));
        lines.extend(self.audio_clips.iter().map(|(i, a)| a.encode_fields(*i)));
        lines.extend(self.fx.iter().map(|(i, f)| FxControl::encode_slot(*i, f)));
        finish_file(lines)
    }

    fn decode(text: &str) -> Result<Self, FormatError> {
        let mut item = Item::default();

        for (line_no, line) in records(text)? {
            match ItemRecord::parse(line_no, line)? {
                ItemRecord::Note(note) => item.notes.push(note),
                ItemRecord::Cc(cc) => item.ccs.push(cc),
                ItemRecord::Pitchbend(pb) => item.pitchbends.push(pb),
                ItemRecord::Audio(index, clip) => {
                    check_range(line_no, "audio slot", index, 0, MAX_AUDIO_SLOTS - 1)?;
                    if item.audio_clips.insert(index, clip).is_some() {
                        return Err(FormatError::new(
                            line_no,
                            format!("duplicate audio slot {}", index),
                        ));
                    }
                }
                ItemRecord::Fx(index, controls) => {
                    check_range(line_no, "fx slot", index, 0, MAX_AUDIO_SLOTS - 1)?;
                    if item.fx.insert(index, controls).is_some() {
                        return Err(FormatError::new(
                            line_no,
                            format!("duplicate fx slot {}", index),
                        ));
                    }
                }
            }
        }

        item.notes.sort_by(|a, b| a.cmp_position(b));
        item.ccs.sort_by(|a, b| a.cmp_position(b));
        item.pitchbends.sort_by(|a, b| a.cmp_position(b));
        Ok(item)
    }
}
