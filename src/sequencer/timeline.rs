// Timeline - the arrangement of Item placements and markers
// Handles conversion between beats and real time through the tempo markers

use crate::codec::{
    BEAT_DECIMALS, FormatError, TextCodec, check_range, fmt_beat, finish_file, join_fields,
    parse_field, parse_rounded, records, round_beat, split_exact,
};
use crate::error::ProjectResult;
use crate::sequencer::item::ItemUid;
use crate::sequencer::marker::{Marker, MarkerKind, TempoMarker, TimeSignature};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Number of tracks in a project (track 0 is the master bus)
pub const TRACK_COUNT: u8 = 32;

/// Placements shorter than this (in beats) are removed by `fix_overlaps`
pub const MIN_ITEM_LENGTH: f64 = 0.25;

/// Tempo of a new project
pub const DEFAULT_BPM: f64 = 128.0;

const FALLBACK_TEMPO: TempoMarker = TempoMarker {
    beat: 0.0,
    bpm: DEFAULT_BPM,
    tsig: TimeSignature::four_four(),
};

type MarkerKey = (i64, MarkerKind);

fn marker_key(beat: f64, kind: MarkerKind) -> MarkerKey {
    ((round_beat(beat) * 1e6).round() as i64, kind)
}

/// A placement of an Item on a track
///
/// `start_offset` is the position inside the Item where playback begins.
#[derive(Debug, Clone, Copy)]
pub struct SequencerItem {
    pub track_num: u8,
    pub start_beat: f64,
    pub length_beats: f64,
    pub item_uid: ItemUid,
    pub start_offset: f64,

    /// Set on placements touched since the last `fix_overlaps`; wins ties
    /// against untouched placements at the same start. Never persisted.
    pub modified: bool,
}

impl PartialEq for SequencerItem {
    fn eq(&self, other: &Self) -> bool {
        self.track_num == other.track_num
            && self.start_beat == other.start_beat
            && self.length_beats == other.length_beats
            && self.item_uid == other.item_uid
            && self.start_offset == other.start_offset
    }
}

impl SequencerItem {
    pub fn new(
        track_num: u8,
        start_beat: f64,
        length_beats: f64,
        item_uid: ItemUid,
        start_offset: f64,
    ) -> Self {
        Self {
            track_num,
            start_beat: round_beat(start_beat.max(0.0)),
            length_beats: round_beat(length_beats.max(0.0)),
            item_uid,
            start_offset: round_beat(start_offset),
            modified: false,
        }
    }

    pub fn end_beat(&self) -> f64 {
        round_beat(self.start_beat + self.length_beats)
    }

    /// Track, then start, then modified placements first
    pub fn cmp_position(&self, other: &SequencerItem) -> Ordering {
        self.track_num
            .cmp(&other.track_num)
            .then(self.start_beat.total_cmp(&other.start_beat))
            .then(other.modified.cmp(&self.modified))
    }

    /// Piece of this placement inside `[start, end)`, if any
    fn clipped(&self, start: f64, end: f64) -> Option<SequencerItem> {
        let lo = self.start_beat.max(start);
        let hi = self.end_beat().min(end);
        if hi <= lo {
            return None;
        }
        let mut piece = *self;
        piece.start_beat = round_beat(lo);
        piece.length_beats = round_beat(hi - lo);
        piece.start_offset = round_beat(self.start_offset + (lo - self.start_beat));
        Some(piece)
    }

    fn encode_fields(&self) -> String {
        join_fields([
            "s".to_string(),
            fmt_beat(self.start_beat),
            fmt_beat(self.length_beats),
            self.item_uid.to_string(),
            fmt_beat(self.start_offset),
        ])
    }

    fn decode_fields(line_no: usize, track_num: u8, line: &str) -> Result<Self, FormatError> {
        let fields = split_exact(line_no, line, 5)?;
        if fields[0] != "s" {
            return Err(FormatError::new(
                line_no,
                format!("expected item placement, found '{}'", fields[0]),
            ));
        }
        let start_beat = parse_rounded(line_no, "start beat", fields[1], BEAT_DECIMALS)?;
        let length_beats = parse_rounded(line_no, "length", fields[2], BEAT_DECIMALS)?;
        let item_uid: ItemUid = parse_field(line_no, "item uid", fields[3])?;
        let start_offset = parse_rounded(line_no, "start offset", fields[4], BEAT_DECIMALS)?;
        check_range(line_no, "start beat", start_beat, 0.0, f64::MAX)?;
        if length_beats <= 0.0 {
            return Err(FormatError::new(line_no, "item length must be positive"));
        }
        Ok(Self {
            track_num,
            start_beat,
            length_beats,
            item_uid,
            start_offset,
            modified: false,
        })
    }
}

/// The project arrangement
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    /// Kept sorted by `SequencerItem::cmp_position`
    items: Vec<SequencerItem>,
    markers: BTreeMap<MarkerKey, Marker>,
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new(DEFAULT_BPM, TimeSignature::default())
    }
}

impl Timeline {
    /// Creates an empty timeline with its beat-0 tempo marker
    pub fn new(bpm: f64, tsig: TimeSignature) -> Self {
        let mut markers = BTreeMap::new();
        let tempo = Marker::tempo(0.0, bpm, tsig);
        markers.insert(marker_key(0.0, MarkerKind::Tempo), tempo);
        Self {
            items: Vec::new(),
            markers,
        }
    }

    pub fn items(&self) -> &[SequencerItem] {
        &self.items
    }

    pub fn items_on_track(&self, track_num: u8) -> impl Iterator<Item = &SequencerItem> {
        self.items.iter().filter(move |i| i.track_num == track_num)
    }

    /// Every item uid referenced by a placement
    pub fn item_uids(&self) -> BTreeSet<ItemUid> {
        self.items.iter().map(|i| i.item_uid).collect()
    }

    /// Markers in beat order
    pub fn markers(&self) -> impl Iterator<Item = &Marker> {
        self.markers.values()
    }

    pub fn loop_marker(&self) -> Option<&Marker> {
        self.markers.values().find(|m| m.kind() == MarkerKind::Loop)
    }

    /// Beat where the last placement ends
    pub fn length_beats(&self) -> f64 {
        self.items.iter().map(|i| i.end_beat()).fold(0.0, f64::max)
    }

    /// Add a placement, marking it as modified
    pub fn add_item(&mut self, mut item: SequencerItem) {
        item.modified = true;
        let insert_pos = self
            .items
            .binary_search_by(|i| i.cmp_position(&item))
            .unwrap_or_else(|pos| pos);
        self.items.insert(insert_pos, item);
    }

    pub fn remove_item(&mut self, item: &SequencerItem) -> bool {
        if let Some(index) = self.items.iter().position(|i| i == item) {
            self.items.remove(index);
            true
        } else {
            false
        }
    }

    /// Keep only placements for which `keep` returns true
    pub fn retain_items<F: FnMut(&SequencerItem) -> bool>(&mut self, keep: F) {
        self.items.retain(keep);
    }

    /// Insert or replace a marker
    ///
    /// There is at most one loop marker, so setting one replaces the other.
    pub fn set_marker(&mut self, marker: Marker) -> ProjectResult<()> {
        marker.validate()?;
        if marker.kind() == MarkerKind::Loop {
            self.markers.retain(|key, _| key.1 != MarkerKind::Loop);
        }
        self.markers
            .insert(marker_key(marker.beat(), marker.kind()), marker);
        Ok(())
    }

    /// Delete a marker; the beat-0 tempo marker cannot be deleted
    pub fn delete_marker(&mut self, beat: f64, kind: MarkerKind) -> bool {
        let key = marker_key(beat, kind);
        if key == marker_key(0.0, MarkerKind::Tempo) {
            log::warn!("Refusing to delete the tempo marker at beat 0");
            return false;
        }
        self.markers.remove(&key).is_some()
    }

    fn tempo_markers(&self) -> impl Iterator<Item = &TempoMarker> {
        self.markers.values().filter_map(|m| match m {
            Marker::Tempo(tempo) => Some(tempo),
            _ => None,
        })
    }

    /// The tempo marker in control at `beat`
    pub fn get_tempo_marker_at_pos(&self, beat: f64) -> TempoMarker {
        let mut current = None;
        for tempo in self.tempo_markers() {
            if tempo.beat > beat && current.is_some() {
                break;
            }
            current = Some(*tempo);
        }
        current.unwrap_or(FALLBACK_TEMPO)
    }

    /// BPM in effect at `beat`
    pub fn get_tempo_at_pos(&self, beat: f64) -> f64 {
        self.get_tempo_marker_at_pos(beat).bpm
    }

    pub fn get_tsig_at_pos(&self, beat: f64) -> TimeSignature {
        self.get_tempo_marker_at_pos(beat).tsig
    }

    /// Tempo spans as `(start, end, seconds per beat)`; the last span is open
    fn tempo_spans(&self) -> Vec<(f64, f64, f64)> {
        let tempos: Vec<&TempoMarker> = self.tempo_markers().collect();
        tempos
            .iter()
            .enumerate()
            .map(|(i, tempo)| {
                let end = tempos.get(i + 1).map_or(f64::INFINITY, |next| next.beat);
                (tempo.beat, end, tempo.seconds_per_beat())
            })
            .collect()
    }

    /// Elapsed seconds at `beat`, summed over the tempo spans before it
    ///
    /// Monotonically non-decreasing in `beat`.
    pub fn get_seconds_at_beat(&self, beat: f64) -> f64 {
        let beat = beat.max(0.0);
        let mut seconds = 0.0;
        for (start, end, spb) in self.tempo_spans() {
            if beat <= start {
                break;
            }
            seconds += (beat.min(end) - start) * spb;
        }
        seconds
    }

    /// Inverse of `get_seconds_at_beat`
    pub fn get_beat_at_seconds(&self, seconds: f64) -> f64 {
        let mut remaining = seconds.max(0.0);
        let mut beat = 0.0;
        for (start, end, spb) in self.tempo_spans() {
            let span_seconds = (end - start) * spb;
            if remaining <= span_seconds {
                return start + remaining / spb;
            }
            remaining -= span_seconds;
            beat = end;
        }
        beat
    }

    fn is_on(tracks: Option<&[u8]>, item: &SequencerItem) -> bool {
        tracks.is_none_or(|t| t.contains(&item.track_num))
    }

    /// Make room in `[start, end)` on the listed tracks
    ///
    /// Contained placements are deleted; placements crossing an edge are
    /// trimmed, and one spanning the whole range becomes a head and a tail.
    pub fn clear_range(&mut self, tracks: &[u8], start: f64, end: f64) {
        let mut kept = Vec::with_capacity(self.items.len());
        for item in self.items.drain(..) {
            let overlaps = item.start_beat < end && item.end_beat() > start;
            if !tracks.contains(&item.track_num) || !overlaps {
                kept.push(item);
                continue;
            }
            if let Some(head) = item.clipped(f64::NEG_INFINITY, start) {
                kept.push(head);
            }
            if let Some(tail) = item.clipped(end, f64::INFINITY) {
                kept.push(tail);
            }
        }
        kept.sort_by(|a, b| a.cmp_position(b));
        self.items = kept;
    }

    /// Cut placements at sorted beat boundaries
    ///
    /// Returns `points.len() + 1` buckets: before the first point, between
    /// each pair of points, and after the last. With `modify` the
    /// placements on the selected tracks are replaced by the pieces.
    pub fn split(
        &mut self,
        points: &[f64],
        tracks: Option<&[u8]>,
        modify: bool,
    ) -> Vec<Vec<SequencerItem>> {
        let bounds: Vec<f64> = std::iter::once(f64::NEG_INFINITY)
            .chain(points.iter().copied())
            .chain(std::iter::once(f64::INFINITY))
            .collect();

        let buckets: Vec<Vec<SequencerItem>> = bounds
            .windows(2)
            .map(|w| {
                self.items
                    .iter()
                    .filter(|item| Self::is_on(tracks, item))
                    .filter_map(|item| item.clipped(w[0], w[1]))
                    .collect()
            })
            .collect();

        if modify {
            self.items.retain(|item| !Self::is_on(tracks, item));
            self.items.extend(buckets.iter().flatten().copied());
            self.items.sort_by(|a, b| a.cmp_position(b));
        }
        buckets
    }

    /// Per track: drop short placements and duplicate starts, truncate overlaps
    ///
    /// Short placements go first so they never cut or replace a neighbour.
    /// At a shared start beat the modified placement wins. Clears every
    /// `modified` flag. Idempotent.
    pub fn fix_overlaps(&mut self) {
        let before = self.items.len();
        let mut items: Vec<SequencerItem> = std::mem::take(&mut self.items)
            .into_iter()
            .filter(|item| item.length_beats >= MIN_ITEM_LENGTH)
            .collect();
        items.sort_by(|a, b| a.cmp_position(b));

        let mut fixed: Vec<SequencerItem> = Vec::with_capacity(items.len());
        for mut item in items {
            item.modified = false;
            match fixed.last_mut() {
                Some(prev) if prev.track_num == item.track_num => {
                    if prev.start_beat == item.start_beat {
                        continue;
                    }
                    if prev.end_beat() > item.start_beat {
                        prev.length_beats = round_beat(item.start_beat - prev.start_beat);
                    }
                    fixed.push(item);
                }
                _ => fixed.push(item),
            }
        }
        fixed.retain(|item| item.length_beats >= MIN_ITEM_LENGTH);

        if fixed.len() != before {
            log::debug!(
                "Timeline: fix_overlaps removed {} placement(s)",
                before - fixed.len()
            );
        }
        self.items = fixed;
    }

    /// Shift every placement starting at or after `start` by `length` beats
    pub fn insert_space(&mut self, start: f64, length: f64) {
        for item in self.items.iter_mut().filter(|i| i.start_beat >= start) {
            item.start_beat = round_beat(item.start_beat + length);
        }
        self.items.sort_by(|a, b| a.cmp_position(b));
    }

    /// Renumber tracks; tracks missing from `map` keep their number
    pub fn reorder_tracks(&mut self, map: &HashMap<u8, u8>) {
        for item in self.items.iter_mut() {
            if let Some(new_track) = map.get(&item.track_num) {
                item.track_num = *new_track;
            }
        }
        self.items.sort_by(|a, b| a.cmp_position(b));
    }
}

impl TextCodec for Timeline {
    fn encode(&self) -> String {
        let mut lines = vec![join_fields(["M".to_string(), self.markers.len().to_string()])];
        lines.extend(self.markers.values().map(|m| m.encode_fields()));

        let mut by_track: BTreeMap<u8, Vec<&SequencerItem>> = BTreeMap::new();
        for item in &self.items {
            by_track.entry(item.track_num).or_default().push(item);
        }
        for (track_num, items) in by_track {
            lines.push(join_fields([
                "T".to_string(),
                track_num.to_string(),
                items.len().to_string(),
            ]));
            lines.extend(items.iter().map(|i| i.encode_fields()));
        }
        finish_file(lines)
    }

    fn decode(text: &str) -> Result<Self, FormatError> {
        let mut lines = records(text)?.into_iter();

        let (line_no, header) = lines
            .next()
            .ok_or_else(|| FormatError::file("missing marker count header"))?;
        let fields = split_exact(line_no, header, 2)?;
        if fields[0] != "M" {
            return Err(FormatError::new(line_no, "expected marker count header"));
        }
        let marker_count: usize = parse_field(line_no, "marker count", fields[1])?;

        let mut markers = BTreeMap::new();
        for _ in 0..marker_count {
            let (line_no, line) = lines.next().ok_or_else(|| {
                FormatError::file(format!("marker count {} exceeds records", marker_count))
            })?;
            let marker = Marker::decode_fields(line_no, line)?;
            if marker.kind() == MarkerKind::Loop
                && markers.keys().any(|(_, kind)| *kind == MarkerKind::Loop)
            {
                return Err(FormatError::new(line_no, "more than one loop marker"));
            }
            let key = marker_key(marker.beat(), marker.kind());
            if markers.insert(key, marker).is_some() {
                return Err(FormatError::new(line_no, "duplicate marker"));
            }
        }

        let mut items = Vec::new();
        let mut seen_tracks = BTreeSet::new();
        while let Some((line_no, line)) = lines.next() {
            let fields = split_exact(line_no, line, 3)?;
            if fields[0] != "T" {
                return Err(FormatError::new(
                    line_no,
                    format!("expected track header, found '{}'", fields[0]),
                ));
            }
            let track_num: u8 = parse_field(line_no, "track number", fields[1])?;
            check_range(line_no, "track number", track_num, 0, TRACK_COUNT - 1)?;
            if !seen_tracks.insert(track_num) {
                return Err(FormatError::new(line_no, format!("duplicate track {}", track_num)));
            }
            let count: usize = parse_field(line_no, "item count", fields[2])?;
            for _ in 0..count {
                let (line_no, line) = lines.next().ok_or_else(|| {
                    FormatError::file(format!(
                        "track {} declares {} items, file ends early",
                        track_num, count
                    ))
                })?;
                items.push(SequencerItem::decode_fields(line_no, track_num, line)?);
            }
        }

        if !markers.contains_key(&marker_key(0.0, MarkerKind::Tempo)) {
            return Err(FormatError::file("missing tempo marker at beat 0"));
        }

        items.sort_by(|a, b| a.cmp_position(b));
        Ok(Self { items, markers })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placement(track: u8, start: f64, length: f64, uid: u32) -> SequencerItem {
        SequencerItem::new(track, start, length, uid, 0.0)
    }

    #[test]
    fn test_default_timeline_has_tempo_marker() {
        let timeline = Timeline::default();
        assert_eq!(timeline.get_tempo_at_pos(100.0), DEFAULT_BPM);
        assert_eq!(timeline.get_tsig_at_pos(0.0), TimeSignature::four_four());
        assert_eq!(timeline.markers().count(), 1);
    }

    #[test]
    fn test_scenario_item_round_trip() {
        let mut timeline = Timeline::new(128.0, TimeSignature::four_four());
        timeline.add_item(placement(1, 2.0, 4.0, 5));

        let decoded = Timeline::decode(&timeline.encode()).unwrap();

        assert_eq!(decoded.items(), timeline.items());
    }

    #[test]
    fn test_encode_layout() {
        let mut timeline = Timeline::new(120.0, TimeSignature::four_four());
        timeline.add_item(SequencerItem::new(3, 1.5, 2.0, 7, 0.5));

        assert_eq!(
            timeline.encode(),
            "M|1\nm|0|t|120|4|4\nT|3|1\ns|1.5|2|7|0.5\n\\\n"
        );
    }

    #[test]
    fn test_full_round_trip() {
        let mut timeline = Timeline::new(140.0, TimeSignature::new(7, 8).unwrap());
        timeline
            .set_marker(Marker::tempo(16.0, 90.5, TimeSignature::four_four()))
            .unwrap();
        timeline.set_marker(Marker::loop_region(4.0, 8.0)).unwrap();
        timeline.set_marker(Marker::text(2.0, "verse")).unwrap();
        timeline.add_item(placement(0, 0.0, 4.0, 1));
        timeline.add_item(placement(2, 1.0 / 3.0, 2.0, 2));
        timeline.add_item(placement(2, 8.0, 1.0, 1));
        timeline.fix_overlaps();

        let decoded = Timeline::decode(&timeline.encode()).unwrap();
        assert_eq!(decoded, timeline);
    }

    #[test]
    fn test_seconds_across_tempo_change() {
        let mut timeline = Timeline::new(120.0, TimeSignature::four_four());
        timeline
            .set_marker(Marker::tempo(4.0, 60.0, TimeSignature::four_four()))
            .unwrap();

        assert_eq!(timeline.get_seconds_at_beat(2.0), 1.0);
        assert_eq!(timeline.get_seconds_at_beat(4.0), 2.0);
        assert_eq!(timeline.get_seconds_at_beat(6.0), 4.0);
        assert_eq!(timeline.get_beat_at_seconds(4.0), 6.0);
        assert_eq!(timeline.get_beat_at_seconds(1.0), 2.0);
        assert_eq!(timeline.get_tempo_at_pos(3.999), 120.0);
        assert_eq!(timeline.get_tempo_at_pos(4.0), 60.0);
    }

    #[test]
    fn test_seconds_monotonic() {
        let mut timeline = Timeline::new(128.0, TimeSignature::four_four());
        timeline
            .set_marker(Marker::tempo(3.0, 200.0, TimeSignature::new(6, 8).unwrap()))
            .unwrap();
        timeline
            .set_marker(Marker::tempo(7.5, 45.0, TimeSignature::new(3, 2).unwrap()))
            .unwrap();

        let mut last = 0.0;
        for step in 0..200 {
            let seconds = timeline.get_seconds_at_beat(step as f64 * 0.1);
            assert!(seconds >= last);
            last = seconds;
        }
    }

    #[test]
    fn test_delete_marker_protects_first_tempo() {
        let mut timeline = Timeline::default();
        assert!(!timeline.delete_marker(0.0, MarkerKind::Tempo));
        timeline.set_marker(Marker::text(0.0, "start")).unwrap();
        assert!(timeline.delete_marker(0.0, MarkerKind::Text));
    }

    #[test]
    fn test_single_loop_marker() {
        let mut timeline = Timeline::default();
        timeline.set_marker(Marker::loop_region(0.0, 4.0)).unwrap();
        timeline.set_marker(Marker::loop_region(8.0, 16.0)).unwrap();
        assert_eq!(timeline.loop_marker(), Some(&Marker::loop_region(8.0, 16.0)));
        assert_eq!(timeline.markers().count(), 2);
    }

    #[test]
    fn test_clear_range() {
        let mut timeline = Timeline::default();
        timeline.add_item(placement(1, 0.0, 4.0, 1)); // tail cut
        timeline.add_item(placement(1, 5.0, 1.0, 2)); // contained
        timeline.add_item(placement(1, 7.0, 4.0, 3)); // head cut
        timeline.add_item(placement(2, 0.0, 16.0, 4)); // spans the range
        timeline.add_item(placement(3, 4.0, 4.0, 5)); // other track

        timeline.clear_range(&[1, 2], 3.0, 8.0);

        let items = timeline.items();
        assert_eq!(items.len(), 5);
        assert_eq!(items[0], SequencerItem::new(1, 0.0, 3.0, 1, 0.0));
        assert_eq!(items[1], SequencerItem::new(1, 8.0, 3.0, 3, 1.0));
        assert_eq!(items[2], SequencerItem::new(2, 0.0, 3.0, 4, 0.0));
        assert_eq!(items[3], SequencerItem::new(2, 8.0, 8.0, 4, 8.0));
        assert_eq!(items[4], placement(3, 4.0, 4.0, 5));
    }

    #[test]
    fn test_split_buckets() {
        let mut timeline = Timeline::default();
        timeline.add_item(placement(1, 0.0, 8.0, 1));
        timeline.add_item(placement(2, 2.0, 1.0, 2));

        let buckets = timeline.split(&[2.0, 4.0], Some(&[1]), false);

        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[0], vec![SequencerItem::new(1, 0.0, 2.0, 1, 0.0)]);
        assert_eq!(buckets[1], vec![SequencerItem::new(1, 2.0, 2.0, 1, 2.0)]);
        assert_eq!(buckets[2], vec![SequencerItem::new(1, 4.0, 4.0, 1, 4.0)]);
        assert_eq!(timeline.items().len(), 2);

        timeline.split(&[2.0, 4.0], None, true);
        assert_eq!(timeline.items().len(), 4);
    }

    #[test]
    fn test_fix_overlaps() {
        let mut timeline = Timeline::default();
        timeline.add_item(placement(1, 0.0, 4.0, 1));
        timeline.add_item(placement(1, 2.0, 4.0, 2));
        timeline.add_item(placement(1, 6.0, 0.1, 3));
        timeline.fix_overlaps();

        // Re-adding at an existing start beat: the newer placement wins
        timeline.add_item(placement(1, 2.0, 1.0, 9));
        timeline.fix_overlaps();

        assert_eq!(
            timeline.items(),
            &[placement(1, 0.0, 2.0, 1), placement(1, 2.0, 1.0, 9)]
        );
        assert!(timeline.items().iter().all(|i| !i.modified));

        let once = timeline.clone();
        timeline.fix_overlaps();
        assert_eq!(timeline, once);
    }

    #[test]
    fn test_fix_overlaps_short_placement_keeps_neighbour() {
        let mut timeline = Timeline::default();
        timeline.add_item(placement(1, 0.0, 4.0, 1));
        timeline.add_item(placement(1, 2.0, 0.1, 2));
        timeline.fix_overlaps();

        assert_eq!(timeline.items(), &[placement(1, 0.0, 4.0, 1)]);
    }

    #[test]
    fn test_fix_overlaps_short_duplicate_does_not_replace() {
        let mut timeline = Timeline::default();
        timeline.add_item(placement(1, 0.0, 4.0, 1));
        timeline.fix_overlaps();

        timeline.add_item(placement(1, 0.0, 0.1, 2));
        timeline.fix_overlaps();

        assert_eq!(timeline.items(), &[placement(1, 0.0, 4.0, 1)]);
    }

    #[test]
    fn test_insert_space_and_reorder() {
        let mut timeline = Timeline::default();
        timeline.add_item(placement(1, 0.0, 2.0, 1));
        timeline.add_item(placement(2, 4.0, 2.0, 2));

        timeline.insert_space(4.0, 8.0);
        assert_eq!(timeline.items()[1].start_beat, 12.0);

        timeline.reorder_tracks(&HashMap::from([(1, 2), (2, 1)]));
        assert_eq!(timeline.items()[0].item_uid, 2);
        assert_eq!(timeline.items()[0].track_num, 1);
    }

    #[test]
    fn test_decode_validates_counts() {
        // Declared one marker, found two
        let text = "M|1\nm|0|t|128|4|4\nm|4|x|a\n\\\n";
        assert!(Timeline::decode(text).is_err());

        // Track declares two placements, only one present
        let text = "M|1\nm|0|t|128|4|4\nT|1|2\ns|0|1|1|0\n\\\n";
        assert!(Timeline::decode(text).is_err());

        // No tempo marker at beat 0
        let text = "M|1\nm|4|t|128|4|4\n\\\n";
        assert!(Timeline::decode(text).is_err());

        // Track out of range
        let text = "M|1\nm|0|t|128|4|4\nT|40|1\ns|0|1|1|0\n\\\n";
        assert!(Timeline::decode(text).is_err());
    }

    #[test]
    fn test_decode_rejects_second_loop_marker() {
        let text = "M|3\nm|0|t|128|4|4\nm|4|l|0\nm|16|l|8\n\\\n";
        let err = Timeline::decode(text).unwrap_err();
        assert_eq!(err.line, 4);

        let text = "M|2\nm|0|t|128|4|4\nm|4|l|0\n\\\n";
        assert!(Timeline::decode(text).is_ok());
    }
}
