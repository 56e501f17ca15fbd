// Track list and per-track plugin chains

use crate::codec::{
    FormatError, TextCodec, check_range, finish_file, fmt_bool, join_fields, parse_bool,
    parse_field, records, split_exact,
};
use crate::error::{ProjectError, ProjectResult};
use crate::routing::MASTER_TRACK;
use crate::sequencer::TRACK_COUNT;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Plugin slots per track
pub const MAX_PLUGINS_PER_TRACK: usize = 10;

/// One mixer track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    /// Position in the track list, 0 is master
    pub track_num: u8,
    /// Stable identity; names the `tracks/<uid>` plugin file
    pub uid: u32,
    pub solo: bool,
    pub mute: bool,
    pub name: String,
}

impl Track {
    pub fn new(track_num: u8, uid: u32, name: impl Into<String>) -> Self {
        Self {
            track_num,
            uid,
            solo: false,
            mute: false,
            name: name.into(),
        }
    }
}

/// The fixed set of tracks (`tracks.txt`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackList {
    /// Indexed by track number
    tracks: Vec<Track>,
}

impl Default for TrackList {
    fn default() -> Self {
        let tracks = (0..TRACK_COUNT)
            .map(|n| {
                let name = if n == MASTER_TRACK {
                    "Master".to_string()
                } else {
                    format!("track{}", n)
                };
                Track::new(n, n as u32, name)
            })
            .collect();
        Self { tracks }
    }
}

impl TrackList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn get(&self, track_num: u8) -> Option<&Track> {
        self.tracks.get(track_num as usize)
    }

    pub fn get_mut(&mut self, track_num: u8) -> Option<&mut Track> {
        self.tracks.get_mut(track_num as usize)
    }

    pub fn by_uid(&self, uid: u32) -> Option<&Track> {
        self.tracks.iter().find(|t| t.uid == uid)
    }

    pub fn uids(&self) -> impl Iterator<Item = u32> + '_ {
        self.tracks.iter().map(|t| t.uid)
    }

    /// Move tracks to new positions; uids travel with their track
    ///
    /// `map` must permute its own key set. Tracks missing from it stay put.
    pub fn reorder(&mut self, map: &HashMap<u8, u8>) -> ProjectResult<()> {
        let keys: BTreeSet<u8> = map.keys().copied().collect();
        let values: BTreeSet<u8> = map.values().copied().collect();
        if keys != values || keys.iter().any(|t| *t >= TRACK_COUNT) {
            return Err(ProjectError::InvalidValue(
                "track reorder is not a permutation".to_string(),
            ));
        }

        let mut tracks = self.tracks.clone();
        for (from, to) in map {
            let mut track = self.tracks[*from as usize].clone();
            track.track_num = *to;
            tracks[*to as usize] = track;
        }
        self.tracks = tracks;
        Ok(())
    }
}

impl TextCodec for TrackList {
    fn encode(&self) -> String {
        finish_file(
            self.tracks
                .iter()
                .map(|t| {
                    join_fields([
                        "t".to_string(),
                        t.track_num.to_string(),
                        t.uid.to_string(),
                        fmt_bool(t.solo).to_string(),
                        fmt_bool(t.mute).to_string(),
                        t.name.clone(),
                    ])
                })
                .collect(),
        )
    }

    fn decode(text: &str) -> Result<Self, FormatError> {
        let mut tracks: BTreeMap<u8, Track> = BTreeMap::new();
        let mut uids = BTreeSet::new();
        for (line_no, line) in records(text)? {
            // The name is the last field and may contain separators
            let fields: Vec<&str> = line.splitn(6, '|').collect();
            if fields.len() != 6 || fields[0] != "t" {
                return Err(FormatError::new(line_no, "malformed track record"));
            }
            let track_num: u8 = parse_field(line_no, "track", fields[1])?;
            check_range(line_no, "track", track_num, 0, TRACK_COUNT - 1)?;
            let uid: u32 = parse_field(line_no, "uid", fields[2])?;
            if tracks.contains_key(&track_num) || !uids.insert(uid) {
                return Err(FormatError::new(
                    line_no,
                    format!("duplicate track {} or uid {}", track_num, uid),
                ));
            }
            tracks.insert(
                track_num,
                Track {
                    track_num,
                    uid,
                    solo: parse_bool(line_no, "solo", fields[3])?,
                    mute: parse_bool(line_no, "mute", fields[4])?,
                    name: fields[5].to_string(),
                },
            );
        }
        if tracks.len() != TRACK_COUNT as usize {
            return Err(FormatError::file(format!(
                "expected {} tracks, found {}",
                TRACK_COUNT,
                tracks.len()
            )));
        }
        Ok(Self {
            tracks: tracks.into_values().collect(),
        })
    }
}

/// One plugin in a track's chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginSlot {
    pub index: u8,
    pub plugin_type: u32,
    /// Uid automation points refer to
    pub plugin_uid: u32,
    pub mute: bool,
    pub solo: bool,
    pub power: bool,
}

impl PluginSlot {
    pub fn new(index: u8, plugin_type: u32, plugin_uid: u32) -> Self {
        Self {
            index,
            plugin_type,
            plugin_uid,
            mute: false,
            solo: false,
            power: true,
        }
    }
}

/// Plugin chain of one track (`tracks/<uid>`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackPlugins {
    slots: BTreeMap<u8, PluginSlot>,
}

impl TrackPlugins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slots(&self) -> impl Iterator<Item = &PluginSlot> {
        self.slots.values()
    }

    pub fn get(&self, index: u8) -> Option<&PluginSlot> {
        self.slots.get(&index)
    }

    pub fn plugin_uids(&self) -> impl Iterator<Item = u32> + '_ {
        self.slots.values().map(|s| s.plugin_uid)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Place a plugin at its slot index, replacing what was there
    pub fn set_plugin(&mut self, slot: PluginSlot) -> ProjectResult<Option<PluginSlot>> {
        if slot.index as usize >= MAX_PLUGINS_PER_TRACK {
            return Err(ProjectError::capacity("plugin slot", MAX_PLUGINS_PER_TRACK));
        }
        Ok(self.slots.insert(slot.index, slot))
    }

    pub fn remove_plugin(&mut self, index: u8) -> Option<PluginSlot> {
        self.slots.remove(&index)
    }
}

impl TextCodec for TrackPlugins {
    fn encode(&self) -> String {
        finish_file(
            self.slots
                .values()
                .map(|s| {
                    join_fields([
                        "p".to_string(),
                        s.index.to_string(),
                        s.plugin_type.to_string(),
                        s.plugin_uid.to_string(),
                        fmt_bool(s.mute).to_string(),
                        fmt_bool(s.solo).to_string(),
                        fmt_bool(s.power).to_string(),
                    ])
                })
                .collect(),
        )
    }

    fn decode(text: &str) -> Result<Self, FormatError> {
        let mut plugins = TrackPlugins::new();
        for (line_no, line) in records(text)? {
            let fields = split_exact(line_no, line, 7)?;
            if fields[0] != "p" {
                return Err(FormatError::new(line_no, "malformed plugin record"));
            }
            let index: u8 = parse_field(line_no, "index", fields[1])?;
            check_range(line_no, "index", index, 0, MAX_PLUGINS_PER_TRACK as u8 - 1)?;
            if plugins.slots.contains_key(&index) {
                return Err(FormatError::new(
                    line_no,
                    format!("duplicate plugin slot {}", index),
                ));
            }
            plugins.slots.insert(
                index,
                PluginSlot {
                    index,
                    plugin_type: parse_field(line_no, "plugin type", fields[2])?,
                    plugin_uid: parse_field(line_no, "plugin uid", fields[3])?,
                    mute: parse_bool(line_no, "mute", fields[4])?,
                    solo: parse_bool(line_no, "solo", fields[5])?,
                    power: parse_bool(line_no, "power", fields[6])?,
                },
            );
        }
        Ok(plugins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_track_list() {
        let tracks = TrackList::default();
        assert_eq!(tracks.tracks().len(), 32);
        assert_eq!(tracks.get(0).map(|t| t.name.as_str()), Some("Master"));
        assert_eq!(tracks.get(31).map(|t| t.uid), Some(31));
    }

    #[test]
    fn test_reorder_moves_uids() {
        let mut tracks = TrackList::default();
        let map = HashMap::from([(1, 2), (2, 3), (3, 1)]);
        tracks.reorder(&map).unwrap();

        assert_eq!(tracks.get(2).map(|t| t.uid), Some(1));
        assert_eq!(tracks.get(3).map(|t| t.uid), Some(2));
        assert_eq!(tracks.get(1).map(|t| (t.uid, t.track_num)), Some((3, 1)));
    }

    #[test]
    fn test_reorder_rejects_non_permutation() {
        let mut tracks = TrackList::default();
        let before = tracks.clone();
        assert!(tracks.reorder(&HashMap::from([(1, 2)])).is_err());
        assert_eq!(tracks, before);
    }

    #[test]
    fn test_track_list_round_trip() {
        let mut tracks = TrackList::default();
        if let Some(track) = tracks.get_mut(4) {
            track.name = "Lead | dry".to_string();
            track.solo = true;
        }
        let decoded = TrackList::decode(&tracks.encode()).unwrap();
        assert_eq!(decoded, tracks);
    }

    #[test]
    fn test_track_list_requires_every_track() {
        let err = TrackList::decode("t|0|0|0|0|Master\n\\\n").unwrap_err();
        assert_eq!(err.line, 0);
    }

    #[test]
    fn test_plugin_capacity() {
        let mut plugins = TrackPlugins::new();
        assert!(plugins.set_plugin(PluginSlot::new(9, 1, 100)).is_ok());
        assert!(matches!(
            plugins.set_plugin(PluginSlot::new(10, 1, 101)),
            Err(ProjectError::Capacity { limit: 10, .. })
        ));
    }

    #[test]
    fn test_track_plugins_round_trip() {
        let mut plugins = TrackPlugins::new();
        plugins.set_plugin(PluginSlot::new(0, 3, 12)).unwrap();
        let mut muted = PluginSlot::new(4, 7, 13);
        muted.mute = true;
        plugins.set_plugin(muted).unwrap();

        let text = plugins.encode();
        assert_eq!(text, "p|0|3|12|0|0|1\np|4|7|13|1|0|1\n\\\n");
        assert_eq!(TrackPlugins::decode(&text).unwrap(), plugins);
    }
}
