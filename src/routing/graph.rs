// Routing graph - track to track sends
// Every track owns up to 4 send slots. The graph is kept acyclic across all
// route kinds so audio always drains towards the master track.

use crate::codec::{
    FormatError, TextCodec, check_range, finish_file, join_fields, parse_field, records,
    split_exact,
};
use crate::error::{ProjectError, ProjectResult};
use crate::sequencer::TRACK_COUNT;
use std::collections::{BTreeMap, HashMap};

/// Send slots per track
pub const SEND_SLOTS: u8 = 4;

/// The master bus
pub const MASTER_TRACK: u8 = 0;

/// What a send carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RouteKind {
    #[default]
    Audio,
    Sidechain,
    Midi,
}

impl RouteKind {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(RouteKind::Audio),
            1 => Some(RouteKind::Sidechain),
            2 => Some(RouteKind::Midi),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            RouteKind::Audio => 0,
            RouteKind::Sidechain => 1,
            RouteKind::Midi => 2,
        }
    }
}

/// One send from `track_num` to `output`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackSend {
    pub track_num: u8,
    pub slot: u8,
    pub output: u8,
    pub kind: RouteKind,
}

/// Result of a successful toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Added { slot: u8 },
    Removed { slot: u8 },
}

/// Inter-track routing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutingGraph {
    /// source track -> slot -> send
    graph: BTreeMap<u8, BTreeMap<u8, TrackSend>>,
}

fn check_track(track: u8) -> ProjectResult<()> {
    if track >= TRACK_COUNT {
        return Err(ProjectError::capacity("track", TRACK_COUNT as usize));
    }
    Ok(())
}

impl RoutingGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends of one track in slot order
    pub fn sends(&self, track: u8) -> impl Iterator<Item = &TrackSend> {
        self.graph.get(&track).into_iter().flat_map(|slots| slots.values())
    }

    /// Tracks with at least one send
    pub fn tracks(&self) -> impl Iterator<Item = u8> + '_ {
        self.graph.keys().copied()
    }

    fn outputs(&self, track: u8) -> impl Iterator<Item = u8> + '_ {
        self.sends(track).map(|s| s.output)
    }

    /// Every simple path from `start` to `end`, following sends of any kind
    ///
    /// A path never revisits a track already on it.
    pub fn find_all_paths(&self, start: u8, end: u8) -> Vec<Vec<u8>> {
        let mut paths = Vec::new();
        let mut path = Vec::new();
        self.walk(start, end, &mut path, &mut paths);
        paths
    }

    fn walk(&self, node: u8, end: u8, path: &mut Vec<u8>, paths: &mut Vec<Vec<u8>>) {
        path.push(node);
        if node == end {
            paths.push(path.clone());
        } else {
            for next in self.outputs(node) {
                if !path.contains(&next) {
                    self.walk(next, end, path, paths);
                }
            }
        }
        path.pop();
    }

    /// Paths `dest -> ... -> src`; any result means `src -> dest` would close a loop
    pub fn check_for_feedback(&self, dest: u8, src: u8) -> Vec<Vec<u8>> {
        self.find_all_paths(dest, src)
    }

    /// Add the send `src -> dest`, or remove it if it already exists
    ///
    /// Rejected (graph unchanged) for self-routing, a full set of slots, or
    /// a connection that would create feedback.
    pub fn toggle(&mut self, src: u8, dest: u8, kind: RouteKind) -> ProjectResult<ToggleOutcome> {
        check_track(src)?;
        check_track(dest)?;

        let existing = self
            .sends(src)
            .find(|s| s.output == dest && s.kind == kind)
            .map(|s| s.slot);
        if let Some(slot) = existing {
            self.remove_send(src, slot);
            log::debug!("Removed {:?} send {} -> {}", kind, src, dest);
            return Ok(ToggleOutcome::Removed { slot });
        }

        if src == dest {
            return Err(ProjectError::Routing(format!(
                "track {} cannot route to itself",
                src
            )));
        }
        let slot = (0..SEND_SLOTS)
            .find(|slot| self.graph.get(&src).is_none_or(|slots| !slots.contains_key(slot)))
            .ok_or_else(|| {
                ProjectError::Routing(format!(
                    "track {} already uses all {} send slots",
                    src, SEND_SLOTS
                ))
            })?;
        let feedback = self.check_for_feedback(dest, src);
        if let Some(path) = feedback.first() {
            let route: Vec<String> = path.iter().map(|t| t.to_string()).collect();
            log::warn!("Rejected send {} -> {}: feedback via {}", src, dest, route.join(" -> "));
            return Err(ProjectError::Routing(format!(
                "send {} -> {} would create a feedback loop ({} -> {})",
                src,
                dest,
                route.join(" -> "),
                dest
            )));
        }

        self.graph.entry(src).or_default().insert(
            slot,
            TrackSend {
                track_num: src,
                slot,
                output: dest,
                kind,
            },
        );
        log::debug!("Added {:?} send {} -> {} in slot {}", kind, src, dest, slot);
        Ok(ToggleOutcome::Added { slot })
    }

    fn remove_send(&mut self, track: u8, slot: u8) {
        if let Some(slots) = self.graph.get_mut(&track) {
            slots.remove(&slot);
            if slots.is_empty() {
                self.graph.remove(&track);
            }
        }
    }

    /// Give a track with no sends a single audio send to `output`
    ///
    /// Returns whether anything changed.
    pub fn set_default_output(&mut self, track: u8, output: u8) -> bool {
        if track == output || self.sends(track).next().is_some() {
            return false;
        }
        self.toggle(track, output, RouteKind::Audio).is_ok()
    }

    /// Track count of the longest path from `track` to master, master included
    ///
    /// Memoized per track. A track already on the walk counts as unreachable,
    /// so a cycle cannot recurse forever.
    fn longest_to_master(
        &self,
        track: u8,
        memo: &mut HashMap<u8, Option<usize>>,
    ) -> Option<usize> {
        if track == MASTER_TRACK {
            return Some(1);
        }
        if let Some(known) = memo.get(&track) {
            return *known;
        }
        memo.insert(track, None);
        let outputs: Vec<u8> = self.outputs(track).collect();
        let longest = outputs
            .into_iter()
            .filter_map(|next| self.longest_to_master(next, memo))
            .max()
            .map(|len| len + 1);
        memo.insert(track, longest);
        longest
    }

    /// Tracks with sends, longest path to master first, ties by track number
    ///
    /// Only used to give the encoded file a stable order.
    pub fn sort_all_paths(&self) -> Vec<u8> {
        let mut memo = HashMap::new();
        let mut tracks: Vec<(usize, u8)> = self
            .tracks()
            .map(|t| (self.longest_to_master(t, &mut memo).unwrap_or(0), t))
            .collect();
        tracks.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        tracks.into_iter().map(|(_, t)| t).collect()
    }

    /// Drop a track's sends and every send pointing at it
    pub fn remove_track(&mut self, track: u8) {
        self.graph.remove(&track);
        for slots in self.graph.values_mut() {
            slots.retain(|_, send| send.output != track);
        }
        self.graph.retain(|_, slots| !slots.is_empty());
    }

    /// Renumber tracks; tracks missing from `map` keep their number
    pub fn reorder_tracks(&mut self, map: &HashMap<u8, u8>) {
        let renumber = |t: u8| map.get(&t).copied().unwrap_or(t);
        let mut graph: BTreeMap<u8, BTreeMap<u8, TrackSend>> = BTreeMap::new();
        for (track, slots) in std::mem::take(&mut self.graph) {
            let track = renumber(track);
            let entry = graph.entry(track).or_default();
            for (slot, send) in slots {
                entry.insert(
                    slot,
                    TrackSend {
                        track_num: track,
                        output: renumber(send.output),
                        ..send
                    },
                );
            }
        }
        self.graph = graph;
    }
}

impl TextCodec for RoutingGraph {
    fn encode(&self) -> String {
        let mut lines = Vec::new();
        for track in self.sort_all_paths() {
            let sends: Vec<&TrackSend> = self.sends(track).collect();
            lines.push(join_fields([
                "t".to_string(),
                track.to_string(),
                sends.len().to_string(),
            ]));
            for send in sends {
                lines.push(join_fields([
                    "s".to_string(),
                    send.slot.to_string(),
                    send.output.to_string(),
                    send.kind.code().to_string(),
                ]));
            }
        }
        finish_file(lines)
    }

    fn decode(text: &str) -> Result<Self, FormatError> {
        let mut graph = RoutingGraph::new();
        let mut lines = records(text)?.into_iter();

        while let Some((line_no, line)) = lines.next() {
            let fields = split_exact(line_no, line, 3)?;
            if fields[0] != "t" {
                return Err(FormatError::new(
                    line_no,
                    format!("expected track header, found '{}'", fields[0]),
                ));
            }
            let track: u8 = parse_field(line_no, "track", fields[1])?;
            check_range(line_no, "track", track, 0, TRACK_COUNT - 1)?;
            if graph.graph.contains_key(&track) {
                return Err(FormatError::new(line_no, format!("duplicate track {}", track)));
            }
            let count: usize = parse_field(line_no, "send count", fields[2])?;
            check_range(line_no, "send count", count, 1, SEND_SLOTS as usize)?;

            for _ in 0..count {
                let (line_no, line) = lines.next().ok_or_else(|| {
                    FormatError::file(format!(
                        "track {} declares {} sends, file ends early",
                        track, count
                    ))
                })?;
                let fields = split_exact(line_no, line, 4)?;
                if fields[0] != "s" {
                    return Err(FormatError::new(line_no, "expected send record"));
                }
                let slot: u8 = parse_field(line_no, "slot", fields[1])?;
                let output: u8 = parse_field(line_no, "output", fields[2])?;
                let code: u8 = parse_field(line_no, "route kind", fields[3])?;
                check_range(line_no, "slot", slot, 0, SEND_SLOTS - 1)?;
                check_range(line_no, "output", output, 0, TRACK_COUNT - 1)?;
                let kind = RouteKind::from_code(code)
                    .ok_or_else(|| FormatError::new(line_no, format!("unknown route kind {}", code)))?;
                if output == track {
                    return Err(FormatError::new(line_no, "track routes to itself"));
                }
                if !graph.check_for_feedback(output, track).is_empty() {
                    return Err(FormatError::new(line_no, "routing contains a feedback loop"));
                }
                let send = TrackSend {
                    track_num: track,
                    slot,
                    output,
                    kind,
                };
                if graph.graph.entry(track).or_default().insert(slot, send).is_some() {
                    return Err(FormatError::new(line_no, format!("duplicate slot {}", slot)));
                }
            }
        }
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_rejects_feedback() {
        let mut graph = RoutingGraph::new();

        assert_eq!(
            graph.toggle(1, 0, RouteKind::Audio).unwrap(),
            ToggleOutcome::Added { slot: 0 }
        );
        let send = graph.sends(1).next().copied().unwrap();
        assert_eq!((send.slot, send.output), (0, 0));

        let before = graph.clone();
        assert!(matches!(
            graph.toggle(0, 1, RouteKind::Audio),
            Err(ProjectError::Routing(_))
        ));
        assert_eq!(graph, before);
    }

    #[test]
    fn test_toggle_removes_existing_send() {
        let mut graph = RoutingGraph::new();
        graph.toggle(2, 0, RouteKind::Audio).unwrap();
        graph.toggle(2, 3, RouteKind::Sidechain).unwrap();

        assert_eq!(
            graph.toggle(2, 0, RouteKind::Audio).unwrap(),
            ToggleOutcome::Removed { slot: 0 }
        );
        // Freed slot is reused
        assert_eq!(
            graph.toggle(2, 4, RouteKind::Midi).unwrap(),
            ToggleOutcome::Added { slot: 0 }
        );
    }

    #[test]
    fn test_feedback_checked_across_route_kinds() {
        let mut graph = RoutingGraph::new();
        graph.toggle(1, 2, RouteKind::Audio).unwrap();
        graph.toggle(2, 3, RouteKind::Sidechain).unwrap();

        assert!(graph.toggle(3, 1, RouteKind::Midi).is_err());
        assert_eq!(graph.check_for_feedback(1, 3), vec![vec![1, 2, 3]]);
    }

    #[test]
    fn test_self_route_rejected() {
        let mut graph = RoutingGraph::new();
        assert!(graph.toggle(4, 4, RouteKind::Audio).is_err());
        assert!(graph.toggle(40, 0, RouteKind::Audio).is_err());
    }

    #[test]
    fn test_slot_capacity_leaves_graph_unchanged() {
        let mut graph = RoutingGraph::new();
        for dest in [0, 2, 3, 4] {
            graph.toggle(1, dest, RouteKind::Audio).unwrap();
        }
        let before = graph.clone();

        assert!(matches!(
            graph.toggle(1, 5, RouteKind::Audio),
            Err(ProjectError::Routing(_))
        ));
        assert_eq!(graph, before);
    }

    #[test]
    fn test_find_all_paths() {
        let mut graph = RoutingGraph::new();
        graph.toggle(3, 1, RouteKind::Audio).unwrap();
        graph.toggle(3, 2, RouteKind::Audio).unwrap();
        graph.toggle(1, 0, RouteKind::Audio).unwrap();
        graph.toggle(2, 0, RouteKind::Audio).unwrap();
        graph.toggle(2, 1, RouteKind::Audio).unwrap();

        let mut paths = graph.find_all_paths(3, 0);
        paths.sort();
        assert_eq!(paths, vec![vec![3, 1, 0], vec![3, 2, 0], vec![3, 2, 1, 0]]);
        assert!(graph.find_all_paths(0, 3).is_empty());
    }

    #[test]
    fn test_set_default_output() {
        let mut graph = RoutingGraph::new();
        assert!(graph.set_default_output(5, 0));
        assert!(!graph.set_default_output(5, 0));
        assert!(!graph.set_default_output(0, 0));
        assert_eq!(graph.sends(5).count(), 1);
    }

    #[test]
    fn test_sort_all_paths() {
        let mut graph = RoutingGraph::new();
        graph.toggle(1, 0, RouteKind::Audio).unwrap();
        graph.toggle(4, 0, RouteKind::Audio).unwrap();
        graph.toggle(2, 1, RouteKind::Audio).unwrap();
        graph.toggle(3, 2, RouteKind::Audio).unwrap();

        assert_eq!(graph.sort_all_paths(), vec![3, 2, 1, 4]);
    }

    #[test]
    fn test_sort_all_paths_dense_layers() {
        // Four layers of tracks, each track sending to every track of the
        // next layer, the last layer to master
        let layers: Vec<Vec<u8>> = vec![
            (1..=8).collect(),
            (9..=16).collect(),
            (17..=24).collect(),
            (25..=31).collect(),
        ];
        let mut graph = RoutingGraph::new();
        for pair in layers.windows(2) {
            for &src in &pair[0] {
                for &dest in pair[1].iter().take(SEND_SLOTS as usize) {
                    graph.toggle(src, dest, RouteKind::Audio).unwrap();
                }
            }
        }
        for &src in &layers[3] {
            graph.toggle(src, MASTER_TRACK, RouteKind::Audio).unwrap();
        }

        let order = graph.sort_all_paths();
        let expected: Vec<u8> = layers.iter().flatten().copied().collect();
        assert_eq!(order, expected);

        let decoded = RoutingGraph::decode(&graph.encode()).unwrap();
        assert_eq!(decoded, graph);
    }

    #[test]
    fn test_sort_all_paths_terminates_on_cycle() {
        let mut graph = RoutingGraph::new();
        for (track_num, output) in [(1, 2), (2, 1), (3, 0)] {
            let send = TrackSend {
                track_num,
                slot: 0,
                output,
                kind: RouteKind::Audio,
            };
            graph.graph.entry(track_num).or_default().insert(0, send);
        }
        assert_eq!(graph.sort_all_paths(), vec![3, 1, 2]);
    }

    #[test]
    fn test_remove_and_reorder_tracks() {
        let mut graph = RoutingGraph::new();
        graph.toggle(1, 2, RouteKind::Audio).unwrap();
        graph.toggle(2, 0, RouteKind::Audio).unwrap();
        graph.toggle(3, 2, RouteKind::Sidechain).unwrap();

        graph.remove_track(2);
        assert_eq!(graph.tracks().count(), 0);

        graph.toggle(1, 0, RouteKind::Audio).unwrap();
        graph.reorder_tracks(&HashMap::from([(1, 6)]));
        let send = graph.sends(6).next().copied().unwrap();
        assert_eq!((send.track_num, send.output), (6, 0));
    }

    #[test]
    fn test_routing_round_trip() {
        let mut graph = RoutingGraph::new();
        graph.toggle(1, 0, RouteKind::Audio).unwrap();
        graph.toggle(2, 1, RouteKind::Audio).unwrap();
        graph.toggle(2, 3, RouteKind::Sidechain).unwrap();
        graph.toggle(3, 0, RouteKind::Audio).unwrap();

        let text = graph.encode();
        assert!(text.starts_with("t|2|2\ns|0|1|0\ns|1|3|1\n"));
        assert_eq!(RoutingGraph::decode(&text).unwrap(), graph);
    }

    #[test]
    fn test_decode_rejects_bad_graphs() {
        // Count mismatch
        assert!(RoutingGraph::decode("t|1|2\ns|0|0|0\n\\\n").is_err());
        // Cycle
        assert!(RoutingGraph::decode("t|1|1\ns|0|2|0\nt|2|1\ns|0|1|0\n\\\n").is_err());
        // Slot out of range
        assert!(RoutingGraph::decode("t|1|1\ns|4|0|0\n\\\n").is_err());
    }
}
