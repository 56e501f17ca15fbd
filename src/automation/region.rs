// Automation region - every automation point of the project
// Points are grouped by plugin uid, then by port; each port list is kept
// sorted by beat with at most one point per beat.

use crate::automation::point::AutomationPoint;
use crate::automation::smoothing::{OnePoleSmoother, SMOOTHING_TIME_CONSTANT, fill_gaps};
use crate::codec::{FormatError, TextCodec, finish_file, records, split_exact};
use std::collections::BTreeMap;

type PortMap = BTreeMap<u32, Vec<AutomationPoint>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AutomationRegion {
    plugins: BTreeMap<u32, PortMap>,
}

fn in_plugins(plugins: Option<&[u32]>, uid: u32) -> bool {
    plugins.is_none_or(|p| p.contains(&uid))
}

impl AutomationRegion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a point, replacing any point at the same beat on its port
    pub fn add_point(&mut self, point: AutomationPoint) {
        let list = self
            .plugins
            .entry(point.plugin_uid)
            .or_default()
            .entry(point.port_num)
            .or_default();
        match list.binary_search_by(|p| p.beat.total_cmp(&point.beat)) {
            Ok(index) => list[index] = point,
            Err(index) => list.insert(index, point),
        }
    }

    pub fn remove_point(&mut self, point: &AutomationPoint) -> bool {
        let Some(list) = self
            .plugins
            .get_mut(&point.plugin_uid)
            .and_then(|ports| ports.get_mut(&point.port_num))
        else {
            return false;
        };
        let before = list.len();
        list.retain(|p| p != point);
        let removed = list.len() < before;
        self.prune();
        removed
    }

    /// Points of one plugin port, sorted by beat
    pub fn points(&self, plugin_uid: u32, port_num: u32) -> &[AutomationPoint] {
        self.plugins
            .get(&plugin_uid)
            .and_then(|ports| ports.get(&port_num))
            .map_or(&[], |list| list.as_slice())
    }

    pub fn plugins(&self) -> impl Iterator<Item = u32> + '_ {
        self.plugins.keys().copied()
    }

    pub fn ports(&self, plugin_uid: u32) -> impl Iterator<Item = u32> + '_ {
        self.plugins
            .get(&plugin_uid)
            .into_iter()
            .flat_map(|ports| ports.keys().copied())
    }

    /// Every point, ordered by plugin, port and beat
    pub fn iter(&self) -> impl Iterator<Item = &AutomationPoint> {
        self.plugins.values().flat_map(|ports| ports.values().flatten())
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    fn prune(&mut self) {
        for ports in self.plugins.values_mut() {
            ports.retain(|_, list| !list.is_empty());
        }
        self.plugins.retain(|_, ports| !ports.is_empty());
    }

    /// Smooth the curve through `points`
    ///
    /// For each plugin port in the selection, existing points strictly
    /// between its first and last selected beat are cleared, the selected
    /// points are kept, and intermediates are generated on a 1/64 note grid.
    /// Each port gets its own filter state, carried across that port's
    /// consecutive pairs. Returns the generated points.
    pub fn smooth_points(
        &mut self,
        points: &[AutomationPoint],
        linear: bool,
    ) -> Vec<AutomationPoint> {
        let mut groups: BTreeMap<(u32, u32), Vec<AutomationPoint>> = BTreeMap::new();
        for point in points {
            groups
                .entry((point.plugin_uid, point.port_num))
                .or_default()
                .push(*point);
        }

        let mut generated = Vec::new();

        for ((plugin_uid, port_num), mut group) in groups {
            group.sort_by(|a, b| a.beat.total_cmp(&b.beat));
            group.dedup_by(|a, b| a.beat == b.beat);
            let (Some(first), Some(last)) = (group.first(), group.last()) else {
                continue;
            };
            let (lo, hi) = (first.beat, last.beat);
            let mut smoother = OnePoleSmoother::new(first.value, SMOOTHING_TIME_CONSTANT);

            if let Some(list) = self
                .plugins
                .get_mut(&plugin_uid)
                .and_then(|ports| ports.get_mut(&port_num))
            {
                list.retain(|p| p.beat <= lo || p.beat >= hi);
            }

            let filled = fill_gaps(&group, linear, &mut smoother);
            for point in group.iter().chain(filled.iter()) {
                self.add_point(*point);
            }
            generated.extend(filled);
        }

        log::debug!("Smoothing generated {} automation point(s)", generated.len());
        generated
    }

    /// Points in `[start, end)` of the given plugins, rebased to `start`
    pub fn copy_range_by_plugins(
        &self,
        start: f64,
        end: f64,
        plugins: &[u32],
    ) -> Vec<AutomationPoint> {
        self.iter()
            .filter(|p| plugins.contains(&p.plugin_uid) && p.beat >= start && p.beat < end)
            .map(|p| p.at_beat(p.beat - start))
            .collect()
    }

    /// Insert clipboard points with their beats offset by `at_beat`
    pub fn paste(&mut self, points: &[AutomationPoint], at_beat: f64) {
        for point in points {
            self.add_point(point.at_beat(point.beat + at_beat));
        }
    }

    /// Delete points in `[start, end)` of the given plugins
    pub fn clear_range(&mut self, start: f64, end: f64, plugins: &[u32]) {
        for (uid, ports) in self.plugins.iter_mut() {
            if !plugins.contains(uid) {
                continue;
            }
            for list in ports.values_mut() {
                list.retain(|p| p.beat < start || p.beat >= end);
            }
        }
        self.prune();
    }

    /// Delete every point of the given plugins
    pub fn clear_plugins(&mut self, plugins: &[u32]) {
        self.plugins.retain(|uid, _| !plugins.contains(uid));
    }

    /// Keep only the plugins for which `keep` returns true
    pub fn retain_plugins<F: FnMut(u32) -> bool>(&mut self, mut keep: F) {
        self.plugins.retain(|uid, _| keep(*uid));
    }

    /// Bucket points by sorted beat boundaries
    ///
    /// Returns `boundaries.len() + 1` buckets, each ordered by plugin, port
    /// and beat. Beats stay absolute. `plugins` limits the plugins copied.
    pub fn split(&self, boundaries: &[f64], plugins: Option<&[u32]>) -> Vec<Vec<AutomationPoint>> {
        let mut buckets = vec![Vec::new(); boundaries.len() + 1];
        for point in self.iter().filter(|p| in_plugins(plugins, p.plugin_uid)) {
            let index = boundaries.partition_point(|b| *b <= point.beat);
            buckets[index].push(*point);
        }
        buckets
    }
}

impl TextCodec for AutomationRegion {
    fn encode(&self) -> String {
        finish_file(self.iter().map(|p| p.encode_fields()).collect())
    }

    fn decode(text: &str) -> Result<Self, FormatError> {
        let mut region = AutomationRegion::new();
        for (line_no, line) in records(text)? {
            let fields = split_exact(line_no, line, 8)?;
            let point = AutomationPoint::decode_fields(line_no, &fields)?;
            if region
                .points(point.plugin_uid, point.port_num)
                .iter()
                .any(|p| p.beat == point.beat)
            {
                return Err(FormatError::new(
                    line_no,
                    format!("duplicate point at beat {}", point.beat),
                ));
            }
            region.add_point(point);
        }
        Ok(region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::smoothing::SMOOTHING_STEP;

    fn point(beat: f64, value: f64) -> AutomationPoint {
        AutomationPoint::new(beat, 0, value, 1, 1)
    }

    fn plugin_point(plugin: u32, port: u32, beat: f64, value: f64) -> AutomationPoint {
        AutomationPoint::new(beat, port, value, plugin, 1)
    }

    #[test]
    fn test_add_point_replaces_same_beat() {
        let mut region = AutomationRegion::new();
        region.add_point(point(1.0, 10.0));
        region.add_point(point(0.0, 20.0));
        region.add_point(point(1.0, 30.0));

        let values: Vec<f64> = region.points(1, 0).iter().map(|p| p.value).collect();
        assert_eq!(values, vec![20.0, 30.0]);
    }

    #[test]
    fn test_remove_point_prunes_empty_ports() {
        let mut region = AutomationRegion::new();
        region.add_point(point(1.0, 10.0));
        assert!(region.remove_point(&point(1.0, 10.0)));
        assert!(region.is_empty());
        assert!(!region.remove_point(&point(1.0, 10.0)));
    }

    #[test]
    fn test_smooth_linear_ramp() {
        let mut region = AutomationRegion::new();
        let anchors = [point(0.0, 0.0), point(1.0, 127.0)];
        for p in anchors {
            region.add_point(p);
        }

        let generated = region.smooth_points(&anchors, true);

        assert_eq!(generated.len(), 15);
        for (i, p) in generated.iter().enumerate() {
            assert_eq!(p.beat, SMOOTHING_STEP * (i + 1) as f64);
        }

        let all = region.points(1, 0);
        assert_eq!(all.len(), 17);
        assert_eq!(all[0].value, 0.0);
        assert_eq!(all[16].value, 127.0);
        for pair in all.windows(2) {
            assert!(pair[1].beat > pair[0].beat);
            assert!(pair[1].value > pair[0].value);
        }
    }

    #[test]
    fn test_smooth_ports_do_not_share_filter_state() {
        let mut region = AutomationRegion::new();
        let anchors = [
            plugin_point(1, 0, 0.0, 0.0),
            plugin_point(1, 0, 1.0, 127.0),
            plugin_point(1, 1, 0.0, 0.0),
            plugin_point(1, 1, 1.0, 10.0),
        ];
        for p in anchors {
            region.add_point(p);
        }

        let generated = region.smooth_points(&anchors, false);

        let second: Vec<f64> = generated
            .iter()
            .filter(|p| p.port_num == 1)
            .map(|p| p.value)
            .collect();
        assert_eq!(second.len(), 15);
        assert!(second.iter().all(|v| (0.0..=10.0).contains(v)));
        for pair in second.windows(2) {
            assert!(pair[1] > pair[0]);
        }

        let mut alone = AutomationRegion::new();
        let expected = alone.smooth_points(&anchors[2..], false);
        let expected: Vec<f64> = expected.iter().map(|p| p.value).collect();
        assert_eq!(second, expected);
    }

    #[test]
    fn test_smooth_clears_points_inside_selection() {
        let mut region = AutomationRegion::new();
        region.add_point(point(0.0, 0.0));
        region.add_point(point(0.3, 90.0));
        region.add_point(point(2.0, 64.0));
        region.add_point(point(5.0, 10.0));

        region.smooth_points(&[point(0.0, 0.0), point(2.0, 64.0)], false);

        let all = region.points(1, 0);
        assert!(!all.iter().any(|p| p.beat == 0.3));
        assert_eq!(all.last().map(|p| p.beat), Some(5.0));
        for pair in all.windows(2) {
            assert!(pair[1].beat > pair[0].beat);
        }
    }

    #[test]
    fn test_copy_paste_and_clear() {
        let mut region = AutomationRegion::new();
        region.add_point(plugin_point(1, 0, 1.0, 10.0));
        region.add_point(plugin_point(1, 0, 3.0, 20.0));
        region.add_point(plugin_point(2, 5, 2.0, 30.0));

        let clip = region.copy_range_by_plugins(1.0, 3.0, &[1]);
        assert_eq!(clip, vec![plugin_point(1, 0, 0.0, 10.0)]);

        region.paste(&clip, 8.0);
        assert_eq!(region.points(1, 0).len(), 3);

        region.clear_range(0.0, 4.0, &[1]);
        assert_eq!(region.points(1, 0), &[plugin_point(1, 0, 8.0, 10.0)]);
        assert_eq!(region.points(2, 5).len(), 1);

        region.clear_plugins(&[2]);
        assert_eq!(region.plugins().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_split_buckets() {
        let mut region = AutomationRegion::new();
        for beat in [0.0, 1.0, 2.0, 3.0] {
            region.add_point(plugin_point(1, 0, beat, 1.0));
        }
        region.add_point(plugin_point(2, 0, 1.5, 1.0));

        let buckets = region.split(&[1.0, 3.0], Some(&[1]));
        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[0].len(), 1);
        assert_eq!(buckets[1].len(), 2);
        assert_eq!(buckets[2].len(), 1);

        let all = region.split(&[1.0, 3.0], None);
        assert_eq!(all[1].len(), 3);
    }

    #[test]
    fn test_region_round_trip() {
        let mut region = AutomationRegion::new();
        region.add_point(plugin_point(7, 2, 0.5, 12.3456));
        region.add_point(plugin_point(3, 1, 4.0, 127.0));
        let mut with_break = plugin_point(3, 1, 8.25, 0.0);
        with_break.break_after = true;
        region.add_point(with_break);

        let text = region.encode();
        assert!(text.starts_with("a|4|1|127|3|1|0|0\n"));
        assert_eq!(AutomationRegion::decode(&text).unwrap(), region);
    }

    #[test]
    fn test_decode_rejects_duplicate_beats() {
        let text = "a|1|0|5|1|1|0|0\na|1|0|6|1|1|0|0\n\\\n";
        assert!(AutomationRegion::decode(text).is_err());
    }
}
