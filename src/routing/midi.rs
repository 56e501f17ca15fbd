// MIDI routing - which track each MIDI input device plays into

use crate::codec::{
    FormatError, TextCodec, check_range, finish_file, fmt_bool, join_fields, parse_bool,
    parse_field, records,
};
use crate::sequencer::TRACK_COUNT;
use std::collections::HashMap;

/// Route from one input device to a track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiRoute {
    pub on: bool,
    pub track_num: u8,
    pub device: String,
}

/// Device routes, one per device name, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MidiRouting {
    routes: Vec<MidiRoute>,
}

impl MidiRouting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn routes(&self) -> &[MidiRoute] {
        &self.routes
    }

    pub fn route_for(&self, device: &str) -> Option<&MidiRoute> {
        self.routes.iter().find(|r| r.device == device)
    }

    /// Route a device to a track, replacing its previous route
    ///
    /// Device names cannot hold line breaks; they are replaced by spaces.
    pub fn set_route(&mut self, device: &str, track_num: u8, on: bool) {
        let device = device.replace(['\n', '\r'], " ");
        let route = MidiRoute {
            on,
            track_num: track_num.min(TRACK_COUNT - 1),
            device,
        };
        match self.routes.iter_mut().find(|r| r.device == route.device) {
            Some(existing) => *existing = route,
            None => self.routes.push(route),
        }
    }

    pub fn remove_device(&mut self, device: &str) -> bool {
        let before = self.routes.len();
        self.routes.retain(|r| r.device != device);
        self.routes.len() < before
    }

    /// Enabled devices playing into `track_num`
    pub fn devices_for_track(&self, track_num: u8) -> impl Iterator<Item = &str> {
        self.routes
            .iter()
            .filter(move |r| r.on && r.track_num == track_num)
            .map(|r| r.device.as_str())
    }

    pub fn reorder_tracks(&mut self, map: &HashMap<u8, u8>) {
        for route in self.routes.iter_mut() {
            if let Some(track) = map.get(&route.track_num) {
                route.track_num = *track;
            }
        }
    }
}

impl TextCodec for MidiRouting {
    fn encode(&self) -> String {
        finish_file(
            self.routes
                .iter()
                .map(|r| {
                    join_fields([
                        "r".to_string(),
                        fmt_bool(r.on).to_string(),
                        r.track_num.to_string(),
                        r.device.clone(),
                    ])
                })
                .collect(),
        )
    }

    fn decode(text: &str) -> Result<Self, FormatError> {
        let mut routing = MidiRouting::new();
        for (line_no, line) in records(text)? {
            // The device name is the last field and may contain separators
            let fields: Vec<&str> = line.splitn(4, '|').collect();
            if fields.len() != 4 || fields[0] != "r" {
                return Err(FormatError::new(line_no, "malformed MIDI route record"));
            }
            let on = parse_bool(line_no, "on", fields[1])?;
            let track_num: u8 = parse_field(line_no, "track", fields[2])?;
            check_range(line_no, "track", track_num, 0, TRACK_COUNT - 1)?;
            if routing.route_for(fields[3]).is_some() {
                return Err(FormatError::new(
                    line_no,
                    format!("duplicate device '{}'", fields[3]),
                ));
            }
            routing.routes.push(MidiRoute {
                on,
                track_num,
                device: fields[3].to_string(),
            });
        }
        Ok(routing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_route_replaces_device() {
        let mut routing = MidiRouting::new();
        routing.set_route("Keystation 49", 2, true);
        routing.set_route("Pads", 3, false);
        routing.set_route("Keystation 49", 5, true);

        assert_eq!(routing.routes().len(), 2);
        assert_eq!(routing.route_for("Keystation 49").map(|r| r.track_num), Some(5));
        assert_eq!(routing.devices_for_track(3).count(), 0);
    }

    #[test]
    fn test_midi_routing_round_trip() {
        let mut routing = MidiRouting::new();
        routing.set_route("USB MIDI | Port 1", 1, true);
        routing.set_route("Pads", 9, false);

        let text = routing.encode();
        assert_eq!(text, "r|1|1|USB MIDI | Port 1\nr|0|9|Pads\n\\\n");
        assert_eq!(MidiRouting::decode(&text).unwrap(), routing);
    }

    #[test]
    fn test_reorder_and_remove() {
        let mut routing = MidiRouting::new();
        routing.set_route("Pads", 1, true);
        routing.reorder_tracks(&HashMap::from([(1, 4)]));
        assert_eq!(routing.devices_for_track(4).collect::<Vec<_>>(), vec!["Pads"]);
        assert!(routing.remove_device("Pads"));
        assert!(!routing.remove_device("Pads"));
    }

    #[test]
    fn test_decode_rejects_bad_track() {
        assert!(MidiRouting::decode("r|1|32|Pads\n\\\n").is_err());
        assert!(MidiRouting::decode("r|1|2\n\\\n").is_err());
    }
}
