// Audio clip - a window into a wav pool sample placed inside an Item

use crate::codec::{
    BEAT_DECIMALS, FormatError, check_range, fmt_beat, fmt_bool, join_fields, parse_bool,
    parse_field, parse_rounded, round_beat,
};
use crate::error::{ProjectError, ProjectResult, ReferenceKind};
use crate::sampler::{SamplePool, StretchParams};

/// Beats per bar used to resolve `start_bar`
pub const BEATS_PER_BAR: f64 = 4.0;

/// Lanes available inside one Item
pub const MAX_LANES: u8 = 24;

/// Number of per-clip sends
pub const AUDIO_SEND_COUNT: usize = 2;

/// Effect tuples allowed per audio slot
pub const MAX_FX_PER_SLOT: usize = 8;

/// Number of fields in an encoded audio clip record, tag and index included
pub(crate) const AUDIO_CLIP_FIELDS: usize = 26;

/// Time-stretch / pitch-shift algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TimeStretchMode {
    #[default]
    None,
    /// Pitch envelope applied by the engine
    PitchEnvelope,
    /// Playback-rate envelope applied by the engine
    RateEnvelope,
    /// Rendered offline by the external stretch tool
    Rubberband,
    RubberbandFormants,
    Paulstretch,
    SoundStretch,
}

impl TimeStretchMode {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::PitchEnvelope),
            2 => Some(Self::RateEnvelope),
            3 => Some(Self::Rubberband),
            4 => Some(Self::RubberbandFormants),
            5 => Some(Self::Paulstretch),
            6 => Some(Self::SoundStretch),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::PitchEnvelope => 1,
            Self::RateEnvelope => 2,
            Self::Rubberband => 3,
            Self::RubberbandFormants => 4,
            Self::Paulstretch => 5,
            Self::SoundStretch => 6,
        }
    }

    /// Whether the sample has to be rendered by the external tool
    pub fn is_external(&self) -> bool {
        self.code() >= 3
    }
}

/// Send from an audio clip to another track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioSend {
    pub output_track: u8,
    /// Send volume in dB
    pub vol: f64,
    pub sidechain: bool,
}

/// One per-slot effect setting: three knob values and an effect type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FxControl {
    pub knobs: [i32; 3],
    pub fx_type: i32,
}

impl FxControl {
    pub fn new(knobs: [i32; 3], fx_type: i32) -> Self {
        Self {
            knobs: knobs.map(|k| k.clamp(0, 127)),
            fx_type,
        }
    }

    pub(crate) fn encode_slot(index: usize, controls: &[FxControl]) -> String {
        let mut fields = vec!["f".to_string(), index.to_string()];
        for control in controls {
            fields.extend(control.knobs.iter().map(|k| k.to_string()));
            fields.push(control.fx_type.to_string());
        }
        join_fields(fields)
    }

    pub(crate) fn decode_slot(
        line_no: usize,
        fields: &[&str],
    ) -> Result<(usize, Vec<FxControl>), FormatError> {
        if fields.len() < 2 || (fields.len() - 2) % 4 != 0 {
            return Err(FormatError::new(
                line_no,
                "fx record must hold groups of 4 values",
            ));
        }
        let index: usize = parse_field(line_no, "fx slot", fields[1])?;
        let groups = (fields.len() - 2) / 4;
        check_range(line_no, "fx count", groups, 0, MAX_FX_PER_SLOT)?;

        let mut controls = Vec::with_capacity(groups);
        for chunk in fields[2..].chunks(4) {
            let mut knobs = [0i32; 3];
            for (knob, raw) in knobs.iter_mut().zip(chunk) {
                *knob = check_range(line_no, "fx knob", parse_field(line_no, "fx knob", raw)?, 0, 127)?;
            }
            let fx_type: i32 = parse_field(line_no, "fx type", chunk[3])?;
            controls.push(FxControl { knobs, fx_type });
        }
        Ok((index, controls))
    }
}

/// An audio clip inside an Item
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    /// Wav pool uid of the source sample
    pub uid: u32,

    /// Start of the played window, permille of the sample (0-1000)
    pub sample_start: f64,

    /// End of the played window, permille of the sample (0-1000)
    pub sample_end: f64,

    pub start_bar: u32,
    pub start_beat: f64,

    pub timestretch_mode: TimeStretchMode,
    pub pitch_shift: f64,
    pub pitch_shift_end: f64,
    pub timestretch_amt: f64,
    pub timestretch_amt_end: f64,

    pub output_track: u8,

    /// Volume in dB
    pub vol: f64,

    pub lane_num: u8,

    /// Fade positions, permille of the window
    pub fade_in: f64,
    pub fade_out: f64,

    /// Fade depth in dB
    pub fade_in_vol: i32,
    pub fade_out_vol: i32,

    /// Quality knob for the external stretch algorithms
    pub crispness: u8,

    pub sends: [Option<AudioSend>; AUDIO_SEND_COUNT],
}

impl AudioClip {
    /// Create a clip playing the whole sample from `start_beat`
    pub fn new(uid: u32, start_beat: f64) -> Self {
        Self {
            uid,
            sample_start: 0.0,
            sample_end: 1000.0,
            start_bar: 0,
            start_beat: round_beat(start_beat.max(0.0)),
            timestretch_mode: TimeStretchMode::None,
            pitch_shift: 0.0,
            pitch_shift_end: 0.0,
            timestretch_amt: 1.0,
            timestretch_amt_end: 1.0,
            output_track: 0,
            vol: 0.0,
            lane_num: 0,
            fade_in: 0.0,
            fade_out: 999.0,
            fade_in_vol: -18,
            fade_out_vol: -18,
            crispness: 5,
            sends: [None; AUDIO_SEND_COUNT],
        }
    }

    /// Position of the clip inside its Item, in beats
    pub fn start_beats(&self) -> f64 {
        round_beat(self.start_bar as f64 * BEATS_PER_BAR + self.start_beat)
    }

    /// Move the clip, normalising the position to `start_bar = 0`
    pub fn set_start_beats(&mut self, beats: f64) {
        self.start_bar = 0;
        self.start_beat = round_beat(beats.max(0.0));
    }

    /// Length of the whole source sample as heard, in seconds
    pub fn sample_length_seconds(&self, pool: &dyn SamplePool) -> ProjectResult<f64> {
        let duration = pool
            .duration_seconds(self.uid)
            .ok_or_else(|| ProjectError::reference(ReferenceKind::Sample, self.uid))?;
        let factor = if self.timestretch_mode.is_external() {
            self.timestretch_amt
        } else {
            1.0
        };
        Ok(duration * factor)
    }

    /// Length of the played window, in beats at `tempo`
    pub fn length_beats(&self, pool: &dyn SamplePool, tempo: f64) -> ProjectResult<f64> {
        let seconds =
            self.sample_length_seconds(pool)? * (self.sample_end - self.sample_start) / 1000.0;
        Ok(seconds * tempo / 60.0)
    }

    /// Parameters for the external renderer, if this clip needs one
    pub fn stretch_params(&self) -> Option<StretchParams> {
        if !self.timestretch_mode.is_external() {
            return None;
        }
        Some(StretchParams {
            source_uid: self.uid,
            mode: self.timestretch_mode,
            pitch_shift: self.pitch_shift,
            pitch_shift_end: self.pitch_shift_end,
            timestretch_amt: self.timestretch_amt,
            timestretch_amt_end: self.timestretch_amt_end,
            crispness: self.crispness,
        })
    }

    pub(crate) fn encode_fields(&self, index: usize) -> String {
        let mut fields = vec![
            "a".to_string(),
            index.to_string(),
            self.uid.to_string(),
            fmt_beat(self.sample_start),
            fmt_beat(self.sample_end),
            self.start_bar.to_string(),
            fmt_beat(self.start_beat),
            self.timestretch_mode.code().to_string(),
            fmt_beat(self.pitch_shift),
            fmt_beat(self.pitch_shift_end),
            fmt_beat(self.timestretch_amt),
            fmt_beat(self.timestretch_amt_end),
            self.output_track.to_string(),
            fmt_beat(self.vol),
            self.lane_num.to_string(),
            fmt_beat(self.fade_in),
            fmt_beat(self.fade_out),
            self.fade_in_vol.to_string(),
            self.fade_out_vol.to_string(),
            self.crispness.to_string(),
        ];
        for send in &self.sends {
            match send {
                Some(send) => {
                    fields.push(send.output_track.to_string());
                    fields.push(fmt_beat(send.vol));
                    fields.push(fmt_bool(send.sidechain).to_string());
                }
                None => {
                    fields.push("-1".to_string());
                    fields.push("0".to_string());
                    fields.push("0".to_string());
                }
            }
        }
        join_fields(fields)
    }

    pub(crate) fn decode_fields(
        line_no: usize,
        fields: &[&str],
    ) -> Result<(usize, Self), FormatError> {
        let float = |i: usize, name: &str| parse_rounded(line_no, name, fields[i], BEAT_DECIMALS);

        let index: usize = parse_field(line_no, "audio slot", fields[1])?;
        let mode_code: u8 = parse_field(line_no, "timestretch mode", fields[7])?;
        let timestretch_mode = TimeStretchMode::from_code(mode_code).ok_or_else(|| {
            FormatError::new(line_no, format!("unknown timestretch mode {}", mode_code))
        })?;

        let clip = AudioClip {
            uid: parse_field(line_no, "wav uid", fields[2])?,
            sample_start: check_range(line_no, "sample start", float(3, "sample start")?, 0.0, 1000.0)?,
            sample_end: check_range(line_no, "sample end", float(4, "sample end")?, 0.0, 1000.0)?,
            start_bar: parse_field(line_no, "start bar", fields[5])?,
            start_beat: check_range(line_no, "start beat", float(6, "start beat")?, 0.0, f64::MAX)?,
            timestretch_mode,
            pitch_shift: float(8, "pitch shift")?,
            pitch_shift_end: float(9, "pitch shift end")?,
            timestretch_amt: float(10, "timestretch amount")?,
            timestretch_amt_end: float(11, "timestretch amount end")?,
            output_track: check_range(
                line_no,
                "output track",
                parse_field(line_no, "output track", fields[12])?,
                0,
                31,
            )?,
            vol: float(13, "volume")?,
            lane_num: check_range(
                line_no,
                "lane",
                parse_field(line_no, "lane", fields[14])?,
                0,
                MAX_LANES - 1,
            )?,
            fade_in: float(15, "fade in")?,
            fade_out: float(16, "fade out")?,
            fade_in_vol: parse_field(line_no, "fade in volume", fields[17])?,
            fade_out_vol: parse_field(line_no, "fade out volume", fields[18])?,
            crispness: parse_field(line_no, "crispness", fields[19])?,
            sends: [
                decode_send(line_no, &fields[20..23])?,
                decode_send(line_no, &fields[23..26])?,
            ],
        };
        if clip.sample_start >= clip.sample_end {
            return Err(FormatError::new(line_no, "sample start must precede sample end"));
        }
        Ok((index, clip))
    }
}

fn decode_send(line_no: usize, fields: &[&str]) -> Result<Option<AudioSend>, FormatError> {
    let output: i32 = parse_field(line_no, "send track", fields[0])?;
    if output < 0 {
        return Ok(None);
    }
    Ok(Some(AudioSend {
        output_track: check_range(line_no, "send track", output, 0, 31)? as u8,
        vol: parse_rounded(line_no, "send volume", fields[1], BEAT_DECIMALS)?,
        sidechain: parse_bool(line_no, "sidechain", fields[2])?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::WavPool;

    fn decode(text: &str) -> Result<(usize, AudioClip), FormatError> {
        let fields: Vec<&str> = text.split('|').collect();
        assert_eq!(fields.len(), AUDIO_CLIP_FIELDS);
        AudioClip::decode_fields(1, &fields)
    }

    #[test]
    fn test_start_beats_resolves_bars() {
        let mut clip = AudioClip::new(1, 1.5);
        clip.start_bar = 2;
        assert_eq!(clip.start_beats(), 9.5);

        clip.set_start_beats(3.25);
        assert_eq!(clip.start_bar, 0);
        assert_eq!(clip.start_beats(), 3.25);
    }

    #[test]
    fn test_fields_round_trip_with_sends() {
        let mut clip = AudioClip::new(42, 2.0);
        clip.sample_start = 125.5;
        clip.timestretch_mode = TimeStretchMode::Rubberband;
        clip.timestretch_amt = 2.0;
        clip.lane_num = 3;
        clip.sends[1] = Some(AudioSend {
            output_track: 4,
            vol: -6.5,
            sidechain: true,
        });

        let (index, decoded) = decode(&clip.encode_fields(7)).unwrap();
        assert_eq!(index, 7);
        assert_eq!(decoded, clip);
    }

    #[test]
    fn test_decode_rejects_inverted_window() {
        let mut clip = AudioClip::new(1, 0.0);
        clip.sample_start = 600.0;
        clip.sample_end = 400.0;
        assert!(decode(&clip.encode_fields(0)).is_err());
    }

    #[test]
    fn test_length_beats_uses_pool_duration() {
        let mut pool = WavPool::new();
        pool.insert(1, "/samples/loop.wav", 2.0);

        let mut clip = AudioClip::new(1, 0.0);
        // 2 s at 120 BPM = 4 beats
        assert_eq!(clip.length_beats(&pool, 120.0).unwrap(), 4.0);

        clip.sample_end = 500.0;
        assert_eq!(clip.length_beats(&pool, 120.0).unwrap(), 2.0);

        clip.uid = 99;
        assert!(clip.length_beats(&pool, 120.0).is_err());
    }

    #[test]
    fn test_stretch_params_only_for_external_modes() {
        let mut clip = AudioClip::new(1, 0.0);
        clip.timestretch_mode = TimeStretchMode::PitchEnvelope;
        assert!(clip.stretch_params().is_none());

        clip.timestretch_mode = TimeStretchMode::Paulstretch;
        let params = clip.stretch_params().unwrap();
        assert_eq!(params.source_uid, 1);
        assert_eq!(params.mode, TimeStretchMode::Paulstretch);
    }

    #[test]
    fn test_fx_slot_round_trip() {
        let controls = vec![FxControl::new([64, 0, 127], 3), FxControl::new([1, 2, 3], 0)];
        let text = FxControl::encode_slot(5, &controls);
        let fields: Vec<&str> = text.split('|').collect();
        let (index, decoded) = FxControl::decode_slot(1, &fields).unwrap();
        assert_eq!(index, 5);
        assert_eq!(decoded, controls);
    }
}
