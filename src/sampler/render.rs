// Time-stretch / pitch-shift render boundary
//
// The external stretch tool runs as a blocking subprocess owned by the
// caller. Nothing here cancels or retries a render.

use crate::error::ProjectResult;
use crate::sequencer::audio_clip::TimeStretchMode;
use std::collections::HashMap;

/// What the external tool needs to render a stretched copy of a sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StretchParams {
    pub source_uid: u32,
    pub mode: TimeStretchMode,
    pub pitch_shift: f64,
    pub pitch_shift_end: f64,
    pub timestretch_amt: f64,
    pub timestretch_amt_end: f64,
    pub crispness: u8,
}

impl StretchParams {
    fn key(&self) -> StretchKey {
        StretchKey {
            source_uid: self.source_uid,
            mode: self.mode,
            values: [
                self.pitch_shift.to_bits(),
                self.pitch_shift_end.to_bits(),
                self.timestretch_amt.to_bits(),
                self.timestretch_amt_end.to_bits(),
            ],
            crispness: self.crispness,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct StretchKey {
    source_uid: u32,
    mode: TimeStretchMode,
    values: [u64; 4],
    crispness: u8,
}

/// Renders a stretched sample and returns the wav pool uid of the result
///
/// Implementations block until the render finishes.
pub trait StretchRenderer {
    fn render(&mut self, params: &StretchParams) -> ProjectResult<u32>;
}

/// Remembers which parameter sets were already rendered
#[derive(Debug, Clone, Default)]
pub struct StretchCache {
    rendered: HashMap<StretchKey, u32>,
}

impl StretchCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uid of a previous render with identical parameters
    pub fn get(&self, params: &StretchParams) -> Option<u32> {
        self.rendered.get(&params.key()).copied()
    }

    /// Return the cached uid or block on the renderer
    pub fn get_or_render(
        &mut self,
        params: &StretchParams,
        renderer: &mut dyn StretchRenderer,
    ) -> ProjectResult<u32> {
        if let Some(uid) = self.get(params) {
            return Ok(uid);
        }
        log::info!(
            "Rendering stretched copy of sample {} ({:?})",
            params.source_uid,
            params.mode
        );
        let uid = renderer.render(params)?;
        self.rendered.insert(params.key(), uid);
        Ok(uid)
    }

    pub fn len(&self) -> usize {
        self.rendered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rendered.is_empty()
    }
}
