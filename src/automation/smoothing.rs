// Smoothing - fills the gaps between automation points
//
// Intermediate points are generated on a fixed beat grid and passed through a
// one-pole low-pass filter so the engine never sees a hard step.

use crate::automation::point::{AutomationPoint, MAX_AUTOMATION_VALUE};
use crate::codec::{AUTOMATION_DECIMALS, round_to};
use std::f64::consts::PI;

/// Grid spacing of generated points (a 1/64 note)
pub const SMOOTHING_STEP: f64 = 0.0625;

/// Filter time constant used by `AutomationRegion::smooth_points`, in grid steps
pub const SMOOTHING_TIME_CONSTANT: f64 = 2.0;

/// Smoother 1-pole (first order low-pass)
///
/// Formula: y[n] = y[n-1] + α * (x[n] - y[n-1])
/// where α controls the speed of convergence.
#[derive(Debug, Clone, Copy)]
pub struct OnePoleSmoother {
    current: f64,
    coefficient: f64,
}

impl OnePoleSmoother {
    /// Creates a smoother reaching ~63% of a step after `time_constant` inputs
    pub fn new(initial_value: f64, time_constant: f64) -> Self {
        let coefficient = if time_constant > 0.0 {
            1.0 / time_constant
        } else {
            1.0
        };
        Self {
            current: initial_value,
            coefficient: coefficient.min(1.0),
        }
    }

    #[inline]
    pub fn process(&mut self, target: f64) -> f64 {
        self.current += self.coefficient * (target - self.current);
        self.current
    }

    #[inline]
    pub fn get(&self) -> f64 {
        self.current
    }
}

/// Interpolate between `from` and `to` at `t` in 0..1
#[inline]
pub fn interpolate(from: f64, to: f64, t: f64, linear: bool) -> f64 {
    let t = if linear {
        t
    } else {
        (1.0 - (t * PI).cos()) * 0.5
    };
    from + (to - from) * t
}

/// Whether a pair of points needs intermediates between them
fn needs_fill(a: &AutomationPoint, b: &AutomationPoint) -> bool {
    a.value.round() != b.value.round() && b.beat - a.beat >= SMOOTHING_STEP
}

/// Generate intermediate points for beat-sorted points of one plugin port
///
/// `smoother` carries its state across consecutive pairs of the port.
/// The input points are fed to the filter but are not returned.
pub fn fill_gaps(
    points: &[AutomationPoint],
    linear: bool,
    smoother: &mut OnePoleSmoother,
) -> Vec<AutomationPoint> {
    let mut generated = Vec::new();

    for pair in points.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        smoother.process(a.value);
        if !needs_fill(a, b) {
            continue;
        }

        let span = b.beat - a.beat;
        let mut step = 1;
        loop {
            let beat = round_to(a.beat + SMOOTHING_STEP * step as f64, AUTOMATION_DECIMALS);
            if beat >= b.beat {
                break;
            }
            let target = interpolate(a.value, b.value, (beat - a.beat) / span, linear);
            let value = smoother.process(target).clamp(0.0, MAX_AUTOMATION_VALUE);
            generated.push(AutomationPoint {
                beat,
                value: round_to(value, AUTOMATION_DECIMALS),
                break_after: false,
                ..*a
            });
            step += 1;
        }
    }
    if let Some(last) = points.last() {
        smoother.process(last.value);
    }
    generated
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(beat: f64, value: f64) -> AutomationPoint {
        AutomationPoint::new(beat, 0, value, 1, 1)
    }

    #[test]
    fn test_smoother_converges() {
        let mut smoother = OnePoleSmoother::new(0.0, SMOOTHING_TIME_CONSTANT);
        for _ in 0..40 {
            smoother.process(100.0);
        }
        assert!((smoother.get() - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_smoother_instant_with_zero_time_constant() {
        let mut smoother = OnePoleSmoother::new(0.0, 0.0);
        assert_eq!(smoother.process(42.0), 42.0);
    }

    #[test]
    fn test_interpolate_endpoints() {
        assert_eq!(interpolate(0.0, 10.0, 0.0, false), 0.0);
        assert!((interpolate(0.0, 10.0, 1.0, false) - 10.0).abs() < 1e-12);
        assert!((interpolate(0.0, 10.0, 0.5, false) - 5.0).abs() < 1e-12);
        assert_eq!(interpolate(0.0, 10.0, 0.25, true), 2.5);
    }

    #[test]
    fn test_fill_gaps_skips_equal_values_and_short_gaps() {
        let mut smoother = OnePoleSmoother::new(0.0, SMOOTHING_TIME_CONSTANT);
        let flat = [point(0.0, 64.2), point(2.0, 63.9)];
        assert!(fill_gaps(&flat, true, &mut smoother).is_empty());

        let close = [point(0.0, 0.0), point(0.05, 127.0)];
        assert!(fill_gaps(&close, true, &mut smoother).is_empty());
    }

    #[test]
    fn test_fill_gaps_grid_spacing() {
        let mut smoother = OnePoleSmoother::new(0.0, SMOOTHING_TIME_CONSTANT);
        let generated = fill_gaps(&[point(0.0, 0.0), point(0.5, 100.0)], false, &mut smoother);

        let beats: Vec<f64> = generated.iter().map(|p| p.beat).collect();
        assert_eq!(beats, vec![0.0625, 0.125, 0.1875, 0.25, 0.3125, 0.375, 0.4375]);
    }
}
