// Quantize grids expressed as musical fractions ("1/16" = sixteenth note)

use crate::error::{ProjectError, ProjectResult};

/// Grids offered by the piano roll, coarsest first
pub const QUANTIZE_GRIDS: [&str; 9] = [
    "1/1", "1/2", "1/4", "1/8", "1/12", "1/16", "1/32", "1/64", "1/128",
];

/// Convert a note fraction to a grid size in beats (quarter note = 1 beat)
///
/// "1/16" -> 0.25, "1/4" -> 1.0, "3/8" -> 1.5
pub fn grid_to_beats(grid: &str) -> ProjectResult<f64> {
    let invalid = || ProjectError::InvalidValue(format!("invalid quantize grid '{}'", grid));

    let (num, den) = grid.trim().split_once('/').ok_or_else(invalid)?;
    let num: u32 = num.trim().parse().map_err(|_| invalid())?;
    let den: u32 = den.trim().parse().map_err(|_| invalid())?;
    if num == 0 || den == 0 {
        return Err(invalid());
    }
    Ok(4.0 * num as f64 / den as f64)
}

/// Snap a beat value to the nearest multiple of `grid`
#[inline]
pub fn snap(value: f64, grid: f64) -> f64 {
    (value / grid).round() * grid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_to_beats() {
        assert_eq!(grid_to_beats("1/16").unwrap(), 0.25);
        assert_eq!(grid_to_beats("1/4").unwrap(), 1.0);
        assert_eq!(grid_to_beats("1/64").unwrap(), 0.0625);
        assert_eq!(grid_to_beats(" 3/8 ").unwrap(), 1.5);
    }

    #[test]
    fn test_grid_to_beats_rejects_garbage() {
        assert!(grid_to_beats("16").is_err());
        assert!(grid_to_beats("1/0").is_err());
        assert!(grid_to_beats("a/b").is_err());
    }

    #[test]
    fn test_all_offered_grids_parse() {
        for grid in QUANTIZE_GRIDS {
            assert!(grid_to_beats(grid).unwrap() > 0.0);
        }
    }

    #[test]
    fn test_snap() {
        assert_eq!(snap(0.3, 0.25), 0.25);
        assert_eq!(snap(0.4, 0.25), 0.5);
        assert_eq!(snap(0.1, 0.25), 0.0);
    }
}
