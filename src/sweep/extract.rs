//! Sub-sweep extraction and duplicate-angle removal.

use log::debug;

use crate::domain::{CleanedSweep, CutoffRange, Sweep};
use crate::error::AnalysisError;

/// Minimum samples a cleaned sweep needs for the endpoint baseline.
const MIN_SAMPLES: usize = 2;

/// Slice `sweep` to `[cutoff.left, cutoff.right)` and drop repeated angles.
///
/// Wherever two consecutive sliced angles are exactly equal, the earlier
/// sample is removed from all three channels, so of a run of equal angles only
/// the last sample survives.
pub fn extract(sweep: &Sweep, cutoff: CutoffRange) -> Result<CleanedSweep, AnalysisError> {
    let len = sweep
        .angle
        .len()
        .min(sweep.load.len())
        .min(sweep.field.len());
    let CutoffRange { left, right } = cutoff;

    let invalid = |reason: String| AnalysisError::InvalidCutoff {
        left,
        right,
        len,
        reason,
    };

    if right <= left {
        return Err(invalid("right must be greater than left".to_string()));
    }
    if left >= len {
        return Err(invalid("left is past the end of the sweep".to_string()));
    }
    if right > len {
        return Err(invalid("right is past the end of the sweep".to_string()));
    }

    let angle = &sweep.angle[left..right];
    let load = &sweep.load[left..right];
    let field = &sweep.field[left..right];

    let n = angle.len();
    let mut keep = vec![true; n];
    for i in 0..n.saturating_sub(1) {
        if angle[i + 1] - angle[i] == 0.0 {
            keep[i] = false;
        }
    }

    let select = |values: &[f64]| -> Vec<f64> {
        values
            .iter()
            .zip(keep.iter())
            .filter_map(|(&v, &k)| k.then_some(v))
            .collect()
    };
    let cleaned = CleanedSweep {
        angle: select(angle),
        load: select(load),
        field: select(field),
    };

    if cleaned.len() < MIN_SAMPLES {
        return Err(invalid(format!(
            "only {} distinct-angle sample(s) remain, need at least {MIN_SAMPLES}",
            cleaned.len()
        )));
    }

    debug!(
        "extracted [{left}, {right}): {} samples, {} duplicate angle(s) removed",
        cleaned.len(),
        n - cleaned.len()
    );

    Ok(cleaned)
}
