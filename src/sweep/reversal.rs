//! Locate the turning point of a ramp-then-reverse angle trace.

/// First index `i` with `angle[i + 1] < angle[i]`.
///
/// This is the last sample of the rising ramp and the natural right cutoff.
/// Returns `None` if the trace never decreases.
pub fn find_reversal(angle: &[f64]) -> Option<usize> {
    angle.windows(2).position(|w| w[1] - w[0] < 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_the_turning_sample() {
        let angle = [0.0, 5.0, 10.0, 10.0, 15.0, 12.0, 8.0];
        assert_eq!(find_reversal(&angle), Some(4));
    }

    #[test]
    fn monotonic_trace_has_no_reversal() {
        assert_eq!(find_reversal(&[0.0, 1.0, 1.0, 2.0]), None);
        assert_eq!(find_reversal(&[]), None);
        assert_eq!(find_reversal(&[3.0]), None);
    }
}
