use log::debug;
use crate::buffer::{AllocationError, GenericBuffer, MemoryBuffer};
use crate::measurer::measure_buffer;
use crate::pattern::AccessPattern;

/// Gets the median of a set of samples, ignoring NaNs
///
/// For an even number of samples this is the mean of the middle two. If there are no valid
/// samples the result is NaN, the same marker used for a buffer which couldn't be built
///
/// # Arguments
///
/// * `samples`: The samples, in any order
///
/// returns: f64
///
/// # Examples
///
/// ```
/// use latencylib::aggregate::median;
/// assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
/// assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
/// assert!(median(&[]).is_nan());
/// ```
pub fn median(samples: &[f64]) -> f64 {
    let mut valid: Vec<f64> = samples.iter().copied().filter(|s| !s.is_nan()).collect();
    if valid.is_empty() {
        return f64::NAN;
    }
    valid.sort_by(|a, b| a.total_cmp(b));
    let mid = valid.len() / 2;
    if valid.len() % 2 == 0 {
        (valid[mid - 1] + valid[mid]) / 2.0
    } else {
        valid[mid]
    }
}

/// Measures one buffer `repeats` times and reduces the results to their median
///
/// The buffer is built once by the caller and reused for every repeat; if it couldn't be built
/// once it won't be built on any later attempt either, so a failed build short circuits to NaN
/// without measuring anything
///
/// # Arguments
///
/// * `buffer`: The buffer, or the reason it couldn't be built
/// * `pattern`: The walk over the buffer
/// * `min_accesses`: The floor on timed reads per repeat
/// * `repeats`: The number of measurements, at least one is always taken
/// * `warmup`: Whether each measurement does an untimed walk first
///
/// returns: f64
pub fn aggregate(
    buffer: &Result<GenericBuffer, AllocationError>,
    pattern: &AccessPattern,
    min_accesses: u64,
    repeats: u32,
    warmup: bool,
) -> f64 {
    let buffer = match buffer {
        Ok(buffer) => buffer,
        Err(e) => {
            debug!("Skipping measurement of {} elements: {e}", pattern.element_count());
            return f64::NAN;
        }
    };
    let samples: Vec<f64> = (0..repeats.max(1))
        .map(|_| measure_buffer(buffer, pattern, min_accesses, warmup).ns_per_access)
        .collect();
    let result = median(&samples);
    debug!("{} samples {samples:?}, median {result:.3}", buffer.kind());
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odd_count_picks_middle() {
        assert_eq!(median(&[5.0]), 5.0);
        assert_eq!(median(&[9.0, 1.0, 5.0]), 5.0);
        assert_eq!(median(&[2.0, 100.0, 3.0, 1.0, 2.5]), 2.5);
    }

    #[test]
    fn even_count_averages_middle_pair() {
        assert_eq!(median(&[1.0, 2.0]), 1.5);
        assert_eq!(median(&[10.0, 1.0, 3.0, 2.0]), 2.5);
    }

    #[test]
    fn outliers_do_not_move_the_median() {
        assert_eq!(median(&[1.0, 1.1, 1_000_000.0]), 1.1);
    }

    #[test]
    fn nan_samples_are_dropped() {
        assert_eq!(median(&[f64::NAN, 4.0, 2.0]), 3.0);
        assert!(median(&[f64::NAN, f64::NAN]).is_nan());
    }

    #[test]
    fn failed_build_is_nan() {
        let buffer = Err(AllocationError::Cells { elements: 16 });
        let result = aggregate(&buffer, &AccessPattern::new(1, 16), 100, 3, true);
        assert!(result.is_nan());
    }
}
