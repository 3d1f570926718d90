/// The size of one element in both buffer layouts, in bytes
pub const ELEMENT_SIZE: u64 = std::mem::size_of::<u64>() as u64;

/// Sizes below this are raised to it before the sweep is generated
pub const SIZE_FLOOR: u64 = 1024;

/// Working sets with fewer elements than this are skipped
pub const MIN_ELEMENTS: u64 = 8;

/// Generates the working set sizes for a sweep
///
/// Sizes are the powers of two from the smallest power of two at or above
/// `max(1024, min_bytes)` up to the largest power of two at or below `max(1024, max_bytes)`,
/// in ascending order. Power of two spacing gives even coverage in log space, so a sweep from
/// kilobytes to gigabytes is only a few dozen points
///
/// If the bounds are inverted the sweep is empty. This isn't an error, there's just nothing to
/// measure
///
/// # Arguments
///
/// * `min_bytes`: The lower bound of the sweep
/// * `max_bytes`: The upper bound of the sweep
///
/// returns: Vec<u64>
///
/// # Examples
///
/// ```
/// use latencylib::sweep::generate_sizes;
/// assert_eq!(generate_sizes(16 * 1024, 64 * 1024), vec![16384, 32768, 65536]);
/// ```
pub fn generate_sizes(min_bytes: u64, max_bytes: u64) -> Vec<u64> {
    let lower = min_bytes.max(SIZE_FLOOR);
    let upper = max_bytes.max(SIZE_FLOOR);
    // Round the lower bound up and the upper bound down, in exponents
    let Some(lower) = lower.checked_next_power_of_two() else {
        return Vec::new();
    };
    let low_exp = lower.trailing_zeros();
    let high_exp = u64::BITS - 1 - upper.leading_zeros();
    (low_exp..=high_exp).map(|exp| 1u64 << exp).collect()
}

/// Gets the number of elements for a working set size, or None if the size is too small to be
/// worth measuring
pub fn element_count(size_bytes: u64) -> Option<u64> {
    let count = size_bytes / ELEMENT_SIZE;
    (count >= MIN_ELEMENTS).then_some(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_point_sweep() {
        assert_eq!(generate_sizes(1024, 1024), vec![1024]);
    }

    #[test]
    fn floor_applies_to_both_bounds() {
        assert_eq!(generate_sizes(1, 1), vec![1024]);
        assert_eq!(generate_sizes(0, 4096), vec![1024, 2048, 4096]);
    }

    #[test]
    fn bounds_that_are_not_powers_of_two() {
        assert_eq!(generate_sizes(3000, 20_000), vec![4096, 8192, 16384]);
    }

    #[test]
    fn inverted_bounds_are_empty() {
        assert!(generate_sizes(64 * 1024, 16 * 1024).is_empty());
        // Both round to nothing in between
        assert!(generate_sizes(1025, 2047).is_empty());
    }

    #[test]
    fn huge_bounds_do_not_overflow() {
        let sizes = generate_sizes(u64::MAX, u64::MAX);
        assert!(sizes.is_empty());
        let sizes = generate_sizes(1 << 62, u64::MAX);
        assert_eq!(sizes, vec![1 << 62, 1 << 63]);
    }

    #[test]
    fn small_sizes_are_skipped() {
        assert_eq!(element_count(63), None);
        assert_eq!(element_count(64), Some(8));
        assert_eq!(element_count(1024), Some(128));
    }
}
