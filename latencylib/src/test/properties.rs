use proptest::prelude::*;
use crate::aggregate::median;
use crate::pattern::AccessPattern;
use crate::sweep::generate_sizes;

proptest! {
    #[test]
    fn accesses_per_sweep_is_ceiling(count in 1u64..1 << 40, stride in 1u64..1 << 20) {
        let pattern = AccessPattern::new(stride, count);
        let expected = count / stride + u64::from(count % stride != 0);
        prop_assert_eq!(pattern.accesses_per_sweep(), expected);
    }

    #[test]
    fn loop_count_is_smallest_cover(min_accesses in 1u64..1 << 32, count in 1u64..1 << 24, stride in 1u64..1024) {
        let pattern = AccessPattern::new(stride, count);
        let per_sweep = pattern.accesses_per_sweep();
        let loops = pattern.loop_count(min_accesses);
        prop_assert!(loops >= 1);
        prop_assert!(loops * per_sweep >= min_accesses);
        if loops > 1 {
            prop_assert!((loops - 1) * per_sweep < min_accesses);
        }
    }

    #[test]
    fn sweep_is_increasing_powers_of_two_in_range(min in 0u64..1 << 40, max in 0u64..1 << 40) {
        let sizes = generate_sizes(min, max);
        let low = min.max(1024);
        let high = max.max(1024);
        for size in &sizes {
            prop_assert!(size.is_power_of_two());
            prop_assert!(*size >= low && *size <= high);
        }
        for pair in sizes.windows(2) {
            prop_assert_eq!(pair[1], pair[0] * 2);
        }
        prop_assert_eq!(generate_sizes(min, max), sizes.clone());
        if low > high {
            prop_assert!(sizes.is_empty());
        }
    }

    #[test]
    fn median_splits_samples(samples in prop::collection::vec(0.0f64..1e6, 1..32)) {
        let m = median(&samples);
        let below = samples.iter().filter(|s| **s <= m).count();
        let above = samples.iter().filter(|s| **s >= m).count();
        prop_assert!(below * 2 >= samples.len());
        prop_assert!(above * 2 >= samples.len());
    }
}
