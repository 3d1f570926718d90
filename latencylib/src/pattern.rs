use crate::sweep::ELEMENT_SIZE;

/// A strided walk over a buffer of a known length
///
/// One sweep reads elements `0, stride, 2 * stride, ...` up to the end of the buffer. Both values
/// are at least one, which keeps the division in the accessors well defined
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct AccessPattern {
    stride_elements: u64,
    element_count: u64,
}

impl AccessPattern {
    /// Creates a pattern from a stride in elements
    ///
    /// A zero stride or element count is raised to one
    pub fn new(stride_elements: u64, element_count: u64) -> Self {
        Self {
            stride_elements: stride_elements.max(1),
            element_count: element_count.max(1),
        }
    }

    /// Creates a pattern from a stride in bytes. Strides smaller than an element read every
    /// element
    ///
    /// # Examples
    ///
    /// ```
    /// use latencylib::pattern::AccessPattern;
    /// let pattern = AccessPattern::from_stride_bytes(64, 1024);
    /// assert_eq!(pattern.stride_elements(), 8);
    /// assert_eq!(pattern.accesses_per_sweep(), 128);
    /// ```
    pub fn from_stride_bytes(stride_bytes: u64, element_count: u64) -> Self {
        Self::new(stride_elements(stride_bytes), element_count)
    }

    pub fn stride_elements(&self) -> u64 {
        self.stride_elements
    }

    pub fn element_count(&self) -> u64 {
        self.element_count
    }

    /// The number of reads in one full walk, `ceil(element_count / stride_elements)`
    pub fn accesses_per_sweep(&self) -> u64 {
        self.element_count.div_ceil(self.stride_elements)
    }

    /// The number of walks needed so that at least `min_accesses` reads happen in total
    ///
    /// This is the smallest such count, and never less than one, so small buffers get walked
    /// repeatedly until the timer can resolve the result
    ///
    /// # Arguments
    ///
    /// * `min_accesses`: The floor on the total number of reads
    ///
    /// returns: u64
    pub fn loop_count(&self, min_accesses: u64) -> u64 {
        min_accesses.div_ceil(self.accesses_per_sweep()).max(1)
    }

    /// The number of reads in `loop_count(min_accesses)` walks, saturating at u64::MAX
    pub fn total_accesses(&self, min_accesses: u64) -> u64 {
        self.loop_count(min_accesses).saturating_mul(self.accesses_per_sweep())
    }

    /// Iterates over the indices of one walk
    pub fn indices(&self) -> impl Iterator<Item = u64> {
        (0..self.element_count).step_by(self.stride_elements as usize)
    }
}

/// Converts a stride in bytes to a stride in elements, `max(1, stride_bytes / 8)`
pub fn stride_elements(stride_bytes: u64) -> u64 {
    (stride_bytes / ELEMENT_SIZE).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odd_stride_rounds_up() {
        let pattern = AccessPattern::new(3, 1000);
        assert_eq!(pattern.accesses_per_sweep(), 334);
        assert_eq!(pattern.loop_count(100), 1);
    }

    #[test]
    fn loop_count_covers_floor() {
        let pattern = AccessPattern::new(8, 128);
        assert_eq!(pattern.accesses_per_sweep(), 16);
        assert_eq!(pattern.loop_count(1_000_000), 62_500);
        assert_eq!(pattern.loop_count(1_000_001), 62_501);
        assert_eq!(pattern.loop_count(0), 1);
    }

    #[test]
    fn total_accesses_saturates() {
        let pattern = AccessPattern::new(1, 2);
        assert_eq!(pattern.total_accesses(9), 10);
        // ceil(u64::MAX / 2) walks of 2 reads is one past u64::MAX
        assert_eq!(pattern.loop_count(u64::MAX), u64::MAX / 2 + 1);
        assert_eq!(pattern.total_accesses(u64::MAX), u64::MAX);
    }

    #[test]
    fn stride_past_the_end() {
        let pattern = AccessPattern::new(4096, 16);
        assert_eq!(pattern.accesses_per_sweep(), 1);
        assert_eq!(pattern.indices().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn small_strides_read_every_element() {
        assert_eq!(stride_elements(0), 1);
        assert_eq!(stride_elements(7), 1);
        assert_eq!(stride_elements(64), 8);
        assert_eq!(stride_elements(100), 12);
    }

    #[test]
    fn indices_match_access_count() {
        let pattern = AccessPattern::new(3, 10);
        assert_eq!(pattern.indices().collect::<Vec<_>>(), vec![0, 3, 6, 9]);
        assert_eq!(pattern.indices().count() as u64, pattern.accesses_per_sweep());
    }
}
