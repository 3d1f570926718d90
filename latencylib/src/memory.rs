use regex::Regex;
use crate::buffer::{AllocationError, BufferKind};

/// Gets the memory the OS reports as available for new allocations, in bytes
///
/// On Linux overcommit means a huge mapping usually succeeds and the process is killed later,
/// when the pages are touched. Checking against this first turns that into a normal allocation
/// failure. Returns None on other systems, or if /proc/meminfo can't be read
pub fn available_memory() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
        parse_mem_available(&meminfo)
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

/// Parses the MemAvailable line of /proc/meminfo into bytes
///
/// # Examples
///
/// ```
/// use latencylib::memory::parse_mem_available;
/// let meminfo = "MemTotal:       16314268 kB\nMemAvailable:    8000000 kB\n";
/// assert_eq!(parse_mem_available(meminfo), Some(8_192_000_000));
/// ```
pub fn parse_mem_available(meminfo: &str) -> Option<u64> {
    let pattern = Regex::new(r"(?m)^MemAvailable:\s+(?P<kb>[0-9]+)\s*kB\s*$").ok()?;
    let kb = pattern.captures(meminfo)?.name("kb")?.as_str().parse::<u64>().ok()?;
    kb.checked_mul(1024)
}

/// Checks a buffer would fit under the limit before it gets built
///
/// # Arguments
///
/// * `kind`: The layout of the buffer
/// * `element_count`: The number of elements
/// * `limit`: The limit in bytes, None for no limit
///
/// returns: Result<(), AllocationError>
pub fn check_limit(kind: BufferKind, element_count: u64, limit: Option<u64>) -> Result<(), AllocationError> {
    let bytes = kind.footprint_bytes(element_count);
    match limit {
        Some(limit) if bytes > limit => Err(AllocationError::OverLimit { bytes, limit }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_line_is_none() {
        assert_eq!(parse_mem_available("MemTotal:       16314268 kB\nMemFree: 1 kB\n"), None);
        assert_eq!(parse_mem_available(""), None);
    }

    #[test]
    fn picks_the_right_line() {
        let meminfo = "MemTotal:       32000000 kB\nMemFree:         1000000 kB\nMemAvailable:    2000000 kB\nBuffers:          100 kB\n";
        assert_eq!(parse_mem_available(meminfo), Some(2_048_000_000));
    }

    #[test]
    fn limit_counts_indirect_overhead() {
        // 1000 contiguous elements are 8000 bytes, indirect ones 40000
        assert!(check_limit(BufferKind::Contiguous, 1000, Some(8000)).is_ok());
        assert!(matches!(
            check_limit(BufferKind::Indirect, 1000, Some(8000)),
            Err(AllocationError::OverLimit { bytes: 40_000, limit: 8000 })
        ));
        assert!(check_limit(BufferKind::Indirect, u64::MAX, None).is_ok());
    }
}
