use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use log::{debug, info, warn};
use serde::Serialize;
use crate::aggregate::aggregate;
use crate::buffer::BufferKind;
use crate::config::SweepConfig;
use crate::memory::check_limit;
use crate::pattern::AccessPattern;
use crate::sweep::{element_count, generate_sizes};

/// The runner walks the sweep one size at a time, builds a fresh buffer per layout, and
/// collects results.
///
/// Buffers are dropped as soon as their repeats finish, before the next one is built, so peak
/// memory is one buffer rather than the whole sweep
pub struct Runner {
    config: SweepConfig,
    sizes: Vec<u64>,
    rows: Vec<SweepRow>,
    sweep_time: Duration,
}

/// The median latency for one layout at one size. NaN if the buffer couldn't be built
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct AggregatedResult {
    pub size_bytes: u64,
    pub kind: BufferKind,
    pub ns_per_access: f64,
}

/// All the results for one working set size, in the configured order of layouts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepRow {
    pub size_bytes: u64,
    pub results: Vec<AggregatedResult>,
}

impl SweepRow {
    /// Gets the latency for a layout, if it was measured
    pub fn latency(&self, kind: BufferKind) -> Option<f64> {
        self.results.iter().find(|r| r.kind == kind).map(|r| r.ns_per_access)
    }
}

/// How far through the sweep the runner is, passed along with each row
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SweepProgress {
    pub completed: usize,
    pub total: usize,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SweepOutcome {
    Completed,
    /// The stop flag was raised. Rows finished before that are kept
    Interrupted,
}

impl Runner {
    /// Creates a new runner for a given configuration
    ///
    /// The sizes are fixed here, so two runners with the same config always sweep the same
    /// points. Layouts are measured once each, contiguous first, however the config lists them
    pub fn new(config: &SweepConfig) -> Self {
        let mut config = config.clone();
        config.kinds = BufferKind::ordered(&config.kinds);
        Self {
            sizes: generate_sizes(config.min_bytes, config.max_bytes),
            config,
            rows: Vec::new(),
            sweep_time: Duration::new(0, 0),
        }
    }

    /// Gets the layouts measured at each size, in reporting order
    pub fn kinds(&self) -> &[BufferKind] {
        &self.config.kinds
    }

    /// Gets the working set sizes this runner will measure
    pub fn sizes(&self) -> &[u64] {
        &self.sizes
    }

    /// Runs the sweep, calling `on_row` as each size completes
    ///
    /// `stop` is checked before each size and each layout. A measurement already in progress
    /// runs to the end, but a size that was interrupted part way through isn't reported
    ///
    /// Allocation failures don't stop the sweep, the affected results are NaN
    ///
    /// # Arguments
    ///
    /// * `stop`: Raised from elsewhere, e.g. a Ctrl-C handler, to end the sweep early
    /// * `on_row`: Called with each finished row and the progress so far
    ///
    /// returns: SweepOutcome
    pub fn run<F: FnMut(&SweepRow, SweepProgress)>(&mut self, stop: &AtomicBool, mut on_row: F) -> SweepOutcome {
        let start = Instant::now();
        if self.sizes.is_empty() {
            warn!(
                "No working set sizes between {} and {} bytes, nothing to measure",
                self.config.min_bytes, self.config.max_bytes
            );
        }
        let mut outcome = SweepOutcome::Completed;
        let mut progress = SweepProgress {
            completed: 0,
            total: self.sizes.len(),
        };
        for &size_bytes in &self.sizes {
            let Some(row) = Self::measure_size(&self.config, size_bytes, stop) else {
                outcome = SweepOutcome::Interrupted;
                break;
            };
            progress.completed += 1;
            if let Some(row) = row {
                on_row(&row, progress);
                self.rows.push(row);
            }
        }
        self.sweep_time += start.elapsed();
        if outcome == SweepOutcome::Interrupted {
            info!("Sweep interrupted after {} of {} sizes", progress.completed, progress.total);
        }
        outcome
    }

    /// Measures every configured layout at one size
    ///
    /// returns: None if interrupted, Some(None) if the size was too small to measure
    fn measure_size(config: &SweepConfig, size_bytes: u64, stop: &AtomicBool) -> Option<Option<SweepRow>> {
        if stop.load(Ordering::Relaxed) {
            return None;
        }
        let Some(count) = element_count(size_bytes) else {
            debug!("Skipping {size_bytes} bytes, too few elements");
            return Some(None);
        };
        info!("Measuring {size_bytes} bytes ({count} elements)");
        let pattern = AccessPattern::from_stride_bytes(config.stride_bytes, count);
        let mut results = Vec::with_capacity(config.kinds.len());
        for &kind in &config.kinds {
            if stop.load(Ordering::Relaxed) {
                return None;
            }
            let buffer = check_limit(kind, count, config.memory_limit).and_then(|_| kind.build(count));
            if let Err(e) = &buffer {
                warn!("Couldn't build a {kind} buffer of {size_bytes} bytes: {e}");
            }
            let ns_per_access = aggregate(
                &buffer,
                &pattern,
                config.min_accesses_for(kind),
                config.measurement.repeats,
                config.measurement.warmup,
            );
            // Release the buffer before the next one is built
            drop(buffer);
            results.push(AggregatedResult {
                size_bytes,
                kind,
                ns_per_access,
            });
        }
        Some(Some(SweepRow { size_bytes, results }))
    }

    /// Gets the rows finished so far
    pub fn rows(&self) -> &[SweepRow] {
        &self.rows
    }

    /// Gets the wall-clock time spent sweeping
    pub fn get_execution_time(&self) -> &Duration {
        &self.sweep_time
    }
}
