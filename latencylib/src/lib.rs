//! # LatencyLib
//!
//! LatencyLib is a library for measuring memory access latency across working set sizes
//!
//! It walks buffers of increasing size at a fixed stride and reports the average time per
//! element read, so the steps between L1, L2, L3 and DRAM show up as jumps in latency. Two
//! storage layouts are provided: a flat contiguous block, and a collection of individually
//! boxed cells which pays for a pointer dereference on every read
//!
//! Everything runs on one thread, one measurement at a time. Running measurements in parallel
//! would have them compete for the caches being measured

/// Contains the two buffer layouts under test, and a utility enum for dispatching between them
pub mod buffer;

/// Contains the run configuration, which can be deserialised from JSON
pub mod config;

/// Contains the stride arithmetic for a walk over a buffer
pub mod pattern;

/// Contains the timed walk itself
pub mod measurer;

/// Contains the repeat-and-median reduction
pub mod aggregate;

/// Contains the generator for the working set sizes of a sweep
pub mod sweep;

/// Contains helpers for finding out how much memory the system can give us
pub mod memory;

/// Contains the sweep driver, tying the other modules together
pub mod runner;

#[cfg(test)]
mod test;
