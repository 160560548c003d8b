//! Sequencing metrics in Prometheus exposition format.
//!
//! All counters are lock-free atomics; per-counter gauges live in a
//! concurrent map.

pub mod histogram;
pub mod registry;

pub use histogram::Histogram;
pub use registry::SequenceMetrics;
