//! Lock-free latency histogram with Prometheus output.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Upper bucket bounds in microseconds.
///
/// Sequencing spans a storage round trip plus any computed affixes, so the
/// range runs from a fast in-memory advance up to a second.
pub const LATENCY_BUCKETS_US: [u64; 10] = [
    50, 100, 250, 500, 1_000, 5_000, 10_000, 50_000, 250_000, 1_000_000,
];

/// Cumulative histogram of durations in microseconds.
pub struct Histogram {
    sum: AtomicU64,
    count: AtomicU64,
    buckets: [AtomicU64; LATENCY_BUCKETS_US.len()],
}

impl Default for Histogram {
    fn default() -> Self {
        Self {
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
            buckets: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }
}

impl Histogram {
    #[inline]
    pub fn observe(&self, value_us: u64) {
        self.sum.fetch_add(value_us, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        for (bucket, &bound) in self.buckets.iter().zip(LATENCY_BUCKETS_US.iter()) {
            if value_us <= bound {
                bucket.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    /// Cumulative count for each bound in [`LATENCY_BUCKETS_US`].
    pub fn bucket_counts(&self) -> Vec<u64> {
        self.buckets
            .iter()
            .map(|b| b.load(Ordering::Relaxed))
            .collect()
    }

    pub fn format_prometheus(&self, name: &str, help: &str) -> String {
        let mut output = String::with_capacity(768);
        let _ = writeln!(output, "# HELP {} {}", name, help);
        let _ = writeln!(output, "# TYPE {} histogram", name);
        for (bound, count) in LATENCY_BUCKETS_US.iter().zip(self.bucket_counts()) {
            let _ = writeln!(output, "{}_bucket{{le=\"{}\"}} {}", name, bound, count);
        }
        let count = self.count();
        let _ = writeln!(output, "{}_bucket{{le=\"+Inf\"}} {}", name, count);
        let _ = writeln!(output, "{}_sum {}", name, self.sum());
        let _ = writeln!(output, "{}_count {}", name, count);
        output
    }
}
