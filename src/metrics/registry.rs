//! Counters for the sequencing pipeline.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use super::Histogram;

/// Sequencing metrics shared by every sequencer of one plugin.
#[derive(Default)]
pub struct SequenceMetrics {
    /// Values assigned to new documents
    pub assigned_total: AtomicU64,
    /// Counters created lazily on first use
    pub counters_created_total: AtomicU64,
    /// Creations lost to a concurrent creator and resolved by re-reading
    pub creation_races_total: AtomicU64,
    /// Saves of existing documents that skipped sequencing
    pub skipped_updates_total: AtomicU64,
    /// Sequencing attempts that aborted the save
    pub failures_total: AtomicU64,
    /// Last assigned count per (model, field)
    pub last_count: DashMap<(String, String), i64>,
    /// Time from counter lookup to rendered value
    pub sequence_duration_us: Histogram,
}

impl SequenceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_assigned(&self, model: &str, field: &str, count: i64, duration_us: u64) {
        self.assigned_total.fetch_add(1, Ordering::Relaxed);
        self.sequence_duration_us.observe(duration_us);
        self.last_count
            .insert((model.to_string(), field.to_string()), count);
    }

    #[inline]
    pub fn record_counter_created(&self) {
        self.counters_created_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_creation_race(&self) {
        self.creation_races_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_skipped_update(&self) {
        self.skipped_updates_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_failure(&self) {
        self.failures_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Formats all metrics in Prometheus exposition format.
    pub fn format_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);

        let counters = [
            (
                "docseq_assigned_total",
                "Sequence values assigned to new documents",
                &self.assigned_total,
            ),
            (
                "docseq_counters_created_total",
                "Counters created on first use",
                &self.counters_created_total,
            ),
            (
                "docseq_creation_races_total",
                "Concurrent counter creations resolved by re-reading",
                &self.creation_races_total,
            ),
            (
                "docseq_skipped_updates_total",
                "Saves of existing documents that skipped sequencing",
                &self.skipped_updates_total,
            ),
            (
                "docseq_failures_total",
                "Sequencing attempts that aborted a save",
                &self.failures_total,
            ),
        ];
        for (name, help, value) in counters {
            let _ = writeln!(output, "# HELP {} {}", name, help);
            let _ = writeln!(output, "# TYPE {} counter", name);
            let _ = writeln!(output, "{} {}", name, value.load(Ordering::Relaxed));
            output.push('\n');
        }

        let _ = writeln!(
            output,
            "# HELP docseq_last_count Last count assigned per counter"
        );
        let _ = writeln!(output, "# TYPE docseq_last_count gauge");
        let mut last: Vec<_> = self
            .last_count
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        last.sort();
        for ((model, field), count) in last {
            let _ = writeln!(
                output,
                "docseq_last_count{{model=\"{}\",field=\"{}\"}} {}",
                model, field, count
            );
        }
        output.push('\n');

        output.push_str(&self.sequence_duration_us.format_prometheus(
            "docseq_sequence_duration_us",
            "Histogram of sequencing durations in microseconds",
        ));

        output
    }
}
