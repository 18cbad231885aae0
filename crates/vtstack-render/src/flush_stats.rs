#![forbid(unsafe_code)]

//! What one terminal flush cost.

use std::time::{Duration, Instant};

/// Statistics from one terminal flush.
///
/// `bytes_emitted` counts everything handed to the writer, the
/// synchronized-output wrapper included, so it equals the growth of a
/// `Vec<u8>` sink.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FlushStats {
    pub bytes_emitted: u64,
    /// Damaged lines processed.
    pub lines_flushed: usize,
    /// Cells whose glyph reached the terminal; a repeat or an erase
    /// counts every cell it covers.
    pub cells_written: usize,
    pub duration: Duration,
}

impl FlushStats {
    /// Whether the flush wrote nothing at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes_emitted == 0
    }

    /// Average output per written cell, 0.0 when no cell was written.
    pub fn bytes_per_cell(&self) -> f64 {
        match self.cells_written {
            0 => 0.0,
            cells => self.bytes_emitted as f64 / cells as f64,
        }
    }

    pub fn log(&self) {
        vtstack_core::debug!(
            bytes = self.bytes_emitted,
            lines = self.lines_flushed,
            cells = self.cells_written,
            duration_us = self.duration.as_micros() as u64,
            bytes_per_cell = self.bytes_per_cell(),
            "flush stats"
        );
    }
}

/// Running counters for a flush in progress.
#[derive(Debug)]
pub(crate) struct StatsCollector {
    started: Instant,
    pub(crate) lines_flushed: usize,
    pub(crate) cells_written: usize,
}

impl StatsCollector {
    pub(crate) fn start() -> Self {
        Self {
            started: Instant::now(),
            lines_flushed: 0,
            cells_written: 0,
        }
    }

    pub(crate) fn finish(self, bytes_emitted: u64) -> FlushStats {
        FlushStats {
            bytes_emitted,
            lines_flushed: self.lines_flushed,
            cells_written: self.cells_written,
            duration: self.started.elapsed(),
        }
    }
}
