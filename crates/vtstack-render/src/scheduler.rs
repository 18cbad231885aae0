#![forbid(unsafe_code)]

//! When a terminal sync may run.
//!
//! The scheduler gates the sync engine on three things: whether a logical
//! draw is complete, whether a caller fenced updates with
//! [`UpdateScheduler::stop`], and whether input is waiting. Pending input
//! defers the sync so keystrokes are handled first, but only a bounded
//! number of times in a row; after that the sync runs anyway, so the
//! screen never falls arbitrarily far behind an input burst.

use std::time::{Duration, Instant};

/// Scheduler tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Deferrals allowed in a row before a sync is forced through.
    pub max_skipped_updates: u32,
    /// Minimum time between two syncs; earlier requests are deferred
    /// like pending input.
    pub min_flush_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_skipped_updates: 5,
            min_flush_interval: Duration::ZERO,
        }
    }
}

impl SchedulerConfig {
    /// Never defer: every request syncs as soon as the draw is complete.
    pub const fn immediate() -> Self {
        Self {
            max_skipped_updates: 0,
            min_flush_interval: Duration::ZERO,
        }
    }

    /// Coalesce bursts into roughly 60 syncs per second.
    pub const fn batched() -> Self {
        Self {
            max_skipped_updates: 5,
            min_flush_interval: Duration::from_millis(16),
        }
    }
}

/// Outcome of asking whether a sync may run now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDecision {
    Run,
    /// Postponed; the request stays pending.
    Defer,
    /// Not allowed until the draw completes or the fence lifts.
    Blocked,
}

/// Tells the scheduler whether input is waiting to be read.
pub trait InputProbe {
    fn input_pending(&mut self) -> bool;
}

/// A probe that never sees input.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoInput;

impl InputProbe for NoInput {
    #[inline]
    fn input_pending(&mut self) -> bool {
        false
    }
}

impl<F: FnMut() -> bool> InputProbe for F {
    #[inline]
    fn input_pending(&mut self) -> bool {
        self()
    }
}

/// Polls the real terminal through crossterm without blocking.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone, Copy, Default)]
pub struct CrosstermProbe;

#[cfg(not(target_arch = "wasm32"))]
impl InputProbe for CrosstermProbe {
    fn input_pending(&mut self) -> bool {
        crossterm::event::poll(Duration::ZERO).unwrap_or(false)
    }
}

/// Update-batching state.
#[derive(Debug, Clone)]
pub struct UpdateScheduler {
    config: SchedulerConfig,
    complete: bool,
    force: bool,
    stopped: bool,
    pending: bool,
    skipped: u32,
    last_flush: Option<Instant>,
}

impl Default for UpdateScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl UpdateScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            complete: true,
            force: false,
            stopped: false,
            pending: false,
            skipped: 0,
            last_flush: None,
        }
    }

    #[inline]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Enter a multi-step draw; syncs are blocked until it finishes.
    pub fn start_update(&mut self) {
        self.complete = false;
    }

    pub fn finish_update(&mut self) {
        self.complete = true;
    }

    #[inline]
    pub fn is_update_complete(&self) -> bool {
        self.complete
    }

    /// Make the next decision run regardless of batching.
    pub fn force(&mut self) {
        self.force = true;
    }

    /// Raise the fence: no sync runs until [`start`](Self::start).
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    /// Lift the fence.
    pub fn start(&mut self) {
        self.stopped = false;
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// A sync was requested but has not run yet.
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    #[inline]
    pub fn skipped(&self) -> u32 {
        self.skipped
    }

    /// Decide whether a sync requested at `now` may run.
    ///
    /// A `Run` decision resets the deferral counter and records the
    /// flush time; the caller is expected to sync right away.
    pub fn decide(&mut self, input_pending: bool, now: Instant) -> SyncDecision {
        if self.stopped {
            self.pending = true;
            return SyncDecision::Blocked;
        }
        if self.force {
            return self.run(now);
        }
        if !self.complete {
            self.pending = true;
            return SyncDecision::Blocked;
        }
        let too_soon = self
            .last_flush
            .is_some_and(|last| now.saturating_duration_since(last) < self.config.min_flush_interval);
        if (input_pending || too_soon) && self.skipped < self.config.max_skipped_updates {
            self.skipped += 1;
            self.pending = true;
            vtstack_core::debug!(
                skipped = self.skipped,
                input_pending,
                too_soon,
                "terminal sync deferred"
            );
            return SyncDecision::Defer;
        }
        if self.skipped > 0 && (input_pending || too_soon) {
            vtstack_core::debug!(skipped = self.skipped, "terminal sync forced after deferrals");
        }
        self.run(now)
    }

    /// [`decide`](Self::decide) with the input state taken from a probe.
    pub fn poll(&mut self, probe: &mut impl InputProbe) -> SyncDecision {
        let input_pending = !self.stopped && probe.input_pending();
        self.decide(input_pending, Instant::now())
    }

    fn run(&mut self, now: Instant) -> SyncDecision {
        self.force = false;
        self.pending = false;
        self.skipped = 0;
        self.last_flush = Some(now);
        SyncDecision::Run
    }
}
