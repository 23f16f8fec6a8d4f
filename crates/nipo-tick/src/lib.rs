//! Fixed-cadence refresh scheduler for Nipo displays.
//!
//! A classroom display re-reads its session on a slow interval (seconds, not
//! milliseconds) so that an invalidation or reissue made elsewhere shows up
//! without anyone touching the projector. This crate owns only the timing:
//! when the next refresh is due, what to do after a slow redraw, and
//! pause/resume.
//!
//! # Manual mode
//!
//! When `interval_ms` is 0 the scheduler is manual: [`RefreshScheduler::wait_for_refresh`]
//! pends forever and redraws happen only when the owner is nudged.
//!
//! # Integration
//!
//! The scheduler sits inside a refresh task's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         _ = cancel.cancelled() => break,
//!         Some(cmd) = cmd_rx.recv() => { /* refresh_now, pause, resume */ }
//!         info = scheduler.wait_for_refresh() => {
//!             redraw().await;
//!             scheduler.record_refresh_end();
//!         }
//!     }
//! }
//! ```

use std::time::{Duration, Instant};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when a refresh wakes up late (slow store, busy runtime).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPolicy {
    /// Forget the missed slots and schedule from now.
    #[default]
    Skip,
    /// Keep the original grid. The next refresh fires at its planned time
    /// even if that is sooner than a full interval away.
    FixedCadence,
}

/// Configuration for the refresh scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Interval between refreshes in milliseconds. 0 = manual only.
    pub interval_ms: u64,
    pub policy: RefreshPolicy,
    /// Fraction of the interval (0.0–1.0) a redraw may take before a
    /// warning is logged.
    pub budget_warn_threshold: f64,
    pub metrics_enabled: bool,
    /// Random jitter (0–max ms) added to the first refresh so that many
    /// displays opened together do not poll the store in lockstep.
    pub initial_jitter_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5_000,
            policy: RefreshPolicy::default(),
            budget_warn_threshold: 0.5,
            metrics_enabled: true,
            initial_jitter_ms: 250,
        }
    }
}

impl RefreshConfig {
    /// Shortest non-manual interval. Anything faster hammers the store for
    /// no visible benefit.
    pub const MIN_INTERVAL_MS: u64 = 250;

    pub fn every(interval: Duration) -> Self {
        Self {
            interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            ..Default::default()
        }
    }

    pub fn manual() -> Self {
        Self {
            interval_ms: 0,
            ..Default::default()
        }
    }

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called by [`RefreshScheduler::new`]. Rules:
    /// - a non-zero `interval_ms` is raised to at least [`Self::MIN_INTERVAL_MS`]
    /// - `budget_warn_threshold` clamped to `0.0..=1.0`
    /// - `initial_jitter_ms` capped at one interval
    pub fn validated(mut self) -> Self {
        if self.interval_ms != 0 && self.interval_ms < Self::MIN_INTERVAL_MS {
            warn!(
                interval_ms = self.interval_ms,
                min = Self::MIN_INTERVAL_MS,
                "refresh interval below minimum, clamping"
            );
            self.interval_ms = Self::MIN_INTERVAL_MS;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        if self.interval_ms != 0 {
            self.initial_jitter_ms = self.initial_jitter_ms.min(self.interval_ms);
        }
        self
    }

    /// Duration of one interval, or `None` in manual mode.
    pub fn interval(&self) -> Option<Duration> {
        (self.interval_ms != 0).then(|| Duration::from_millis(self.interval_ms))
    }
}

// ---------------------------------------------------------------------------
// Refresh info
// ---------------------------------------------------------------------------

/// Returned by [`RefreshScheduler::wait_for_refresh`].
#[derive(Debug, Clone)]
pub struct RefreshInfo {
    /// Monotonically increasing, starting at 1.
    pub refresh: u64,
    /// `true` if the scheduler woke up more than 10% of an interval late.
    pub late: bool,
    /// Whole intervals missed because of lateness.
    pub missed: u64,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Runtime metrics, updated after each refresh.
#[derive(Debug, Clone, Default)]
pub struct RefreshMetrics {
    pub total_refreshes: u64,
    pub total_late: u64,
    pub total_missed: u64,
    /// Exponential moving average of redraw time (α = 0.1).
    pub avg_redraw_time: Duration,
    pub max_redraw_time: Duration,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-cadence refresh scheduler. One per refresh task.
pub struct RefreshScheduler {
    config: RefreshConfig,
    interval: Option<Duration>,
    refresh_count: u64,
    next_refresh: Option<TokioInstant>,
    /// Set by `wait_for_refresh`, consumed by `record_refresh_end`.
    redraw_start: Option<Instant>,
    paused: bool,
    metrics: RefreshMetrics,
}

impl RefreshScheduler {
    pub fn new(config: RefreshConfig) -> Self {
        let config = config.validated();
        let interval = config.interval();

        let next_refresh = interval.map(|d| {
            let jitter = if config.initial_jitter_ms > 0 {
                let ms = rand::rng().random_range(0..config.initial_jitter_ms);
                Duration::from_millis(ms)
            } else {
                Duration::ZERO
            };
            TokioInstant::now() + d + jitter
        });

        match interval {
            None => debug!("refresh scheduler created in manual mode"),
            Some(d) => debug!(
                interval_ms = d.as_millis() as u64,
                policy = ?config.policy,
                "refresh scheduler created"
            ),
        }

        Self {
            config,
            interval,
            refresh_count: 0,
            next_refresh,
            redraw_start: None,
            paused: false,
            metrics: RefreshMetrics::default(),
        }
    }

    pub fn every(interval: Duration) -> Self {
        Self::new(RefreshConfig::every(interval))
    }

    /// Waits until the next refresh is due.
    ///
    /// Pends forever in manual mode or while paused; other `select!`
    /// branches keep running.
    pub async fn wait_for_refresh(&mut self) -> RefreshInfo {
        let (next, interval) = match (self.next_refresh, self.interval) {
            (Some(next), Some(interval)) if !self.paused => (next, interval),
            _ => return std::future::pending().await,
        };

        time::sleep_until(next).await;

        let now = TokioInstant::now();
        self.refresh_count += 1;
        self.redraw_start = Some(Instant::now());

        let late_by = now.saturating_duration_since(next);
        let late = late_by > interval / 10;
        let missed = if late {
            (late_by.as_nanos() / interval.as_nanos()) as u64
        } else {
            0
        };

        self.next_refresh = Some(match self.config.policy {
            RefreshPolicy::Skip => {
                if missed > 0 {
                    warn!(
                        refresh = self.refresh_count,
                        missed,
                        late_ms = late_by.as_millis() as u64,
                        "refresh late, skipping ahead"
                    );
                }
                now + interval
            }
            RefreshPolicy::FixedCadence => {
                // Step past every slot already in the past.
                let slots = u32::try_from(missed + 1).unwrap_or(u32::MAX);
                next + interval.saturating_mul(slots)
            }
        });

        if late {
            self.metrics.total_late += 1;
        }
        self.metrics.total_missed += missed;
        self.metrics.total_refreshes += 1;

        trace!(refresh = self.refresh_count, late, "refresh due");

        RefreshInfo {
            refresh: self.refresh_count,
            late,
            missed,
        }
    }

    /// Marks the redraw for the current refresh as finished.
    ///
    /// Without this call no budget warnings or redraw timings are recorded.
    pub fn record_refresh_end(&mut self) {
        let Some(start) = self.redraw_start.take() else {
            return;
        };
        let elapsed = start.elapsed();

        if let Some(interval) = self.interval {
            let utilization = elapsed.as_secs_f64() / interval.as_secs_f64();
            if utilization >= self.config.budget_warn_threshold {
                warn!(
                    refresh = self.refresh_count,
                    elapsed_ms = elapsed.as_millis() as u64,
                    interval_ms = interval.as_millis() as u64,
                    "redraw is taking a large share of the refresh interval"
                );
            }
        }

        if self.config.metrics_enabled {
            if elapsed > self.metrics.max_redraw_time {
                self.metrics.max_redraw_time = elapsed;
            }
            let alpha = 0.1;
            let prev = self.metrics.avg_redraw_time.as_secs_f64();
            let curr = elapsed.as_secs_f64();
            self.metrics.avg_redraw_time =
                Duration::from_secs_f64(prev * (1.0 - alpha) + curr * alpha);
        }
    }

    /// Pushes the next scheduled refresh a full interval out.
    ///
    /// Used after an out-of-band redraw so the periodic one does not follow
    /// right behind it.
    pub fn reset(&mut self) {
        if let Some(interval) = self.interval {
            self.next_refresh = Some(TokioInstant::now() + interval);
        }
    }

    /// Idempotent.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(refresh = self.refresh_count, "refresh scheduler paused");
        }
    }

    /// Resumes after a pause. The next refresh is one full interval from
    /// now, so time spent paused never produces a burst.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            self.reset();
            debug!(refresh = self.refresh_count, "refresh scheduler resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_manual(&self) -> bool {
        self.interval.is_none()
    }

    pub fn refresh_count(&self) -> u64 {
        self.refresh_count
    }

    pub fn metrics(&self) -> &RefreshMetrics {
        &self.metrics
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }
}
