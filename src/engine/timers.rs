//! # Periodic publication timers.
//!
//! [`EngineTimers`] drives the engine's well-known timer topics. Each
//! distinct interval owns one background task publishing a tick per period:
//!
//! - `1 s` → `EventEngine.Internal.Timer.Second`, aligned to the start of
//!   each wall-clock second; ticks carry a `timestamp` named argument.
//! - `60 s` → `EventEngine.Internal.Timer.Minute`, aligned to the start of
//!   each minute; ticks carry `timestamp`.
//! - anything else → `EventEngine.Internal.Timer.<seconds>`; ticks carry
//!   `interval` and `trigger_time`.
//!
//! ## Rules
//! - One task per interval: a repeated `get_timer` returns the existing
//!   topic and ignores `activate_at` (debug-logged).
//! - Ticks publish non-blocking; a full queue drops the tick with a
//!   warning rather than stalling the clock.
//! - Aligned timers recompute each deadline from the wall clock, so they
//!   do not drift; interval timers advance a monotonic deadline.

use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::engine::core::Shared;
use crate::payload::EventArgs;
use crate::topics::Topic;

/// Topic of the second-aligned timer.
pub const TIMER_SECOND_TOPIC: &str = "EventEngine.Internal.Timer.Second";
/// Topic of the minute-aligned timer.
pub const TIMER_MINUTE_TOPIC: &str = "EventEngine.Internal.Timer.Minute";
/// Prefix of free-interval timer topics.
pub const TIMER_TOPIC_PREFIX: &str = "EventEngine.Internal.Timer";

struct TimerEntry {
    topic: Arc<Topic>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Registry of running timer tasks, one per interval.
pub struct EngineTimers {
    engine: Weak<Shared>,
    entries: DashMap<Duration, TimerEntry>,
}

impl EngineTimers {
    pub(crate) fn new(engine: Weak<Shared>) -> Self {
        Self {
            engine,
            entries: DashMap::new(),
        }
    }

    /// Number of running timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no timers run.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a timer runs for the interval.
    #[must_use]
    pub fn contains(&self, interval: Duration) -> bool {
        self.entries.contains_key(&interval)
    }

    /// Topics of the running timers, in no particular order.
    #[must_use]
    pub fn topics(&self) -> Vec<Arc<Topic>> {
        self.entries
            .iter()
            .map(|entry| Arc::clone(&entry.topic))
            .collect()
    }

    /// Returns the interval's topic, spawning its task on first use.
    pub(crate) fn get_or_spawn(
        &self,
        interval: Duration,
        activate_at: Option<SystemTime>,
    ) -> Arc<Topic> {
        let interval = if interval.is_zero() {
            warn!("zero timer interval clamped to 1ms");
            Duration::from_millis(1)
        } else {
            interval
        };

        if let Some(entry) = self.entries.get(&interval) {
            if activate_at.is_some() {
                debug!(
                    topic = entry.topic.literal(),
                    "timer already running; activate_at ignored",
                );
            }
            return Arc::clone(&entry.topic);
        }

        let entry = self.entries.entry(interval).or_insert_with(|| {
            let topic = Arc::new(timer_topic(interval));
            let cancel = CancellationToken::new();
            let handle = spawn_timer(
                self.engine.clone(),
                cancel.clone(),
                Arc::clone(&topic),
                interval,
                activate_at,
            );
            TimerEntry {
                topic,
                cancel,
                handle,
            }
        });
        Arc::clone(&entry.topic)
    }

    /// Cancels all timer tasks and joins them.
    pub(crate) async fn stop(&self) {
        let intervals: Vec<Duration> = self.entries.iter().map(|e| *e.key()).collect();
        for interval in intervals {
            if let Some((_, entry)) = self.entries.remove(&interval) {
                entry.cancel.cancel();
                let _ = entry.handle.await;
            }
        }
    }

    /// Cancels and detaches all timer tasks without joining (sync paths).
    pub(crate) fn abort_all(&self) {
        let intervals: Vec<Duration> = self.entries.iter().map(|e| *e.key()).collect();
        for interval in intervals {
            if let Some((_, entry)) = self.entries.remove(&interval) {
                entry.cancel.cancel();
                entry.handle.abort();
            }
        }
    }
}

/// Builds the well-known topic for an interval.
fn timer_topic(interval: Duration) -> Topic {
    let literal = if interval == Duration::from_secs(1) {
        TIMER_SECOND_TOPIC.to_owned()
    } else if interval == Duration::from_secs(60) {
        TIMER_MINUTE_TOPIC.to_owned()
    } else {
        format!("{TIMER_TOPIC_PREFIX}.{}", interval_label(interval))
    };
    Topic::parse(&literal).expect("timer topics are well-formed")
}

/// Seconds as a plain decimal: `5`, `0.5`, `0.1`.
fn interval_label(interval: Duration) -> String {
    let secs = interval.as_secs_f64();
    if secs.fract() == 0.0 {
        format!("{}", secs as u64)
    } else {
        format!("{secs}")
    }
}

fn spawn_timer(
    engine: Weak<Shared>,
    cancel: CancellationToken,
    topic: Arc<Topic>,
    interval: Duration,
    activate_at: Option<SystemTime>,
) -> JoinHandle<()> {
    if interval == Duration::from_secs(1) || interval == Duration::from_secs(60) {
        tokio::spawn(run_aligned(engine, cancel, topic, interval.as_secs()))
    } else {
        tokio::spawn(run_interval(engine, cancel, topic, interval, activate_at))
    }
}

/// Ticks at `floor(now / period) + period` wall-clock boundaries.
async fn run_aligned(
    engine: Weak<Shared>,
    cancel: CancellationToken,
    topic: Arc<Topic>,
    period_secs: u64,
) {
    let period = period_secs as f64;
    loop {
        let now = unix_now();
        let tick_at = (now / period).floor() * period + period;
        let delay = Duration::from_secs_f64((tick_at - now).max(0.0));

        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }

        let Some(shared) = engine.upgrade() else { break };
        shared.publish_tick(&topic, EventArgs::new().named("timestamp", tick_at));
    }
}

/// Ticks every `interval`, first at `activate_at` (or one interval from
/// now), advancing a monotonic deadline.
async fn run_interval(
    engine: Weak<Shared>,
    cancel: CancellationToken,
    topic: Arc<Topic>,
    interval: Duration,
    activate_at: Option<SystemTime>,
) {
    let first_delay = activate_at
        .and_then(|at| at.duration_since(SystemTime::now()).ok())
        .unwrap_or(interval);
    let mut deadline = tokio::time::Instant::now() + first_delay;

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep_until(deadline) => {}
        }

        let Some(shared) = engine.upgrade() else { break };
        shared.publish_tick(
            &topic,
            EventArgs::new()
                .named("interval", interval.as_secs_f64())
                .named("trigger_time", unix_now()),
        );
        deadline += interval;
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
