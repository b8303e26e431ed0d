//! Delayed and periodic task scheduler for the ircloop event loop.
//!
//! Tasks are kept in a min-heap keyed by their absolute fire time, ties
//! broken by insertion order so two tasks due at the same instant always
//! fire in the order they were scheduled.
//!
//! The scheduler never runs anything itself. The owner pulls due tasks
//! out with [`TaskScheduler::pop_due`], runs the payload, and hands the
//! task back with [`TaskScheduler::complete`]. Only then is a periodic
//! task re-armed, at `nominal fire time + interval`, so a slow callback
//! doesn't shift the cadence and an occurrence can never overlap the
//! previous one.
//!
//! # Integration
//!
//! The scheduler is designed to sit inside the engine's `tokio::select!`
//! loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         n = conn.recv(&mut buf) => { /* frame, parse, dispatch */ }
//!         () = scheduler.wait_due() => {
//!             while let Some(mut due) = scheduler.pop_due(Instant::now()) {
//!                 (due.payload)();
//!                 scheduler.complete(due);
//!             }
//!         }
//!     }
//! }
//! ```

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Identifiers and errors
// ---------------------------------------------------------------------------

/// Handle to a scheduled task, used to cancel or reschedule it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Errors returned by scheduling operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// A delay or interval of zero was given.
    #[error("task delay must be greater than zero")]
    ZeroDelay,

    /// The task already fired, was cancelled, or never existed.
    #[error("{0} is not scheduled")]
    UnknownTask(TaskId),
}

// ---------------------------------------------------------------------------
// Configuration and metrics
// ---------------------------------------------------------------------------

/// Scheduler settings.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// A task that fires later than this past its due time is logged at
    /// warn level and counted as late.
    pub late_threshold: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            late_threshold: Duration::from_millis(250),
        }
    }
}

/// Running counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerMetrics {
    /// Occurrences handed out by [`TaskScheduler::pop_due`].
    pub fired: u64,
    /// Tasks removed by cancellation or [`TaskScheduler::clear`].
    pub cancelled: u64,
    /// Occurrences that fired later than the late threshold.
    pub late: u64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

struct Entry<T> {
    payload: T,
    interval: Option<Duration>,
    /// Matches the heap entry that is currently live for this task.
    seq: u64,
}

/// Bookkeeping for the task whose payload is out being run.
struct InFlight {
    id: TaskId,
    cancelled: bool,
    rearm_at: Option<Instant>,
}

/// A task occurrence that is due, returned by [`TaskScheduler::pop_due`].
///
/// Hand it back with [`TaskScheduler::complete`] once the payload has run.
pub struct Due<T> {
    id: TaskId,
    /// The task's payload, typically a callback.
    pub payload: T,
    nominal: Instant,
    interval: Option<Duration>,
}

impl<T> Due<T> {
    /// The task this occurrence belongs to.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// When this occurrence was supposed to fire.
    pub fn nominal(&self) -> Instant {
        self.nominal
    }

    /// Whether the task repeats.
    pub fn is_periodic(&self) -> bool {
        self.interval.is_some()
    }
}

/// Time-ordered task queue, generic over the payload it carries.
pub struct TaskScheduler<T> {
    config: SchedulerConfig,
    tasks: HashMap<TaskId, Entry<T>>,
    /// `(deadline, seq, id)`. Entries whose `seq` no longer matches the
    /// task's are stale and skipped when popped.
    heap: BinaryHeap<Reverse<(Instant, u64, TaskId)>>,
    in_flight: Option<InFlight>,
    next_id: u64,
    next_seq: u64,
    metrics: SchedulerMetrics,
}

impl<T> Default for TaskScheduler<T> {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl<T> TaskScheduler<T> {
    /// Creates an empty scheduler.
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            tasks: HashMap::new(),
            heap: BinaryHeap::new(),
            in_flight: None,
            next_id: 1,
            next_seq: 0,
            metrics: SchedulerMetrics::default(),
        }
    }

    /// Schedules `payload` to fire once, `delay` from now.
    pub fn schedule(&mut self, delay: Duration, payload: T) -> Result<TaskId, SchedulerError> {
        self.insert(delay, None, payload)
    }

    /// Schedules `payload` to fire every `interval`, first after one
    /// interval.
    pub fn schedule_periodic(
        &mut self,
        interval: Duration,
        payload: T,
    ) -> Result<TaskId, SchedulerError> {
        self.insert(interval, Some(interval), payload)
    }

    fn insert(
        &mut self,
        delay: Duration,
        interval: Option<Duration>,
        payload: T,
    ) -> Result<TaskId, SchedulerError> {
        if delay.is_zero() {
            return Err(SchedulerError::ZeroDelay);
        }
        let id = TaskId(self.next_id);
        self.next_id += 1;
        let deadline = Instant::now() + delay;
        self.arm(id, deadline, interval, payload);
        debug!(%id, ?delay, periodic = interval.is_some(), "task scheduled");
        Ok(id)
    }

    fn arm(&mut self, id: TaskId, deadline: Instant, interval: Option<Duration>, payload: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse((deadline, seq, id)));
        self.tasks.insert(
            id,
            Entry {
                payload,
                interval,
                seq,
            },
        );
    }

    /// Cancels a task. Returns `false` if it was not scheduled.
    ///
    /// Calling this from inside the task's own payload stops a periodic
    /// task from being re-armed.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        if self.tasks.remove(&id).is_some() {
            self.metrics.cancelled += 1;
            debug!(%id, "task cancelled");
            return true;
        }
        match &mut self.in_flight {
            Some(running) if running.id == id && !running.cancelled => {
                running.cancelled = true;
                self.metrics.cancelled += 1;
                debug!(%id, "running task cancelled");
                true
            }
            _ => false,
        }
    }

    /// Moves a pending task to fire `delay` from now.
    ///
    /// For a periodic task the interval is unchanged; the cadence restarts
    /// from the new fire time.
    pub fn reschedule(&mut self, id: TaskId, delay: Duration) -> Result<(), SchedulerError> {
        if delay.is_zero() {
            return Err(SchedulerError::ZeroDelay);
        }
        let deadline = Instant::now() + delay;

        if let Some(entry) = self.tasks.remove(&id) {
            self.arm(id, deadline, entry.interval, entry.payload);
            debug!(%id, ?delay, "task rescheduled");
            return Ok(());
        }
        match &mut self.in_flight {
            Some(running) if running.id == id && !running.cancelled => {
                running.rearm_at = Some(deadline);
                debug!(%id, ?delay, "running task rescheduled");
                Ok(())
            }
            _ => Err(SchedulerError::UnknownTask(id)),
        }
    }

    /// Takes the earliest task that is due at `now`, if any.
    ///
    /// A one-shot task is gone from the scheduler once popped. A periodic
    /// task is re-armed by [`complete`](Self::complete).
    pub fn pop_due(&mut self, now: Instant) -> Option<Due<T>> {
        self.purge_stale();
        let Reverse((deadline, _, id)) = *self.heap.peek()?;
        if deadline > now {
            return None;
        }
        self.heap.pop();
        let entry = self.tasks.remove(&id)?;

        let late_by = now.saturating_duration_since(deadline);
        if late_by > self.config.late_threshold {
            self.metrics.late += 1;
            warn!(
                %id,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "task fired late"
            );
        }
        self.metrics.fired += 1;
        trace!(%id, "task due");

        self.in_flight = Some(InFlight {
            id,
            cancelled: false,
            rearm_at: None,
        });
        Some(Due {
            id,
            payload: entry.payload,
            nominal: deadline,
            interval: entry.interval,
        })
    }

    /// Returns a task after its payload ran, re-arming it if it repeats.
    pub fn complete(&mut self, due: Due<T>) {
        let running = self.in_flight.take();
        let (cancelled, rearm_at) = match running {
            Some(r) if r.id == due.id => (r.cancelled, r.rearm_at),
            _ => (false, None),
        };
        if cancelled {
            return;
        }
        let next = rearm_at.or_else(|| due.interval.map(|i| due.nominal + i));
        if let Some(deadline) = next {
            self.arm(due.id, deadline, due.interval, due.payload);
        }
    }

    /// The earliest pending fire time.
    pub fn next_deadline(&mut self) -> Option<Instant> {
        self.purge_stale();
        self.heap.peek().map(|Reverse((deadline, _, _))| *deadline)
    }

    /// Sleeps until the earliest pending task is due.
    ///
    /// With nothing scheduled this future pends forever, which lets it sit
    /// in a `tokio::select!` next to the socket without special-casing.
    pub async fn wait_due(&mut self) {
        match self.next_deadline() {
            Some(deadline) => time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    }

    /// Cancels everything, including a task that is currently running.
    pub fn clear(&mut self) {
        let mut dropped = self.tasks.len() as u64;
        if let Some(running) = &mut self.in_flight {
            if !running.cancelled {
                running.cancelled = true;
                dropped += 1;
            }
        }
        self.tasks.clear();
        self.heap.clear();
        self.metrics.cancelled += dropped;
        if dropped > 0 {
            debug!(count = dropped, "all tasks cancelled");
        }
    }

    /// Whether `id` is pending or currently running (and not cancelled).
    pub fn contains(&self, id: TaskId) -> bool {
        self.tasks.contains_key(&id)
            || self
                .in_flight
                .as_ref()
                .is_some_and(|r| r.id == id && !r.cancelled)
    }

    /// Number of pending tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no task is pending.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Snapshot of the counters.
    pub fn metrics(&self) -> &SchedulerMetrics {
        &self.metrics
    }

    fn purge_stale(&mut self) {
        while let Some(&Reverse((_, seq, id))) = self.heap.peek() {
            match self.tasks.get(&id) {
                Some(entry) if entry.seq == seq => break,
                _ => {
                    self.heap.pop();
                }
            }
        }
    }
}
