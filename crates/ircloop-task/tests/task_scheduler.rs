//! Integration tests for the task scheduler.
//!
//! Every test runs on a paused Tokio clock, so `advance` moves time
//! deterministically and `sleep_until` resolves as soon as the clock
//! reaches the deadline.

use std::time::Duration;

use ircloop_task::{SchedulerConfig, SchedulerError, TaskScheduler};
use tokio::time::{self, Instant};

// =========================================================================
// Helpers
// =========================================================================

/// Fires everything due right now, running each payload through `run`.
fn fire_due<T>(s: &mut TaskScheduler<T>, mut run: impl FnMut(&mut TaskScheduler<T>, &T)) -> usize {
    let mut fired = 0;
    while let Some(due) = s.pop_due(Instant::now()) {
        run(s, &due.payload);
        s.complete(due);
        fired += 1;
    }
    fired
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

// =========================================================================
// Scheduling
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_one_shot_fires_once_after_delay() {
    let mut s = TaskScheduler::default();
    let id = s.schedule(ms(100), "hello").unwrap();
    assert!(s.contains(id));

    time::advance(ms(99)).await;
    assert!(s.pop_due(Instant::now()).is_none());

    time::advance(ms(1)).await;
    let due = s.pop_due(Instant::now()).expect("task should be due");
    assert_eq!(due.id(), id);
    assert_eq!(due.payload, "hello");
    assert!(!due.is_periodic());
    s.complete(due);

    assert!(!s.contains(id));
    assert!(s.is_empty());
    time::advance(ms(1000)).await;
    assert!(s.pop_due(Instant::now()).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_due_tasks_fire_in_time_order_then_insertion_order() {
    let mut s = TaskScheduler::default();
    s.schedule(ms(30), "c").unwrap();
    s.schedule(ms(10), "a").unwrap();
    s.schedule(ms(20), "b1").unwrap();
    s.schedule(ms(20), "b2").unwrap();

    time::advance(ms(50)).await;
    let mut order = Vec::new();
    fire_due(&mut s, |_, p| order.push(*p));
    assert_eq!(order, vec!["a", "b1", "b2", "c"]);
}

#[tokio::test(start_paused = true)]
async fn test_zero_delay_is_rejected() {
    let mut s = TaskScheduler::default();
    assert_eq!(s.schedule(Duration::ZERO, ()), Err(SchedulerError::ZeroDelay));
    assert_eq!(
        s.schedule_periodic(Duration::ZERO, ()),
        Err(SchedulerError::ZeroDelay)
    );
    assert!(s.is_empty());
}

// =========================================================================
// Periodic tasks
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_periodic_fires_n_times_in_n_intervals() {
    let mut s = TaskScheduler::default();
    s.schedule_periodic(ms(100), ()).unwrap();

    let mut count = 0;
    for _ in 0..5 {
        s.wait_due().await;
        count += fire_due(&mut s, |_, _| {});
    }
    assert_eq!(count, 5);
    assert_eq!(s.metrics().fired, 5);
    assert_eq!(s.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_periodic_cadence_uses_nominal_time() {
    let mut s = TaskScheduler::default();
    let start = Instant::now();
    s.schedule_periodic(ms(100), ()).unwrap();

    // Fire the first occurrence 40ms late.
    time::advance(ms(140)).await;
    assert_eq!(fire_due(&mut s, |_, _| {}), 1);

    // Next occurrence is at 200ms, not 240ms.
    assert_eq!(s.next_deadline(), Some(start + ms(200)));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_inside_own_callback_stops_periodic() {
    let mut s = TaskScheduler::default();
    let id = s.schedule_periodic(ms(50), ()).unwrap();

    let mut fired = 0;
    for _ in 0..2 {
        s.wait_due().await;
        fire_due(&mut s, |s, _| {
            fired += 1;
            if fired == 2 {
                assert!(s.cancel(id));
            }
        });
    }
    assert_eq!(fired, 2);
    assert!(s.is_empty());
    assert!(s.next_deadline().is_none());

    time::advance(ms(500)).await;
    assert_eq!(fire_due(&mut s, |_, _| {}), 0);
    assert_eq!(s.metrics().cancelled, 1);
}

// =========================================================================
// Cancel and reschedule
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_cancel_is_idempotent() {
    let mut s = TaskScheduler::default();
    let id = s.schedule(ms(10), ()).unwrap();
    assert!(s.cancel(id));
    assert!(!s.cancel(id));
    assert_eq!(s.metrics().cancelled, 1);

    time::advance(ms(20)).await;
    assert!(s.pop_due(Instant::now()).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_after_fire_is_noop() {
    let mut s = TaskScheduler::default();
    let id = s.schedule(ms(10), ()).unwrap();
    time::advance(ms(10)).await;
    assert_eq!(fire_due(&mut s, |_, _| {}), 1);
    assert!(!s.cancel(id));
}

#[tokio::test(start_paused = true)]
async fn test_reschedule_moves_pending_task() {
    let mut s = TaskScheduler::default();
    let id = s.schedule(ms(100), ()).unwrap();

    time::advance(ms(50)).await;
    s.reschedule(id, ms(200)).unwrap();

    time::advance(ms(100)).await;
    assert_eq!(fire_due(&mut s, |_, _| {}), 0);

    time::advance(ms(100)).await;
    assert_eq!(fire_due(&mut s, |_, _| {}), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reschedule_unknown_or_zero() {
    let mut s = TaskScheduler::default();
    let id = s.schedule(ms(10), ()).unwrap();
    assert_eq!(s.reschedule(id, Duration::ZERO), Err(SchedulerError::ZeroDelay));

    s.cancel(id);
    assert_eq!(
        s.reschedule(id, ms(10)),
        Err(SchedulerError::UnknownTask(id))
    );
}

#[tokio::test(start_paused = true)]
async fn test_clear_drops_everything() {
    let mut s = TaskScheduler::default();
    s.schedule(ms(10), ()).unwrap();
    s.schedule_periodic(ms(20), ()).unwrap();
    s.clear();
    assert!(s.is_empty());
    assert_eq!(s.metrics().cancelled, 2);

    time::advance(ms(100)).await;
    assert_eq!(fire_due(&mut s, |_, _| {}), 0);
}

// =========================================================================
// Waiting and metrics
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_wait_due_pends_when_empty() {
    let mut s: TaskScheduler<()> = TaskScheduler::default();
    let waited = time::timeout(ms(1000), s.wait_due()).await;
    assert!(waited.is_err(), "wait_due should never resolve when empty");
}

#[tokio::test(start_paused = true)]
async fn test_wait_due_resolves_at_deadline() {
    let mut s = TaskScheduler::default();
    let start = Instant::now();
    s.schedule(ms(250), ()).unwrap();
    s.wait_due().await;
    let elapsed = Instant::now() - start;
    assert!(elapsed >= ms(250) && elapsed < ms(252), "woke after {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_late_firing_is_counted() {
    let mut s = TaskScheduler::new(SchedulerConfig {
        late_threshold: ms(50),
    });
    s.schedule(ms(10), ()).unwrap();
    s.schedule(ms(100), ()).unwrap();

    time::advance(ms(100)).await;
    assert_eq!(fire_due(&mut s, |_, _| {}), 2);
    // The first task was 90ms late, the second exactly on time.
    assert_eq!(s.metrics().late, 1);
    assert_eq!(s.metrics().fired, 2);
}
