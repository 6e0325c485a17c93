//! Delayed-action scheduling under paused tokio time.
//!
//! With `start_paused`, the runtime clock only moves when every task is
//! blocked on a timer or when the test calls `tokio::time::advance`, so these
//! run instantly and deterministically.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use umesh_node::timer::{DelayedScheduler, MeshTimer};

fn counter() -> (Arc<AtomicU32>, impl Fn() -> u32) {
    let count = Arc::new(AtomicU32::new(0));
    let read = {
        let count = Arc::clone(&count);
        move || count.load(Ordering::SeqCst)
    };
    (count, read)
}

async fn settle() {
    // let woken timer tasks run
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn posted_action_runs_after_delay() {
    let mut scheduler = DelayedScheduler::new();
    let (count, fired) = counter();

    scheduler.post_delayed(1000, move || {
        count.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(scheduler.pending(), 1);
    // the task arms its sleep on first poll
    settle().await;

    tokio::time::advance(Duration::from_millis(999)).await;
    settle().await;
    assert_eq!(fired(), 0);

    tokio::time::advance(Duration::from_millis(1)).await;
    settle().await;
    assert_eq!(fired(), 1);
    assert_eq!(scheduler.pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancelled_action_never_runs() {
    let mut scheduler = DelayedScheduler::new();
    let (count, fired) = counter();

    let handle = scheduler.post_delayed(500, move || {
        count.fetch_add(1, Ordering::SeqCst);
    });
    assert!(scheduler.cancel_delayed(handle));
    assert!(!scheduler.cancel_delayed(handle));

    tokio::time::advance(Duration::from_secs(5)).await;
    settle().await;
    assert_eq!(fired(), 0);
}

#[tokio::test(start_paused = true)]
async fn restarting_timer_replaces_pending_action() {
    let mut scheduler = DelayedScheduler::new();
    let mut timer = MeshTimer::new();
    let (count, fired) = counter();

    let first = Arc::clone(&count);
    timer.start(&mut scheduler, 100, move || {
        first.fetch_add(1, Ordering::SeqCst);
    });
    let second = Arc::clone(&count);
    timer.start(&mut scheduler, 300, move || {
        second.fetch_add(10, Ordering::SeqCst);
    });
    assert!(timer.is_armed());
    settle().await;

    tokio::time::advance(Duration::from_millis(200)).await;
    settle().await;
    assert_eq!(fired(), 0, "first action was replaced");

    tokio::time::advance(Duration::from_millis(100)).await;
    settle().await;
    assert_eq!(fired(), 10);
}

#[tokio::test(start_paused = true)]
async fn stopped_timer_does_not_fire() {
    let mut scheduler = DelayedScheduler::new();
    let mut timer = MeshTimer::new();
    let (count, fired) = counter();

    timer.start(&mut scheduler, 100, move || {
        count.fetch_add(1, Ordering::SeqCst);
    });
    timer.stop(&mut scheduler);
    assert!(!timer.is_armed());

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(fired(), 0);
}
