//! Integration tests for rebuild coordination.
//!
//! These cover the serialization guarantees: at most one cycle in flight,
//! and any burst of requests during a run collapses into exactly one
//! follow-up cycle.

use skiff_cli::dev::{RebuildCoordinator, RebuildState};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_change_runs_exactly_one_cycle() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let coordinator = RebuildCoordinator::new("wasm", move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    coordinator.request();
    sleep(Duration::from_millis(200)).await;

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(coordinator.state(), RebuildState::Idle);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn change_storm_during_run_causes_one_follow_up() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let coordinator = RebuildCoordinator::new("wasm", move || {
        counter.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(200));
    });

    coordinator.request();
    sleep(Duration::from_millis(50)).await;
    assert_eq!(coordinator.state(), RebuildState::Running);

    // Deliver many changes while the first cycle is still compiling.
    for _ in 0..100 {
        coordinator.request();
    }
    assert_eq!(coordinator.state(), RebuildState::RunningWithPending);

    sleep(Duration::from_millis(700)).await;

    // The storm is represented by exactly one extra cycle.
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(coordinator.state(), RebuildState::Idle);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_from_many_tasks_stay_serialized() {
    let running = Arc::new(AtomicUsize::new(0));
    let max_observed = Arc::new(AtomicUsize::new(0));

    let running_in = Arc::clone(&running);
    let max_in = Arc::clone(&max_observed);
    let coordinator = RebuildCoordinator::new("wasm", move || {
        let now = running_in.fetch_add(1, Ordering::SeqCst) + 1;
        max_in.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(50));
        running_in.fetch_sub(1, Ordering::SeqCst);
    });

    let mut handles = Vec::new();
    for _ in 0..8 {
        let coordinator = Arc::clone(&coordinator);
        handles.push(tokio::spawn(async move {
            for _ in 0..5 {
                coordinator.request();
                sleep(Duration::from_millis(10)).await;
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    sleep(Duration::from_millis(500)).await;

    // Never more than one cycle in flight, no matter how requests raced.
    assert_eq!(max_observed.load(Ordering::SeqCst), 1);
    assert_eq!(coordinator.state(), RebuildState::Idle);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failed_cycle_leaves_coordinator_usable() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let coordinator = RebuildCoordinator::new("wasm", move || {
        counter.fetch_add(1, Ordering::SeqCst);
        // A failed cycle reports its own error and simply returns.
    });

    coordinator.request();
    sleep(Duration::from_millis(100)).await;
    assert_eq!(coordinator.state(), RebuildState::Idle);

    coordinator.request();
    sleep(Duration::from_millis(100)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rebuild_and_recook_coordinators_run_concurrently() {
    let rebuild_running = Arc::new(AtomicUsize::new(0));
    let overlap_seen = Arc::new(AtomicUsize::new(0));

    let flag = Arc::clone(&rebuild_running);
    let rebuild = RebuildCoordinator::new("rebuild", move || {
        flag.store(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(300));
        flag.store(0, Ordering::SeqCst);
    });

    let flag = Arc::clone(&rebuild_running);
    let seen = Arc::clone(&overlap_seen);
    let recook = RebuildCoordinator::new("recook", move || {
        if flag.load(Ordering::SeqCst) == 1 {
            seen.store(1, Ordering::SeqCst);
        }
    });

    rebuild.request();
    sleep(Duration::from_millis(100)).await;
    recook.request();
    sleep(Duration::from_millis(400)).await;

    // The recook cycle ran while the rebuild cycle was still in flight.
    assert_eq!(overlap_seen.load(Ordering::SeqCst), 1);
}
