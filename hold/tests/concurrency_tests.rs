use std::sync::Arc;
use std::time::Duration;

use common::time::{ManualClock, SystemClock};
use hold::broadcast::BroadcastHub;
use hold::{HoldConfig, HoldError, HoldManager, HoldStatus, RoomKey};
use tokio::sync::Barrier;
use tokio::task::JoinSet;

mod mock_broadcaster;
use mock_broadcaster::RecordingBroadcaster;

fn rooms(n: usize) -> Vec<RoomKey> {
    (0..n)
        .map(|i| RoomKey::derive(&format!("Mozilla/5.0 device-{i}")))
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn exactly_one_of_n_simultaneous_claims_wins() {
    let mgr = Arc::new(HoldManager::new(
        HoldConfig::default(),
        Arc::new(BroadcastHub::default()),
        Arc::new(SystemClock),
    ));

    let rooms = rooms(32);
    let barrier = Arc::new(Barrier::new(rooms.len()));
    let mut set = JoinSet::new();

    for room in rooms {
        let mgr = Arc::clone(&mgr);
        let barrier = Arc::clone(&barrier);
        set.spawn(async move {
            barrier.wait().await;
            mgr.claim("car-1", &room).await
        });
    }

    let mut wins = 0;
    let mut conflicts = 0;
    while let Some(res) = set.join_next().await {
        match res.expect("task panicked") {
            Ok(_) => wins += 1,
            Err(HoldError::Conflict { .. }) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(wins, 1);
    assert_eq!(conflicts, 31);
    assert_eq!(mgr.active_count().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn owners_never_overlap_under_churn() {
    let clock = Arc::new(ManualClock::new(0));
    let events = Arc::new(RecordingBroadcaster::default());
    let mgr = Arc::new(HoldManager::new(
        HoldConfig {
            hold_duration: Duration::from_millis(50),
            tombstone_retention: Duration::from_millis(10),
        },
        events.clone(),
        clock.clone(),
    ));

    let mut set = JoinSet::new();

    for room in rooms(8) {
        let mgr = Arc::clone(&mgr);
        set.spawn(async move {
            for _ in 0..200 {
                if mgr.claim("car-1", &room).await.is_ok() {
                    tokio::task::yield_now().await;
                    let _ = mgr.release("car-1", &room).await;
                }
            }
        });
    }

    {
        let mgr = Arc::clone(&mgr);
        let clock = Arc::clone(&clock);
        set.spawn(async move {
            for _ in 0..200 {
                clock.advance_ms(7);
                mgr.sweep_expired().await;
                tokio::task::yield_now().await;
            }
        });
    }

    while let Some(res) = set.join_next().await {
        res.expect("task panicked");
    }

    // replay the event log: an `active` for a new owner may only follow a
    // terminal event for the previous one
    let mut owner: Option<RoomKey> = None;
    for (room, event) in events.events.lock().iter() {
        match event.status {
            HoldStatus::Active => {
                if let Some(current) = &owner {
                    assert_eq!(current, room, "two rooms active at once");
                }
                owner = Some(room.clone());
            }
            HoldStatus::Released | HoldStatus::Expired => {
                assert_eq!(owner.as_ref(), Some(room));
                owner = None;
            }
            HoldStatus::Converted => unreachable!("nobody converts here"),
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn distinct_cars_are_claimed_in_parallel() {
    let mgr = Arc::new(HoldManager::new(
        HoldConfig::default(),
        Arc::new(BroadcastHub::default()),
        Arc::new(SystemClock),
    ));

    let mut set = JoinSet::new();
    for (i, room) in rooms(16).into_iter().enumerate() {
        let mgr = Arc::clone(&mgr);
        set.spawn(async move { mgr.claim(&format!("car-{i}"), &room).await });
    }

    while let Some(res) = set.join_next().await {
        res.expect("task panicked").expect("claim on a free car");
    }

    assert_eq!(mgr.active_count().await, 16);
}
