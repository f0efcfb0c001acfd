use std::sync::Arc;
use std::time::Duration;

use common::time::ManualClock;
use hold::broadcast::BroadcastHub;
use hold::sweeper::spawn_expiry_sweeper;
use hold::{HoldConfig, HoldManager, HoldStatus, RoomKey};

#[tokio::test(start_paused = true)]
async fn sweeper_broadcasts_expiry_to_every_tab() -> anyhow::Result<()> {
    let clock = Arc::new(ManualClock::new(0));
    let hub = Arc::new(BroadcastHub::new(16));
    let mgr = Arc::new(HoldManager::new(
        HoldConfig {
            hold_duration: Duration::from_secs(600),
            tombstone_retention: Duration::from_secs(60),
        },
        hub.clone(),
        clock.clone(),
    ));

    let room = RoomKey::derive("Mozilla/5.0 (tablet)");
    let mut tab1 = hub.subscribe(&room);
    let mut tab2 = hub.subscribe(&room);

    mgr.claim("car-7", &room).await?;
    assert_eq!(tab1.recv().await?.status, HoldStatus::Active);
    assert_eq!(tab2.recv().await?.status, HoldStatus::Active);

    clock.advance_ms(600_000);
    let handle = spawn_expiry_sweeper(mgr.clone(), Duration::from_millis(250));

    let ev1 = tokio::time::timeout(Duration::from_secs(5), tab1.recv()).await??;
    let ev2 = tokio::time::timeout(Duration::from_secs(5), tab2.recv()).await??;

    assert_eq!(ev1.status, HoldStatus::Expired);
    assert_eq!(ev1.car_id, "car-7");
    assert_eq!(ev1.expires_at_ms, None);
    assert_eq!(ev2, ev1);

    handle.abort();
    Ok(())
}
