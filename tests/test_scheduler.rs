mod common;
use common::*;
use trannergy_bridge::prelude::*;
use trannergy_bridge::scheduler::Scheduler;
use trannergy_bridge::store::MemoryStore;

use std::sync::Arc;
use std::time::Duration;

fn replies(n: usize) -> Vec<Result<Vec<u8>>> {
    (0..n).map(|_| Ok(Factory::reply())).collect()
}

#[tokio::test(start_paused = true)]
async fn polls_at_interval_without_overlap() -> Result<()> {
    common_setup();

    // 45s fetches against the default 30s poll interval
    let inverter = Arc::new(ScriptedInverter::slow(replies(10), Duration::from_secs(45)));
    let channels = Channels::new();
    let coordinator = Coordinator::new(
        inverter.clone(),
        Arc::new(MemoryStore::new()),
        channels.clone(),
        150.0,
    );

    let config = Factory::config();
    assert_eq!(config.inverter.poll_interval(), Duration::from_secs(30));

    let scheduler = Scheduler::new(config.inverter, channels, coordinator.clone());
    let start = tokio::time::Instant::now();

    let runner = scheduler.clone();
    let handle = tokio::spawn(async move { runner.start().await });

    tokio::time::sleep(Duration::from_secs(200)).await;
    scheduler.stop();
    tokio::time::timeout(Duration::from_secs(120), handle).await???;

    let started = inverter.started();

    // first refresh straight away
    assert_eq!(started[0] - start, Duration::ZERO);

    // each fetch waits for the previous one to finish
    for pair in started.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_secs(45));
    }
    // 0, 45, 90, 135, 180 and possibly one more before the stop is seen
    assert!((5..=6).contains(&started.len()), "{}", started.len());

    let stats = coordinator.stats.lock().unwrap();
    assert_eq!(stats.skipped, 0);
    assert_eq!(stats.online as usize, started.len());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn ticks_every_poll_interval() -> Result<()> {
    let inverter = Arc::new(ScriptedInverter::new(replies(10)));
    let channels = Channels::new();
    let coordinator = Coordinator::new(
        inverter.clone(),
        Arc::new(MemoryStore::new()),
        channels.clone(),
        150.0,
    );

    let scheduler = Scheduler::new(Factory::config().inverter, channels, coordinator);
    let start = tokio::time::Instant::now();

    let runner = scheduler.clone();
    let handle = tokio::spawn(async move { runner.start().await });

    tokio::time::sleep(Duration::from_secs(95)).await;
    scheduler.stop();
    tokio::time::timeout(Duration::from_secs(1), handle).await???;

    let offsets: Vec<_> = inverter.started().iter().map(|t| *t - start).collect();
    assert_eq!(
        offsets,
        vec![
            Duration::ZERO,
            Duration::from_secs(30),
            Duration::from_secs(60),
            Duration::from_secs(90)
        ]
    );

    Ok(())
}

#[tokio::test]
async fn stop_ends_start() -> Result<()> {
    let channels = Channels::new();
    let coordinator = Coordinator::new(
        Arc::new(ScriptedInverter::new(replies(1))),
        Arc::new(MemoryStore::new()),
        channels.clone(),
        150.0,
    );

    let scheduler = Scheduler::new(Factory::config().inverter, channels, coordinator);

    let runner = scheduler.clone();
    let handle = tokio::spawn(async move { runner.start().await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    scheduler.stop();

    tokio::time::timeout(Duration::from_secs(1), handle).await???;

    Ok(())
}
