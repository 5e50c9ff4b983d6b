use crate::prelude::*;

use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelData {
    Shutdown,
}

/// Drives the coordinator at the configured poll interval.
///
/// The first tick fires straight away. Each refresh is awaited before the
/// next tick is taken and ticks missed meanwhile are dropped, so fetches
/// never pile up behind a slow inverter.
#[derive(Clone)]
pub struct Scheduler {
    config: config::Inverter,
    channels: Channels,
    coordinator: Coordinator,
}

impl Scheduler {
    pub fn new(config: config::Inverter, channels: Channels, coordinator: Coordinator) -> Self {
        Self {
            config,
            channels,
            coordinator,
        }
    }

    pub async fn start(&self) -> Result<()> {
        let mut receiver = self.channels.to_scheduler.subscribe();

        let mut interval = tokio::time::interval(self.config.poll_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "polling inverter {} every {}s",
            self.config.serial(),
            self.config.poll_interval().as_secs()
        );

        loop {
            tokio::select! {
                msg = receiver.recv() => {
                    match msg {
                        Ok(ChannelData::Shutdown) | Err(broadcast::error::RecvError::Closed) => {
                            info!("scheduler received shutdown signal");
                            break;
                        }
                        Err(e) => {
                            warn!("Error receiving from channel: {}", e);
                            continue;
                        }
                    }
                }
                _ = interval.tick() => {
                    if let Some(update) = self.coordinator.refresh().await {
                        trace!("refresh settled: {:?}", update.state);
                    }
                }
            }
        }

        Ok(())
    }

    pub fn stop(&self) {
        let _ = self.channels.to_scheduler.send(ChannelData::Shutdown);
    }
}
