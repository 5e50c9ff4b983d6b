use crate::prelude::*;

#[derive(Debug, Clone)]
pub struct Channels {
    pub from_coordinator: broadcast::Sender<coordinator::ChannelData>,
    pub to_mqtt: broadcast::Sender<mqtt::ChannelData>,
    pub to_scheduler: broadcast::Sender<crate::scheduler::ChannelData>,
}

impl Default for Channels {
    fn default() -> Self {
        Self::new()
    }
}

impl Channels {
    pub fn new() -> Self {
        Self {
            from_coordinator: Self::channel(),
            to_mqtt: Self::channel(),
            to_scheduler: Self::channel(),
        }
    }

    fn channel<T: Clone>() -> broadcast::Sender<T> {
        broadcast::channel(2048).0
    }
}
