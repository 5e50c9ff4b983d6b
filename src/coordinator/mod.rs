use crate::prelude::*;
use crate::trannergy::inverter::Fetch;
use crate::trannergy::packet::Parser;

use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub enum ChannelData {
    Update(Box<Update>),
    Shutdown,
}

pub type Sender = broadcast::Sender<ChannelData>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateState {
    Idle,
    Fetching,
    SettledOnline,
    SettledOffline,
    Failed,
}

/// What consumers get after every refresh.
#[derive(Clone, Debug, PartialEq)]
pub struct Update {
    /// Latest data; on a failed refresh this is whatever we had before.
    pub snapshot: Option<Snapshot>,
    /// Highest lifetime counter values seen so far.
    pub preserved: PreservedCounters,
    pub online: bool,
    pub last_update_success: bool,
    /// The state the refresh settled in.
    pub state: UpdateState,
}

impl Update {
    /// The value to show for a lifetime counter: never zero, and never
    /// below what was seen before, even if the inverter reports less.
    pub fn counter(&self, key: FieldKey) -> Option<f64> {
        let reported = self.snapshot.as_ref().and_then(|s| s.numeric(key));
        let known = self.preserved.get(key);

        match (reported, known) {
            (Some(r), Some(k)) => Some(r.max(k)),
            (r, k) => r.or(k),
        }
        .filter(|v| *v > 0.0)
    }
}

#[derive(Default)]
pub struct RefreshStats {
    pub refreshes: u64,
    pub online: u64,
    pub offline: u64,
    pub failed: u64,
    pub skipped: u64,
    pub counter_saves: u64,
    pub counter_save_errors: u64,
}

impl RefreshStats {
    pub fn print_summary(&self) {
        info!("Refresh Statistics:");
        info!("  Total refreshes: {}", self.refreshes);
        info!("    Online: {}", self.online);
        info!("    Offline: {}", self.offline);
        info!("    Failed: {}", self.failed);
        info!("    Skipped (already running): {}", self.skipped);
        info!("  Counter Store:");
        info!("    Saves: {}", self.counter_saves);
        info!("    Errors: {}", self.counter_save_errors);
    }
}

struct State {
    state: UpdateState,
    online: bool,
    preserved: PreservedCounters,
    // set when preserved has changes the store hasn't seen yet
    dirty: bool,
    data: Option<Snapshot>,
    last_update_success: bool,
}

#[derive(Clone)]
pub struct Coordinator {
    inverter: Arc<dyn Fetch>,
    store: Arc<dyn CounterStore>,
    channels: Channels,
    max_temperature: f64,
    state: Arc<Mutex<State>>,
    // held for the whole of a refresh, separate from state so readers
    // don't wait on the network
    in_flight: Arc<Mutex<()>>,
    pub stats: Arc<std::sync::Mutex<RefreshStats>>,
}

impl Coordinator {
    pub fn new(
        inverter: Arc<dyn Fetch>,
        store: Arc<dyn CounterStore>,
        channels: Channels,
        max_temperature: f64,
    ) -> Self {
        let state = State {
            state: UpdateState::Idle,
            online: false,
            preserved: PreservedCounters::default(),
            dirty: false,
            data: None,
            last_update_success: true,
        };

        Self {
            inverter,
            store,
            channels,
            max_temperature,
            state: Arc::new(Mutex::new(state)),
            in_flight: Arc::new(Mutex::new(())),
            stats: Arc::new(std::sync::Mutex::new(RefreshStats::default())),
        }
    }

    /// Loads preserved counters; call once before the first refresh.
    ///
    /// A store that can't be read is logged and we start from nothing,
    /// the counters fill in again on the next online reading.
    pub async fn load_stored(&self) {
        let loaded = match self.store.load().await {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!("could not load stored counters: {:#}", e);
                None
            }
        };

        if let Some(counters) = loaded {
            for (key, value) in counters.iter() {
                info!("restored {} = {}", key, value);
            }
            self.state.lock().await.preserved = counters;
        }
    }

    pub async fn preserved(&self) -> PreservedCounters {
        self.state.lock().await.preserved.clone()
    }

    pub async fn online(&self) -> bool {
        self.state.lock().await.online
    }

    pub async fn current_state(&self) -> UpdateState {
        self.state.lock().await.state
    }

    /// Runs one fetch cycle and broadcasts the result.
    ///
    /// Returns None without doing anything if a refresh is already in
    /// flight; overlapping fetches are never started. The state lock is
    /// only held to mark the start and to apply the result, never across
    /// the network exchange.
    pub async fn refresh(&self) -> Option<Update> {
        let _in_flight = match self.in_flight.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("refresh already in progress, skipping");
                self.with_stats(|s| s.skipped += 1);
                return None;
            }
        };

        self.state.lock().await.state = UpdateState::Fetching;

        let fetched = self.inverter.fetch().await;

        let mut state = self.state.lock().await;

        let settled = match fetched {
            Ok(raw) => {
                let snapshot = Parser::parse_with_threshold(&raw, self.max_temperature);
                if snapshot.is_online() {
                    self.settle_online(&mut state, snapshot).await
                } else {
                    self.settle_offline(&mut state)
                }
            }
            Err(err) if FetchError::is_offline(&err) => {
                debug!("inverter unreachable (likely offline): {:#}", err);
                self.settle_offline(&mut state)
            }
            Err(err) => {
                error!("unexpected error fetching data from inverter: {:#}", err);
                state.last_update_success = false;
                UpdateState::Failed
            }
        };

        let update = Update {
            snapshot: state.data.clone(),
            preserved: state.preserved.clone(),
            online: state.online,
            last_update_success: state.last_update_success,
            state: settled,
        };

        state.state = UpdateState::Idle;
        drop(state);

        self.with_stats(|s| {
            s.refreshes += 1;
            match settled {
                UpdateState::SettledOnline => s.online += 1,
                UpdateState::SettledOffline => s.offline += 1,
                _ => s.failed += 1,
            }
        });

        // nobody listening (no mqtt) is fine
        let _ = self
            .channels
            .from_coordinator
            .send(ChannelData::Update(Box::new(update.clone())));

        Some(update)
    }

    async fn settle_online(&self, state: &mut State, snapshot: Snapshot) -> UpdateState {
        if !state.online {
            info!("inverter is online");
        }
        state.online = true;

        for key in FieldKey::PRESERVED {
            if let Some(value) = snapshot.numeric(key) {
                if state.preserved.advance(key, value) {
                    debug!("preserved {} advanced to {}", key, value);
                    state.dirty = true;
                }
            }
        }

        if state.dirty {
            match self.store.save(&state.preserved).await {
                Ok(()) => {
                    state.dirty = false;
                    self.with_stats(|s| s.counter_saves += 1);
                }
                Err(e) => {
                    // keep dirty, the next online reading tries again
                    warn!("failed to save counters: {:#}", e);
                    self.with_stats(|s| s.counter_save_errors += 1);
                }
            }
        }

        state.data = Some(snapshot);
        state.last_update_success = true;
        UpdateState::SettledOnline
    }

    fn settle_offline(&self, state: &mut State) -> UpdateState {
        if state.online {
            info!("inverter went offline");
        }
        state.online = false;

        let mut snapshot = Snapshot::offline();
        for key in FieldKey::PRESERVED {
            if let Some(value) = state.preserved.get(key) {
                snapshot.set_numeric(key, value);
            }
        }

        state.data = Some(snapshot);
        state.last_update_success = true;
        UpdateState::SettledOffline
    }

    pub fn stop(&self) {
        let _ = self.channels.from_coordinator.send(ChannelData::Shutdown);
    }

    fn with_stats<F: FnOnce(&mut RefreshStats)>(&self, f: F) {
        if let Ok(mut stats) = self.stats.lock() {
            f(&mut stats);
        }
    }
}
