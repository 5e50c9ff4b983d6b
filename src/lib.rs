pub mod channels;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fields;
pub mod home_assistant;
pub mod mqtt;
pub mod options;
pub mod prelude;
pub mod scheduler;
pub mod sensor;
pub mod store;
pub mod trannergy;
pub mod utils;

const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

use crate::prelude::*;
use crate::mqtt::Mqtt;
use crate::scheduler::Scheduler;
use crate::store::JsonFileStore;
use crate::trannergy::inverter::{Fetch, Inverter};
use crate::trannergy::packet::Parser;

use std::sync::Arc;
use std::time::Duration;

/// Running components, kept together so they can be stopped in order.
#[derive(Clone)]
pub struct Components {
    pub coordinator: Coordinator,
    pub scheduler: Scheduler,
    pub mqtt: Option<Mqtt>,
}

impl Components {
    /// Stops the scheduler first so no new refresh starts, then tells
    /// everything downstream of the coordinator to finish.
    pub fn stop(&self) {
        info!("Stopping all components...");

        self.scheduler.stop();
        self.coordinator.stop();
        if let Some(mqtt) = &self.mqtt {
            mqtt.stop();
        }
    }
}

fn init_logging(level: &str) {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.module_path().unwrap_or(""),
                record.args()
            )
        })
        .write_style(env_logger::WriteStyle::Never)
        .try_init();
}

pub async fn app() -> Result<()> {
    let options = Options::new();

    let config = match Config::new(options.config_file.clone()) {
        Ok(config) => config,
        Err(err) => {
            init_logging("info");
            error!("Failed to load config: {:#}", err);
            return Err(err);
        }
    };

    init_logging(&config.loglevel);

    if options.once {
        return read_once(&config).await;
    }

    info!(
        "trannergy-bridge {} starting with config file: {}",
        CARGO_PKG_VERSION, options.config_file
    );
    config.log_summary();

    run(config, options.runtime.map(Duration::from_secs)).await
}

/// Polls until ctrl-c (or `runtime` elapses), then shuts down cleanly.
pub async fn run(config: Config, runtime: Option<Duration>) -> Result<()> {
    let channels = Channels::new();

    info!("Initializing components...");

    let store = Arc::new(JsonFileStore::new(config.store.path()));
    let inverter = Arc::new(Inverter::new(&config.inverter));

    let coordinator = Coordinator::new(
        inverter,
        store,
        channels.clone(),
        config.inverter.max_temperature(),
    );
    coordinator.load_stored().await;

    let scheduler = Scheduler::new(config.inverter.clone(), channels.clone(), coordinator.clone());

    let mqtt = if config.mqtt.enabled() {
        Some(Mqtt::new(config.clone(), channels.clone()))
    } else {
        info!("mqtt disabled");
        None
    };

    let components = Components {
        coordinator: coordinator.clone(),
        scheduler: scheduler.clone(),
        mqtt: mqtt.clone(),
    };

    let mqtt_handle = mqtt.map(|mqtt| {
        tokio::spawn(async move {
            if let Err(e) = mqtt.start().await {
                error!("MQTT task failed: {:#}", e);
            }
        })
    });

    let scheduler_handle = tokio::spawn(async move {
        if let Err(e) = scheduler.start().await {
            error!("Scheduler task failed: {:#}", e);
        }
    });

    info!("Waiting for shutdown signal...");
    match runtime {
        Some(limit) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Ctrl+C received"),
                _ = tokio::time::sleep(limit) => info!("runtime limit of {}s reached", limit.as_secs()),
            }
        }
        None => {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
        }
    }

    components.stop();

    if let Err(e) = scheduler_handle.await {
        error!("Error waiting for scheduler task: {}", e);
    }
    if let Some(handle) = mqtt_handle {
        if let Err(e) = handle.await {
            error!("Error waiting for MQTT task: {}", e);
        }
    }

    if let Ok(stats) = coordinator.stats.lock() {
        stats.print_summary();
    }

    info!("Shutdown complete");
    Ok(())
}

/// One fetch, printed as JSON on stdout.
///
/// An unreachable inverter prints the offline snapshot rather than
/// failing; anything else is returned as an error.
pub async fn read_once(config: &Config) -> Result<()> {
    let inverter = Inverter::new(&config.inverter);

    let snapshot = match inverter.fetch().await {
        Ok(raw) => Parser::parse_with_threshold(&raw, config.inverter.max_temperature()),
        Err(err) if FetchError::is_offline(&err) => {
            info!("{:#}", err);
            Snapshot::offline()
        }
        Err(err) => return Err(err),
    };

    let mut stdout = std::io::stdout();
    writeln!(stdout, "{}", serde_json::to_string_pretty(&snapshot)?)?;

    Ok(())
}
