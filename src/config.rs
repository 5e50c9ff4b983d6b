use crate::prelude::*;
use crate::trannergy::packet::DEFAULT_MAX_TEMPERATURE;

use serde::Deserialize;
use serde_with::{serde_as, DisplayFromStr, PickFirst};
use std::time::Duration;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub inverter: Inverter,

    #[serde(default = "Config::default_mqtt")]
    pub mqtt: Mqtt,

    #[serde(default)]
    pub store: Store,

    #[serde(default = "Config::default_loglevel")]
    pub loglevel: String,
}

// Inverter {{{
#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct Inverter {
    pub name: Option<String>,

    pub host: String,
    pub port: Option<u16>,

    // the wifi/lan stick serial; config files have it both quoted and bare
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub serial: u64,

    pub poll_interval: Option<u64>,
    pub connect_timeout: Option<u64>,
    pub read_timeout: Option<u64>,
    pub use_tcp_nodelay: Option<bool>,
    pub max_temperature: Option<f64>,

    pub sensors: Option<Vec<FieldKey>>,
}
impl Inverter {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("Trannergy")
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(8899)
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval.unwrap_or(30))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout.unwrap_or(10))
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout.unwrap_or(10))
    }

    pub fn use_tcp_nodelay(&self) -> bool {
        self.use_tcp_nodelay.unwrap_or(true)
    }

    pub fn max_temperature(&self) -> f64 {
        self.max_temperature.unwrap_or(DEFAULT_MAX_TEMPERATURE)
    }

    pub fn sensors(&self) -> Vec<FieldKey> {
        match &self.sensors {
            Some(sensors) => sensors.clone(),
            None => FieldKey::DEFAULT_ENABLED.to_vec(),
        }
    }
} // }}}

// HomeAssistant {{{
#[derive(Clone, Debug, Deserialize)]
pub struct HomeAssistant {
    #[serde(default = "Config::default_enabled")]
    pub enabled: bool,

    #[serde(default = "Config::default_mqtt_homeassistant_prefix")]
    pub prefix: String,
}

impl HomeAssistant {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
} // }}}

// Mqtt {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Mqtt {
    #[serde(default = "Config::default_enabled")]
    pub enabled: bool,

    #[serde(default = "Config::default_mqtt_host")]
    pub host: String,
    #[serde(default = "Config::default_mqtt_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,

    #[serde(default = "Config::default_mqtt_namespace")]
    pub namespace: String,

    #[serde(default = "Config::default_mqtt_homeassistant")]
    pub homeassistant: HomeAssistant,
}
impl Mqtt {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn username(&self) -> &Option<String> {
        &self.username
    }

    pub fn password(&self) -> &Option<String> {
        &self.password
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn homeassistant(&self) -> &HomeAssistant {
        &self.homeassistant
    }
} // }}}

// Store {{{
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Store {
    pub path: Option<String>,
}
impl Store {
    pub fn path(&self) -> &str {
        self.path.as_deref().unwrap_or("trannergy-counters.json")
    }
} // }}}

impl Config {
    pub fn new(file: String) -> Result<Self> {
        let content = std::fs::read_to_string(&file)
            .map_err(|err| anyhow!("config.rs:error reading {}: {}", file, err))?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn log_summary(&self) {
        let inv = &self.inverter;
        info!("Configuration loaded successfully:");
        info!("  Inverter: {}", inv.name());
        info!("    Host: {}", inv.host());
        info!("    Port: {}", inv.port());
        info!("    Serial: {}", inv.serial());
        info!("    Poll Interval: {}s", inv.poll_interval().as_secs());
        info!("    Connect Timeout: {}s", inv.connect_timeout().as_secs());
        info!("    Read Timeout: {}s", inv.read_timeout().as_secs());
        info!("    TCP NoDelay: {}", inv.use_tcp_nodelay());
        info!("    Max Temperature: {}", inv.max_temperature());
        info!(
            "    Sensors: {}",
            inv.sensors().iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
        );

        info!("  MQTT: {}", if self.mqtt.enabled { "enabled" } else { "disabled" });
        if self.mqtt.enabled {
            info!("    Host: {}", self.mqtt.host);
            info!("    Port: {}", self.mqtt.port);
            info!("    Namespace: {}", self.mqtt.namespace);
            info!(
                "    Home Assistant: {}",
                if self.mqtt.homeassistant.enabled { "enabled" } else { "disabled" }
            );
        }

        info!("  Counter Store: {}", self.store.path());
        info!("  Log Level: {}", self.loglevel);
    }

    fn validate(&self) -> Result<()> {
        let inv = &self.inverter;

        if inv.port() == 0 {
            return Err(anyhow!("config.rs:Invalid inverter port: 0"));
        }
        if inv.host.is_empty() {
            return Err(anyhow!("config.rs:Inverter host cannot be empty"));
        }
        if inv.poll_interval.unwrap_or(30) == 0 {
            return Err(anyhow!("config.rs:Invalid poll interval: 0"));
        }
        if inv.connect_timeout.unwrap_or(10) == 0 {
            return Err(anyhow!("config.rs:Invalid connect timeout: 0"));
        }
        if inv.read_timeout.unwrap_or(10) == 0 {
            return Err(anyhow!("config.rs:Invalid read timeout: 0"));
        }
        if !(inv.max_temperature() > 0.0) {
            return Err(anyhow!(
                "config.rs:Invalid max temperature: {}",
                inv.max_temperature()
            ));
        }

        if self.mqtt.enabled {
            if self.mqtt.port == 0 {
                return Err(anyhow!("config.rs:Invalid MQTT port: 0"));
            }
            if self.mqtt.host.is_empty() {
                return Err(anyhow!("config.rs:MQTT host cannot be empty"));
            }
        }

        if self.store.path().is_empty() {
            return Err(anyhow!("config.rs:Store path cannot be empty"));
        }

        Ok(())
    }

    fn default_mqtt() -> Mqtt {
        Mqtt {
            enabled: false,
            host: Self::default_mqtt_host(),
            port: Self::default_mqtt_port(),
            username: None,
            password: None,
            namespace: Self::default_mqtt_namespace(),
            homeassistant: Self::default_mqtt_homeassistant(),
        }
    }

    fn default_mqtt_host() -> String {
        "localhost".to_string()
    }

    fn default_mqtt_port() -> u16 {
        1883
    }

    fn default_mqtt_namespace() -> String {
        "trannergy".to_string()
    }

    fn default_mqtt_homeassistant() -> HomeAssistant {
        HomeAssistant {
            enabled: Self::default_enabled(),
            prefix: Self::default_mqtt_homeassistant_prefix(),
        }
    }

    fn default_mqtt_homeassistant_prefix() -> String {
        "homeassistant".to_string()
    }

    fn default_enabled() -> bool {
        true
    }

    fn default_loglevel() -> String {
        "info".to_string()
    }
}
