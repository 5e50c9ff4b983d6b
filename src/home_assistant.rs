use crate::prelude::*;
use crate::fields::{DeviceClass, StateClass};
use crate::sensor::Sensor;

use serde::Serialize;

#[derive(Debug, Serialize)]
struct Device {
    identifiers: Vec<String>,
    name: String,
    manufacturer: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct Entity<'a> {
    name: &'a str,
    unique_id: String,
    object_id: String,
    state_topic: String,
    availability_topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit_of_measurement: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_class: Option<DeviceClass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_class: Option<StateClass>,
    icon: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    suggested_display_precision: Option<u8>,
    device: &'a Device,
}

/// Home Assistant MQTT discovery for one inverter's enabled sensors.
pub struct Config {
    inverter: config::Inverter,
    mqtt: config::Mqtt,
    sensors: Vec<Sensor>,
}

impl Config {
    pub fn new(inverter: &config::Inverter, mqtt: &config::Mqtt) -> Self {
        Self {
            inverter: inverter.clone(),
            mqtt: mqtt.clone(),
            sensors: Sensor::for_inverter(inverter),
        }
    }

    pub fn all(&self) -> Result<Vec<mqtt::Message>> {
        let device = Device {
            identifiers: vec![format!("trannergy_{}", self.inverter.serial())],
            name: self.inverter.name().to_owned(),
            manufacturer: "Trannergy".to_owned(),
            model: "PV Inverter".to_owned(),
        };

        self.sensors
            .iter()
            .map(|sensor| self.sensor(sensor, &device))
            .collect()
    }

    fn sensor(&self, sensor: &Sensor, device: &Device) -> Result<mqtt::Message> {
        let d = sensor.descriptor();
        let unique_id = sensor.unique_id();

        let entity = Entity {
            name: d.name,
            unique_id: unique_id.clone(),
            object_id: format!("{}_{}", self.inverter.name().to_lowercase().replace(' ', "_"), d.key),
            state_topic: format!(
                "{}/{}",
                self.mqtt.namespace(),
                mqtt::Message::state_topic(self.inverter.serial(), sensor.key())
            ),
            availability_topic: format!(
                "{}/{}",
                self.mqtt.namespace(),
                mqtt::Message::availability_topic(self.inverter.serial(), sensor.key())
            ),
            unit_of_measurement: d.unit,
            device_class: d.device_class,
            state_class: d.state_class,
            icon: d.icon,
            suggested_display_precision: d.precision,
            device,
        };

        Ok(mqtt::Message {
            topic: format!(
                "{}/sensor/{}/config",
                self.mqtt.homeassistant().prefix(),
                unique_id
            ),
            retain: true,
            payload: serde_json::to_string(&entity)?,
        })
    }
}
