use crate::prelude::*;
use crate::fields::Classification;

/// One exposed measurement of one inverter.
///
/// Decides, per update, whether the sensor is available and which value it
/// shows. Lifetime counters never show 0 so downstream statistics aren't
/// reset by an inverter that switched off for the night.
#[derive(Clone, Debug)]
pub struct Sensor {
    descriptor: &'static FieldDescriptor,
    serial: u64,
}

impl Sensor {
    pub fn new(key: FieldKey, serial: u64) -> Self {
        Self {
            descriptor: key.descriptor(),
            serial,
        }
    }

    /// The enabled sensors for an inverter, in config order, without duplicates.
    pub fn for_inverter(inverter: &config::Inverter) -> Vec<Sensor> {
        let mut seen = Vec::new();
        inverter
            .sensors()
            .into_iter()
            .filter(|key| {
                if seen.contains(key) {
                    false
                } else {
                    seen.push(*key);
                    true
                }
            })
            .map(|key| Sensor::new(key, inverter.serial()))
            .collect()
    }

    pub fn key(&self) -> FieldKey {
        self.descriptor.field
    }

    pub fn descriptor(&self) -> &'static FieldDescriptor {
        self.descriptor
    }

    pub fn unique_id(&self) -> String {
        format!("{}_{}", self.serial, self.descriptor.key)
    }

    pub fn available(&self, update: &Update) -> bool {
        if !update.last_update_success {
            return false;
        }

        if self.descriptor.classification == Classification::Status {
            return true;
        }

        if self.descriptor.is_total_increasing() {
            return update.counter(self.key()).is_some();
        }

        update.online
    }

    pub fn native_value(&self, update: &Update) -> Option<Value> {
        let value = update.snapshot.as_ref().and_then(|s| s.get(self.key()));

        match self.descriptor.classification {
            Classification::Status => Some(match value {
                Some(Value::Status(status)) => Value::Status(*status),
                _ => Value::Status(Status::Offline),
            }),
            Classification::Text => update.snapshot.as_ref().map(|_| match value {
                Some(Value::Text(s)) => Value::Text(s.clone()),
                _ => Value::Text(String::new()),
            }),
            Classification::Numeric if self.descriptor.is_total_increasing() => {
                update.counter(self.key()).map(Value::Numeric)
            }
            Classification::Numeric => {
                if update.snapshot.is_none() || !update.online {
                    return None;
                }
                Some(Value::Numeric(value.and_then(Value::as_f64).unwrap_or(0.0)))
            }
        }
    }
}
