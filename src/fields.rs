use crate::prelude::*;

use serde::{Deserialize, Serialize};

/// Every measurement the inverter reply carries.
///
/// Serialized in lowercase, which gives exactly the keys used in the config
/// file, the MQTT topics and the persisted counters (`energytotal` etc).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKey {
    Status,
    ActualPower,
    EnergyToday,
    EnergyTotal,
    HoursTotal,
    InverterSn,
    Temperature,
    DcInputVoltage1,
    DcInputCurrent1,
    DcInputVoltage2,
    DcInputCurrent2,
    DcInputVoltage3,
    DcInputCurrent3,
    AcOutputVoltage1,
    AcOutputCurrent1,
    AcOutputFrequency1,
    AcOutputPower1,
    AcOutputVoltage2,
    AcOutputCurrent2,
    AcOutputFrequency2,
    AcOutputPower2,
    AcOutputVoltage3,
    AcOutputCurrent3,
    AcOutputFrequency3,
    AcOutputPower3,
}

impl FieldKey {
    pub const ALL: [FieldKey; 25] = [
        FieldKey::Status,
        FieldKey::ActualPower,
        FieldKey::EnergyToday,
        FieldKey::EnergyTotal,
        FieldKey::HoursTotal,
        FieldKey::InverterSn,
        FieldKey::Temperature,
        FieldKey::DcInputVoltage1,
        FieldKey::DcInputCurrent1,
        FieldKey::DcInputVoltage2,
        FieldKey::DcInputCurrent2,
        FieldKey::DcInputVoltage3,
        FieldKey::DcInputCurrent3,
        FieldKey::AcOutputVoltage1,
        FieldKey::AcOutputCurrent1,
        FieldKey::AcOutputFrequency1,
        FieldKey::AcOutputPower1,
        FieldKey::AcOutputVoltage2,
        FieldKey::AcOutputCurrent2,
        FieldKey::AcOutputFrequency2,
        FieldKey::AcOutputPower2,
        FieldKey::AcOutputVoltage3,
        FieldKey::AcOutputCurrent3,
        FieldKey::AcOutputFrequency3,
        FieldKey::AcOutputPower3,
    ];

    /// Sensors enabled when the config doesn't list any.
    pub const DEFAULT_ENABLED: [FieldKey; 13] = [
        FieldKey::EnergyToday,
        FieldKey::EnergyTotal,
        FieldKey::HoursTotal,
        FieldKey::InverterSn,
        FieldKey::Temperature,
        FieldKey::DcInputVoltage1,
        FieldKey::DcInputCurrent1,
        FieldKey::DcInputVoltage2,
        FieldKey::DcInputCurrent2,
        FieldKey::AcOutputVoltage1,
        FieldKey::AcOutputCurrent1,
        FieldKey::AcOutputFrequency1,
        FieldKey::AcOutputPower1,
    ];

    /// Lifetime counters whose last known value survives the inverter going offline.
    pub const PRESERVED: [FieldKey; 2] = [FieldKey::EnergyTotal, FieldKey::HoursTotal];

    pub fn is_preserved(&self) -> bool {
        Self::PRESERVED.contains(self)
    }

    pub fn as_str(&self) -> &'static str {
        self.descriptor().key
    }

    pub fn descriptor(&self) -> &'static FieldDescriptor {
        // DESCRIPTORS is laid out in the same order as the enum
        &DESCRIPTORS[*self as usize]
    }
}

impl std::fmt::Display for FieldKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FieldKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|k| k.as_str() == s)
            .copied()
            .ok_or_else(|| anyhow!("unknown field {}", s))
    }
}

/// How a field's value is represented in a snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
    Numeric,
    Text,
    Status,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Power,
    Energy,
    Duration,
    Temperature,
    Voltage,
    Current,
    Frequency,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateClass {
    Measurement,
    TotalIncreasing,
}

#[derive(Debug, PartialEq)]
pub struct FieldDescriptor {
    pub field: FieldKey,
    pub key: &'static str,
    pub name: &'static str,
    pub unit: Option<&'static str>,
    pub icon: &'static str,
    pub device_class: Option<DeviceClass>,
    pub state_class: Option<StateClass>,
    pub precision: Option<u8>,
    pub classification: Classification,
}

impl FieldDescriptor {
    pub fn is_total_increasing(&self) -> bool {
        self.state_class == Some(StateClass::TotalIncreasing)
    }
}

// shorthand for the bulk of the table, plain measurements
const fn measurement(
    field: FieldKey,
    key: &'static str,
    name: &'static str,
    unit: &'static str,
    icon: &'static str,
    device_class: DeviceClass,
) -> FieldDescriptor {
    FieldDescriptor {
        field,
        key,
        name,
        unit: Some(unit),
        icon,
        device_class: Some(device_class),
        state_class: Some(StateClass::Measurement),
        precision: None,
        classification: Classification::Numeric,
    }
}

static DESCRIPTORS: [FieldDescriptor; 25] = [
    FieldDescriptor {
        field: FieldKey::Status,
        key: "status",
        name: "Status",
        unit: None,
        icon: "mdi:weather-sunny",
        device_class: None,
        state_class: None,
        precision: None,
        classification: Classification::Status,
    },
    measurement(FieldKey::ActualPower, "actualpower", "Actual Power", "W", "mdi:solar-power", DeviceClass::Power),
    FieldDescriptor {
        field: FieldKey::EnergyToday,
        key: "energytoday",
        name: "Energy Today",
        unit: Some("kWh"),
        icon: "mdi:chart-bell-curve-cumulative",
        device_class: Some(DeviceClass::Energy),
        state_class: None,
        precision: Some(2),
        classification: Classification::Numeric,
    },
    FieldDescriptor {
        field: FieldKey::EnergyTotal,
        key: "energytotal",
        name: "Energy Total",
        unit: Some("kWh"),
        icon: "mdi:meter-electric-outline",
        device_class: Some(DeviceClass::Energy),
        state_class: Some(StateClass::TotalIncreasing),
        precision: Some(2),
        classification: Classification::Numeric,
    },
    FieldDescriptor {
        field: FieldKey::HoursTotal,
        key: "hourstotal",
        name: "Hours Total",
        unit: Some("h"),
        icon: "mdi:timer-outline",
        device_class: Some(DeviceClass::Duration),
        state_class: Some(StateClass::TotalIncreasing),
        precision: None,
        classification: Classification::Numeric,
    },
    FieldDescriptor {
        field: FieldKey::InverterSn,
        key: "invertersn",
        name: "Inverter Serial Number",
        unit: None,
        icon: "mdi:information-outline",
        device_class: None,
        state_class: None,
        precision: None,
        classification: Classification::Text,
    },
    measurement(FieldKey::Temperature, "temperature", "Temperature", "°C", "mdi:thermometer", DeviceClass::Temperature),
    measurement(FieldKey::DcInputVoltage1, "dcinputvoltage1", "DC Input Voltage 1", "V", "mdi:flash-outline", DeviceClass::Voltage),
    measurement(FieldKey::DcInputCurrent1, "dcinputcurrent1", "DC Input Current 1", "A", "mdi:current-dc", DeviceClass::Current),
    measurement(FieldKey::DcInputVoltage2, "dcinputvoltage2", "DC Input Voltage 2", "V", "mdi:flash-outline", DeviceClass::Voltage),
    measurement(FieldKey::DcInputCurrent2, "dcinputcurrent2", "DC Input Current 2", "A", "mdi:current-dc", DeviceClass::Current),
    measurement(FieldKey::DcInputVoltage3, "dcinputvoltage3", "DC Input Voltage 3", "V", "mdi:flash-outline", DeviceClass::Voltage),
    measurement(FieldKey::DcInputCurrent3, "dcinputcurrent3", "DC Input Current 3", "A", "mdi:current-dc", DeviceClass::Current),
    measurement(FieldKey::AcOutputVoltage1, "acoutputvoltage1", "AC Output Voltage 1", "V", "mdi:flash-outline", DeviceClass::Voltage),
    measurement(FieldKey::AcOutputCurrent1, "acoutputcurrent1", "AC Output Current 1", "A", "mdi:current-ac", DeviceClass::Current),
    measurement(FieldKey::AcOutputFrequency1, "acoutputfrequency1", "AC Output Frequency 1", "Hz", "mdi:sine-wave", DeviceClass::Frequency),
    measurement(FieldKey::AcOutputPower1, "acoutputpower1", "AC Output Power 1", "W", "mdi:solar-power", DeviceClass::Power),
    measurement(FieldKey::AcOutputVoltage2, "acoutputvoltage2", "AC Output Voltage 2", "V", "mdi:flash-outline", DeviceClass::Voltage),
    measurement(FieldKey::AcOutputCurrent2, "acoutputcurrent2", "AC Output Current 2", "A", "mdi:current-ac", DeviceClass::Current),
    measurement(FieldKey::AcOutputFrequency2, "acoutputfrequency2", "AC Output Frequency 2", "Hz", "mdi:sine-wave", DeviceClass::Frequency),
    measurement(FieldKey::AcOutputPower2, "acoutputpower2", "AC Output Power 2", "W", "mdi:solar-power", DeviceClass::Power),
    measurement(FieldKey::AcOutputVoltage3, "acoutputvoltage3", "AC Output Voltage 3", "V", "mdi:flash-outline", DeviceClass::Voltage),
    measurement(FieldKey::AcOutputCurrent3, "acoutputcurrent3", "AC Output Current 3", "A", "mdi:current-ac", DeviceClass::Current),
    measurement(FieldKey::AcOutputFrequency3, "acoutputfrequency3", "AC Output Frequency 3", "Hz", "mdi:sine-wave", DeviceClass::Frequency),
    measurement(FieldKey::AcOutputPower3, "acoutputpower3", "AC Output Power 3", "W", "mdi:solar-power", DeviceClass::Power),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_table_matches_enum_order() {
        for key in FieldKey::ALL {
            assert_eq!(key.descriptor().field, key);
        }
    }

    #[test]
    fn serde_key_matches_descriptor_key() {
        for key in FieldKey::ALL {
            let json = serde_json::to_string(&key).unwrap();
            assert_eq!(json, format!("\"{}\"", key.as_str()));
            assert_eq!(FieldKey::from_str(key.as_str()).unwrap(), key);
        }
    }

    #[test]
    fn unknown_key() {
        assert!(FieldKey::from_str("batterysoc").is_err());
    }

    #[test]
    fn only_counters_are_preserved() {
        let preserved: Vec<_> = FieldKey::ALL.into_iter().filter(|k| k.is_preserved()).collect();
        assert_eq!(preserved, vec![FieldKey::EnergyTotal, FieldKey::HoursTotal]);
        assert!(preserved.iter().all(|k| k.descriptor().is_total_increasing()));
    }
}
