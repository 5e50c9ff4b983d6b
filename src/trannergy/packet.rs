use crate::prelude::*;

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Replies shorter than this can't hold a full record.
pub const MIN_RESPONSE_LEN: usize = 80;

/// Default for the liveness heuristic; a sleeping inverter reports garbage here.
pub const DEFAULT_MAX_TEMPERATURE: f64 = 150.0;

const REQUEST_HEADER: [u8; 4] = [0x68, 0x02, 0x40, 0x30];
const REQUEST_COMMAND: [u8; 2] = [0x01, 0x00];
const REQUEST_TRAILER: u8 = 0x16;
const CHECKSUM_OFFSET: u32 = 115;

const TEMPERATURE_OFFSET: usize = 31;

// Status {{{
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Status {
    Online,
    Offline,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Online => write!(f, "Online"),
            Status::Offline => write!(f, "Offline"),
        }
    }
} // }}}

// Value {{{
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Numeric(f64),
    Text(String),
    Status(Status),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Numeric(v) => Some(*v),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Numeric(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
            Value::Status(s) => write!(f, "{}", s),
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Numeric(v) => serializer.serialize_f64(*v),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Status(s) => s.serialize(serializer),
        }
    }
} // }}}

// Snapshot {{{
/// One decoded reply: every field key mapped to its value.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Snapshot {
    values: BTreeMap<FieldKey, Value>,
}

impl Snapshot {
    /// The canonical all-zero reading used whenever the inverter isn't there.
    pub fn offline() -> Self {
        let values = FieldKey::ALL
            .iter()
            .map(|key| {
                let value = match key {
                    FieldKey::Status => Value::Status(Status::Offline),
                    FieldKey::InverterSn => Value::Text(String::new()),
                    _ => Value::Numeric(0.0),
                };
                (*key, value)
            })
            .collect();

        Self { values }
    }

    pub fn status(&self) -> Status {
        match self.values.get(&FieldKey::Status) {
            Some(Value::Status(s)) => *s,
            _ => Status::Offline,
        }
    }

    pub fn is_online(&self) -> bool {
        self.status() == Status::Online
    }

    pub fn get(&self, key: FieldKey) -> Option<&Value> {
        self.values.get(&key)
    }

    pub fn numeric(&self, key: FieldKey) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldKey, &Value)> {
        self.values.iter()
    }

    // crate-private: a snapshot is immutable once handed out, only the
    // coordinator overlays preserved counters while building one
    pub(crate) fn set_numeric(&mut self, key: FieldKey, value: f64) {
        self.values.insert(key, Value::Numeric(value));
    }
} // }}}

// Request {{{
pub struct Request;

impl Request {
    /// Builds the single "give me everything" request for the wifi stick
    /// with the given serial number.
    ///
    /// The serial is hex encoded, doubled up, and sent byte-reversed; odd
    /// length hex is zero padded on the left so every serial maps to whole
    /// bytes.
    pub fn build(serial: u64) -> Vec<u8> {
        let serial_bytes = Self::serial_bytes(serial);

        let mut data = Vec::with_capacity(REQUEST_HEADER.len() + serial_bytes.len() + 4);
        data.extend_from_slice(&REQUEST_HEADER);
        data.extend_from_slice(&serial_bytes);
        data.extend_from_slice(&REQUEST_COMMAND);
        data.push(Self::checksum(&serial_bytes));
        data.push(REQUEST_TRAILER);

        debug!("request: {}", Utils::hex(&data));

        data
    }

    // reversed bytes of the doubled serial number
    pub fn serial_bytes(serial: u64) -> Vec<u8> {
        let be = serial.to_be_bytes();
        // drop leading zero bytes but keep at least one, equivalent to
        // zero-padding the hex representation to an even length
        let first = be.iter().position(|b| *b != 0).unwrap_or(be.len() - 1);
        let once = &be[first..];

        let mut doubled = Vec::with_capacity(once.len() * 2);
        doubled.extend_from_slice(once);
        doubled.extend_from_slice(once);
        doubled.reverse();
        doubled
    }

    pub fn checksum(serial_bytes: &[u8]) -> u8 {
        let sum = serial_bytes
            .iter()
            .fold(CHECKSUM_OFFSET, |acc, b| acc + u32::from(*b));
        (sum % 256) as u8
    }
} // }}}

// Parser {{{
#[derive(Clone, Copy, Debug)]
enum Encoding {
    // big-endian u16 divided by the given divisor; 0xFFFF means absent
    U16(f64),
    // big-endian u32 divided by the given divisor
    U32(f64),
    // NUL padded text, end offset exclusive
    Text(usize),
}

// where each field lives in the reply. actualpower and acoutputpower1
// share the same register.
const LAYOUT: [(FieldKey, usize, Encoding); 24] = [
    (FieldKey::InverterSn, 15, Encoding::Text(31)),
    (FieldKey::Temperature, 31, Encoding::U16(10.0)),
    (FieldKey::DcInputVoltage1, 33, Encoding::U16(10.0)),
    (FieldKey::DcInputVoltage2, 35, Encoding::U16(10.0)),
    (FieldKey::DcInputVoltage3, 37, Encoding::U16(10.0)),
    (FieldKey::DcInputCurrent1, 39, Encoding::U16(10.0)),
    (FieldKey::DcInputCurrent2, 41, Encoding::U16(10.0)),
    (FieldKey::DcInputCurrent3, 43, Encoding::U16(10.0)),
    (FieldKey::AcOutputCurrent1, 45, Encoding::U16(10.0)),
    (FieldKey::AcOutputCurrent2, 47, Encoding::U16(10.0)),
    (FieldKey::AcOutputCurrent3, 49, Encoding::U16(10.0)),
    (FieldKey::AcOutputVoltage1, 51, Encoding::U16(10.0)),
    (FieldKey::AcOutputVoltage2, 53, Encoding::U16(10.0)),
    (FieldKey::AcOutputVoltage3, 55, Encoding::U16(10.0)),
    (FieldKey::AcOutputFrequency1, 57, Encoding::U16(100.0)),
    (FieldKey::AcOutputPower1, 59, Encoding::U16(1.0)),
    (FieldKey::AcOutputFrequency2, 61, Encoding::U16(100.0)),
    (FieldKey::AcOutputPower2, 63, Encoding::U16(1.0)),
    (FieldKey::AcOutputFrequency3, 65, Encoding::U16(100.0)),
    (FieldKey::AcOutputPower3, 67, Encoding::U16(1.0)),
    (FieldKey::ActualPower, 59, Encoding::U16(1.0)),
    (FieldKey::EnergyToday, 69, Encoding::U16(100.0)),
    (FieldKey::EnergyTotal, 71, Encoding::U32(10.0)),
    (FieldKey::HoursTotal, 75, Encoding::U32(1.0)),
];

pub struct Parser;

impl Parser {
    /// Decodes a raw reply using the default liveness threshold.
    pub fn parse(input: &[u8]) -> Snapshot {
        Self::parse_with_threshold(input, DEFAULT_MAX_TEMPERATURE)
    }

    /// Decodes a raw reply into a snapshot.
    ///
    /// Never fails: a short reply, or one whose temperature is missing or
    /// above `max_temperature`, decodes to the offline snapshot. Individual
    /// fields that can't be read decode as 0.0 (or "" for the serial).
    pub fn parse_with_threshold(input: &[u8], max_temperature: f64) -> Snapshot {
        if input.len() < MIN_RESPONSE_LEN {
            debug!("reply too short ({} bytes), treating inverter as offline", input.len());
            return Snapshot::offline();
        }

        match Self::temperature(input) {
            Some(t) if t <= max_temperature => {}
            t => {
                debug!("inverter appears to be offline (temperature: {:?})", t);
                return Snapshot::offline();
            }
        }

        let mut values = BTreeMap::new();
        values.insert(FieldKey::Status, Value::Status(Status::Online));

        for (key, offset, encoding) in LAYOUT {
            let value = match encoding {
                Encoding::U16(divisor) => {
                    Value::Numeric(Utils::be_u16_checked_div(input, offset, divisor).unwrap_or(0.0))
                }
                Encoding::U32(divisor) => {
                    Value::Numeric(Utils::be_u32_div(input, offset, divisor).unwrap_or(0.0))
                }
                Encoding::Text(end) => {
                    Value::Text(Utils::nul_padded_str(input, offset, end).unwrap_or_default())
                }
            };
            values.insert(key, value);
        }

        Snapshot { values }
    }

    pub fn temperature(input: &[u8]) -> Option<f64> {
        Utils::be_u16_checked_div(input, TEMPERATURE_OFFSET, 10.0)
    }
} // }}}
