#![allow(dead_code)]

use trannergy_bridge::prelude::*;
use trannergy_bridge::trannergy::inverter::Fetch;

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

pub fn common_setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct Factory;

impl Factory {
    /// A plausible daytime reply, long enough for every field.
    pub fn reply() -> Vec<u8> {
        let mut r = vec![0u8; 99];
        r[..4].copy_from_slice(&[0x68, 0x59, 0x41, 0xb0]);
        Self::put_str(&mut r, 15, "NLDN302015AB");
        Self::put_u16(&mut r, 31, 382); // 38.2 C
        Self::put_u16(&mut r, 33, 3105); // 310.5 V
        Self::put_u16(&mut r, 35, 2988);
        Self::put_u16(&mut r, 39, 42); // 4.2 A
        Self::put_u16(&mut r, 41, 38);
        Self::put_u16(&mut r, 45, 51);
        Self::put_u16(&mut r, 51, 2311); // 231.1 V
        Self::put_u16(&mut r, 57, 4998); // 49.98 Hz
        Self::put_u16(&mut r, 59, 1180); // W
        Self::put_u16(&mut r, 69, 532); // 5.32 kWh
        Self::put_u32(&mut r, 71, 12345); // 1234.5 kWh
        Self::put_u32(&mut r, 75, 4321); // h
        *r.last_mut().unwrap() = 0x16;
        r
    }

    /// Same as [`Factory::reply`] with different lifetime counters.
    pub fn reply_with_totals(energy_tenths: u32, hours: u32) -> Vec<u8> {
        let mut r = Self::reply();
        Self::put_u32(&mut r, 71, energy_tenths);
        Self::put_u32(&mut r, 75, hours);
        r
    }

    pub fn put_u16(buf: &mut [u8], offset: usize, value: u16) {
        buf[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
    }

    pub fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
        buf[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
    }

    pub fn put_str(buf: &mut [u8], offset: usize, value: &str) {
        buf[offset..offset + value.len()].copy_from_slice(value.as_bytes());
    }

    pub fn inverter_yaml(port: u16) -> String {
        format!(
            "inverter:\n  host: 127.0.0.1\n  port: {}\n  serial: 1234567890\n  connect_timeout: 1\n  read_timeout: 1\n",
            port
        )
    }

    pub fn config() -> Config {
        Config::from_yaml(&Self::inverter_yaml(8899)).unwrap()
    }

    pub fn connection_refused() -> anyhow::Error {
        FetchError::Connection {
            host: "127.0.0.1".to_owned(),
            port: 8899,
            source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        }
        .into()
    }

    pub fn timed_out() -> anyhow::Error {
        FetchError::Timeout {
            host: "127.0.0.1".to_owned(),
            port: 8899,
            phase: trannergy_bridge::error::Phase::Read,
            after: std::time::Duration::from_secs(10),
        }
        .into()
    }
}

/// Hands out queued replies in order, one per fetch.
pub struct ScriptedInverter {
    replies: Mutex<VecDeque<Result<Vec<u8>>>>,
    delay: Option<std::time::Duration>,
    started: Mutex<Vec<tokio::time::Instant>>,
}

impl ScriptedInverter {
    pub fn new(replies: Vec<Result<Vec<u8>>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            delay: None,
            started: Mutex::new(Vec::new()),
        }
    }

    pub fn slow(replies: Vec<Result<Vec<u8>>>, delay: std::time::Duration) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            delay: Some(delay),
            started: Mutex::new(Vec::new()),
        }
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }

    /// When each fetch so far began.
    pub fn started(&self) -> Vec<tokio::time::Instant> {
        self.started.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetch for ScriptedInverter {
    async fn fetch(&self) -> Result<Vec<u8>> {
        self.started.lock().unwrap().push(tokio::time::Instant::now());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("no more scripted replies")))
    }
}

/// A counter store whose disk is always full.
#[derive(Default)]
pub struct FailingStore {
    attempts: Mutex<u64>,
}

impl FailingStore {
    pub fn attempts(&self) -> u64 {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl CounterStore for FailingStore {
    async fn load(&self) -> Result<Option<PreservedCounters>> {
        Ok(None)
    }

    async fn save(&self, _counters: &PreservedCounters) -> Result<()> {
        *self.attempts.lock().unwrap() += 1;
        bail!("No space left on device")
    }
}
