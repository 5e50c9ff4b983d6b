pub use anyhow::{anyhow, bail, Result};
pub use log::{debug, error, info, trace, warn};
pub use std::io::Write;
pub use std::str::FromStr;
pub use tokio::sync::broadcast;

pub use crate::channels::Channels;
pub use crate::config::{self, Config};
pub use crate::coordinator::{self, Coordinator, Update, UpdateState};
pub use crate::error::FetchError;
pub use crate::fields::{FieldDescriptor, FieldKey};
pub use crate::mqtt;
pub use crate::options::Options;
pub use crate::store::{CounterStore, PreservedCounters};
pub use crate::trannergy::{self, packet::{Snapshot, Status, Value}};
pub use crate::utils::Utils;
