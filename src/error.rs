use std::time::Duration;

/// Creates an anyhow error with the current file and line number
#[macro_export]
macro_rules! file_error {
    ($($arg:tt)*) => {
        anyhow::anyhow!(
            "[{}:{}] {}",
            std::path::Path::new(file!())
                .file_name()
                .map(|f| f.to_string_lossy())
                .unwrap_or_default(),
            line!(),
            format!($($arg)*)
        )
    };
}

/// Failures the transport reports when the inverter can't be talked to.
///
/// Both variants are expected in normal operation (an inverter powers down
/// its wifi stick overnight) and the coordinator turns them into an offline
/// reading. Anything else travelling up as an `anyhow::Error` is unexpected.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("could not talk to inverter at {host}:{port}: {source}")]
    Connection {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("timeout {phase} inverter at {host}:{port} after {}s", .after.as_secs())]
    Timeout {
        host: String,
        port: u16,
        phase: Phase,
        after: Duration,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connect,
    Read,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Connect => write!(f, "connecting to"),
            Phase::Read => write!(f, "reading from"),
        }
    }
}

impl FetchError {
    /// True for errors that mean "the inverter is offline" rather than a fault.
    pub fn is_offline(err: &anyhow::Error) -> bool {
        err.downcast_ref::<FetchError>().is_some()
    }
}
