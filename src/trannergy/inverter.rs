use crate::prelude::*;
use crate::error::Phase;
use crate::trannergy::packet::{Request, MIN_RESPONSE_LEN};

use {
    async_trait::async_trait,
    bytes::BytesMut,
    std::time::Duration,
    tokio::io::{AsyncReadExt, AsyncWriteExt},
    tokio::net::TcpStream,
};

/// Upper bound on a single reply; the full record is well under this.
pub const MAX_RESPONSE_LEN: usize = 1024;

// Fetch {{{
/// Something that can hand back one raw reply from the inverter.
///
/// Offline conditions must be reported as a [`FetchError`] inside the
/// `anyhow::Error`; any other error is treated as an unexpected failure.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self) -> Result<Vec<u8>>;
} // }}}

// DeviceIdentity {{{
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceIdentity {
    host: String,
    port: u16,
    serial: u64,
}

impl DeviceIdentity {
    pub fn new(host: &str, port: u16, serial: u64) -> Self {
        Self {
            host: host.to_owned(),
            port,
            serial,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }
}

impl std::fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}:{})", self.serial, self.host, self.port)
    }
} // }}}

#[derive(Clone, Debug)]
pub struct Inverter {
    identity: DeviceIdentity,
    connect_timeout: Duration,
    read_timeout: Duration,
    use_tcp_nodelay: bool,
}

impl Inverter {
    pub fn new(config: &config::Inverter) -> Self {
        Self {
            identity: DeviceIdentity::new(config.host(), config.port(), config.serial()),
            connect_timeout: config.connect_timeout(),
            read_timeout: config.read_timeout(),
            use_tcp_nodelay: config.use_tcp_nodelay(),
        }
    }

    pub fn with_timeouts(identity: DeviceIdentity, connect_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            identity,
            connect_timeout,
            read_timeout,
            use_tcp_nodelay: true,
        }
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// One full request/reply exchange on a fresh connection.
    ///
    /// The connection is closed on every path out of here; errors while
    /// closing are never reported.
    pub async fn fetch_once(&self) -> Result<Vec<u8>> {
        let mut stream = self.connect().await?;

        let result = self.exchange(&mut stream).await;

        if let Err(e) = stream.shutdown().await {
            trace!("inverter {}: error closing connection: {}", self.identity, e);
        }

        result
    }

    async fn connect(&self) -> Result<TcpStream> {
        let hp = (self.identity.host(), self.identity.port());

        debug!("inverter {}: connecting", self.identity);

        let stream = match tokio::time::timeout(self.connect_timeout, TcpStream::connect(hp)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(self.connection_error(e).into()),
            Err(_) => return Err(self.timeout_error(Phase::Connect, self.connect_timeout).into()),
        };

        if self.use_tcp_nodelay {
            if let Err(e) = stream.set_nodelay(true) {
                warn!("Failed to set TCP_NODELAY: {}", e);
            }
        }

        Ok(stream)
    }

    async fn exchange(&self, stream: &mut TcpStream) -> Result<Vec<u8>> {
        let request = Request::build(self.identity.serial());

        if let Err(e) = stream.write_all(&request).await {
            return Err(self.connection_error(e).into());
        }
        if let Err(e) = stream.flush().await {
            return Err(self.connection_error(e).into());
        }

        let mut buf = BytesMut::with_capacity(MAX_RESPONSE_LEN);
        let mut bounded = (&mut *stream).take(MAX_RESPONSE_LEN as u64);

        let len = match tokio::time::timeout(self.read_timeout, bounded.read_buf(&mut buf)).await {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(self.connection_error(e).into()),
            Err(_) => return Err(self.timeout_error(Phase::Read, self.read_timeout).into()),
        };

        debug!("inverter {}: RX {} bytes: {}", self.identity, len, Utils::hex(&buf));
        if len < MIN_RESPONSE_LEN {
            debug!("inverter {}: short reply", self.identity);
        }

        Ok(buf.to_vec())
    }

    fn connection_error(&self, source: std::io::Error) -> FetchError {
        FetchError::Connection {
            host: self.identity.host().to_owned(),
            port: self.identity.port(),
            source,
        }
    }

    fn timeout_error(&self, phase: Phase, after: Duration) -> FetchError {
        FetchError::Timeout {
            host: self.identity.host().to_owned(),
            port: self.identity.port(),
            phase,
            after,
        }
    }
}

#[async_trait]
impl Fetch for Inverter {
    async fn fetch(&self) -> Result<Vec<u8>> {
        self.fetch_once().await
    }
}
