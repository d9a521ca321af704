use std::fmt::Display;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace, warn};

/// Size of the single blocking read performed after each send. Whatever
/// arrived within one read is handed to the decode layer as-is.
pub const READ_BUFFER_LEN: usize = 1024;

/// Lifecycle of the one socket to the board. The socket handle exists
/// exactly while the state is `Connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

/// Represents errors on the device socket. All of them are recovered
/// locally: the connection is invalidated and the next use reconnects.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    #[error("connecting to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    #[error("i/o failure on the device socket: {0}")]
    Io(#[from] std::io::Error),

    #[error("device closed the connection")]
    ConnectionClosed,

    #[error("device did not reply within {timeout:?}")]
    RequestTimeout { timeout: Duration },

    #[error("not connected to the device")]
    NotConnected,
}

/// Owns the single TCP connection to the bench board.
///
/// All operations are synchronous round trips from the caller's point of
/// view; the device link task is the only owner, so one request is on the
/// wire at a time.
pub struct DeviceConnection {
    addr: String,
    connect_timeout: Duration,
    request_timeout: Duration,
    stream: Option<TcpStream>,
    state: ConnectionState,
}

impl DeviceConnection {
    pub fn new(addr: String, connect_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            addr,
            connect_timeout,
            request_timeout,
            stream: None,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    fn set_state(&mut self, next: ConnectionState) {
        if self.state != next {
            debug!("Connection state: {} -> {}.", self.state, next);
            self.state = next;
        }
    }

    /// Open a fresh connection to the board, closing any held socket first
    /// so reconnecting never leaks a handle. Failure is reported to the
    /// caller and leaves the state `Disconnected`, never aborts.
    pub async fn connect(&mut self) -> Result<(), DeviceError> {
        self.close();
        self.set_state(ConnectionState::Connecting);
        trace!("Connecting to device at {}.", self.addr);

        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.addr)).await {
            Err(_) => {
                self.set_state(ConnectionState::Disconnected);
                Err(DeviceError::ConnectTimeout {
                    addr: self.addr.clone(),
                    timeout: self.connect_timeout,
                })
            }
            Ok(Err(e)) => {
                self.set_state(ConnectionState::Disconnected);
                Err(DeviceError::Connect {
                    addr: self.addr.clone(),
                    source: e,
                })
            }
            Ok(Ok(stream)) => {
                debug!("Connected to device at {}.", self.addr);
                self.stream = Some(stream);
                self.set_state(ConnectionState::Connected);
                Ok(())
            }
        }
    }

    /// One round trip: write the full frame, then perform a single read of
    /// up to [`READ_BUFFER_LEN`] bytes and return whatever arrived. No
    /// framing validation happens here; the decode layer checks sufficiency.
    ///
    /// If not connected, one connect attempt is made first. Any I/O failure
    /// invalidates the connection so the next call reconnects.
    pub async fn send_request(&mut self, frame: &[u8]) -> Result<Vec<u8>, DeviceError> {
        if !self.is_connected() {
            trace!("Not connected, attempting to connect before send.");
            self.connect().await?;
        }

        let written = {
            let stream = self.stream.as_mut().ok_or(DeviceError::NotConnected)?;
            stream.write_all(frame).await
        };
        if let Err(e) = written {
            warn!("Failed to write frame to device. Error: {}", e);
            self.invalidate();
            return Err(e.into());
        }
        trace!("Wrote {} byte frame to device.", frame.len());

        let mut buffer = [0u8; READ_BUFFER_LEN];
        let read = {
            let stream = self.stream.as_mut().ok_or(DeviceError::NotConnected)?;
            tokio::time::timeout(self.request_timeout, stream.read(&mut buffer)).await
        };
        match read {
            Err(_) => {
                warn!("Device did not reply within {:?}.", self.request_timeout);
                self.invalidate();
                Err(DeviceError::RequestTimeout {
                    timeout: self.request_timeout,
                })
            }
            Ok(Err(e)) => {
                warn!("Failed to read response from device. Error: {}", e);
                self.invalidate();
                Err(e.into())
            }
            Ok(Ok(0)) => {
                warn!("Device closed the connection.");
                self.invalidate();
                Err(DeviceError::ConnectionClosed)
            }
            Ok(Ok(received)) => {
                trace!("Received {} bytes from device.", received);
                Ok(buffer[..received].to_vec())
            }
        }
    }

    /// Idempotent; closing an already closed connection does nothing.
    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!("Closed connection to device.");
        }
        self.set_state(ConnectionState::Disconnected);
    }

    fn invalidate(&mut self) {
        self.stream = None;
        self.set_state(ConnectionState::Disconnected);
    }
}
