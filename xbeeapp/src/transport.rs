use std::io::{self, Read, Write};

use thiserror::Error;

/// A byte stream connected to the serial interface of a local XBee.
///
/// Transports must be cloneable to support reading and writing from different threads,
/// via a working implementation of try_clone(). We do not require `Clone` directly
/// as this could not be fulfilled by `TcpStream`.
///
/// `XBeeDevice` uses one copy exclusively for reading on a background thread and the
/// other for writing. Reads may time out (`ErrorKind::TimedOut`); the reader retries.
/// Any other read error, or end of stream, is treated as the connection being lost.
pub trait Transport: Read + Write + Sized + Send + 'static {
    /// Return a copy of this transport sharing the same underlying connection.
    fn try_clone(&mut self) -> Result<Self, TransportError>;

    /// Shut down I/O - it is assumed we cannot restart.
    fn close(&mut self) -> Result<(), TransportError>;
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("unable to clone transport: {0}")]
    Clone(#[source] io::Error),

    #[error("unable to close transport: {0}")]
    Close(#[source] io::Error),

    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

/// XBee Wi-Fi and Cellular modules, or a serial server, exposing the API over TCP.
impl Transport for std::net::TcpStream {
    fn try_clone(&mut self) -> Result<Self, TransportError> {
        std::net::TcpStream::try_clone(self).map_err(TransportError::Clone)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        match self.shutdown(std::net::Shutdown::Both) {
            Ok(()) => Ok(()),
            // the peer may have got in first
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(TransportError::Close(e)),
        }
    }
}
