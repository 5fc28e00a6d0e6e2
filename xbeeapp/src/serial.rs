use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::SerialPort;

use crate::transport::{Transport, TransportError};

/// How long a read may block before the reader thread gets a chance to notice a close.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Local XBee attached to a serial port or USB adapter.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    pub fn available_ports() -> impl Iterator<Item = String> {
        serialport::available_ports()
            .unwrap_or_else(|_| vec![])
            .into_iter()
            .map(|i| i.port_name)
    }

    /// Open `port_name` at the given baud rate, 8N1 with no flow control.
    pub fn new(port_name: &str, baud_rate: u32) -> Result<Self, TransportError> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(READ_TIMEOUT)
            .open()?;
        Ok(Self { port })
    }
}

impl Read for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl Transport for SerialTransport {
    fn try_clone(&mut self) -> Result<Self, TransportError> {
        Ok(Self {
            port: self.port.try_clone()?,
        })
    }

    fn close(&mut self) -> Result<(), TransportError> {
        // The port is released when both halves are dropped. The reader half notices
        // the closed device at its next read timeout.
        self.port.clear(serialport::ClearBuffer::All)?;
        Ok(())
    }
}
