use thiserror::Error;
use xbeecore::frame::AtName;
use xbeecore::protocol::{AtCommandStatus, DeliveryStatus, OperatingMode, XBeeProtocol};

use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum XBeeError {
    #[error("connection to the local XBee is not open")]
    ConnectionNotOpen,

    #[error("connection to the local XBee was closed while waiting")]
    ConnectionClosed,

    #[error("operating mode {0:?} does not support API frames")]
    InvalidOperatingMode(OperatingMode),

    #[error("timed out waiting for a response")]
    Timeout,

    #[error("AT command {command} failed with status: {status}")]
    AtCommand {
        command: AtName,
        status: AtCommandStatus,
    },

    #[error("transmission failed: {0}")]
    TransmitFailed(DeliveryStatus),

    #[error("XBee reports protocol {actual} but was configured as {expected}")]
    ProtocolMismatch {
        expected: XBeeProtocol,
        actual: XBeeProtocol,
    },

    #[error("{operation} is not supported by protocol {protocol}")]
    OperationNotSupported {
        operation: &'static str,
        protocol: XBeeProtocol,
    },

    #[error("a discovery process is already running on this XBee")]
    DiscoveryAlreadyRunning,

    #[error("all 255 frame IDs are waiting for responses")]
    FrameIdsExhausted,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("unexpected response frame: {0}")]
    UnexpectedResponse(String),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, XBeeError>;
