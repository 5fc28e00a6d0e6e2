use alloc::vec::Vec;
use core::fmt;

use crate::address::{XBee16BitAddress, XBee64BitAddress};
use crate::discovery::NodeRecord;
use crate::protocol::{AtCommandStatus, DeliveryStatus, ModemStatus, XBeeProtocol};
use crate::wire::Reader;

pub const FRAME_TX_64: u8 = 0x00;
pub const FRAME_TX_16: u8 = 0x01;
pub const FRAME_AT_COMMAND: u8 = 0x08;
pub const FRAME_AT_COMMAND_QUEUE: u8 = 0x09;
pub const FRAME_TRANSMIT_REQUEST: u8 = 0x10;
pub const FRAME_REMOTE_AT_COMMAND: u8 = 0x17;
pub const FRAME_RX_64: u8 = 0x80;
pub const FRAME_RX_16: u8 = 0x81;
pub const FRAME_AT_COMMAND_RESPONSE: u8 = 0x88;
pub const FRAME_TX_STATUS: u8 = 0x89;
pub const FRAME_MODEM_STATUS: u8 = 0x8A;
pub const FRAME_TRANSMIT_STATUS: u8 = 0x8B;
pub const FRAME_RECEIVE_PACKET: u8 = 0x90;
pub const FRAME_NODE_IDENTIFICATION: u8 = 0x95;
pub const FRAME_REMOTE_AT_COMMAND_RESPONSE: u8 = 0x97;

/// Remote AT command option: apply the change immediately.
pub const REMOTE_AT_APPLY_CHANGES: u8 = 0x02;

/// Receive option bit set when the packet was sent to the broadcast address.
pub const RECEIVE_BROADCAST: u8 = 0x02;

/// Two-character name of an AT command, such as `NI` or `ND`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtName(pub [u8; 2]);

impl AtName {
    pub const ND: AtName = AtName(*b"ND");
    pub const AS: AtName = AtName(*b"AS");
    pub const NI: AtName = AtName(*b"NI");
    pub const NT: AtName = AtName(*b"NT");
    pub const NO: AtName = AtName(*b"NO");

    /// Returns `None` unless `name` is exactly two ASCII characters.
    pub fn new(name: &str) -> Option<Self> {
        let b = name.as_bytes();
        if b.len() != 2 || !b.iter().all(|c| c.is_ascii_graphic()) {
            return None;
        }
        Some(AtName([b[0].to_ascii_uppercase(), b[1].to_ascii_uppercase()]))
    }
}

impl fmt::Display for AtName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.0[0] as char, self.0[1] as char)
    }
}

impl fmt::Debug for AtName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AtName({self})")
    }
}

/// One decoded API frame.
///
/// `frame_id` 0 on a request means that no response is wanted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiFrame {
    AtCommand {
        frame_id: u8,
        command: AtName,
        parameter: Vec<u8>,
    },
    /// Like `AtCommand`, but the change is not applied until `AC` is issued.
    AtCommandQueue {
        frame_id: u8,
        command: AtName,
        parameter: Vec<u8>,
    },
    AtCommandResponse {
        frame_id: u8,
        command: AtName,
        status: AtCommandStatus,
        value: Vec<u8>,
    },
    RemoteAtCommand {
        frame_id: u8,
        dest64: XBee64BitAddress,
        dest16: XBee16BitAddress,
        options: u8,
        command: AtName,
        parameter: Vec<u8>,
    },
    RemoteAtCommandResponse {
        frame_id: u8,
        source64: XBee64BitAddress,
        source16: XBee16BitAddress,
        command: AtName,
        status: AtCommandStatus,
        value: Vec<u8>,
    },
    TransmitRequest {
        frame_id: u8,
        dest64: XBee64BitAddress,
        dest16: XBee16BitAddress,
        radius: u8,
        options: u8,
        data: Vec<u8>,
    },
    /// 802.15.4 transmission to a 64-bit address.
    Tx64Request {
        frame_id: u8,
        dest64: XBee64BitAddress,
        options: u8,
        data: Vec<u8>,
    },
    /// 802.15.4 transmission to a 16-bit address.
    Tx16Request {
        frame_id: u8,
        dest16: XBee16BitAddress,
        options: u8,
        data: Vec<u8>,
    },
    TransmitStatus {
        frame_id: u8,
        dest16: XBee16BitAddress,
        retry_count: u8,
        delivery: DeliveryStatus,
        discovery: u8,
    },
    /// 802.15.4 transmit status.
    TxStatus {
        frame_id: u8,
        delivery: DeliveryStatus,
    },
    ReceivePacket {
        source64: XBee64BitAddress,
        source16: XBee16BitAddress,
        options: u8,
        data: Vec<u8>,
    },
    Rx64Packet {
        source64: XBee64BitAddress,
        rssi: u8,
        options: u8,
        data: Vec<u8>,
    },
    Rx16Packet {
        source16: XBee16BitAddress,
        rssi: u8,
        options: u8,
        data: Vec<u8>,
    },
    /// Sent unsolicited when a radio joins or announces itself with the commissioning button.
    NodeIdentification {
        source64: XBee64BitAddress,
        source16: XBee16BitAddress,
        options: u8,
        record: NodeRecord,
    },
    ModemStatus(ModemStatus),
    /// Any frame type this library does not interpret.
    Raw { frame_type: u8, payload: Vec<u8> },
}

/// Reasons a candidate frame was thrown away by the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    ChecksumMismatch { expected: u8, actual: u8 },
    Truncated { frame_type: u8, len: usize },
    EmptyFrame,
    /// The length field exceeds anything a radio sends.
    TooLong(usize),
    /// A new start delimiter turned up before the candidate frame was complete.
    Interrupted,
}

impl ApiFrame {
    pub fn frame_type(&self) -> u8 {
        match self {
            ApiFrame::AtCommand { .. } => FRAME_AT_COMMAND,
            ApiFrame::AtCommandQueue { .. } => FRAME_AT_COMMAND_QUEUE,
            ApiFrame::AtCommandResponse { .. } => FRAME_AT_COMMAND_RESPONSE,
            ApiFrame::RemoteAtCommand { .. } => FRAME_REMOTE_AT_COMMAND,
            ApiFrame::RemoteAtCommandResponse { .. } => FRAME_REMOTE_AT_COMMAND_RESPONSE,
            ApiFrame::TransmitRequest { .. } => FRAME_TRANSMIT_REQUEST,
            ApiFrame::Tx64Request { .. } => FRAME_TX_64,
            ApiFrame::Tx16Request { .. } => FRAME_TX_16,
            ApiFrame::TransmitStatus { .. } => FRAME_TRANSMIT_STATUS,
            ApiFrame::TxStatus { .. } => FRAME_TX_STATUS,
            ApiFrame::ReceivePacket { .. } => FRAME_RECEIVE_PACKET,
            ApiFrame::Rx64Packet { .. } => FRAME_RX_64,
            ApiFrame::Rx16Packet { .. } => FRAME_RX_16,
            ApiFrame::NodeIdentification { .. } => FRAME_NODE_IDENTIFICATION,
            ApiFrame::ModemStatus(_) => FRAME_MODEM_STATUS,
            ApiFrame::Raw { frame_type, .. } => *frame_type,
        }
    }

    /// Frame ID used to correlate this frame with a request or response, if the type has one.
    pub fn frame_id(&self) -> Option<u8> {
        match self {
            ApiFrame::AtCommand { frame_id, .. }
            | ApiFrame::AtCommandQueue { frame_id, .. }
            | ApiFrame::AtCommandResponse { frame_id, .. }
            | ApiFrame::RemoteAtCommand { frame_id, .. }
            | ApiFrame::RemoteAtCommandResponse { frame_id, .. }
            | ApiFrame::TransmitRequest { frame_id, .. }
            | ApiFrame::Tx64Request { frame_id, .. }
            | ApiFrame::Tx16Request { frame_id, .. }
            | ApiFrame::TransmitStatus { frame_id, .. }
            | ApiFrame::TxStatus { frame_id, .. } => Some(*frame_id),
            _ => None,
        }
    }

    /// Return a copy of this request frame carrying a different frame ID.
    ///
    /// Frames without a frame ID are returned unchanged.
    pub fn with_frame_id(mut self, id: u8) -> Self {
        match &mut self {
            ApiFrame::AtCommand { frame_id, .. }
            | ApiFrame::AtCommandQueue { frame_id, .. }
            | ApiFrame::AtCommandResponse { frame_id, .. }
            | ApiFrame::RemoteAtCommand { frame_id, .. }
            | ApiFrame::RemoteAtCommandResponse { frame_id, .. }
            | ApiFrame::TransmitRequest { frame_id, .. }
            | ApiFrame::Tx64Request { frame_id, .. }
            | ApiFrame::Tx16Request { frame_id, .. }
            | ApiFrame::TransmitStatus { frame_id, .. }
            | ApiFrame::TxStatus { frame_id, .. } => *frame_id = id,
            _ => (),
        }
        self
    }

    /// Serialise the frame data: the type byte followed by the type-specific payload.
    pub fn to_frame_data(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16);
        out.push(self.frame_type());
        match self {
            ApiFrame::AtCommand {
                frame_id,
                command,
                parameter,
            }
            | ApiFrame::AtCommandQueue {
                frame_id,
                command,
                parameter,
            } => {
                out.push(*frame_id);
                out.extend_from_slice(&command.0);
                out.extend_from_slice(parameter);
            }
            ApiFrame::AtCommandResponse {
                frame_id,
                command,
                status,
                value,
            } => {
                out.push(*frame_id);
                out.extend_from_slice(&command.0);
                out.push(status.as_byte());
                out.extend_from_slice(value);
            }
            ApiFrame::RemoteAtCommand {
                frame_id,
                dest64,
                dest16,
                options,
                command,
                parameter,
            } => {
                out.push(*frame_id);
                out.extend_from_slice(&dest64.to_bytes());
                out.extend_from_slice(&dest16.to_bytes());
                out.push(*options);
                out.extend_from_slice(&command.0);
                out.extend_from_slice(parameter);
            }
            ApiFrame::RemoteAtCommandResponse {
                frame_id,
                source64,
                source16,
                command,
                status,
                value,
            } => {
                out.push(*frame_id);
                out.extend_from_slice(&source64.to_bytes());
                out.extend_from_slice(&source16.to_bytes());
                out.extend_from_slice(&command.0);
                out.push(status.as_byte());
                out.extend_from_slice(value);
            }
            ApiFrame::TransmitRequest {
                frame_id,
                dest64,
                dest16,
                radius,
                options,
                data,
            } => {
                out.push(*frame_id);
                out.extend_from_slice(&dest64.to_bytes());
                out.extend_from_slice(&dest16.to_bytes());
                out.push(*radius);
                out.push(*options);
                out.extend_from_slice(data);
            }
            ApiFrame::Tx64Request {
                frame_id,
                dest64,
                options,
                data,
            } => {
                out.push(*frame_id);
                out.extend_from_slice(&dest64.to_bytes());
                out.push(*options);
                out.extend_from_slice(data);
            }
            ApiFrame::Tx16Request {
                frame_id,
                dest16,
                options,
                data,
            } => {
                out.push(*frame_id);
                out.extend_from_slice(&dest16.to_bytes());
                out.push(*options);
                out.extend_from_slice(data);
            }
            ApiFrame::TransmitStatus {
                frame_id,
                dest16,
                retry_count,
                delivery,
                discovery,
            } => {
                out.push(*frame_id);
                out.extend_from_slice(&dest16.to_bytes());
                out.push(*retry_count);
                out.push(delivery.as_byte());
                out.push(*discovery);
            }
            ApiFrame::TxStatus { frame_id, delivery } => {
                out.push(*frame_id);
                out.push(delivery.as_byte());
            }
            ApiFrame::ReceivePacket {
                source64,
                source16,
                options,
                data,
            } => {
                out.extend_from_slice(&source64.to_bytes());
                out.extend_from_slice(&source16.to_bytes());
                out.push(*options);
                out.extend_from_slice(data);
            }
            ApiFrame::Rx64Packet {
                source64,
                rssi,
                options,
                data,
            } => {
                out.extend_from_slice(&source64.to_bytes());
                out.push(*rssi);
                out.push(*options);
                out.extend_from_slice(data);
            }
            ApiFrame::Rx16Packet {
                source16,
                rssi,
                options,
                data,
            } => {
                out.extend_from_slice(&source16.to_bytes());
                out.push(*rssi);
                out.push(*options);
                out.extend_from_slice(data);
            }
            ApiFrame::NodeIdentification {
                source64,
                source16,
                options,
                record,
            } => {
                out.extend_from_slice(&source64.to_bytes());
                out.extend_from_slice(&source16.to_bytes());
                out.push(*options);
                out.extend_from_slice(&record.to_bytes(XBeeProtocol::ZigBee));
            }
            ApiFrame::ModemStatus(status) => out.push(status.as_byte()),
            ApiFrame::Raw { payload, .. } => out.extend_from_slice(payload),
        }
        out
    }

    /// Interpret frame data (type byte plus payload) taken from a valid API frame.
    pub fn parse(frame_data: &[u8]) -> Result<Self, FrameError> {
        let Some((&frame_type, payload)) = frame_data.split_first() else {
            return Err(FrameError::EmptyFrame);
        };
        let mut r = Reader::new(payload);
        let frame = parse_payload(frame_type, &mut r).ok_or(FrameError::Truncated {
            frame_type,
            len: payload.len(),
        })?;
        // Fixed-size frames with extra bytes are kept whole rather than trimmed
        if r.remaining() > 0 {
            return Ok(ApiFrame::Raw {
                frame_type,
                payload: payload.to_vec(),
            });
        }
        Ok(frame)
    }
}

fn parse_payload(frame_type: u8, r: &mut Reader<'_>) -> Option<ApiFrame> {
    Some(match frame_type {
        FRAME_AT_COMMAND => ApiFrame::AtCommand {
            frame_id: r.u8()?,
            command: r.at_name()?,
            parameter: r.rest(),
        },
        FRAME_AT_COMMAND_QUEUE => ApiFrame::AtCommandQueue {
            frame_id: r.u8()?,
            command: r.at_name()?,
            parameter: r.rest(),
        },
        FRAME_AT_COMMAND_RESPONSE => ApiFrame::AtCommandResponse {
            frame_id: r.u8()?,
            command: r.at_name()?,
            status: AtCommandStatus::from_byte(r.u8()?),
            value: r.rest(),
        },
        FRAME_REMOTE_AT_COMMAND => ApiFrame::RemoteAtCommand {
            frame_id: r.u8()?,
            dest64: r.addr64()?,
            dest16: r.addr16()?,
            options: r.u8()?,
            command: r.at_name()?,
            parameter: r.rest(),
        },
        FRAME_REMOTE_AT_COMMAND_RESPONSE => ApiFrame::RemoteAtCommandResponse {
            frame_id: r.u8()?,
            source64: r.addr64()?,
            source16: r.addr16()?,
            command: r.at_name()?,
            status: AtCommandStatus::from_byte(r.u8()?),
            value: r.rest(),
        },
        FRAME_TRANSMIT_REQUEST => ApiFrame::TransmitRequest {
            frame_id: r.u8()?,
            dest64: r.addr64()?,
            dest16: r.addr16()?,
            radius: r.u8()?,
            options: r.u8()?,
            data: r.rest(),
        },
        FRAME_TX_64 => ApiFrame::Tx64Request {
            frame_id: r.u8()?,
            dest64: r.addr64()?,
            options: r.u8()?,
            data: r.rest(),
        },
        FRAME_TX_16 => ApiFrame::Tx16Request {
            frame_id: r.u8()?,
            dest16: r.addr16()?,
            options: r.u8()?,
            data: r.rest(),
        },
        FRAME_TRANSMIT_STATUS => ApiFrame::TransmitStatus {
            frame_id: r.u8()?,
            dest16: r.addr16()?,
            retry_count: r.u8()?,
            delivery: DeliveryStatus::from_byte(r.u8()?),
            discovery: r.u8()?,
        },
        FRAME_TX_STATUS => ApiFrame::TxStatus {
            frame_id: r.u8()?,
            delivery: DeliveryStatus::from_byte(r.u8()?),
        },
        FRAME_RECEIVE_PACKET => ApiFrame::ReceivePacket {
            source64: r.addr64()?,
            source16: r.addr16()?,
            options: r.u8()?,
            data: r.rest(),
        },
        FRAME_RX_64 => ApiFrame::Rx64Packet {
            source64: r.addr64()?,
            rssi: r.u8()?,
            options: r.u8()?,
            data: r.rest(),
        },
        FRAME_RX_16 => ApiFrame::Rx16Packet {
            source16: r.addr16()?,
            rssi: r.u8()?,
            options: r.u8()?,
            data: r.rest(),
        },
        FRAME_NODE_IDENTIFICATION => ApiFrame::NodeIdentification {
            source64: r.addr64()?,
            source16: r.addr16()?,
            options: r.u8()?,
            record: NodeRecord::parse(XBeeProtocol::ZigBee, &r.rest())?,
        },
        FRAME_MODEM_STATUS => ApiFrame::ModemStatus(ModemStatus::from_byte(r.u8()?)),
        _ => ApiFrame::Raw {
            frame_type,
            payload: r.rest(),
        },
    })
}
