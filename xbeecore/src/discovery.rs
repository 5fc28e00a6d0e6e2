//! Parsing of the replies produced by the `ND` (node discovery) and `AS` (active scan)
//! commands.
//!
//! Both commands can be answered many times, once per remote radio or access point.
//! A reply which is missing a mandatory field is not an error: the parsers return `None`
//! and the reply is ignored by the caller.

use alloc::string::String;
use alloc::vec::Vec;

use crate::address::{XBee16BitAddress, XBee64BitAddress};
use crate::protocol::{EncryptionType, NodeRole, XBeeProtocol};
use crate::wire::Reader;

/// `NO` option bit: append the DD value to discovery replies.
pub const NO_APPEND_DD: u8 = 0x01;
/// `NO` option bit: the local radio answers its own ND.
pub const NO_SELF_RESPONSE: u8 = 0x02;
/// `NO` option bit: append the RSSI of the last hop (DigiMesh).
pub const NO_APPEND_RSSI: u8 = 0x04;

/// Information about one remote radio, as reported by node discovery.
///
/// Fields which a protocol does not report hold their sentinel or default value:
/// 802.15.4 has no parent, role or profile, and reports RSSI in every reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    pub addr16: XBee16BitAddress,
    pub addr64: XBee64BitAddress,
    pub node_id: String,
    pub parent16: XBee16BitAddress,
    pub role: NodeRole,
    pub status: u8,
    pub profile_id: u16,
    pub manufacturer_id: u16,
    pub device_type_id: Option<u32>,
    /// Signal strength of the reply in -dBm.
    pub rssi: Option<u8>,
}

impl NodeRecord {
    /// Parse the value of one ND reply using the layout of the given protocol.
    pub fn parse(protocol: XBeeProtocol, data: &[u8]) -> Option<Self> {
        let mut r = Reader::new(data);
        if protocol == XBeeProtocol::Raw802_15_4 {
            let addr16 = r.addr16()?;
            let addr64 = r.addr64()?;
            let rssi = r.u8()?;
            let node_id = r.trailing_string();
            return Some(NodeRecord {
                addr16,
                addr64,
                node_id,
                parent16: XBee16BitAddress::UNKNOWN,
                role: NodeRole::Unknown(0xFF),
                status: 0,
                profile_id: 0,
                manufacturer_id: 0,
                device_type_id: None,
                rssi: Some(rssi),
            });
        }
        let addr16 = r.addr16()?;
        let addr64 = r.addr64()?;
        let node_id = r.cstring()?;
        let parent16 = r.addr16()?;
        let role = NodeRole::from_byte(r.u8()?);
        let status = r.u8()?;
        let profile_id = r.u16()?;
        let manufacturer_id = r.u16()?;
        let device_type_id = if r.remaining() >= 4 { r.u32() } else { None };
        let rssi = r.u8();
        Some(NodeRecord {
            addr16,
            addr64,
            node_id,
            parent16,
            role,
            status,
            profile_id,
            manufacturer_id,
            device_type_id,
            rssi,
        })
    }

    /// Serialise in the layout a radio of the given protocol would use.
    pub fn to_bytes(&self, protocol: XBeeProtocol) -> Vec<u8> {
        let mut out = Vec::with_capacity(32);
        out.extend_from_slice(&self.addr16.to_bytes());
        out.extend_from_slice(&self.addr64.to_bytes());
        if protocol == XBeeProtocol::Raw802_15_4 {
            out.push(self.rssi.unwrap_or(0));
            out.extend_from_slice(self.node_id.as_bytes());
            out.push(0);
            return out;
        }
        out.extend_from_slice(self.node_id.as_bytes());
        out.push(0);
        out.extend_from_slice(&self.parent16.to_bytes());
        out.push(self.role.as_byte());
        out.push(self.status);
        out.extend_from_slice(&self.profile_id.to_be_bytes());
        out.extend_from_slice(&self.manufacturer_id.to_be_bytes());
        if let Some(dd) = self.device_type_id {
            out.extend_from_slice(&dd.to_be_bytes());
        }
        if let Some(rssi) = self.rssi {
            out.push(rssi);
        }
        out
    }
}

/// One access point found by a Wi-Fi active scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPointRecord {
    pub ssid: String,
    pub encryption: EncryptionType,
    pub channel: u8,
    /// Link quality as a percentage.
    pub signal_quality: u8,
}

impl AccessPointRecord {
    /// Parse the value of one AS reply: version, channel, encryption, signal strength, SSID.
    ///
    /// Replies shorter than four bytes or of an unrecognised scan version produce `None`.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let mut r = Reader::new(data);
        let version = r.u8()?;
        let channel = r.u8()?;
        let encryption = EncryptionType::from_byte(r.u8()?);
        let signal_strength = r.u8()? as i8;
        let ssid = String::from_utf8_lossy(&r.rest()).into_owned();
        let signal_quality = signal_quality(version, signal_strength as i32)?;
        Some(AccessPointRecord {
            ssid,
            encryption,
            channel,
            signal_quality,
        })
    }
}

/// Convert a signal strength in dBm to a 0-100 link quality for the given scan version.
///
/// Version 1 maps -100..=-50 dBm linearly onto 0..=100. Version 2 maps -100..=0 dBm.
/// Values outside the range are clipped.
pub fn signal_quality(version: u8, dbm: i32) -> Option<u8> {
    let quality = match version {
        1 => 2 * (dbm + 100),
        2 => dbm + 100,
        _ => return None,
    };
    Some(quality.clamp(0, 100) as u8)
}
