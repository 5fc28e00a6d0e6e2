use std::fmt;
use std::sync::{Arc, RwLock, Weak};

use log::debug;
use xbeecore::address::{XBee16BitAddress, XBee64BitAddress};
use xbeecore::discovery::NodeRecord;
use xbeecore::frame::{ApiFrame, AtName, REMOTE_AT_APPLY_CHANGES};
use xbeecore::protocol::{NodeRole, XBeeProtocol};

use crate::device::{DeviceInner, XBeeDevice, at_response_value, parse_at_name};
use crate::error::{Result, XBeeError};

/// A radio elsewhere in the network, reached through a local `XBeeDevice`.
///
/// Its kind follows the protocol of the local radio it was found through. Details learned
/// later (for example by a repeated discovery) are merged in place, so one instance can be
/// shared by everything that refers to the same radio.
pub struct RemoteXBeeDevice {
    local: Weak<DeviceInner>,
    protocol: XBeeProtocol,
    state: RwLock<RemoteState>,
}

#[derive(Debug, Clone)]
struct RemoteState {
    addr64: XBee64BitAddress,
    addr16: XBee16BitAddress,
    node_id: Option<String>,
    parent16: XBee16BitAddress,
    role: NodeRole,
    rssi: Option<u8>,
    hardware_version: Vec<u8>,
    firmware_version: Vec<u8>,
}

impl RemoteXBeeDevice {
    /// Construct the remote device kind that matches `protocol`.
    ///
    /// DigiMesh and DigiPoint radios have no fixed 16-bit address so any given one is dropped.
    pub fn for_protocol(
        local: &XBeeDevice,
        protocol: XBeeProtocol,
        addr64: XBee64BitAddress,
        addr16: XBee16BitAddress,
        node_id: Option<String>,
    ) -> Self {
        let addr16 = if protocol.has_16bit_addressing() {
            addr16
        } else {
            XBee16BitAddress::UNKNOWN
        };
        Self {
            local: Arc::downgrade(&local.inner),
            protocol,
            state: RwLock::new(RemoteState {
                addr64,
                addr16,
                node_id,
                parent16: XBee16BitAddress::UNKNOWN,
                role: NodeRole::Unknown(0xFF),
                rssi: None,
                hardware_version: vec![],
                firmware_version: vec![],
            }),
        }
    }

    /// A remote device of the same protocol as `local`.
    pub fn new(
        local: &XBeeDevice,
        addr64: XBee64BitAddress,
        addr16: XBee16BitAddress,
        node_id: Option<String>,
    ) -> Self {
        Self::for_protocol(local, local.protocol(), addr64, addr16, node_id)
    }

    /// Build a remote device from a node discovery reply.
    pub fn from_record(local: &XBeeDevice, record: &NodeRecord) -> Self {
        let device = Self::new(
            local,
            record.addr64,
            record.addr16,
            Some(record.node_id.clone()),
        );
        {
            let mut state = device.state.write().unwrap();
            state.parent16 = record.parent16;
            state.role = record.role;
            state.rssi = record.rssi;
        }
        device
    }

    pub fn protocol(&self) -> XBeeProtocol {
        self.protocol
    }

    pub fn addr64(&self) -> XBee64BitAddress {
        self.state.read().unwrap().addr64
    }

    pub fn addr16(&self) -> XBee16BitAddress {
        self.state.read().unwrap().addr16
    }

    pub fn node_id(&self) -> Option<String> {
        self.state.read().unwrap().node_id.clone()
    }

    pub fn parent16(&self) -> XBee16BitAddress {
        self.state.read().unwrap().parent16
    }

    pub fn role(&self) -> NodeRole {
        self.state.read().unwrap().role
    }

    /// Signal strength of the last discovery reply in -dBm, where the protocol reports it.
    pub fn rssi(&self) -> Option<u8> {
        self.state.read().unwrap().rssi
    }

    pub fn hardware_version(&self) -> Vec<u8> {
        self.state.read().unwrap().hardware_version.clone()
    }

    pub fn firmware_version(&self) -> Vec<u8> {
        self.state.read().unwrap().firmware_version.clone()
    }

    /// Merge what `other` knows about the same radio into this device.
    ///
    /// A known node identifier or address in `other` replaces ours; unknown values never
    /// overwrite known ones.
    pub(crate) fn update_from(&self, other: &RemoteXBeeDevice) {
        if std::ptr::eq(self, other) {
            return;
        }
        let incoming = other.state.read().unwrap().clone();
        let mut state = self.state.write().unwrap();
        if incoming.node_id.is_some() {
            state.node_id = incoming.node_id;
        }
        if incoming.addr64.is_known() {
            state.addr64 = incoming.addr64;
        }
        if incoming.addr16.is_known() && self.protocol.has_16bit_addressing() {
            state.addr16 = incoming.addr16;
        }
        if incoming.parent16 != XBee16BitAddress::UNKNOWN {
            state.parent16 = incoming.parent16;
        }
        if !matches!(incoming.role, NodeRole::Unknown(_)) {
            state.role = incoming.role;
        }
        if incoming.rssi.is_some() {
            state.rssi = incoming.rssi;
        }
        if !incoming.hardware_version.is_empty() {
            state.hardware_version = incoming.hardware_version;
        }
        if !incoming.firmware_version.is_empty() {
            state.firmware_version = incoming.firmware_version;
        }
    }

    fn local(&self) -> Result<XBeeDevice> {
        self.local
            .upgrade()
            .map(|inner| XBeeDevice { inner })
            .ok_or(XBeeError::ConnectionNotOpen)
    }

    fn remote_at(&self, command: AtName, parameter: Vec<u8>) -> Result<Vec<u8>> {
        let local = self.local()?;
        let (addr64, addr16) = (self.addr64(), self.addr16());
        // Prefer the 64-bit address; the 16-bit one may be stale
        let (dest64, dest16) = if addr64.is_known() {
            (addr64, XBee16BitAddress::UNKNOWN)
        } else if addr16.is_known() {
            (XBee64BitAddress::UNKNOWN, addr16)
        } else {
            return Err(XBeeError::InvalidParameter(
                "remote device has neither a 64-bit nor a 16-bit address".into(),
            ));
        };
        let request = ApiFrame::RemoteAtCommand {
            frame_id: 0,
            dest64,
            dest16,
            options: REMOTE_AT_APPLY_CHANGES,
            command,
            parameter,
        };
        let response = local.send_frame_sync(request, local.config().receive_timeout)?;
        at_response_value(command, response)
    }

    pub fn get_parameter(&self, name: &str) -> Result<Vec<u8>> {
        self.remote_at(parse_at_name(name)?, vec![])
    }

    pub fn set_parameter(&self, name: &str, value: &[u8]) -> Result<()> {
        self.remote_at(parse_at_name(name)?, value.to_vec())
            .map(|_| ())
    }

    pub fn execute_command(&self, name: &str) -> Result<()> {
        self.remote_at(parse_at_name(name)?, vec![]).map(|_| ())
    }

    /// Read identity and firmware from the remote radio and check it runs the expected protocol.
    pub fn read_device_info(&self) -> Result<()> {
        let hardware_version = self.get_parameter("HV")?;
        let firmware_version = self.get_parameter("VR")?;
        let actual = XBeeProtocol::determine(&hardware_version, &firmware_version);
        if actual != XBeeProtocol::Unknown && actual != self.protocol {
            return Err(XBeeError::ProtocolMismatch {
                expected: self.protocol,
                actual,
            });
        }
        let node_id = String::from_utf8_lossy(&self.get_parameter("NI")?).into_owned();
        let addr16 = if self.protocol.has_16bit_addressing() {
            let my = self.get_parameter("MY")?;
            (my.len() == 2).then(|| XBee16BitAddress(u16::from_be_bytes([my[0], my[1]])))
        } else {
            None
        };
        debug!("remote XBee {} is '{node_id}'", self.addr64());

        let mut state = self.state.write().unwrap();
        state.hardware_version = hardware_version;
        state.firmware_version = firmware_version;
        state.node_id = Some(node_id);
        if let Some(addr16) = addr16 {
            state.addr16 = addr16;
        }
        Ok(())
    }
}

impl fmt::Debug for RemoteXBeeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read().unwrap();
        f.debug_struct("RemoteXBeeDevice")
            .field("protocol", &self.protocol)
            .field("addr64", &state.addr64)
            .field("addr16", &state.addr16)
            .field("node_id", &state.node_id)
            .finish()
    }
}

impl fmt::Display for RemoteXBeeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read().unwrap();
        match &state.node_id {
            Some(ni) if !ni.is_empty() => write!(f, "{} - {ni}", state.addr64),
            _ => write!(f, "{}", state.addr64),
        }
    }
}
