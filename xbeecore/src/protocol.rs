use core::fmt;

/// Radio protocol family running on an XBee, as determined from its firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XBeeProtocol {
    Raw802_15_4,
    DigiMesh,
    DigiPoint,
    ZigBee,
    Cellular,
    XBeeWifi,
    Unknown,
}

impl XBeeProtocol {
    /// Work out the protocol from the `HV` (hardware version) and `VR` (firmware version)
    /// parameters.
    ///
    /// Only the hardware families this library has been used with are recognised.
    /// Anything else is `Unknown`, which never causes a protocol mismatch.
    pub fn determine(hardware_version: &[u8], firmware_version: &[u8]) -> Self {
        let (Some(hw), Some(fw)) = (hardware_version.first(), firmware_version.first()) else {
            return XBeeProtocol::Unknown;
        };
        let fw_family = fw >> 4;
        match hw {
            // Series 1
            0x17 | 0x18 => {
                if fw_family == 0x8 {
                    XBeeProtocol::DigiMesh
                } else {
                    XBeeProtocol::Raw802_15_4
                }
            }
            // Series 2 / 2B
            0x19 | 0x1A | 0x1E => XBeeProtocol::ZigBee,
            // S6 / S6B Wi-Fi
            0x1F | 0x27 => XBeeProtocol::XBeeWifi,
            // Series 2C runs all three 2.4 GHz stacks
            0x21 | 0x22 => match fw_family {
                0x2 => XBeeProtocol::Raw802_15_4,
                0x9 => XBeeProtocol::DigiMesh,
                _ => XBeeProtocol::ZigBee,
            },
            // Sub-GHz modules
            0x23..=0x25 => {
                if fw_family == 0x2 {
                    XBeeProtocol::DigiPoint
                } else {
                    XBeeProtocol::DigiMesh
                }
            }
            0x44..=0x4B => XBeeProtocol::Cellular,
            _ => XBeeProtocol::Unknown,
        }
    }

    /// Whether remote radios keep a stable 16-bit network address that can be used for lookup.
    pub fn has_16bit_addressing(&self) -> bool {
        !matches!(self, XBeeProtocol::DigiMesh | XBeeProtocol::DigiPoint)
    }

    pub fn supports_node_discovery(&self) -> bool {
        matches!(
            self,
            XBeeProtocol::Raw802_15_4
                | XBeeProtocol::DigiMesh
                | XBeeProtocol::DigiPoint
                | XBeeProtocol::ZigBee
        )
    }

    pub fn supports_access_point_scan(&self) -> bool {
        *self == XBeeProtocol::XBeeWifi
    }

    /// 802.15.4 radios finish an ND with an empty reply. Everything else simply stops answering.
    pub fn has_discovery_terminator(&self) -> bool {
        *self == XBeeProtocol::Raw802_15_4
    }
}

impl fmt::Display for XBeeProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            XBeeProtocol::Raw802_15_4 => "802.15.4",
            XBeeProtocol::DigiMesh => "DigiMesh",
            XBeeProtocol::DigiPoint => "DigiPoint",
            XBeeProtocol::ZigBee => "ZigBee",
            XBeeProtocol::Cellular => "Cellular",
            XBeeProtocol::XBeeWifi => "Wi-Fi",
            XBeeProtocol::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// Serial interface mode configured with the `AP` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    /// Transparent mode. API frames cannot be used.
    At,
    /// API mode 1.
    Api,
    /// API mode 2, with escaping of control characters.
    ApiEscape,
    Unknown,
}

impl OperatingMode {
    pub fn is_api(&self) -> bool {
        matches!(self, OperatingMode::Api | OperatingMode::ApiEscape)
    }

    pub fn is_escaped(&self) -> bool {
        *self == OperatingMode::ApiEscape
    }
}

/// Status byte of an AT command response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtCommandStatus {
    Ok,
    Error,
    InvalidCommand,
    InvalidParameter,
    TxFailure,
    Unknown(u8),
}

impl AtCommandStatus {
    pub fn from_byte(b: u8) -> Self {
        match b {
            0 => AtCommandStatus::Ok,
            1 => AtCommandStatus::Error,
            2 => AtCommandStatus::InvalidCommand,
            3 => AtCommandStatus::InvalidParameter,
            4 => AtCommandStatus::TxFailure,
            b => AtCommandStatus::Unknown(b),
        }
    }

    pub fn as_byte(&self) -> u8 {
        match self {
            AtCommandStatus::Ok => 0,
            AtCommandStatus::Error => 1,
            AtCommandStatus::InvalidCommand => 2,
            AtCommandStatus::InvalidParameter => 3,
            AtCommandStatus::TxFailure => 4,
            AtCommandStatus::Unknown(b) => *b,
        }
    }
}

impl fmt::Display for AtCommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtCommandStatus::Ok => write!(f, "OK"),
            AtCommandStatus::Error => write!(f, "ERROR"),
            AtCommandStatus::InvalidCommand => write!(f, "invalid command"),
            AtCommandStatus::InvalidParameter => write!(f, "invalid parameter"),
            AtCommandStatus::TxFailure => write!(f, "TX failure"),
            AtCommandStatus::Unknown(b) => write!(f, "unknown status (0x{b:02X})"),
        }
    }
}

/// Delivery status reported by a transmit status frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Success,
    NoAck,
    CcaFailure,
    Purged,
    NetworkAckFailure,
    NotJoined,
    AddressNotFound,
    RouteNotFound,
    PayloadTooLarge,
    Unknown(u8),
}

impl DeliveryStatus {
    pub fn from_byte(b: u8) -> Self {
        match b {
            0x00 => DeliveryStatus::Success,
            0x01 => DeliveryStatus::NoAck,
            0x02 => DeliveryStatus::CcaFailure,
            0x03 => DeliveryStatus::Purged,
            0x21 => DeliveryStatus::NetworkAckFailure,
            0x22 => DeliveryStatus::NotJoined,
            0x24 => DeliveryStatus::AddressNotFound,
            0x25 => DeliveryStatus::RouteNotFound,
            0x74 => DeliveryStatus::PayloadTooLarge,
            b => DeliveryStatus::Unknown(b),
        }
    }

    pub fn as_byte(&self) -> u8 {
        match self {
            DeliveryStatus::Success => 0x00,
            DeliveryStatus::NoAck => 0x01,
            DeliveryStatus::CcaFailure => 0x02,
            DeliveryStatus::Purged => 0x03,
            DeliveryStatus::NetworkAckFailure => 0x21,
            DeliveryStatus::NotJoined => 0x22,
            DeliveryStatus::AddressNotFound => 0x24,
            DeliveryStatus::RouteNotFound => 0x25,
            DeliveryStatus::PayloadTooLarge => 0x74,
            DeliveryStatus::Unknown(b) => *b,
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryStatus::Success => write!(f, "success"),
            DeliveryStatus::NoAck => write!(f, "no acknowledgement received"),
            DeliveryStatus::CcaFailure => write!(f, "clear channel assessment failure"),
            DeliveryStatus::Purged => write!(f, "transmission purged"),
            DeliveryStatus::NetworkAckFailure => write!(f, "network ACK failure"),
            DeliveryStatus::NotJoined => write!(f, "not joined to network"),
            DeliveryStatus::AddressNotFound => write!(f, "address not found"),
            DeliveryStatus::RouteNotFound => write!(f, "route not found"),
            DeliveryStatus::PayloadTooLarge => write!(f, "payload too large"),
            DeliveryStatus::Unknown(b) => write!(f, "unknown delivery status (0x{b:02X})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModemStatus {
    HardwareReset,
    WatchdogReset,
    Joined,
    Disassociated,
    CoordinatorStarted,
    Unknown(u8),
}

impl ModemStatus {
    pub fn from_byte(b: u8) -> Self {
        match b {
            0 => ModemStatus::HardwareReset,
            1 => ModemStatus::WatchdogReset,
            2 => ModemStatus::Joined,
            3 => ModemStatus::Disassociated,
            6 => ModemStatus::CoordinatorStarted,
            b => ModemStatus::Unknown(b),
        }
    }

    pub fn as_byte(&self) -> u8 {
        match self {
            ModemStatus::HardwareReset => 0,
            ModemStatus::WatchdogReset => 1,
            ModemStatus::Joined => 2,
            ModemStatus::Disassociated => 3,
            ModemStatus::CoordinatorStarted => 6,
            ModemStatus::Unknown(b) => *b,
        }
    }
}

/// Role of a node in the network, as reported by node discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Coordinator,
    Router,
    EndDevice,
    Unknown(u8),
}

impl NodeRole {
    pub fn from_byte(b: u8) -> Self {
        match b {
            0 => NodeRole::Coordinator,
            1 => NodeRole::Router,
            2 => NodeRole::EndDevice,
            b => NodeRole::Unknown(b),
        }
    }

    pub fn as_byte(&self) -> u8 {
        match self {
            NodeRole::Coordinator => 0,
            NodeRole::Router => 1,
            NodeRole::EndDevice => 2,
            NodeRole::Unknown(b) => *b,
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRole::Coordinator => write!(f, "Coordinator"),
            NodeRole::Router => write!(f, "Router"),
            NodeRole::EndDevice => write!(f, "End device"),
            NodeRole::Unknown(_) => write!(f, "Unknown"),
        }
    }
}

/// Security of a Wi-Fi access point found by an active scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionType {
    None,
    Wpa,
    Wpa2,
    Wep,
    Unknown(u8),
}

impl EncryptionType {
    pub fn from_byte(b: u8) -> Self {
        match b {
            0 => EncryptionType::None,
            1 => EncryptionType::Wpa,
            2 => EncryptionType::Wpa2,
            3 => EncryptionType::Wep,
            b => EncryptionType::Unknown(b),
        }
    }

    pub fn as_byte(&self) -> u8 {
        match self {
            EncryptionType::None => 0,
            EncryptionType::Wpa => 1,
            EncryptionType::Wpa2 => 2,
            EncryptionType::Wep => 3,
            EncryptionType::Unknown(b) => *b,
        }
    }
}

impl fmt::Display for EncryptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncryptionType::None => write!(f, "none"),
            EncryptionType::Wpa => write!(f, "WPA"),
            EncryptionType::Wpa2 => write!(f, "WPA2"),
            EncryptionType::Wep => write!(f, "WEP"),
            EncryptionType::Unknown(b) => write!(f, "unknown (0x{b:02X})"),
        }
    }
}
