use core::fmt;
use core::str::FromStr;

/// Globally unique 64-bit address of a radio, made up of its `SH` and `SL` parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct XBee64BitAddress(pub u64);

impl XBee64BitAddress {
    /// Sentinel used when the 64-bit address of a radio has not been learned.
    pub const UNKNOWN: Self = Self(0xFFFF_FFFF_FFFF_FFFF);
    pub const BROADCAST: Self = Self(0x0000_0000_0000_FFFF);
    pub const COORDINATOR: Self = Self(0);

    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(u64::from_be_bytes(bytes))
    }

    pub fn to_bytes(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// True if this address can identify a single radio.
    pub fn is_known(&self) -> bool {
        *self != Self::UNKNOWN && *self != Self::BROADCAST
    }
}

impl fmt::Display for XBee64BitAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}", self.0)
    }
}

impl FromStr for XBee64BitAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hex(s, 16).map(Self)
    }
}

/// Network-local 16-bit address. May be reassigned by the network at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct XBee16BitAddress(pub u16);

impl XBee16BitAddress {
    /// Sentinel used when the 16-bit address is unknown or not used by the protocol.
    pub const UNKNOWN: Self = Self(0xFFFE);
    pub const BROADCAST: Self = Self(0xFFFF);
    pub const COORDINATOR: Self = Self(0);

    pub fn to_bytes(&self) -> [u8; 2] {
        self.0.to_be_bytes()
    }

    pub fn is_known(&self) -> bool {
        *self != Self::UNKNOWN && *self != Self::BROADCAST
    }
}

impl fmt::Display for XBee16BitAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.0)
    }
}

impl FromStr for XBee16BitAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hex(s, 4).map(|v| Self(v as u16))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressParseError {
    Empty,
    TooLong(usize),
    InvalidDigit(char),
}

impl fmt::Display for AddressParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressParseError::Empty => write!(f, "address is empty"),
            AddressParseError::TooLong(n) => write!(f, "address has {n} hex digits, too many"),
            AddressParseError::InvalidDigit(c) => write!(f, "'{c}' is not a hex digit"),
        }
    }
}

impl core::error::Error for AddressParseError {}

fn parse_hex(s: &str, max_digits: usize) -> Result<u64, AddressParseError> {
    let s = s.trim();
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    if s.is_empty() {
        return Err(AddressParseError::Empty);
    }
    if s.len() > max_digits {
        return Err(AddressParseError::TooLong(s.len()));
    }
    let mut out = 0u64;
    for c in s.chars() {
        let d = c.to_digit(16).ok_or(AddressParseError::InvalidDigit(c))?;
        out = (out << 4) | d as u64;
    }
    Ok(out)
}
