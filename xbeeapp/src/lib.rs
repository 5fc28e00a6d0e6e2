#![doc = include_str!("../README.md")]

pub mod device;
pub mod discovery;
pub mod error;
pub mod listener;
pub mod network;
pub mod remote;
pub mod serial;
pub mod transport;

mod correlator;

#[cfg(test)]
mod test_util;

// Definitions from the core crate that appear throughout the public API
pub use xbeecore::address::{XBee16BitAddress, XBee64BitAddress};
pub use xbeecore::frame::{ApiFrame, AtName};
pub use xbeecore::protocol::{OperatingMode, XBeeProtocol};
