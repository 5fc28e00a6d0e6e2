use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::debug;
use xbeecore::address::{XBee16BitAddress, XBee64BitAddress};

use crate::device::{XBeeDevice, be_value};
use crate::discovery::{DiscoveryListener, Flow, RunningGuard, node_discovery};
use crate::error::{Result, XBeeError};
use crate::remote::RemoteXBeeDevice;

/// Used when the radio reports no `NT` value.
const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Registry and discovery settings belonging to one local device.
pub(crate) struct NetworkState {
    registry: Mutex<Registry>,
    /// `None` until set by the caller or read from the radio's `NT`.
    discovery_timeout: Mutex<Option<Duration>>,
}

/// Each remote radio appears once: in `by64` if its 64-bit address is known, otherwise
/// in `by16`.
struct Registry {
    by64: HashMap<XBee64BitAddress, Arc<RemoteXBeeDevice>>,
    by16: HashMap<XBee16BitAddress, Arc<RemoteXBeeDevice>>,
}

impl NetworkState {
    pub(crate) fn new() -> Self {
        Self {
            registry: Mutex::new(Registry {
                by64: HashMap::new(),
                by16: HashMap::new(),
            }),
            discovery_timeout: Mutex::new(None),
        }
    }
}

/// The remote radios reachable through a local XBee.
///
/// Obtained from `XBeeDevice::network`. All handles for one local device share the
/// same registry.
#[derive(Clone)]
pub struct XBeeNetwork {
    device: XBeeDevice,
    state: Arc<NetworkState>,
}

impl XBeeNetwork {
    pub(crate) fn new(device: XBeeDevice, state: Arc<NetworkState>) -> Self {
        Self { device, state }
    }

    pub fn local_device(&self) -> &XBeeDevice {
        &self.device
    }

    /// Add a remote device, or merge it into the entry for the same radio.
    ///
    /// Returns the device now held by the registry, which is the pre-existing instance
    /// when one matched. Returns `None` if neither address of `device` is known.
    pub fn add_remote_device(
        &self,
        device: Arc<RemoteXBeeDevice>,
    ) -> Option<Arc<RemoteXBeeDevice>> {
        let addr64 = device.addr64();
        let addr16 = device.addr16();
        let mut reg = self.state.registry.lock().unwrap();
        if addr64.is_known() {
            if let Some(existing) = reg.by64.get(&addr64) {
                existing.update_from(&device);
                return Some(existing.clone());
            }
            if addr16.is_known() {
                if let Some(existing) = reg.by16.remove(&addr16) {
                    debug!("{addr16} is {addr64}, moving to the 64-bit index");
                    existing.update_from(&device);
                    reg.by64.insert(addr64, existing.clone());
                    return Some(existing);
                }
            }
            reg.by64.insert(addr64, device.clone());
            return Some(device);
        }
        if addr16.is_known() {
            let existing = reg
                .by16
                .get(&addr16)
                .or_else(|| reg.by64.values().find(|d| d.addr16() == addr16))
                .cloned();
            if let Some(existing) = existing {
                existing.update_from(&device);
                return Some(existing);
            }
            reg.by16.insert(addr16, device.clone());
            return Some(device);
        }
        debug!("not adding remote device with no known address");
        None
    }

    /// Add several devices. The result holds the registry's instance for each accepted one.
    pub fn add_remote_devices<I>(&self, devices: I) -> Vec<Arc<RemoteXBeeDevice>>
    where
        I: IntoIterator<Item = Arc<RemoteXBeeDevice>>,
    {
        devices
            .into_iter()
            .filter_map(|d| self.add_remote_device(d))
            .collect()
    }

    /// Remove the entry matching the addresses of `device`, if there is one.
    ///
    /// A device known only by its 16-bit address also matches an entry that has since
    /// learned its 64-bit address.
    pub fn remove_remote_device(&self, device: &RemoteXBeeDevice) {
        let addr64 = device.addr64();
        let addr16 = device.addr16();
        let mut reg = self.state.registry.lock().unwrap();
        if addr64.is_known() {
            reg.by64.remove(&addr64);
        }
        if addr16.is_known() {
            reg.by16.remove(&addr16);
            if !addr64.is_known() {
                reg.by64.retain(|_, d| d.addr16() != addr16);
            }
        }
    }

    pub fn clear(&self) {
        let mut reg = self.state.registry.lock().unwrap();
        reg.by64.clear();
        reg.by16.clear();
    }

    pub fn devices(&self) -> Vec<Arc<RemoteXBeeDevice>> {
        let reg = self.state.registry.lock().unwrap();
        reg.by64.values().chain(reg.by16.values()).cloned().collect()
    }

    pub fn count(&self) -> usize {
        let reg = self.state.registry.lock().unwrap();
        reg.by64.len() + reg.by16.len()
    }

    /// First known device whose node identifier is `node_id`.
    pub fn get_device(&self, node_id: &str) -> Option<Arc<RemoteXBeeDevice>> {
        let reg = self.state.registry.lock().unwrap();
        reg.by64
            .values()
            .chain(reg.by16.values())
            .find(|d| d.node_id().as_deref() == Some(node_id))
            .cloned()
    }

    pub fn get_device_by_64(&self, addr: XBee64BitAddress) -> Option<Arc<RemoteXBeeDevice>> {
        self.state.registry.lock().unwrap().by64.get(&addr).cloned()
    }

    /// Look up a device by its 16-bit network address.
    ///
    /// Fails on protocols where 16-bit addresses are not stable.
    pub fn get_device_by_16(
        &self,
        addr: XBee16BitAddress,
    ) -> Result<Option<Arc<RemoteXBeeDevice>>> {
        let protocol = self.device.protocol();
        if !protocol.has_16bit_addressing() {
            return Err(XBeeError::OperationNotSupported {
                operation: "16-bit address lookup",
                protocol,
            });
        }
        let reg = self.state.registry.lock().unwrap();
        Ok(reg
            .by16
            .get(&addr)
            .or_else(|| reg.by64.values().find(|d| d.addr16() == addr))
            .cloned())
    }

    /// How long node discovery collects replies.
    ///
    /// Unless set with `set_discovery_timeout`, this is read once from the radio's `NT`
    /// parameter, falling back to 10 seconds if the radio reports no value.
    pub fn discovery_timeout(&self) -> Result<Duration> {
        if let Some(timeout) = *self.state.discovery_timeout.lock().unwrap() {
            return Ok(timeout);
        }
        let value = self.device.get_parameter("NT")?;
        let timeout = match be_value(&value) {
            0 => DEFAULT_DISCOVERY_TIMEOUT,
            units => Duration::from_millis(units.saturating_mul(100)),
        };
        debug!("radio discovery timeout is {timeout:?}");
        *self.state.discovery_timeout.lock().unwrap() = Some(timeout);
        Ok(timeout)
    }

    /// Set how long node discovery collects replies, and write it to the radio as `NT`.
    pub fn set_discovery_timeout(&self, timeout: Duration) -> Result<()> {
        let units = timeout.as_millis() / 100;
        if units == 0 || units > u32::MAX as u128 {
            return Err(XBeeError::InvalidParameter(format!(
                "discovery timeout {timeout:?} is out of range"
            )));
        }
        let bytes = (units as u32).to_be_bytes();
        let skip = bytes.iter().take(3).take_while(|b| **b == 0).count();
        self.device.set_parameter("NT", &bytes[skip..])?;
        *self.state.discovery_timeout.lock().unwrap() = Some(timeout);
        Ok(())
    }

    /// Configure discovery behaviour (`NO`). See the `NO_*` constants in `xbeecore::discovery`.
    pub fn set_discovery_options(&self, options: u8) -> Result<()> {
        self.device.set_parameter("NO", &[options])
    }

    pub fn get_discovery_options(&self) -> Result<u8> {
        let value = self.device.get_parameter("NO")?;
        value
            .last()
            .copied()
            .ok_or_else(|| XBeeError::UnexpectedResponse("empty NO value".into()))
    }

    /// Discover every radio in range, blocking for the discovery timeout.
    ///
    /// A radio that answers more than once appears more than once.
    pub fn discover_all(&self) -> Result<Vec<Arc<RemoteXBeeDevice>>> {
        let _guard = RunningGuard::acquire(&self.device)?;
        let mut found = vec![];
        node_discovery(
            self,
            None,
            |d| {
                found.push(d);
                Flow::Continue
            },
            |e| debug!("discovery error: {e}"),
        )?;
        Ok(found)
    }

    /// Run one discovery and keep the devices whose node identifier is in `node_ids`.
    pub fn discover_devices(&self, node_ids: &[&str]) -> Result<Vec<Arc<RemoteXBeeDevice>>> {
        let mut found = self.discover_all()?;
        found.retain(|d| {
            d.node_id()
                .is_some_and(|ni| node_ids.iter().any(|id| *id == ni))
        });
        Ok(found)
    }

    /// Find one radio by node identifier, stopping as soon as it answers.
    pub fn discover_device(&self, node_id: &str) -> Result<Option<Arc<RemoteXBeeDevice>>> {
        let _guard = RunningGuard::acquire(&self.device)?;
        let mut found = None;
        node_discovery(
            self,
            Some(node_id),
            |d| {
                if d.node_id().as_deref() == Some(node_id) {
                    found = Some(d);
                    Flow::Stop
                } else {
                    Flow::Continue
                }
            },
            |e| debug!("discovery error: {e}"),
        )?;
        Ok(found)
    }

    /// Start discovering in the background, reporting to `listener`.
    ///
    /// Only fails if a discovery is already running. Every other problem is reported through
    /// `discovery_error` or `discovery_finished`.
    pub fn start_discovery_process<L: DiscoveryListener>(&self, listener: L) -> Result<()> {
        let guard = RunningGuard::acquire(&self.device)?;
        let network = self.clone();
        std::thread::spawn(move || {
            let result = node_discovery(
                &network,
                None,
                |d| {
                    listener.device_discovered(d);
                    Flow::Continue
                },
                |e| listener.discovery_error(e),
            );
            drop(guard);
            listener.discovery_finished(result.err());
        });
        Ok(())
    }

    /// Ask a running discovery to finish early. It ends within one polling tick.
    pub fn stop_discovery_process(&self) {
        if self.is_discovery_running() {
            let inner = &self.device.inner;
            inner.discovery_stop.store(true, Ordering::Release);
        }
    }

    pub fn is_discovery_running(&self) -> bool {
        self.device.inner.discovery_running.load(Ordering::Acquire)
    }
}
