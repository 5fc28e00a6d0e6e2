//! The collection loop shared by node discovery (`ND`) and Wi-Fi access point scans (`AS`).
//!
//! Both commands are sent once and then answered any number of times, every reply carrying
//! the frame ID of the request. A run moves through `Idle`, `CommandSent`, `Collecting` and
//! `Finished`. It finishes when:
//!
//! * an 802.15.4 radio sends its empty terminating reply to `ND`,
//! * the discovery timeout passes (a fixed deadline from when the command was sent),
//! * a caller looking for a single node has found it,
//! * `stop_discovery_process` is called, or
//! * the connection closes, which is reported as `ConnectionClosed`.
//!
//! Only one run per local device may be active at a time.

use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::debug;
use xbeecore::discovery::{AccessPointRecord, NodeRecord};
use xbeecore::frame::{ApiFrame, AtName};
use xbeecore::protocol::AtCommandStatus;

use crate::device::{DeviceInner, XBeeDevice};
use crate::error::{Result, XBeeError};
use crate::listener::FrameListener;
use crate::network::XBeeNetwork;
use crate::remote::RemoteXBeeDevice;

/// Wi-Fi access point found by `XBeeDevice::scan_access_points`.
pub type AccessPoint = AccessPointRecord;

/// Granularity at which a collecting run notices a stop request or a lost connection.
const TICK: Duration = Duration::from_millis(100);

/// Receives the progress of a discovery started with `XBeeNetwork::start_discovery_process`.
///
/// Called from the discovery thread.
pub trait DiscoveryListener: Send + 'static {
    /// A radio answered. The device is the registry's instance for that radio.
    fn device_discovered(&self, device: Arc<RemoteXBeeDevice>);

    /// A reply could not be used. Discovery continues.
    fn discovery_error(&self, error: String) {
        debug!("discovery error: {error}");
    }

    /// Called exactly once when the run ends, with the error that ended it if any.
    fn discovery_finished(&self, error: Option<XBeeError>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DiscoveryState {
    Idle,
    CommandSent,
    Collecting,
    Finished,
}

/// Whether a run should keep collecting after a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Stop,
}

pub(crate) enum Reply {
    Value(Vec<u8>),
    Failed(AtCommandStatus),
}

/// Marks a discovery as running on a local device until dropped.
pub(crate) struct RunningGuard {
    inner: Arc<DeviceInner>,
}

impl RunningGuard {
    pub(crate) fn acquire(device: &XBeeDevice) -> Result<Self> {
        device
            .inner
            .discovery_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| XBeeError::DiscoveryAlreadyRunning)?;
        device.inner.discovery_stop.store(false, Ordering::Release);
        Ok(Self {
            inner: device.inner.clone(),
        })
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.inner.discovery_running.store(false, Ordering::Release);
    }
}

/// Forwards replies to one discovery command into the collecting run.
struct ReplyForwarder {
    frame_id: u8,
    command: AtName,
    tx: Sender<Reply>,
}

impl FrameListener for ReplyForwarder {
    fn frame_received(&self, frame: &ApiFrame) {
        let ApiFrame::AtCommandResponse {
            frame_id,
            command,
            status,
            value,
        } = frame
        else {
            return;
        };
        if *frame_id != self.frame_id || *command != self.command {
            return;
        }
        let reply = if *status == AtCommandStatus::Ok {
            Reply::Value(value.clone())
        } else {
            Reply::Failed(*status)
        };
        let _ = self.tx.send(reply);
    }
}

fn transition(state: &mut DiscoveryState, next: DiscoveryState, command: AtName) {
    debug!("{command} discovery: {state:?} -> {next:?}");
    *state = next;
}

/// Send `command` and feed every reply to `on_reply` until the run finishes.
///
/// Replies arrive through a temporary frame listener that is removed again before returning.
pub(crate) fn collect<F>(
    device: &XBeeDevice,
    command: AtName,
    parameter: Vec<u8>,
    timeout: Duration,
    terminator: bool,
    on_reply: F,
) -> Result<()>
where
    F: FnMut(Reply) -> Flow,
{
    let mut state = DiscoveryState::Idle;
    let reservation = device.reserve_frame_id()?;
    let (tx, rx) = mpsc::channel();
    let listener_id = device.add_frame_listener(ReplyForwarder {
        frame_id: reservation.frame_id(),
        command,
        tx,
    });
    let request = ApiFrame::AtCommand {
        frame_id: reservation.frame_id(),
        command,
        parameter,
    };
    let result = send_and_collect(
        device, &mut state, command, &request, &rx, timeout, terminator, on_reply,
    );
    device.remove_frame_listener(listener_id);
    drop(reservation);
    if let Err(e) = &result {
        debug!("{command} discovery failed: {e}");
    }
    transition(&mut state, DiscoveryState::Finished, command);
    result
}

#[allow(clippy::too_many_arguments)]
fn send_and_collect<F>(
    device: &XBeeDevice,
    state: &mut DiscoveryState,
    command: AtName,
    request: &ApiFrame,
    rx: &Receiver<Reply>,
    timeout: Duration,
    terminator: bool,
    mut on_reply: F,
) -> Result<()>
where
    F: FnMut(Reply) -> Flow,
{
    device.send_frame(request)?;
    transition(state, DiscoveryState::CommandSent, command);
    let deadline = Instant::now() + timeout;
    transition(state, DiscoveryState::Collecting, command);
    loop {
        if device.inner.discovery_stop.load(Ordering::Acquire) {
            debug!("{command} discovery stopped on request");
            return Ok(());
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(());
        }
        match rx.recv_timeout(TICK.min(deadline - now)) {
            Ok(Reply::Value(data)) if terminator && data.is_empty() => return Ok(()),
            Ok(reply) => {
                if on_reply(reply) == Flow::Stop {
                    return Ok(());
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if !device.is_open() {
                    return Err(XBeeError::ConnectionClosed);
                }
            }
            Err(RecvTimeoutError::Disconnected) => return Err(XBeeError::ConnectionClosed),
        }
    }
}

/// Run one node discovery on the local device behind `network`.
///
/// Each usable reply is turned into a remote device, merged into the registry and passed to
/// `found`. The caller must hold the `RunningGuard`.
pub(crate) fn node_discovery<F, E>(
    network: &XBeeNetwork,
    node_id: Option<&str>,
    mut found: F,
    mut error: E,
) -> Result<()>
where
    F: FnMut(Arc<RemoteXBeeDevice>) -> Flow,
    E: FnMut(String),
{
    let device = network.local_device();
    device.check_ready()?;
    let protocol = device.protocol();
    if !protocol.supports_node_discovery() {
        return Err(XBeeError::OperationNotSupported {
            operation: "node discovery",
            protocol,
        });
    }
    let timeout = network.discovery_timeout()?;
    let parameter = node_id.map(|id| id.as_bytes().to_vec()).unwrap_or_default();
    collect(
        device,
        AtName::ND,
        parameter,
        timeout,
        protocol.has_discovery_terminator(),
        |reply| match reply {
            Reply::Value(data) => {
                let Some(record) = NodeRecord::parse(protocol, &data) else {
                    error(format!("ignoring malformed ND reply of {} bytes", data.len()));
                    return Flow::Continue;
                };
                let remote = Arc::new(RemoteXBeeDevice::from_record(device, &record));
                match network.add_remote_device(remote) {
                    Some(d) => found(d),
                    None => {
                        error(format!("ND reply from '{}' has no usable address", record.node_id));
                        Flow::Continue
                    }
                }
            }
            Reply::Failed(status) => {
                error(format!("ND reply with status: {status}"));
                Flow::Continue
            }
        },
    )
}

impl XBeeDevice {
    /// Scan for Wi-Fi access points, blocking for the access point timeout.
    pub fn scan_access_points(&self) -> Result<Vec<AccessPoint>> {
        self.check_ready()?;
        let protocol = self.protocol();
        if !protocol.supports_access_point_scan() {
            return Err(XBeeError::OperationNotSupported {
                operation: "access point scan",
                protocol,
            });
        }
        let _guard = RunningGuard::acquire(self)?;
        let mut found = vec![];
        collect(
            self,
            AtName::AS,
            vec![],
            self.access_point_timeout(),
            false,
            |reply| {
                match reply {
                    Reply::Value(data) => match AccessPoint::parse(&data) {
                        Some(ap) => found.push(ap),
                        None => debug!("ignoring AS reply of {} bytes", data.len()),
                    },
                    Reply::Failed(status) => debug!("AS reply with status: {status}"),
                }
                Flow::Continue
            },
        )?;
        Ok(found)
    }

    /// Scan once and return the access point whose SSID is exactly `ssid`.
    pub fn get_access_point(&self, ssid: &str) -> Result<Option<AccessPoint>> {
        Ok(self
            .scan_access_points()?
            .into_iter()
            .find(|ap| ap.ssid == ssid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{MockRadio, acknowledge, open_device};
    use std::sync::Mutex;
    use std::thread;
    use xbeecore::address::{XBee16BitAddress, XBee64BitAddress};
    use xbeecore::protocol::{EncryptionType, NodeRole, XBeeProtocol};

    fn record(protocol: XBeeProtocol, addr64: u64, addr16: u16, ni: &str) -> Vec<u8> {
        NodeRecord {
            addr16: XBee16BitAddress(addr16),
            addr64: XBee64BitAddress(addr64),
            node_id: ni.to_owned(),
            parent16: XBee16BitAddress::UNKNOWN,
            role: NodeRole::Router,
            status: 0,
            profile_id: 0xC105,
            manufacturer_id: 0x101E,
            device_type_id: None,
            rssi: (protocol == XBeeProtocol::Raw802_15_4).then_some(0x28),
        }
        .to_bytes(protocol)
    }

    /// Answer every `command` request with one reply per entry in `replies`.
    fn replying(
        command: AtName,
        replies: Vec<Vec<u8>>,
    ) -> impl Fn(&ApiFrame) -> Vec<ApiFrame> + Send + Sync + 'static {
        move |f| match f {
            ApiFrame::AtCommand {
                frame_id,
                command: c,
                ..
            } if *c == command => replies
                .iter()
                .map(|value| ApiFrame::AtCommandResponse {
                    frame_id: *frame_id,
                    command,
                    status: AtCommandStatus::Ok,
                    value: value.clone(),
                })
                .collect(),
            other => acknowledge(other),
        }
    }

    fn set_timeout(device: &XBeeDevice, timeout: Duration) {
        device.network().set_discovery_timeout(timeout).unwrap();
    }

    #[test]
    fn raw_802_stops_at_terminator() {
        let radio = MockRadio::new();
        radio.set_responder(replying(
            AtName::ND,
            vec![
                record(XBeeProtocol::Raw802_15_4, 0x0013A20040522BAA, 0x0001, "END"),
                vec![],
            ],
        ));
        let device = open_device(&radio, XBeeProtocol::Raw802_15_4);
        set_timeout(&device, Duration::from_secs(10));
        let start = Instant::now();
        let found = device.network().discover_all().unwrap();
        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].node_id().as_deref(), Some("END"));
        assert_eq!(found[0].rssi(), Some(0x28));
        assert!(!device.network().is_discovery_running());
    }

    #[test]
    fn zigbee_runs_until_deadline() {
        let radio = MockRadio::new();
        radio.set_responder(replying(AtName::ND, vec![]));
        let device = open_device(&radio, XBeeProtocol::ZigBee);
        set_timeout(&device, Duration::from_millis(400));
        let start = Instant::now();
        let found = device.network().discover_all().unwrap();
        let elapsed = start.elapsed();
        assert!(found.is_empty());
        assert!(elapsed >= Duration::from_millis(400), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(1500), "{elapsed:?}");
        assert_eq!(radio.commands_sent(AtName::ND), 1);
    }

    #[test]
    fn zigbee_two_devices() {
        let radio = MockRadio::new();
        radio.set_responder(replying(
            AtName::ND,
            vec![
                record(XBeeProtocol::ZigBee, 0x0013A20040A1B2C3, 0x7D84, "KITCHEN"),
                record(XBeeProtocol::ZigBee, 0x0013A20040D4E5F6, 0x1A2B, "GARAGE"),
            ],
        ));
        let device = open_device(&radio, XBeeProtocol::ZigBee);
        set_timeout(&device, Duration::from_millis(300));
        let network = device.network();
        let found = network.discover_all().unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].node_id().as_deref(), Some("KITCHEN"));
        assert_eq!(found[0].addr64(), XBee64BitAddress(0x0013A20040A1B2C3));
        assert_eq!(found[0].addr16(), XBee16BitAddress(0x7D84));
        assert_eq!(found[0].role(), NodeRole::Router);
        assert_eq!(found[1].node_id().as_deref(), Some("GARAGE"));
        assert_eq!(found[1].addr64(), XBee64BitAddress(0x0013A20040D4E5F6));
        assert_eq!(found[1].addr16(), XBee16BitAddress(0x1A2B));
        assert_eq!(network.count(), 2);

        // Rediscovering the same radios reuses the registry entries
        let again = network.discover_all().unwrap();
        assert!(Arc::ptr_eq(&again[0], &found[0]));
        assert_eq!(network.count(), 2);

        let garage = network.discover_devices(&["GARAGE"]).unwrap();
        assert_eq!(garage.len(), 1);
        assert!(Arc::ptr_eq(&garage[0], &found[1]));
    }

    #[test]
    fn discover_single_device_stops_early() {
        let radio = MockRadio::new();
        radio.set_responder(|f| match f {
            ApiFrame::AtCommand {
                frame_id,
                command: AtName::ND,
                parameter,
            } if parameter == b"SENSOR" => vec![ApiFrame::AtCommandResponse {
                frame_id: *frame_id,
                command: AtName::ND,
                status: AtCommandStatus::Ok,
                value: record(XBeeProtocol::DigiMesh, 0x0013A20041000001, 0xFFFE, "SENSOR"),
            }],
            other => acknowledge(other),
        });
        let device = open_device(&radio, XBeeProtocol::DigiMesh);
        set_timeout(&device, Duration::from_secs(10));
        let network = device.network();
        let start = Instant::now();
        let sensor = network.discover_device("SENSOR").unwrap().unwrap();
        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(sensor.addr64(), XBee64BitAddress(0x0013A20041000001));
        assert_eq!(sensor.addr16(), XBee16BitAddress::UNKNOWN);
    }

    #[test]
    fn bad_replies_are_skipped() {
        let radio = MockRadio::new();
        radio.set_responder(|f| match f {
            ApiFrame::AtCommand {
                frame_id,
                command: AtName::ND,
                ..
            } => vec![
                ApiFrame::AtCommandResponse {
                    frame_id: *frame_id,
                    command: AtName::ND,
                    status: AtCommandStatus::Ok,
                    value: vec![0x00, 0x01, 0x02],
                },
                ApiFrame::AtCommandResponse {
                    frame_id: *frame_id,
                    command: AtName::ND,
                    status: AtCommandStatus::Error,
                    value: vec![],
                },
                ApiFrame::AtCommandResponse {
                    frame_id: *frame_id,
                    command: AtName::ND,
                    status: AtCommandStatus::Ok,
                    value: record(XBeeProtocol::ZigBee, 0x0013A20040A1B2C3, 0x7D84, "OK"),
                },
            ],
            other => acknowledge(other),
        });
        let device = open_device(&radio, XBeeProtocol::ZigBee);
        set_timeout(&device, Duration::from_millis(300));
        let found = device.network().discover_all().unwrap();
        assert_eq!(found.len(), 1);
    }

    #[derive(Default)]
    struct Progress {
        devices: Mutex<Vec<Arc<RemoteXBeeDevice>>>,
        errors: Mutex<Vec<String>>,
        finished: Mutex<Vec<Option<String>>>,
    }

    struct Reporter(Arc<Progress>);

    impl DiscoveryListener for Reporter {
        fn device_discovered(&self, device: Arc<RemoteXBeeDevice>) {
            self.0.devices.lock().unwrap().push(device);
        }

        fn discovery_error(&self, error: String) {
            self.0.errors.lock().unwrap().push(error);
        }

        fn discovery_finished(&self, error: Option<XBeeError>) {
            self.0
                .finished
                .lock()
                .unwrap()
                .push(error.map(|e| e.to_string()));
        }
    }

    fn wait_finished(progress: &Progress) {
        let start = Instant::now();
        while progress.finished.lock().unwrap().is_empty()
            && start.elapsed() < Duration::from_secs(5)
        {
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn background_discovery_reports_progress() {
        let radio = MockRadio::new();
        radio.set_responder(replying(
            AtName::ND,
            vec![
                record(XBeeProtocol::ZigBee, 0x0013A20040A1B2C3, 0x7D84, "KITCHEN"),
                vec![0xAB],
            ],
        ));
        let device = open_device(&radio, XBeeProtocol::ZigBee);
        set_timeout(&device, Duration::from_millis(300));
        let network = device.network();
        let progress = Arc::new(Progress::default());
        network
            .start_discovery_process(Reporter(progress.clone()))
            .unwrap();
        assert!(network.is_discovery_running());
        assert!(matches!(
            network.discover_all(),
            Err(XBeeError::DiscoveryAlreadyRunning)
        ));
        assert!(matches!(
            network.start_discovery_process(Reporter(Arc::new(Progress::default()))),
            Err(XBeeError::DiscoveryAlreadyRunning)
        ));
        wait_finished(&progress);
        assert_eq!(*progress.finished.lock().unwrap(), vec![None]);
        assert_eq!(progress.devices.lock().unwrap().len(), 1);
        assert_eq!(progress.errors.lock().unwrap().len(), 1);
        assert!(!network.is_discovery_running());
        assert_eq!(radio.commands_sent(AtName::ND), 1);
    }

    #[test]
    fn stop_ends_run_promptly() {
        let radio = MockRadio::new();
        radio.set_responder(replying(AtName::ND, vec![]));
        let device = open_device(&radio, XBeeProtocol::ZigBee);
        set_timeout(&device, Duration::from_secs(30));
        let network = device.network();
        let progress = Arc::new(Progress::default());
        network
            .start_discovery_process(Reporter(progress.clone()))
            .unwrap();
        thread::sleep(Duration::from_millis(150));
        let start = Instant::now();
        network.stop_discovery_process();
        wait_finished(&progress);
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(*progress.finished.lock().unwrap(), vec![None]);
    }

    #[test]
    fn close_ends_run_with_error() {
        let radio = MockRadio::new();
        radio.set_responder(replying(AtName::ND, vec![]));
        let device = open_device(&radio, XBeeProtocol::ZigBee);
        set_timeout(&device, Duration::from_secs(30));
        let progress = Arc::new(Progress::default());
        device
            .network()
            .start_discovery_process(Reporter(progress.clone()))
            .unwrap();
        thread::sleep(Duration::from_millis(150));
        let start = Instant::now();
        device.close();
        wait_finished(&progress);
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(
            *progress.finished.lock().unwrap(),
            vec![Some(XBeeError::ConnectionClosed.to_string())]
        );
    }

    #[test]
    fn send_failure_keeps_registry() {
        let radio = MockRadio::new();
        radio.set_responder(replying(
            AtName::ND,
            vec![record(XBeeProtocol::ZigBee, 0x0013A20040A1B2C3, 0x7D84, "KITCHEN")],
        ));
        let device = open_device(&radio, XBeeProtocol::ZigBee);
        set_timeout(&device, Duration::from_millis(200));
        let network = device.network();
        assert_eq!(network.discover_all().unwrap().len(), 1);

        radio.set_fail_writes(true);
        assert!(matches!(network.discover_all(), Err(XBeeError::Io(_))));
        assert_eq!(network.count(), 1);
        assert!(!network.is_discovery_running());
        // the temporary listener has gone
        assert_eq!(device.inner.conn.listeners.frame_listener_count(), 0);
    }

    #[test]
    fn node_discovery_needs_mesh_protocol() {
        let radio = MockRadio::new();
        let device = open_device(&radio, XBeeProtocol::XBeeWifi);
        assert!(matches!(
            device.network().discover_all(),
            Err(XBeeError::OperationNotSupported {
                protocol: XBeeProtocol::XBeeWifi,
                ..
            })
        ));
        let zigbee = open_device(&MockRadio::new(), XBeeProtocol::ZigBee);
        assert!(matches!(
            zigbee.scan_access_points(),
            Err(XBeeError::OperationNotSupported { .. })
        ));
    }

    fn access_point(version: u8, dbm: i8, ssid: &str) -> Vec<u8> {
        let mut v = vec![version, 6, EncryptionType::Wpa2.as_byte(), dbm as u8];
        v.extend_from_slice(ssid.as_bytes());
        v
    }

    #[test]
    fn get_access_point_by_ssid() {
        let radio = MockRadio::new();
        radio.set_responder(replying(
            AtName::AS,
            vec![
                access_point(1, -60, "HomeNet"),
                access_point(1, -80, "HomeNet-Guest"),
                vec![0x01, 0x02],
                access_point(9, -70, "Future"),
            ],
        ));
        let device = open_device(&radio, XBeeProtocol::XBeeWifi);

        let ap = device.get_access_point("HomeNet").unwrap().unwrap();
        assert_eq!(ap.ssid, "HomeNet");
        assert_eq!(ap.channel, 6);
        assert_eq!(ap.encryption, EncryptionType::Wpa2);
        assert_eq!(ap.signal_quality, 80);
        assert_eq!(radio.commands_sent(AtName::AS), 1);

        assert!(device.get_access_point("Home").unwrap().is_none());
        assert_eq!(radio.commands_sent(AtName::AS), 2);

        let all = device.scan_access_points().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].signal_quality, 40);
    }
}
