use std::io::{self, ErrorKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use log::{debug, info, warn};
use xbeecore::address::{XBee16BitAddress, XBee64BitAddress};
use xbeecore::codec::{ApiBuffer, encode_frame};
use xbeecore::frame::{ApiFrame, AtName};
use xbeecore::protocol::{AtCommandStatus, DeliveryStatus, OperatingMode, XBeeProtocol};

use crate::correlator::{FrameIdReservation, RequestCorrelator};
use crate::error::{Result, XBeeError};
use crate::listener::{DataListener, FrameListener, Listeners};
use crate::network::{NetworkState, XBeeNetwork};
use crate::remote::RemoteXBeeDevice;
use crate::transport::Transport;

/// Settings for a local XBee connection.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Must match the `AP` setting of the radio.
    pub operating_mode: OperatingMode,
    /// How long synchronous operations wait for their response frame.
    pub receive_timeout: Duration,
    /// Collection window for Wi-Fi access point scans.
    pub access_point_timeout: Duration,
    /// The protocol the caller expects the radio to run. When set, `read_device_info`
    /// fails if the radio turns out to run something else.
    pub protocol: Option<XBeeProtocol>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            operating_mode: OperatingMode::Api,
            receive_timeout: Duration::from_secs(2),
            access_point_timeout: Duration::from_secs(15),
            protocol: None,
        }
    }
}

/// State shared with the reader thread. Tearing this down is how a close is propagated.
pub(crate) struct Connection {
    is_open: AtomicBool,
    pub(crate) listeners: Listeners,
    pub(crate) correlator: Arc<RequestCorrelator>,
}

impl Connection {
    fn new() -> Self {
        Self {
            is_open: AtomicBool::new(true),
            listeners: Listeners::new(),
            correlator: Arc::new(RequestCorrelator::new()),
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.is_open.load(Ordering::Acquire)
    }

    /// Mark the connection closed, fail pending requests and drop all listeners.
    ///
    /// Safe to call more than once; only the first call has any effect.
    fn shutdown(&self) {
        if self.is_open.swap(false, Ordering::AcqRel) {
            self.correlator.close_all();
            self.listeners.close_all();
        }
    }
}

/// What the local radio reported about itself in `read_device_info`.
#[derive(Debug, Clone)]
struct LocalInfo {
    addr64: XBee64BitAddress,
    addr16: XBee16BitAddress,
    node_id: String,
    hardware_version: Vec<u8>,
    firmware_version: Vec<u8>,
}

pub(crate) struct DeviceInner {
    config: DeviceConfig,
    protocol: RwLock<XBeeProtocol>,
    info: RwLock<LocalInfo>,
    pub(crate) conn: Arc<Connection>,
    writer_tx: SyncSender<WriterEvent>,
    pub(crate) discovery_running: AtomicBool,
    pub(crate) discovery_stop: AtomicBool,
    access_point_timeout: Mutex<Duration>,
    pub(crate) network: Arc<NetworkState>,
}

/// Carries a request from a method on XBeeDevice to the writer thread, which will execute it.
enum WriterEvent {
    Frame(Vec<u8>, SyncSender<io::Result<()>>),
    Close,
}

/// An XBee attached to this host, through which the rest of the network is reached.
///
/// Cloning produces another handle to the same connection.
#[derive(Clone)]
pub struct XBeeDevice {
    pub(crate) inner: Arc<DeviceInner>,
}

impl XBeeDevice {
    /// Take ownership of a connected transport and start the reader and writer threads.
    pub fn open<T: Transport>(mut transport: T, config: DeviceConfig) -> Result<Self> {
        let write_half = transport.try_clone()?;
        let (writer_tx, writer_rx) = mpsc::sync_channel(128);
        let conn = Arc::new(Connection::new());
        spawn_reader(transport, conn.clone(), config.operating_mode.is_escaped());
        spawn_writer(write_half, writer_rx);
        let protocol = config.protocol.unwrap_or(XBeeProtocol::Unknown);
        info!(
            "opened XBee connection in {:?} mode, protocol {protocol}",
            config.operating_mode
        );
        Ok(Self {
            inner: Arc::new(DeviceInner {
                access_point_timeout: Mutex::new(config.access_point_timeout),
                config,
                protocol: RwLock::new(protocol),
                info: RwLock::new(LocalInfo {
                    addr64: XBee64BitAddress::UNKNOWN,
                    addr16: XBee16BitAddress::UNKNOWN,
                    node_id: String::new(),
                    hardware_version: vec![],
                    firmware_version: vec![],
                }),
                conn,
                writer_tx,
                discovery_running: AtomicBool::new(false),
                discovery_stop: AtomicBool::new(false),
                network: Arc::new(NetworkState::new()),
            }),
        })
    }

    pub fn is_open(&self) -> bool {
        self.inner.conn.is_open()
    }

    /// Close the connection. Every blocked request and discovery run ends with
    /// `ConnectionClosed` and all listeners are removed.
    pub fn close(&self) {
        self.inner.conn.shutdown();
        let _ = self.inner.writer_tx.send(WriterEvent::Close);
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.inner.config
    }

    pub fn operating_mode(&self) -> OperatingMode {
        self.inner.config.operating_mode
    }

    /// The configured protocol until `read_device_info` has asked the radio.
    pub fn protocol(&self) -> XBeeProtocol {
        *self.inner.protocol.read().unwrap()
    }

    pub fn addr64(&self) -> XBee64BitAddress {
        self.inner.info.read().unwrap().addr64
    }

    pub fn addr16(&self) -> XBee16BitAddress {
        self.inner.info.read().unwrap().addr16
    }

    pub fn node_id(&self) -> String {
        self.inner.info.read().unwrap().node_id.clone()
    }

    pub fn hardware_version(&self) -> Vec<u8> {
        self.inner.info.read().unwrap().hardware_version.clone()
    }

    pub fn firmware_version(&self) -> Vec<u8> {
        self.inner.info.read().unwrap().firmware_version.clone()
    }

    pub fn access_point_timeout(&self) -> Duration {
        *self.inner.access_point_timeout.lock().unwrap()
    }

    pub fn set_access_point_timeout(&self, timeout: Duration) {
        *self.inner.access_point_timeout.lock().unwrap() = timeout;
    }

    /// The remote radios known to this device.
    pub fn network(&self) -> XBeeNetwork {
        XBeeNetwork::new(self.clone(), self.inner.network.clone())
    }

    pub fn add_frame_listener<L: FrameListener>(&self, listener: L) -> usize {
        self.inner.conn.listeners.add_frame_listener(Arc::new(listener))
    }

    pub fn add_data_listener<L: DataListener>(&self, listener: L) -> usize {
        self.inner.conn.listeners.add_data_listener(Arc::new(listener))
    }

    pub fn remove_frame_listener(&self, id: usize) {
        self.inner.conn.listeners.remove_frame_listener(id);
    }

    pub fn remove_data_listener(&self, id: usize) {
        self.inner.conn.listeners.remove_data_listener(id);
    }

    /// A frame ID for a request whose response the caller will collect with a listener.
    pub fn next_frame_id(&self) -> Result<u8> {
        self.inner.conn.correlator.next_frame_id()
    }

    pub(crate) fn reserve_frame_id(&self) -> Result<FrameIdReservation> {
        self.inner.conn.correlator.reserve()
    }

    pub(crate) fn check_ready(&self) -> Result<()> {
        if !self.is_open() {
            return Err(XBeeError::ConnectionNotOpen);
        }
        if !self.inner.config.operating_mode.is_api() {
            return Err(XBeeError::InvalidOperatingMode(
                self.inner.config.operating_mode,
            ));
        }
        Ok(())
    }

    /// Write a frame without waiting for any response.
    pub fn send_frame(&self, frame: &ApiFrame) -> Result<()> {
        self.check_ready()?;
        self.write_frame(frame)
    }

    /// Write a frame with a freshly allocated frame ID and wait for the response carrying it.
    pub fn send_frame_sync(&self, frame: ApiFrame, timeout: Duration) -> Result<ApiFrame> {
        self.check_ready()?;
        let pending = self.inner.conn.correlator.register()?;
        let frame = frame.with_frame_id(pending.frame_id());
        self.write_frame(&frame)?;
        pending.wait(timeout)
    }

    fn write_frame(&self, frame: &ApiFrame) -> Result<()> {
        let bytes = encode_frame(frame, self.inner.config.operating_mode.is_escaped());
        let (ack_tx, ack_rx) = mpsc::sync_channel(1);
        self.inner
            .writer_tx
            .send(WriterEvent::Frame(bytes, ack_tx))
            .map_err(|_| XBeeError::ConnectionClosed)?;
        match ack_rx.recv() {
            Ok(r) => Ok(r?),
            Err(_) => Err(XBeeError::ConnectionClosed),
        }
    }

    fn at_command(&self, command: AtName, parameter: Vec<u8>) -> Result<Vec<u8>> {
        let request = ApiFrame::AtCommand {
            frame_id: 0,
            command,
            parameter,
        };
        let response = self.send_frame_sync(request, self.inner.config.receive_timeout)?;
        at_response_value(command, response)
    }

    /// Read the value of an AT parameter from the local radio.
    pub fn get_parameter(&self, name: &str) -> Result<Vec<u8>> {
        self.at_command(parse_at_name(name)?, vec![])
    }

    pub fn set_parameter(&self, name: &str, value: &[u8]) -> Result<()> {
        self.at_command(parse_at_name(name)?, value.to_vec())?;
        Ok(())
    }

    /// Run an AT command that takes no parameter, such as `FR`.
    pub fn execute_command(&self, name: &str) -> Result<()> {
        self.at_command(parse_at_name(name)?, vec![]).map(|_| ())
    }

    /// Apply queued parameter changes (`AC`).
    pub fn apply_changes(&self) -> Result<()> {
        self.execute_command("AC")
    }

    /// Save the current parameters to non-volatile memory (`WR`).
    pub fn write_changes(&self) -> Result<()> {
        self.execute_command("WR")
    }

    pub fn set_node_id(&self, node_id: &str) -> Result<()> {
        if node_id.len() > 20 {
            return Err(XBeeError::InvalidParameter(format!(
                "node identifier '{node_id}' is longer than 20 characters"
            )));
        }
        self.set_parameter("NI", node_id.as_bytes())?;
        self.inner.info.write().unwrap().node_id = node_id.to_owned();
        Ok(())
    }

    /// Ask the radio for its identity and firmware, and work out which protocol it runs.
    pub fn read_device_info(&self) -> Result<()> {
        let hardware_version = self.get_parameter("HV")?;
        let firmware_version = self.get_parameter("VR")?;
        let actual = XBeeProtocol::determine(&hardware_version, &firmware_version);
        if let Some(expected) = self.inner.config.protocol {
            if actual != XBeeProtocol::Unknown && actual != expected {
                return Err(XBeeError::ProtocolMismatch { expected, actual });
            }
        }
        let high = self.get_parameter("SH")?;
        let low = self.get_parameter("SL")?;
        let addr64 = XBee64BitAddress((be_value(&high) << 32) | be_value(&low));
        let protocol = if actual == XBeeProtocol::Unknown {
            self.protocol()
        } else {
            actual
        };
        let addr16 = if protocol.has_16bit_addressing() {
            XBee16BitAddress(be_value(&self.get_parameter("MY")?) as u16)
        } else {
            XBee16BitAddress::UNKNOWN
        };
        let node_id = String::from_utf8_lossy(&self.get_parameter("NI")?).into_owned();
        debug!("local XBee {addr64} ({node_id}) runs {protocol}");

        *self.inner.protocol.write().unwrap() = protocol;
        *self.inner.info.write().unwrap() = LocalInfo {
            addr64,
            addr16,
            node_id,
            hardware_version,
            firmware_version,
        };
        Ok(())
    }

    /// Send data to a remote radio and wait for the transmit status.
    pub fn send_data(&self, remote: &RemoteXBeeDevice, data: &[u8]) -> Result<()> {
        let (addr64, addr16) = (remote.addr64(), remote.addr16());
        let request = if self.protocol() == XBeeProtocol::Raw802_15_4 {
            if addr64.is_known() {
                ApiFrame::Tx64Request {
                    frame_id: 0,
                    dest64: addr64,
                    options: 0,
                    data: data.to_vec(),
                }
            } else {
                ApiFrame::Tx16Request {
                    frame_id: 0,
                    dest16: addr16,
                    options: 0,
                    data: data.to_vec(),
                }
            }
        } else {
            ApiFrame::TransmitRequest {
                frame_id: 0,
                dest64: addr64,
                dest16: addr16,
                radius: 0,
                options: 0,
                data: data.to_vec(),
            }
        };
        self.transmit(request)
    }

    /// Send data to every radio in the network. Only local delivery is confirmed.
    pub fn send_broadcast_data(&self, data: &[u8]) -> Result<()> {
        let request = if self.protocol() == XBeeProtocol::Raw802_15_4 {
            ApiFrame::Tx16Request {
                frame_id: 0,
                dest16: XBee16BitAddress::BROADCAST,
                options: 0,
                data: data.to_vec(),
            }
        } else {
            ApiFrame::TransmitRequest {
                frame_id: 0,
                dest64: XBee64BitAddress::BROADCAST,
                dest16: XBee16BitAddress::UNKNOWN,
                radius: 0,
                options: 0,
                data: data.to_vec(),
            }
        };
        self.transmit(request)
    }

    fn transmit(&self, request: ApiFrame) -> Result<()> {
        let response = self.send_frame_sync(request, self.inner.config.receive_timeout)?;
        let delivery = match response {
            ApiFrame::TransmitStatus { delivery, .. } | ApiFrame::TxStatus { delivery, .. } => {
                delivery
            }
            other => return Err(unexpected(&other)),
        };
        if delivery != DeliveryStatus::Success {
            return Err(XBeeError::TransmitFailed(delivery));
        }
        Ok(())
    }
}

pub(crate) fn parse_at_name(name: &str) -> Result<AtName> {
    AtName::new(name)
        .ok_or_else(|| XBeeError::InvalidParameter(format!("'{name}' is not an AT command")))
}

/// Check that `response` answers `command` successfully and return its value.
pub(crate) fn at_response_value(command: AtName, response: ApiFrame) -> Result<Vec<u8>> {
    match response {
        ApiFrame::AtCommandResponse {
            command: c,
            status,
            value,
            ..
        }
        | ApiFrame::RemoteAtCommandResponse {
            command: c,
            status,
            value,
            ..
        } if c == command => {
            if status == AtCommandStatus::Ok {
                Ok(value)
            } else {
                Err(XBeeError::AtCommand { command, status })
            }
        }
        other => Err(unexpected(&other)),
    }
}

fn unexpected(frame: &ApiFrame) -> XBeeError {
    XBeeError::UnexpectedResponse(format!("frame type 0x{:02X}", frame.frame_type()))
}

/// Interpret up to eight bytes as a big-endian unsigned value.
pub(crate) fn be_value(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64)
}

fn spawn_reader<T: Transport>(mut transport: T, conn: Arc<Connection>, escaped: bool) {
    std::thread::spawn(move || {
        let mut buffer = ApiBuffer::new(escaped);
        let mut chunk = [0u8; 256];
        while conn.is_open() {
            let n = match transport.read(&mut chunk) {
                Ok(0) => {
                    if conn.is_open() {
                        warn!("XBee transport reached end of stream");
                    }
                    break;
                }
                Ok(n) => n,
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                    ) =>
                {
                    continue;
                }
                Err(e) => {
                    if conn.is_open() {
                        warn!("XBee transport read failed: {e}");
                    }
                    break;
                }
            };
            buffer.push(&chunk[..n]);
            while let Some(frame) = buffer.next_frame() {
                conn.correlator.resolve(&frame);
                conn.listeners.publish(&frame);
            }
        }
        conn.shutdown();
    });
}

fn spawn_writer<T: Transport>(mut transport: T, event_rx: Receiver<WriterEvent>) {
    std::thread::spawn(move || {
        while let Ok(ev) = event_rx.recv() {
            match ev {
                WriterEvent::Frame(bytes, ack) => {
                    let result = transport.write_all(&bytes).and_then(|_| transport.flush());
                    if let Err(e) = &result {
                        debug!("frame write err: {e}");
                    }
                    let _ = ack.send(result);
                }
                WriterEvent::Close => {
                    if let Err(e) = transport.close() {
                        debug!("transport close err: {e}");
                    }
                    return;
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::XBeeMessage;
    use crate::test_util::{MockRadio, open_device};
    use std::thread;
    use std::time::Instant;
    use xbeecore::protocol::ModemStatus;

    fn at_ok(frame_id: u8, command: AtName, value: &[u8]) -> Vec<ApiFrame> {
        vec![ApiFrame::AtCommandResponse {
            frame_id,
            command,
            status: AtCommandStatus::Ok,
            value: value.to_vec(),
        }]
    }

    #[test]
    fn get_parameter() {
        let radio = MockRadio::new();
        radio.set_responder(|f| match f {
            ApiFrame::AtCommand {
                frame_id, command, ..
            } => at_ok(*frame_id, *command, b"BASE"),
            _ => vec![],
        });
        let device = open_device(&radio, XBeeProtocol::ZigBee);
        assert_eq!(device.get_parameter("NI").unwrap(), b"BASE");
        assert_eq!(radio.commands_sent(AtName::NI), 1);
        assert!(matches!(
            device.get_parameter("NID"),
            Err(XBeeError::InvalidParameter(_))
        ));
    }

    #[test]
    fn at_error_status() {
        let radio = MockRadio::new();
        radio.set_responder(|f| match f {
            ApiFrame::AtCommand {
                frame_id, command, ..
            } => vec![ApiFrame::AtCommandResponse {
                frame_id: *frame_id,
                command: *command,
                status: AtCommandStatus::InvalidParameter,
                value: vec![],
            }],
            _ => vec![],
        });
        let device = open_device(&radio, XBeeProtocol::ZigBee);
        let err = device.set_parameter("NI", b"this is far too long").unwrap_err();
        assert!(matches!(
            err,
            XBeeError::AtCommand {
                command: AtName::NI,
                status: AtCommandStatus::InvalidParameter
            }
        ));
    }

    #[test]
    fn timeout_without_response() {
        let radio = MockRadio::new();
        radio.set_responder(|_| vec![]);
        let device = open_device(&radio, XBeeProtocol::ZigBee);
        let start = Instant::now();
        assert!(matches!(
            device.get_parameter("NI"),
            Err(XBeeError::Timeout)
        ));
        assert!(start.elapsed() >= device.config().receive_timeout);
    }

    #[test]
    fn close_releases_waiters() {
        let radio = MockRadio::new();
        radio.set_responder(|_| vec![]);
        let device = open_device(&radio, XBeeProtocol::ZigBee);
        let waiter = {
            let device = device.clone();
            thread::spawn(move || {
                device.send_frame_sync(
                    ApiFrame::AtCommand {
                        frame_id: 0,
                        command: AtName::NI,
                        parameter: vec![],
                    },
                    Duration::from_secs(10),
                )
            })
        };
        thread::sleep(Duration::from_millis(100));
        let start = Instant::now();
        device.close();
        assert!(matches!(
            waiter.join().unwrap(),
            Err(XBeeError::ConnectionClosed)
        ));
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(!device.is_open());
        assert!(matches!(
            device.get_parameter("NI"),
            Err(XBeeError::ConnectionNotOpen)
        ));
    }

    #[test]
    fn connection_loss_closes_device() {
        let radio = MockRadio::new();
        let device = open_device(&radio, XBeeProtocol::ZigBee);
        radio.disconnect();
        let start = Instant::now();
        while device.is_open() && start.elapsed() < Duration::from_secs(2) {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(!device.is_open());
    }

    #[test]
    fn transparent_mode_is_rejected() {
        let radio = MockRadio::new();
        let config = DeviceConfig {
            operating_mode: OperatingMode::At,
            ..Default::default()
        };
        let device = XBeeDevice::open(radio, config).unwrap();
        assert!(matches!(
            device.get_parameter("NI"),
            Err(XBeeError::InvalidOperatingMode(OperatingMode::At))
        ));
    }

    fn identity_responder(
        hv: &'static [u8],
        vr: &'static [u8],
    ) -> impl Fn(&ApiFrame) -> Vec<ApiFrame> + Send + Sync + 'static {
        move |f| match f {
            ApiFrame::AtCommand {
                frame_id, command, ..
            } => {
                let value: &[u8] = match &command.0 {
                    b"HV" => hv,
                    b"VR" => vr,
                    b"SH" => &[0x00, 0x13, 0xA2, 0x00],
                    b"SL" => &[0x40, 0x8B, 0xC1, 0x9B],
                    b"MY" => &[0x00, 0x00],
                    b"NI" => b"COORD",
                    _ => &[],
                };
                at_ok(*frame_id, *command, value)
            }
            _ => vec![],
        }
    }

    #[test]
    fn read_device_info() {
        let radio = MockRadio::new();
        radio.set_responder(identity_responder(&[0x1E, 0x46], &[0x23, 0xA7]));
        let device = open_device(&radio, XBeeProtocol::ZigBee);
        device.read_device_info().unwrap();
        assert_eq!(device.protocol(), XBeeProtocol::ZigBee);
        assert_eq!(device.addr64(), XBee64BitAddress(0x0013A200408BC19B));
        assert_eq!(device.addr16(), XBee16BitAddress::COORDINATOR);
        assert_eq!(device.node_id(), "COORD");
    }

    #[test]
    fn protocol_mismatch() {
        let radio = MockRadio::new();
        radio.set_responder(identity_responder(&[0x17, 0x42], &[0x80, 0x62]));
        let device = open_device(&radio, XBeeProtocol::ZigBee);
        assert!(matches!(
            device.read_device_info(),
            Err(XBeeError::ProtocolMismatch {
                expected: XBeeProtocol::ZigBee,
                actual: XBeeProtocol::DigiMesh
            })
        ));
        // unchanged
        assert_eq!(device.protocol(), XBeeProtocol::ZigBee);
    }

    #[test]
    fn transmit_status() {
        let radio = MockRadio::new();
        let device = open_device(&radio, XBeeProtocol::ZigBee);
        device.send_broadcast_data(b"hello").unwrap();

        radio.set_responder(|f| match f {
            ApiFrame::TransmitRequest { frame_id, .. } => vec![ApiFrame::TransmitStatus {
                frame_id: *frame_id,
                dest16: XBee16BitAddress::UNKNOWN,
                retry_count: 3,
                delivery: DeliveryStatus::AddressNotFound,
                discovery: 0,
            }],
            _ => vec![],
        });
        let remote = RemoteXBeeDevice::new(
            &device,
            XBee64BitAddress(0x0013A20040112233),
            XBee16BitAddress::UNKNOWN,
            None,
        );
        assert!(matches!(
            device.send_data(&remote, b"hello"),
            Err(XBeeError::TransmitFailed(DeliveryStatus::AddressNotFound))
        ));
    }

    #[test]
    fn listeners_see_frames_in_order() {
        struct Collect(Arc<Mutex<Vec<ApiFrame>>>);
        impl FrameListener for Collect {
            fn frame_received(&self, frame: &ApiFrame) {
                self.0.lock().unwrap().push(frame.clone());
            }
        }
        struct Messages(Arc<Mutex<Vec<XBeeMessage>>>);
        impl DataListener for Messages {
            fn data_received(&self, message: XBeeMessage) {
                self.0.lock().unwrap().push(message);
            }
        }

        let radio = MockRadio::new();
        let device = open_device(&radio, XBeeProtocol::ZigBee);
        let frames = Arc::new(Mutex::new(vec![]));
        let messages = Arc::new(Mutex::new(vec![]));
        device.add_frame_listener(Collect(frames.clone()));
        device.add_data_listener(Messages(messages.clone()));

        let sent = vec![
            ApiFrame::ModemStatus(ModemStatus::Joined),
            ApiFrame::ReceivePacket {
                source64: XBee64BitAddress(0x0013A20040112233),
                source16: XBee16BitAddress(0x1234),
                options: 0x01,
                data: b"ping".to_vec(),
            },
            ApiFrame::ModemStatus(ModemStatus::CoordinatorStarted),
        ];
        for f in &sent {
            radio.inject(f);
        }
        let start = Instant::now();
        while frames.lock().unwrap().len() < sent.len() && start.elapsed() < Duration::from_secs(2)
        {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(*frames.lock().unwrap(), sent);
        let messages = messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(&*messages[0].data, b"ping");
        assert!(!messages[0].broadcast);
    }

    #[test]
    fn big_endian_values() {
        assert_eq!(be_value(&[]), 0);
        assert_eq!(be_value(&[0x12, 0x34]), 0x1234);
        assert_eq!(be_value(&[0x00, 0x13, 0xA2, 0x00]), 0x0013A200);
    }
}
