use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use xbeecore::codec::{ApiBuffer, encode_frame};
use xbeecore::frame::{ApiFrame, AtName};
use xbeecore::protocol::{AtCommandStatus, DeliveryStatus, XBeeProtocol};

use crate::device::{DeviceConfig, XBeeDevice};
use crate::transport::{Transport, TransportError};

type Responder = Arc<dyn Fn(&ApiFrame) -> Vec<ApiFrame> + Send + Sync>;

/// In-memory stand-in for a local XBee in API mode 1.
///
/// Every frame written to it is decoded, recorded and handed to a responder, whose
/// replies are queued for the reader. Clones share the same radio.
#[derive(Clone)]
pub(crate) struct MockRadio {
    shared: Arc<Shared>,
}

struct Shared {
    incoming_tx: Mutex<Option<Sender<Vec<u8>>>>,
    incoming_rx: Mutex<Receiver<Vec<u8>>>,
    unread: Mutex<VecDeque<u8>>,
    decoder: Mutex<ApiBuffer>,
    written: Mutex<Vec<ApiFrame>>,
    responder: Mutex<Responder>,
    fail_writes: AtomicBool,
}

impl MockRadio {
    /// A radio that acknowledges every AT command and transmission with success.
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        let responder: Responder = Arc::new(acknowledge);
        Self {
            shared: Arc::new(Shared {
                incoming_tx: Mutex::new(Some(tx)),
                incoming_rx: Mutex::new(rx),
                unread: Mutex::new(VecDeque::new()),
                decoder: Mutex::new(ApiBuffer::new(false)),
                written: Mutex::new(vec![]),
                responder: Mutex::new(responder),
                fail_writes: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn set_responder<F>(&self, responder: F)
    where
        F: Fn(&ApiFrame) -> Vec<ApiFrame> + Send + Sync + 'static,
    {
        let responder: Responder = Arc::new(responder);
        *self.shared.responder.lock().unwrap() = responder;
    }

    /// Make every subsequent write fail as if the serial line had gone.
    pub(crate) fn set_fail_writes(&self, fail: bool) {
        self.shared.fail_writes.store(fail, Ordering::Release);
    }

    /// Queue a frame as though the radio had sent it.
    pub(crate) fn inject(&self, frame: &ApiFrame) {
        self.inject_bytes(encode_frame(frame, false));
    }

    pub(crate) fn inject_bytes(&self, bytes: Vec<u8>) {
        if let Some(tx) = self.shared.incoming_tx.lock().unwrap().as_ref() {
            let _ = tx.send(bytes);
        }
    }

    /// End the byte stream. The reader sees end of file once queued bytes are consumed.
    pub(crate) fn disconnect(&self) {
        self.shared.incoming_tx.lock().unwrap().take();
    }

    pub(crate) fn written(&self) -> Vec<ApiFrame> {
        self.shared.written.lock().unwrap().clone()
    }

    /// How many local AT command frames with this name have been written.
    pub(crate) fn commands_sent(&self, command: AtName) -> usize {
        self.written()
            .iter()
            .filter(|f| matches!(f, ApiFrame::AtCommand { command: c, .. } if *c == command))
            .count()
    }
}

/// Default responder.
pub(crate) fn acknowledge(frame: &ApiFrame) -> Vec<ApiFrame> {
    match frame {
        ApiFrame::AtCommand {
            frame_id, command, ..
        }
        | ApiFrame::AtCommandQueue {
            frame_id, command, ..
        } if *frame_id != 0 => vec![ApiFrame::AtCommandResponse {
            frame_id: *frame_id,
            command: *command,
            status: AtCommandStatus::Ok,
            value: vec![],
        }],
        ApiFrame::RemoteAtCommand {
            frame_id,
            dest64,
            dest16,
            command,
            ..
        } if *frame_id != 0 => vec![ApiFrame::RemoteAtCommandResponse {
            frame_id: *frame_id,
            source64: *dest64,
            source16: *dest16,
            command: *command,
            status: AtCommandStatus::Ok,
            value: vec![],
        }],
        ApiFrame::TransmitRequest {
            frame_id, dest16, ..
        } if *frame_id != 0 => vec![ApiFrame::TransmitStatus {
            frame_id: *frame_id,
            dest16: *dest16,
            retry_count: 0,
            delivery: DeliveryStatus::Success,
            discovery: 0,
        }],
        ApiFrame::Tx64Request { frame_id, .. } | ApiFrame::Tx16Request { frame_id, .. }
            if *frame_id != 0 =>
        {
            vec![ApiFrame::TxStatus {
                frame_id: *frame_id,
                delivery: DeliveryStatus::Success,
            }]
        }
        _ => vec![],
    }
}

impl Read for MockRadio {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut unread = self.shared.unread.lock().unwrap();
        if unread.is_empty() {
            let rx = self.shared.incoming_rx.lock().unwrap();
            match rx.recv_timeout(Duration::from_millis(20)) {
                Ok(bytes) => unread.extend(bytes),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(io::Error::new(ErrorKind::TimedOut, "no data"));
                }
                Err(RecvTimeoutError::Disconnected) => return Ok(0),
            }
        }
        let n = buf.len().min(unread.len());
        for (dst, src) in buf.iter_mut().zip(unread.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
}

impl Write for MockRadio {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.shared.fail_writes.load(Ordering::Acquire) {
            return Err(io::Error::new(ErrorKind::BrokenPipe, "mock write failure"));
        }
        let mut frames = vec![];
        {
            let mut decoder = self.shared.decoder.lock().unwrap();
            decoder.push(buf);
            while let Some(f) = decoder.next_frame() {
                frames.push(f);
            }
        }
        let responder = self.shared.responder.lock().unwrap().clone();
        for f in frames {
            self.shared.written.lock().unwrap().push(f.clone());
            for reply in responder(&f) {
                self.inject(&reply);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for MockRadio {
    fn try_clone(&mut self) -> Result<Self, TransportError> {
        Ok(self.clone())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.disconnect();
        Ok(())
    }
}

/// Open a device on the mock radio with short timeouts, pinned to `protocol`.
pub(crate) fn open_device(radio: &MockRadio, protocol: XBeeProtocol) -> XBeeDevice {
    let config = DeviceConfig {
        receive_timeout: Duration::from_millis(300),
        access_point_timeout: Duration::from_millis(300),
        protocol: Some(protocol),
        ..Default::default()
    };
    XBeeDevice::open(radio.clone(), config).unwrap()
}
