use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use xbeecore::address::{XBee16BitAddress, XBee64BitAddress};
use xbeecore::frame::{ApiFrame, RECEIVE_BROADCAST};

/// Receives every valid API frame decoded from the local XBee, in the order received.
///
/// Callbacks run on the reader thread, so they should return promptly.
pub trait FrameListener: Send + Sync + 'static {
    fn frame_received(&self, frame: &ApiFrame);

    /// The connection was closed or lost. The listener has already been removed.
    fn connection_closed(&self) {}
}

/// Receives data packets sent to the local XBee by remote radios.
pub trait DataListener: Send + Sync + 'static {
    fn data_received(&self, message: XBeeMessage);

    fn connection_closed(&self) {}
}

/// Data packet received from a remote radio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XBeeMessage {
    pub source64: XBee64BitAddress,
    pub source16: XBee16BitAddress,
    pub data: Arc<[u8]>,
    pub broadcast: bool,
}

impl XBeeMessage {
    fn from_frame(frame: &ApiFrame) -> Option<Self> {
        let (source64, source16, options, data) = match frame {
            ApiFrame::ReceivePacket {
                source64,
                source16,
                options,
                data,
            } => (*source64, *source16, *options, data),
            ApiFrame::Rx64Packet {
                source64,
                options,
                data,
                ..
            } => (*source64, XBee16BitAddress::UNKNOWN, *options, data),
            ApiFrame::Rx16Packet {
                source16,
                options,
                data,
                ..
            } => (XBee64BitAddress::UNKNOWN, *source16, *options, data),
            _ => return None,
        };
        Some(XBeeMessage {
            source64,
            source16,
            data: Arc::from(data.as_slice()),
            broadcast: options & RECEIVE_BROADCAST != 0,
        })
    }
}

/// Synchronised structure for listeners subscribing to frames and data.
///
/// Each listener will be notified in turn of each event.
pub(crate) struct Listeners {
    inner: RwLock<ListenerSet>,
}

struct ListenerSet {
    /// Identifier to be assigned to the next listener, starting from 0
    next: usize,
    frame: HashMap<usize, Arc<dyn FrameListener>>,
    data: HashMap<usize, Arc<dyn DataListener>>,
}

impl Listeners {
    pub(crate) fn new() -> Self {
        Self {
            inner: RwLock::new(ListenerSet {
                next: 0,
                frame: HashMap::new(),
                data: HashMap::new(),
            }),
        }
    }

    pub(crate) fn add_frame_listener(&self, listener: Arc<dyn FrameListener>) -> usize {
        let mut set = self.inner.write().unwrap();
        let id = set.next;
        set.next += 1;
        set.frame.insert(id, listener);
        id
    }

    pub(crate) fn add_data_listener(&self, listener: Arc<dyn DataListener>) -> usize {
        let mut set = self.inner.write().unwrap();
        let id = set.next;
        set.next += 1;
        set.data.insert(id, listener);
        id
    }

    pub(crate) fn remove_frame_listener(&self, id: usize) -> bool {
        self.inner.write().unwrap().frame.remove(&id).is_some()
    }

    pub(crate) fn remove_data_listener(&self, id: usize) -> bool {
        self.inner.write().unwrap().data.remove(&id).is_some()
    }

    pub(crate) fn frame_listener_count(&self) -> usize {
        self.inner.read().unwrap().frame.len()
    }

    /// Deliver a frame to every listener registered at the time of the call.
    ///
    /// The lock is released before any callback runs so listeners may add or remove
    /// listeners (including themselves) from inside a callback.
    pub(crate) fn publish(&self, frame: &ApiFrame) {
        let (frame_subs, data_subs): (Vec<_>, Vec<_>) = {
            let set = self.inner.read().unwrap();
            (
                set.frame.values().cloned().collect(),
                set.data.values().cloned().collect(),
            )
        };
        for s in frame_subs {
            s.frame_received(frame);
        }
        if data_subs.is_empty() {
            return;
        }
        if let Some(message) = XBeeMessage::from_frame(frame) {
            for s in data_subs {
                s.data_received(message.clone());
            }
        }
    }

    /// Remove every listener, telling each one that the connection has gone.
    pub(crate) fn close_all(&self) {
        let (frame_subs, data_subs): (Vec<_>, Vec<_>) = {
            let mut set = self.inner.write().unwrap();
            (
                set.frame.drain().map(|(_, l)| l).collect(),
                set.data.drain().map(|(_, l)| l).collect(),
            )
        };
        for s in frame_subs {
            s.connection_closed();
        }
        for s in data_subs {
            s.connection_closed();
        }
    }
}
