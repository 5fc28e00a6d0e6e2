use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, trace};
use xbeecore::frame::ApiFrame;

use crate::error::{Result, XBeeError};

/// Matches response frames to the request that is waiting for them, by frame ID.
///
/// IDs are handed out from 1 to 255 and wrap around, skipping any that still have a
/// request outstanding. ID 0 is never used since it tells the XBee not to respond.
pub(crate) struct RequestCorrelator {
    inner: Mutex<Inner>,
}

struct Inner {
    next_id: u8,
    /// Incremented for every registration so a stale handle can't remove a reused ID
    next_token: u64,
    pending: HashMap<u8, Pending>,
    closed: bool,
}

struct Pending {
    token: u64,
    slot: Slot,
}

enum Slot {
    /// Somebody is blocked waiting for the first frame with this ID.
    Request(SyncSender<ApiFrame>),
    /// The ID is in use by a caller that watches the frame stream itself (e.g. discovery).
    Reserved,
}

impl RequestCorrelator {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 1,
                next_token: 0,
                pending: HashMap::new(),
                closed: false,
            }),
        }
    }

    /// Allocate a frame ID and arrange for its response to be delivered to the returned handle.
    pub(crate) fn register(self: &Arc<Self>) -> Result<PendingRequest> {
        let (tx, rx) = mpsc::sync_channel(1);
        let (frame_id, token) = self.allocate(Slot::Request(tx))?;
        Ok(PendingRequest {
            correlator: self.clone(),
            frame_id,
            token,
            rx,
        })
    }

    /// Allocate a frame ID that stays out of circulation until the reservation is dropped.
    ///
    /// Responses carrying a reserved ID are not consumed here; they are only seen by frame
    /// listeners.
    pub(crate) fn reserve(self: &Arc<Self>) -> Result<FrameIdReservation> {
        let (frame_id, token) = self.allocate(Slot::Reserved)?;
        Ok(FrameIdReservation {
            correlator: self.clone(),
            frame_id,
            token,
        })
    }

    fn allocate(&self, slot: Slot) -> Result<(u8, u64)> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return Err(XBeeError::ConnectionNotOpen);
        }
        let frame_id = inner.take_id().ok_or(XBeeError::FrameIdsExhausted)?;
        let token = inner.next_token;
        inner.next_token += 1;
        inner.pending.insert(frame_id, Pending { token, slot });
        Ok((frame_id, token))
    }

    /// The next frame ID for callers that send with no intention of waiting.
    ///
    /// The ID is not recorded, so a later response for it is ignored here. Fails rather
    /// than hand out an ID that an outstanding request is waiting on.
    pub(crate) fn next_frame_id(&self) -> Result<u8> {
        let mut inner = self.inner.lock().unwrap();
        inner.take_id().ok_or(XBeeError::FrameIdsExhausted)
    }

    /// Deliver a frame to the waiting request with the same ID, if any.
    ///
    /// Returns true if the frame was consumed by a request. Frames without an ID, with ID 0,
    /// or with an ID held by a reservation are left alone.
    pub(crate) fn resolve(&self, frame: &ApiFrame) -> bool {
        let Some(frame_id) = frame.frame_id() else {
            return false;
        };
        if frame_id == 0 {
            return false;
        }
        let mut inner = self.inner.lock().unwrap();
        if !matches!(
            inner.pending.get(&frame_id),
            Some(Pending {
                slot: Slot::Request(_),
                ..
            })
        ) {
            return false;
        }
        let Some(Pending {
            slot: Slot::Request(tx),
            ..
        }) = inner.pending.remove(&frame_id)
        else {
            return false;
        };
        drop(inner);
        trace!("response for frame ID {frame_id}");
        // The waiter may have just given up; that's fine
        let _ = tx.try_send(frame.clone());
        true
    }

    /// Fail every outstanding request with `ConnectionClosed` and refuse new ones.
    pub(crate) fn close_all(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.closed = true;
        if !inner.pending.is_empty() {
            debug!("abandoning {} pending requests", inner.pending.len());
        }
        // Dropping the senders wakes every waiter with a disconnect
        inner.pending.clear();
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.inner.lock().unwrap().pending.len()
    }

    fn release(&self, frame_id: u8, token: u64) {
        let mut inner = self.inner.lock().unwrap();
        if inner.pending.get(&frame_id).map(|p| p.token) == Some(token) {
            inner.pending.remove(&frame_id);
        }
    }
}

impl Inner {
    fn advance(&mut self) {
        self.next_id = if self.next_id == 255 {
            1
        } else {
            self.next_id + 1
        };
    }

    fn take_id(&mut self) -> Option<u8> {
        for _ in 0..255 {
            let candidate = self.next_id;
            self.advance();
            if !self.pending.contains_key(&candidate) {
                return Some(candidate);
            }
        }
        None
    }
}

/// Handle for one request awaiting its response.
///
/// Dropping the handle without waiting releases the frame ID.
pub(crate) struct PendingRequest {
    correlator: Arc<RequestCorrelator>,
    frame_id: u8,
    token: u64,
    rx: Receiver<ApiFrame>,
}

impl PendingRequest {
    pub(crate) fn frame_id(&self) -> u8 {
        self.frame_id
    }

    /// Block until the response arrives, the connection closes, or `timeout` passes.
    pub(crate) fn wait(self, timeout: Duration) -> Result<ApiFrame> {
        match self.rx.recv_timeout(timeout) {
            Ok(frame) => Ok(frame),
            Err(RecvTimeoutError::Timeout) => {
                debug!("no response for frame ID {} after {:?}", self.frame_id, timeout);
                Err(XBeeError::Timeout)
            }
            Err(RecvTimeoutError::Disconnected) => Err(XBeeError::ConnectionClosed),
        }
    }
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        self.correlator.release(self.frame_id, self.token);
    }
}

/// A frame ID held out of circulation for as long as this value lives.
pub(crate) struct FrameIdReservation {
    correlator: Arc<RequestCorrelator>,
    frame_id: u8,
    token: u64,
}

impl FrameIdReservation {
    pub(crate) fn frame_id(&self) -> u8 {
        self.frame_id
    }
}

impl Drop for FrameIdReservation {
    fn drop(&mut self) {
        self.correlator.release(self.frame_id, self.token);
    }
}
