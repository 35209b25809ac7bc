//! The session inbox.
//!
//! Everything asynchronous (transport, capture thread, playback thread, decode
//! task, front-end) reaches the session as a [`SessionEvent`] on one channel
//! and is handled by a single dispatch in the event loop.

use tokio::sync::mpsc;

use crate::audio::device::UnitId;
use crate::error::SessionError;
use crate::playback::DecodeTicket;
use crate::protocol::TransportEvent;

#[derive(Debug)]
pub enum SessionEvent {
    /// Something happened on the transport opened under `epoch`.
    Transport { epoch: u64, event: TransportEvent },
    /// One fixed-size window from the capture device opened under `epoch`.
    Capture { epoch: u64, window: Vec<f32> },
    /// A fragment finished decoding.
    Decoded {
        ticket: DecodeTicket,
        result: Result<Vec<f32>, SessionError>,
    },
    /// A playback unit reached its natural end on the output device.
    UnitFinished(UnitId),
    /// The process regained foreground visibility.
    Foreground,
}

/// Sending half of the inbox, stamped with the epoch of the session that
/// handed it out. Events from a torn-down session are recognised by their
/// stale epoch and ignored.
#[derive(Clone)]
pub struct EventSink {
    epoch: u64,
    tx: mpsc::Sender<SessionEvent>,
}

impl EventSink {
    pub fn new(epoch: u64, tx: mpsc::Sender<SessionEvent>) -> Self {
        Self { epoch, tx }
    }

    /// Returns false once the session inbox is gone.
    pub async fn transport(&self, event: TransportEvent) -> bool {
        self.tx
            .send(SessionEvent::Transport {
                epoch: self.epoch,
                event,
            })
            .await
            .is_ok()
    }

    /// Never blocks. A full inbox drops the window.
    pub fn try_capture(&self, window: Vec<f32>) -> Result<(), mpsc::error::TrySendError<SessionEvent>> {
        self.tx.try_send(SessionEvent::Capture {
            epoch: self.epoch,
            window,
        })
    }

    pub async fn decoded(
        &self,
        ticket: DecodeTicket,
        result: Result<Vec<f32>, SessionError>,
    ) -> bool {
        self.tx
            .send(SessionEvent::Decoded { ticket, result })
            .await
            .is_ok()
    }

    /// For the playback thread. A full inbox hands the id back to retry later.
    pub fn try_unit_finished(&self, id: UnitId) -> Result<(), mpsc::error::TrySendError<SessionEvent>> {
        self.tx.try_send(SessionEvent::UnitFinished(id))
    }
}
