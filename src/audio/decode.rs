//! Background decoding of inbound audio fragments.
//!
//! One task per session pulls fragments off an unbounded queue in arrival
//! order and posts each result back to the session inbox together with the
//! ticket it was submitted under.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::pcm;
use crate::event::EventSink;
use crate::playback::DecodeTicket;

pub struct DecodeWorker {
    tx: mpsc::UnboundedSender<(DecodeTicket, String)>,
    task: Option<JoinHandle<()>>,
}

impl DecodeWorker {
    pub fn spawn(sink: EventSink) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<(DecodeTicket, String)>();

        let task = tokio::spawn(async move {
            while let Some((ticket, data)) = rx.recv().await {
                let result = pcm::decode_fragment(&data);
                if let Err(e) = &result {
                    log::warn!("Fragment decode failed: {}", e);
                }
                if !sink.decoded(ticket, result).await {
                    break;
                }
            }
            log::debug!("Decode worker stopped");
        });

        Self {
            tx,
            task: Some(task),
        }
    }

    /// Queue a fragment. Returns false once the worker has stopped.
    pub fn submit(&self, ticket: DecodeTicket, data: String) -> bool {
        self.tx.send((ticket, data)).is_ok()
    }

    /// Abandon queued work and stop the task.
    pub fn shutdown(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for DecodeWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
