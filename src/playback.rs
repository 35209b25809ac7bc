//! Gapless, interruptible scheduling of synthesized speech.
//!
//! Every decoded fragment becomes a [`PlaybackUnit`] that starts exactly where
//! the previous one ends (`next_start_time`), or right away when the device
//! has gone idle or the fragment arrived late. The scheduler keeps the live
//! set of units that are scheduled but not finished; the remote side is
//! speaking exactly while that set is non-empty.
//!
//! Interruption stops every live unit at once, clears the set and rewinds the
//! cursor to zero. It also bumps the generation so decode results that were
//! still in flight are discarded instead of resurrecting the live set.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::audio::device::{AudioOutput, UnitId};
use crate::audio::pcm;

static NEXT_UNIT_ID: AtomicU64 = AtomicU64::new(1);

/// One scheduled chunk of synthesized audio.
#[derive(Debug, Clone)]
pub struct PlaybackUnit {
    pub id: UnitId,
    pub buffer: Arc<[f32]>,
    /// Start on the output device clock, in seconds.
    pub scheduled_start: f64,
    pub duration: f64,
}

impl PlaybackUnit {
    pub fn end(&self) -> f64 {
        self.scheduled_start + self.duration
    }
}

/// Proof that a decode was requested under a given scheduler generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeTicket {
    generation: u64,
}

pub struct PlaybackScheduler {
    sample_rate: u32,
    live: BTreeMap<UnitId, PlaybackUnit>,
    next_start_time: f64,
    generation: u64,
    armed: bool,
}

impl PlaybackScheduler {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            live: BTreeMap::new(),
            next_start_time: 0.0,
            generation: 0,
            armed: false,
        }
    }

    /// Start accepting fragments (transport acknowledged the session).
    pub fn arm(&mut self) {
        self.armed = true;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Ticket to attach to a fragment before handing it to the decoder.
    pub fn ticket(&self) -> DecodeTicket {
        DecodeTicket {
            generation: self.generation,
        }
    }

    pub fn is_current(&self, ticket: DecodeTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Schedule decoded samples behind everything already queued.
    ///
    /// Returns the new unit id, or `None` when the ticket is stale, the
    /// scheduler is disarmed, or the device refused the buffer.
    pub fn enqueue(
        &mut self,
        ticket: DecodeTicket,
        samples: Vec<f32>,
        output: &mut dyn AudioOutput,
    ) -> Option<UnitId> {
        if !self.is_current(ticket) {
            log::debug!(
                "Discarding fragment decoded under generation {} (now {})",
                ticket.generation,
                self.generation
            );
            return None;
        }
        if !self.armed {
            log::debug!("Discarding fragment, playback not armed");
            return None;
        }
        if samples.is_empty() {
            return None;
        }

        let now = output.current_time();
        let scheduled_start = self.next_start_time.max(now);
        let duration = pcm::duration_secs(samples.len(), self.sample_rate);
        let id = NEXT_UNIT_ID.fetch_add(1, Ordering::Relaxed);
        let buffer: Arc<[f32]> = samples.into();

        if let Err(e) = output.schedule(id, buffer.clone(), scheduled_start) {
            log::warn!("Output device refused playback unit {}: {:#}", id, e);
            return None;
        }

        let unit = PlaybackUnit {
            id,
            buffer,
            scheduled_start,
            duration,
        };
        self.next_start_time = unit.end();
        log::debug!(
            "Scheduled unit {} at {:.3}s for {:.3}s (clock {:.3}s, {} live)",
            id,
            scheduled_start,
            duration,
            now,
            self.live.len() + 1
        );
        self.live.insert(id, unit);
        Some(id)
    }

    /// A unit reached its natural end on the device.
    ///
    /// Returns true if this emptied the live set. Ids that were already
    /// force-stopped are ignored.
    pub fn on_unit_finished(&mut self, id: UnitId) -> bool {
        if self.live.remove(&id).is_none() {
            return false;
        }
        self.live.is_empty()
    }

    /// Barge-in: stop everything now, clear the live set, rewind the cursor.
    ///
    /// `output` may be absent when the device is already gone; the bookkeeping
    /// is reset either way.
    pub fn interrupt(&mut self, output: Option<&mut (dyn AudioOutput + 'static)>) {
        let stopped = self.live.len();
        if let Some(output) = output {
            for id in self.live.keys() {
                output.stop(*id);
            }
        }
        self.live.clear();
        self.next_start_time = 0.0;
        self.generation += 1;
        if stopped > 0 {
            log::info!("Playback interrupted, {} unit(s) stopped", stopped);
        }
    }

    /// Interrupt and stop accepting fragments until re-armed.
    pub fn reset(&mut self, output: Option<&mut (dyn AudioOutput + 'static)>) {
        self.interrupt(output);
        self.armed = false;
    }

    pub fn is_remote_speaking(&self) -> bool {
        !self.live.is_empty()
    }

    pub fn next_start_time(&self) -> f64 {
        self.next_start_time
    }

    pub fn live_units(&self) -> impl Iterator<Item = &PlaybackUnit> {
        self.live.values()
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}
