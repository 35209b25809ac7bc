//! Every OS handle owned by the live session, released through one entry point.

use crate::audio::decode::DecodeWorker;
use crate::audio::device::{AudioInput, AudioOutput};
use crate::keep_alive::PowerLock;
use crate::net_link::TransportHandle;

#[derive(Default)]
pub struct ResourceSet {
    pub power_lock: Option<Box<dyn PowerLock>>,
    pub input: Option<Box<dyn AudioInput>>,
    pub output: Option<Box<dyn AudioOutput>>,
    /// Whether the keep-alive tone was started on `output`.
    pub keep_alive_tone: bool,
    pub decoder: Option<DecodeWorker>,
    pub transport: Option<TransportHandle>,
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Release whatever is held. Each step stands alone: a missing resource is
    /// skipped and a failing one is logged without stopping the rest.
    /// Safe to call any number of times.
    pub fn release(&mut self) {
        if let Some(mut lock) = self.power_lock.take() {
            lock.release();
        }

        if let Some(mut input) = self.input.take() {
            if let Err(e) = input.close() {
                log::warn!("Failed to close input device {}: {:#}", input.name(), e);
            }
        }

        if self.keep_alive_tone {
            if let Some(output) = self.output.as_mut() {
                output.set_keep_alive_tone(false);
            }
            self.keep_alive_tone = false;
        }

        if let Some(mut output) = self.output.take() {
            if let Err(e) = output.close() {
                log::warn!("Failed to close output device {}: {:#}", output.name(), e);
            }
        }

        if let Some(mut decoder) = self.decoder.take() {
            decoder.shutdown();
        }

        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.power_lock.is_none()
            && self.input.is_none()
            && self.output.is_none()
            && !self.keep_alive_tone
            && self.decoder.is_none()
            && self.transport.is_none()
    }
}

impl Drop for ResourceSet {
    fn drop(&mut self) {
        self.release();
    }
}
