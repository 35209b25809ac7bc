//! Device abstractions the session drives.
//!
//! The output device is also the session clock: every playback unit is
//! scheduled against `AudioOutput::current_time`.

use std::sync::Arc;

use anyhow::Result;

/// Identifier of one scheduled playback unit. Unique for the process lifetime.
pub type UnitId = u64;

/// Requested capture format.
#[derive(Debug, Clone)]
pub struct InputSpec {
    pub device: String,
    pub sample_rate: u32,
    /// Samples per window delivered to the session.
    pub window: usize,
}

/// Requested playback format.
#[derive(Debug, Clone)]
pub struct OutputSpec {
    pub device: String,
    pub sample_rate: u32,
    pub channels: u32,
    pub period_size: usize,
    pub keep_alive_frequency: f32,
    pub keep_alive_amplitude: f32,
}

/// A running capture device. Windows are posted to the session inbox.
pub trait AudioInput: Send {
    fn name(&self) -> &str;

    /// Stop capturing and release the device. Calling it again is a no-op.
    fn close(&mut self) -> Result<()>;
}

/// A running playback device with its own clock.
pub trait AudioOutput: Send {
    fn name(&self) -> &str;

    fn sample_rate(&self) -> u32;

    /// Seconds elapsed on the device clock since it was opened.
    fn current_time(&self) -> f64;

    /// Play `samples` (mono, device rate) starting at `start_at` on the device
    /// clock. A start in the past begins immediately. The device reports the
    /// natural end through `SessionEvent::UnitFinished`.
    fn schedule(&mut self, id: UnitId, samples: Arc<[f32]>, start_at: f64) -> Result<()>;

    /// Force-stop a unit now. Unknown or already finished ids are ignored.
    fn stop(&mut self, id: UnitId);

    fn set_keep_alive_tone(&mut self, enabled: bool);

    /// Release the device. Calling it again is a no-op.
    fn close(&mut self) -> Result<()>;
}
