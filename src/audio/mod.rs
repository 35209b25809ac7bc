//! audio - Capture, playback and PCM conversion
//!
//! The device traits and the mixer timeline are always built. The ALSA
//! backend runs capture and playback on dedicated OS threads and is only
//! compiled with the `alsa` feature.

#[cfg(feature = "alsa")]
mod alsa_device;
pub mod decode;
pub mod device;
pub mod mixer;
pub mod pcm;
#[cfg(feature = "alsa")]
pub mod play;
#[cfg(feature = "alsa")]
pub mod record;

pub use decode::DecodeWorker;
pub use device::{AudioInput, AudioOutput, InputSpec, OutputSpec, UnitId};
