//! Full-duplex voice session with a live speech-to-speech service.
//!
//! Microphone windows stream out as PCM16 frames; synthesized speech streams
//! back and is scheduled gaplessly on the output device, with barge-in
//! stopping playback at once.

pub mod audio;
pub mod capture;
pub mod config;
pub mod control_bridge;
pub mod error;
pub mod event;
pub mod keep_alive;
pub mod net_link;
pub mod platform;
pub mod playback;
pub mod protocol;
pub mod resources;
pub mod session;

pub use config::Config;
pub use error::SessionError;
pub use session::{SessionSnapshot, SessionStatus, VoiceSession};
