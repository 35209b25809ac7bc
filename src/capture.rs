//! Microphone windows to outbound frames.
//!
//! Each window is quantized to PCM16, base64 encoded and wrapped in a
//! `realtimeInput` message tagged with the capture MIME type. Windows that
//! arrive while the transport is not open are dropped, never queued.

use crate::audio::pcm;
use crate::net_link::TransportHandle;
use crate::protocol::RealtimeInput;

/// Serialize one capture window into a transport frame.
pub fn capture_frame(mime_type: &str, window: &[f32]) -> serde_json::Result<String> {
    let data = pcm::encode_pcm16(&pcm::quantize(window));
    serde_json::to_string(&RealtimeInput::audio(mime_type.to_string(), data))
}

pub struct CaptureStage {
    armed: bool,
    mime_type: String,
    frames_sent: u64,
    frames_dropped: u64,
}

impl CaptureStage {
    pub fn new(mime_type: String) -> Self {
        Self {
            armed: false,
            mime_type,
            frames_sent: 0,
            frames_dropped: 0,
        }
    }

    pub fn arm(&mut self) {
        self.armed = true;
    }

    pub fn disarm(&mut self) {
        self.armed = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Returns true if the window went out on the transport.
    pub fn on_window(&mut self, window: &[f32], transport: Option<&TransportHandle>) -> bool {
        let transport = match transport {
            Some(t) if self.armed && t.is_ready() => t,
            _ => {
                self.frames_dropped += 1;
                log::debug!("Dropping capture window, transport not open");
                return false;
            }
        };

        let frame = match capture_frame(&self.mime_type, window) {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("Failed to serialize capture frame: {}", e);
                self.frames_dropped += 1;
                return false;
            }
        };

        if transport.send_text(frame) {
            self.frames_sent += 1;
            true
        } else {
            self.frames_dropped += 1;
            false
        }
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }
}
