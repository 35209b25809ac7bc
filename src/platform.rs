//! Where the session gets its OS resources from.

use async_trait::async_trait;

use crate::audio::device::{AudioInput, AudioOutput, InputSpec, OutputSpec};
use crate::config::Config;
use crate::error::SessionError;
use crate::event::EventSink;
use crate::keep_alive::{InhibitorLock, PowerLock};
use crate::net_link::{NetLink, TransportHandle};

#[async_trait]
pub trait Platform: Send + Sync {
    /// Best-effort; the session carries on without a lock when this fails.
    async fn acquire_power_lock(&self) -> anyhow::Result<Box<dyn PowerLock>>;

    /// Start capturing. Windows are posted to `sink`.
    async fn open_input(
        &self,
        spec: InputSpec,
        sink: EventSink,
    ) -> Result<Box<dyn AudioInput>, SessionError>;

    /// Start the output device. Finished units are posted to `sink`.
    async fn open_output(
        &self,
        spec: OutputSpec,
        sink: EventSink,
    ) -> Result<Box<dyn AudioOutput>, SessionError>;

    /// Begin connecting. The handle starts out `Pending`; the outcome arrives
    /// on `sink` as transport events.
    fn open_transport(&self, config: &Config, sink: EventSink) -> TransportHandle;
}

/// ALSA devices, a systemd inhibitor and the Gemini Live websocket.
pub struct SystemPlatform {
    app_name: &'static str,
}

impl SystemPlatform {
    pub fn new(config: &Config) -> Self {
        Self {
            app_name: config.app_name,
        }
    }
}

#[async_trait]
impl Platform for SystemPlatform {
    async fn acquire_power_lock(&self) -> anyhow::Result<Box<dyn PowerLock>> {
        Ok(Box::new(InhibitorLock::acquire(self.app_name)?))
    }

    #[cfg(feature = "alsa")]
    async fn open_input(
        &self,
        spec: InputSpec,
        sink: EventSink,
    ) -> Result<Box<dyn AudioInput>, SessionError> {
        crate::audio::record::AlsaInput::open(spec, sink)
            .await
            .map(|input| Box::new(input) as Box<dyn AudioInput>)
            .map_err(|e| SessionError::Permission(format!("{:#}", e)))
    }

    #[cfg(not(feature = "alsa"))]
    async fn open_input(
        &self,
        spec: InputSpec,
        _sink: EventSink,
    ) -> Result<Box<dyn AudioInput>, SessionError> {
        Err(SessionError::Permission(format!(
            "cannot open '{}': built without ALSA support",
            spec.device
        )))
    }

    #[cfg(feature = "alsa")]
    async fn open_output(
        &self,
        spec: OutputSpec,
        sink: EventSink,
    ) -> Result<Box<dyn AudioOutput>, SessionError> {
        crate::audio::play::AlsaOutput::open(spec, sink)
            .await
            .map(|output| Box::new(output) as Box<dyn AudioOutput>)
            .map_err(|e| SessionError::Device(format!("{:#}", e)))
    }

    #[cfg(not(feature = "alsa"))]
    async fn open_output(
        &self,
        spec: OutputSpec,
        _sink: EventSink,
    ) -> Result<Box<dyn AudioOutput>, SessionError> {
        Err(SessionError::Device(format!(
            "cannot open '{}': built without ALSA support",
            spec.device
        )))
    }

    fn open_transport(&self, config: &Config, sink: EventSink) -> TransportHandle {
        NetLink::spawn(config, sink)
    }
}
