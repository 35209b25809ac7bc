use crate::audio::decode::DecodeWorker;
use crate::audio::device::{InputSpec, OutputSpec};
use crate::capture::CaptureStage;
use crate::config::Config;
use crate::error::SessionError;
use crate::event::{EventSink, SessionEvent};
use crate::playback::{DecodeTicket, PlaybackScheduler};
use crate::platform::Platform;
use crate::protocol::{Speaker, TransportEvent};
use crate::resources::ResourceSet;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};

const INBOX_CAPACITY: usize = 256;
const TRANSCRIPT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Everything a front-end may observe about the session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub last_error: Option<String>,
    pub is_remote_speaking: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptLine {
    pub speaker: Speaker,
    pub text: String,
}

/// The one live conversation.
///
/// Owned by the event loop; every asynchronous input arrives through
/// [`VoiceSession::handle_event`], so nothing here needs a lock.
pub struct VoiceSession<P: Platform> {
    config: Config,
    platform: P,
    events_tx: mpsc::Sender<SessionEvent>,
    epoch: u64,
    status: SessionStatus,
    last_error: Option<String>,
    resources: ResourceSet,
    scheduler: PlaybackScheduler,
    capture: CaptureStage,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    transcript_tx: broadcast::Sender<TranscriptLine>,
}

impl<P: Platform> VoiceSession<P> {
    /// Build an idle session. The returned receiver is its inbox; the event
    /// loop feeds whatever arrives there back into `handle_event`.
    pub fn new(config: Config, platform: P) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (events_tx, events_rx) = mpsc::channel(INBOX_CAPACITY);
        let (snapshot_tx, _) = watch::channel(SessionSnapshot {
            status: SessionStatus::Disconnected,
            last_error: None,
            is_remote_speaking: false,
        });
        let (transcript_tx, _) = broadcast::channel(TRANSCRIPT_CAPACITY);

        let session = Self {
            scheduler: PlaybackScheduler::new(config.output_sample_rate),
            capture: CaptureStage::new(config.input_mime_type()),
            config,
            platform,
            events_tx,
            epoch: 0,
            status: SessionStatus::Disconnected,
            last_error: None,
            resources: ResourceSet::new(),
            snapshot_tx,
            transcript_tx,
        };
        (session, events_rx)
    }

    /// Start a session, tearing down any previous one first.
    ///
    /// Returns once the devices are running and the transport handshake is
    /// in flight; `Connected` follows when the service acknowledges. Errors
    /// are also reflected in the status.
    pub async fn connect(&mut self) -> Result<(), SessionError> {
        if self.config.credential().is_none() {
            let error = SessionError::Configuration(self.config.api_key_env.to_string());
            self.release_session();
            return Err(self.settle_error(error));
        }

        self.release_session();
        self.status = SessionStatus::Connecting;
        self.publish();
        log::info!("Connecting session (epoch {})", self.epoch);

        let sink = EventSink::new(self.epoch, self.events_tx.clone());

        match self.platform.acquire_power_lock().await {
            Ok(lock) => self.resources.power_lock = Some(lock),
            Err(e) => log::warn!("Continuing without power lock: {:#}", e),
        }

        let input_spec = InputSpec {
            device: self.config.capture_device.to_string(),
            sample_rate: self.config.input_sample_rate,
            window: self.config.capture_window,
        };
        match self.platform.open_input(input_spec, sink.clone()).await {
            Ok(input) => self.resources.input = Some(input),
            Err(e) => return Err(self.fail(e)),
        }

        let output_spec = OutputSpec {
            device: self.config.playback_device.to_string(),
            sample_rate: self.config.output_sample_rate,
            channels: self.config.playback_channels,
            period_size: self.config.playback_period_size,
            keep_alive_frequency: self.config.keep_alive_frequency,
            keep_alive_amplitude: self.config.keep_alive_amplitude,
        };
        match self.platform.open_output(output_spec, sink.clone()).await {
            Ok(mut output) => {
                output.set_keep_alive_tone(true);
                self.resources.keep_alive_tone = true;
                self.resources.output = Some(output);
            }
            Err(e) => return Err(self.fail(e)),
        }

        self.resources.decoder = Some(DecodeWorker::spawn(sink.clone()));
        self.resources.transport = Some(self.platform.open_transport(&self.config, sink));
        Ok(())
    }

    /// End the session from any state. Calling it again changes nothing.
    pub fn disconnect(&mut self) {
        if self.status != SessionStatus::Disconnected || !self.resources.is_empty() {
            log::info!("Disconnecting session");
        }
        self.release_session();
        self.status = SessionStatus::Disconnected;
        self.last_error = None;
        self.publish();
    }

    /// Manual barge-in: silence the assistant without ending the session.
    pub fn stop_playback(&mut self) {
        self.scheduler
            .interrupt(self.resources.output.as_deref_mut());
        self.publish();
    }

    /// Process exit. Leaves nothing acquired.
    pub fn shutdown(&mut self) {
        self.release_session();
        self.status = SessionStatus::Disconnected;
        self.publish();
    }

    pub async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Transport { epoch, event } => {
                if epoch != self.epoch || self.resources.transport.is_none() {
                    log::debug!("Ignoring transport event from epoch {}: {:?}", epoch, event);
                    return;
                }
                self.on_transport_event(event);
            }
            SessionEvent::Capture { epoch, window } => {
                if epoch != self.epoch {
                    return;
                }
                self.capture
                    .on_window(&window, self.resources.transport.as_ref());
            }
            SessionEvent::Decoded { ticket, result } => match result {
                Ok(samples) => self.on_decoded(ticket, samples),
                Err(e) => log::warn!("Dropping fragment: {}", e),
            },
            SessionEvent::UnitFinished(id) => {
                if self.scheduler.on_unit_finished(id) {
                    log::debug!("Remote finished speaking");
                    self.publish();
                }
            }
            SessionEvent::Foreground => self.on_foreground().await,
        }
    }

    fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => {
                if self.status != SessionStatus::Connecting {
                    log::warn!("Unexpected setup acknowledgment in state {:?}", self.status);
                    return;
                }
                if let Some(transport) = self.resources.transport.as_mut() {
                    transport.mark_ready();
                }
                self.status = SessionStatus::Connected;
                self.last_error = None;
                self.capture.arm();
                self.scheduler.arm();
                log::info!("Session connected");
                self.publish();
            }
            TransportEvent::Fragment { data } => {
                if !self.scheduler.is_armed() {
                    log::debug!("Dropping fragment received before setup completed");
                    return;
                }
                let ticket = self.scheduler.ticket();
                if let Some(decoder) = self.resources.decoder.as_ref() {
                    if !decoder.submit(ticket, data) {
                        log::warn!("Decode worker is gone, fragment dropped");
                    }
                }
            }
            TransportEvent::Interrupted => {
                log::info!("Remote signalled interruption");
                self.stop_playback();
            }
            TransportEvent::TurnComplete => {
                log::debug!("Turn complete");
            }
            TransportEvent::Transcript { speaker, text } => {
                let _ = self.transcript_tx.send(TranscriptLine { speaker, text });
            }
            TransportEvent::Closed { code, reason } => {
                if self.status == SessionStatus::Connecting {
                    // Setup never completed, so even a clean close is a failed open.
                    self.fail(SessionError::Transport(match code {
                        Some(code) => format!(
                            "connection closed before setup completed with code {}: {}",
                            code, reason
                        ),
                        None => "connection closed before setup completed".to_string(),
                    }));
                } else if TransportEvent::is_orderly_close(code) {
                    log::info!("Remote closed the session: {:?} {}", code, reason);
                    self.release_session();
                    self.status = SessionStatus::Disconnected;
                    self.publish();
                } else {
                    let code = code.unwrap_or_default();
                    self.fail(SessionError::Transport(format!(
                        "connection closed with code {}: {}",
                        code, reason
                    )));
                }
            }
            TransportEvent::Error(message) => {
                if let Some(transport) = self.resources.transport.as_mut() {
                    transport.mark_failed();
                }
                self.fail(SessionError::Transport(message));
            }
        }
    }

    fn on_decoded(&mut self, ticket: DecodeTicket, samples: Vec<f32>) {
        let Some(output) = self.resources.output.as_deref_mut() else {
            return;
        };
        if self.scheduler.enqueue(ticket, samples, output).is_some() {
            self.publish();
        }
    }

    async fn on_foreground(&mut self) {
        if self.status != SessionStatus::Connected {
            return;
        }
        let held = self
            .resources
            .power_lock
            .as_mut()
            .map(|lock| lock.is_held())
            .unwrap_or(false);
        if held {
            return;
        }

        log::info!("Back in foreground, re-requesting power lock");
        match self.platform.acquire_power_lock().await {
            Ok(lock) => {
                if let Some(mut stale) = self.resources.power_lock.replace(lock) {
                    stale.release();
                }
            }
            Err(e) => log::warn!("Power lock still unavailable: {:#}", e),
        }
    }

    /// Surface an error: release everything and rest in `Error`.
    fn fail(&mut self, error: SessionError) -> SessionError {
        self.release_session();
        self.settle_error(error)
    }

    fn settle_error(&mut self, error: SessionError) -> SessionError {
        log::error!("Session error: {}", error);
        self.status = SessionStatus::Error;
        self.last_error = Some(error.to_string());
        self.publish();
        error
    }

    fn release_session(&mut self) {
        self.capture.disarm();
        self.scheduler.reset(self.resources.output.as_deref_mut());
        self.resources.release();
        // Anything still in flight from the old devices now carries a stale epoch.
        self.epoch += 1;
    }

    fn publish(&self) {
        let snapshot = self.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current != snapshot {
                *current = snapshot;
                true
            } else {
                false
            }
        });
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            last_error: self.last_error.clone(),
            is_remote_speaking: self.scheduler.is_remote_speaking(),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_remote_speaking(&self) -> bool {
        self.scheduler.is_remote_speaking()
    }

    pub fn next_start_time(&self) -> f64 {
        self.scheduler.next_start_time()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn transcripts(&self) -> broadcast::Receiver<TranscriptLine> {
        self.transcript_tx.subscribe()
    }

    pub fn scheduler(&self) -> &PlaybackScheduler {
        &self.scheduler
    }

    pub fn capture(&self) -> &CaptureStage {
        &self.capture
    }

    pub fn resources(&self) -> &ResourceSet {
        &self.resources
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }
}
