// Fake platform and devices for driving a session without hardware or network.
//
// Every acquisition, schedule and stop call is recorded in one shared state,
// and the output clock only moves when a test sets it.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use live_voice_rs::audio::device::{AudioInput, AudioOutput, InputSpec, OutputSpec, UnitId};
use live_voice_rs::audio::pcm;
use live_voice_rs::config::Config;
use live_voice_rs::error::SessionError;
use live_voice_rs::event::{EventSink, SessionEvent};
use live_voice_rs::keep_alive::PowerLock;
use live_voice_rs::net_link::{NetCommand, TransportHandle};
use live_voice_rs::platform::Platform;
use live_voice_rs::protocol::TransportEvent;
use live_voice_rs::session::VoiceSession;
use tokio::sync::mpsc;

pub const OUTPUT_RATE: u32 = 24000;

#[derive(Debug, Clone, PartialEq)]
pub struct Scheduled {
    pub id: UnitId,
    pub start: f64,
    pub duration: f64,
}

#[derive(Default)]
pub struct FakeState {
    pub clock: f64,
    pub scheduled: Vec<Scheduled>,
    pub stopped: Vec<UnitId>,
    pub tone: bool,

    pub locks_acquired: usize,
    pub locks_released: usize,
    pub lock_held: bool,
    current_lock: usize,

    pub inputs_opened: usize,
    pub inputs_closed: usize,
    pub outputs_opened: usize,
    pub outputs_closed: usize,
    pub transports_opened: usize,

    pub sinks: Vec<EventSink>,
    pub transport_rx: Vec<mpsc::Receiver<NetCommand>>,
}

impl FakeState {
    pub fn acquisitions(&self) -> usize {
        self.locks_acquired + self.inputs_opened + self.outputs_opened + self.transports_opened
    }
}

#[derive(Clone, Default)]
pub struct Shared(Arc<Mutex<FakeState>>);

impl Shared {
    pub fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.0.lock().unwrap()
    }

    pub fn set_clock(&self, seconds: f64) {
        self.lock().clock = seconds;
    }

    /// Sink handed to the most recent transport.
    pub fn sink(&self) -> EventSink {
        self.lock().sinks.last().cloned().expect("no transport opened")
    }

    /// Drain the commands the most recent transport received.
    pub fn sent(&self) -> Vec<NetCommand> {
        let mut state = self.lock();
        let rx = state.transport_rx.last_mut().expect("no transport opened");
        let mut out = Vec::new();
        while let Ok(cmd) = rx.try_recv() {
            out.push(cmd);
        }
        out
    }
}

pub struct FakeLock {
    shared: Shared,
    id: usize,
    released: bool,
}

impl PowerLock for FakeLock {
    fn is_held(&mut self) -> bool {
        let state = self.shared.lock();
        !self.released && state.current_lock == self.id && state.lock_held
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            let mut state = self.shared.lock();
            if state.current_lock == self.id {
                state.lock_held = false;
            }
            state.locks_released += 1;
        }
    }
}

pub struct FakeInput {
    shared: Shared,
    closed: bool,
}

impl AudioInput for FakeInput {
    fn name(&self) -> &str {
        "fake-mic"
    }

    fn close(&mut self) -> anyhow::Result<()> {
        if !self.closed {
            self.closed = true;
            self.shared.lock().inputs_closed += 1;
        }
        Ok(())
    }
}

pub struct FakeOutput {
    shared: Shared,
    closed: bool,
}

impl FakeOutput {
    pub fn new(shared: Shared) -> Self {
        Self {
            shared,
            closed: false,
        }
    }
}

impl AudioOutput for FakeOutput {
    fn name(&self) -> &str {
        "fake-speaker"
    }

    fn sample_rate(&self) -> u32 {
        OUTPUT_RATE
    }

    fn current_time(&self) -> f64 {
        self.shared.lock().clock
    }

    fn schedule(&mut self, id: UnitId, samples: Arc<[f32]>, start_at: f64) -> anyhow::Result<()> {
        if self.closed {
            anyhow::bail!("output closed");
        }
        self.shared.lock().scheduled.push(Scheduled {
            id,
            start: start_at,
            duration: pcm::duration_secs(samples.len(), OUTPUT_RATE),
        });
        Ok(())
    }

    fn stop(&mut self, id: UnitId) {
        self.shared.lock().stopped.push(id);
    }

    fn set_keep_alive_tone(&mut self, enabled: bool) {
        self.shared.lock().tone = enabled;
    }

    fn close(&mut self) -> anyhow::Result<()> {
        if !self.closed {
            self.closed = true;
            self.shared.lock().outputs_closed += 1;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakePlatform {
    pub shared: Shared,
    pub deny_lock: bool,
    pub deny_input: bool,
    pub deny_output: bool,
}

#[async_trait]
impl Platform for FakePlatform {
    async fn acquire_power_lock(&self) -> anyhow::Result<Box<dyn PowerLock>> {
        if self.deny_lock {
            anyhow::bail!("inhibitor not available");
        }
        let mut state = self.shared.lock();
        state.locks_acquired += 1;
        state.current_lock = state.locks_acquired;
        state.lock_held = true;
        Ok(Box::new(FakeLock {
            shared: self.shared.clone(),
            id: state.locks_acquired,
            released: false,
        }))
    }

    async fn open_input(
        &self,
        _spec: InputSpec,
        _sink: EventSink,
    ) -> Result<Box<dyn AudioInput>, SessionError> {
        if self.deny_input {
            return Err(SessionError::Permission("denied by user".into()));
        }
        self.shared.lock().inputs_opened += 1;
        Ok(Box::new(FakeInput {
            shared: self.shared.clone(),
            closed: false,
        }))
    }

    async fn open_output(
        &self,
        _spec: OutputSpec,
        _sink: EventSink,
    ) -> Result<Box<dyn AudioOutput>, SessionError> {
        if self.deny_output {
            return Err(SessionError::Device("no such device".into()));
        }
        self.shared.lock().outputs_opened += 1;
        Ok(Box::new(FakeOutput::new(self.shared.clone())))
    }

    fn open_transport(&self, _config: &Config, sink: EventSink) -> TransportHandle {
        let (tx, rx) = mpsc::channel(64);
        let mut state = self.shared.lock();
        state.transports_opened += 1;
        state.sinks.push(sink);
        state.transport_rx.push(rx);
        TransportHandle::new(tx, None)
    }
}

pub fn test_config() -> Config {
    Config {
        api_key: Some("test-key".to_string()),
        ..Config::default()
    }
}

pub fn new_session(
    platform: FakePlatform,
) -> (VoiceSession<FakePlatform>, mpsc::Receiver<SessionEvent>, Shared) {
    let shared = platform.shared.clone();
    let (session, rx) = VoiceSession::new(test_config(), platform);
    (session, rx, shared)
}

/// Base64 PCM16 fragment of `seconds` at the output rate.
pub fn fragment(seconds: f64) -> String {
    let count = (seconds * OUTPUT_RATE as f64).round() as usize;
    pcm::encode_pcm16(&vec![1000i16; count])
}

/// Handle exactly one event from the inbox.
pub async fn pump(session: &mut VoiceSession<FakePlatform>, rx: &mut mpsc::Receiver<SessionEvent>) {
    let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for session event")
        .expect("session inbox closed");
    session.handle_event(event).await;
}

/// Post a transport event on the current sink and handle it.
pub async fn deliver(
    session: &mut VoiceSession<FakePlatform>,
    rx: &mut mpsc::Receiver<SessionEvent>,
    shared: &Shared,
    event: TransportEvent,
) {
    assert!(shared.sink().transport(event).await);
    pump(session, rx).await;
}

/// Post a fragment and handle both the transport event and its decode result.
pub async fn deliver_fragment(
    session: &mut VoiceSession<FakePlatform>,
    rx: &mut mpsc::Receiver<SessionEvent>,
    shared: &Shared,
    seconds: f64,
) {
    deliver(
        session,
        rx,
        shared,
        TransportEvent::Fragment {
            data: fragment(seconds),
        },
    )
    .await;
    pump(session, rx).await;
}

/// Connect and complete the setup handshake.
pub async fn connected(
    platform: FakePlatform,
) -> (VoiceSession<FakePlatform>, mpsc::Receiver<SessionEvent>, Shared) {
    let (mut session, mut rx, shared) = new_session(platform);
    session.connect().await.expect("connect");
    deliver(&mut session, &mut rx, &shared, TransportEvent::Opened).await;
    (session, rx, shared)
}

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}
