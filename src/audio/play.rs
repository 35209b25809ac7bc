use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Result};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::sync::oneshot;

use super::alsa_device;
use super::device::{AudioOutput, OutputSpec, UnitId};
use super::mixer::Timeline;
use super::pcm;
use crate::event::EventSink;

/// XRUN recoveries attempted per period before the period is dropped.
const MAX_RECOVERY_RETRIES: u32 = 3;

enum PlayCommand {
    Schedule {
        id: UnitId,
        start_frame: u64,
        samples: Arc<[f32]>,
    },
    Stop(UnitId),
    Tone(bool),
}

/// Speaker on a dedicated OS thread. The clock it publishes is the first
/// frame a command sent now can still take effect at.
pub struct AlsaOutput {
    name: String,
    sample_rate: u32,
    frames: Arc<AtomicU64>,
    cmd_tx: UnboundedSender<PlayCommand>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl AlsaOutput {
    pub async fn open(spec: OutputSpec, sink: EventSink) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let frames = Arc::new(AtomicU64::new(0));
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let name = spec.device.clone();
        let sample_rate = spec.sample_rate;

        let r = running.clone();
        let f = frames.clone();
        let handle = thread::Builder::new()
            .name("alsa-playback".into())
            .spawn(move || {
                play_thread(&spec, &sink, cmd_rx, &f, &r, ready_tx);
            })?;

        match ready_rx.await {
            Ok(Ok(())) => Ok(Self {
                name,
                sample_rate,
                frames,
                cmd_tx,
                running,
                handle: Some(handle),
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => Err(anyhow!("Playback thread exited before opening {}", name)),
        }
    }

    fn command(&self, cmd: PlayCommand) -> Result<()> {
        self.cmd_tx
            .send(cmd)
            .map_err(|_| anyhow!("Playback thread for {} is not running", self.name))
    }
}

impl AudioOutput for AlsaOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn current_time(&self) -> f64 {
        self.frames.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }

    fn schedule(&mut self, id: UnitId, samples: Arc<[f32]>, start_at: f64) -> Result<()> {
        let start_frame = (start_at.max(0.0) * self.sample_rate as f64).round() as u64;
        self.command(PlayCommand::Schedule {
            id,
            start_frame,
            samples,
        })
    }

    fn stop(&mut self, id: UnitId) {
        // A unit that already finished is simply not found by the thread.
        let _ = self.command(PlayCommand::Stop(id));
    }

    fn set_keep_alive_tone(&mut self, enabled: bool) {
        let _ = self.command(PlayCommand::Tone(enabled));
    }

    fn close(&mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| anyhow!("Playback thread for {} panicked", self.name))?;
            log::info!("Playback device {} closed", self.name);
        }
        Ok(())
    }
}

impl Drop for AlsaOutput {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("{:#}", e);
        }
    }
}

fn play_thread(
    spec: &OutputSpec,
    sink: &EventSink,
    mut cmd_rx: UnboundedReceiver<PlayCommand>,
    frames: &AtomicU64,
    running: &AtomicBool,
    ready: oneshot::Sender<Result<()>>,
) {
    // 1. Open ALSA playback device with configurable channels and period size
    let period_size_opt = if spec.period_size > 0 {
        Some(spec.period_size)
    } else {
        None
    };
    let (pcm, params) = match alsa_device::open_playback(
        &spec.device,
        spec.sample_rate,
        spec.channels,
        period_size_opt,
    ) {
        Ok(opened) => opened,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let io = match pcm.io_i16() {
        Ok(io) => io,
        Err(e) => {
            let _ = ready.send(Err(e.into()));
            return;
        }
    };
    if ready.send(Ok(())).is_err() {
        return;
    }

    let channels = params.channels as usize;
    let period_size = params.period_size;
    let mut timeline = Timeline::new(
        params.sample_rate,
        spec.keep_alive_frequency,
        spec.keep_alive_amplitude,
    );
    let mut mono = vec![0f32; period_size];
    let mut interleaved = vec![0i16; period_size * channels];

    log::info!(
        "Playback started: rate={}, ch={}, period={}",
        params.sample_rate,
        channels,
        period_size,
    );

    let mut unreported: Vec<UnitId> = Vec::new();

    'outer: while running.load(Ordering::Relaxed) {
        // 2. Publish the clock, then apply commands at the period boundary
        frames.store(timeline.commit_horizon(period_size), Ordering::Release);
        loop {
            match cmd_rx.try_recv() {
                Ok(PlayCommand::Schedule {
                    id,
                    start_frame,
                    samples,
                }) => timeline.schedule(id, start_frame, samples),
                Ok(PlayCommand::Stop(id)) => {
                    timeline.stop(id);
                }
                Ok(PlayCommand::Tone(enabled)) => timeline.set_tone(enabled),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break 'outer,
            }
        }

        // 3. Render one period and fan mono out to every channel
        unreported.extend(timeline.render(&mut mono));
        for (frame, sample) in pcm::quantize(&mono).into_iter().enumerate() {
            interleaved[frame * channels..(frame + 1) * channels].fill(sample);
        }

        // 4. Write with XRUN recovery; a period that cannot be written is dropped
        let mut frames_written = 0;
        let mut retry_count = 0u32;
        while frames_written < period_size {
            let offset = frames_written * channels;
            match io.writei(&interleaved[offset..]) {
                Ok(n) => {
                    frames_written += n;
                    retry_count = 0; // 成功写入，重置重试计数
                }
                Err(e) => {
                    log::warn!("ALSA XRUN or error: {}, recovering...", e);
                    retry_count += 1;

                    if let Err(e2) = pcm.prepare() {
                        log::error!("Failed to recover PCM playback: {}", e2);
                        break 'outer;
                    }

                    if retry_count >= MAX_RECOVERY_RETRIES {
                        log::error!(
                            "Max recovery retries ({}) reached. Dropping {} unwritten frames.",
                            retry_count,
                            period_size - frames_written
                        );
                        break;
                    }
                }
            }
        }

        // 5. Report finished units without waiting on a full inbox
        while let Some(&id) = unreported.first() {
            match sink.try_unit_finished(id) {
                Ok(()) => {
                    unreported.remove(0);
                }
                Err(TrySendError::Full(_)) => break,
                Err(TrySendError::Closed(_)) => {
                    log::info!("Session inbox closed, stopping playback");
                    break 'outer;
                }
            }
        }
    }

    log::info!("Playback stopped");
}
