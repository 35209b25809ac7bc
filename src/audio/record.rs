use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Result};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::oneshot;

use super::alsa_device;
use super::device::{AudioInput, InputSpec};
use crate::event::EventSink;

/// Microphone on a dedicated OS thread, posting fixed-size windows.
pub struct AlsaInput {
    name: String,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl AlsaInput {
    /// Resolves once the device is open and capturing, or with the reason it
    /// could not be opened.
    pub async fn open(spec: InputSpec, sink: EventSink) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = oneshot::channel();
        let name = spec.device.clone();

        let r = running.clone();
        let handle = thread::Builder::new()
            .name("alsa-capture".into())
            .spawn(move || {
                record_thread(&spec, &sink, &r, ready_tx);
            })?;

        match ready_rx.await {
            Ok(Ok(())) => Ok(Self {
                name,
                running,
                handle: Some(handle),
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => Err(anyhow!("Capture thread exited before opening {}", name)),
        }
    }
}

impl AudioInput for AlsaInput {
    fn name(&self) -> &str {
        &self.name
    }

    fn close(&mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| anyhow!("Capture thread for {} panicked", self.name))?;
            log::info!("Capture device {} closed", self.name);
        }
        Ok(())
    }
}

impl Drop for AlsaInput {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("{:#}", e);
        }
    }
}

fn record_thread(
    spec: &InputSpec,
    sink: &EventSink,
    running: &AtomicBool,
    ready: oneshot::Sender<Result<()>>,
) {
    // 1. Open ALSA capture device
    let (pcm, params) = match alsa_device::open_capture(&spec.device, spec.sample_rate) {
        Ok(opened) => opened,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let io = match pcm.io_f32() {
        Ok(io) => io,
        Err(e) => {
            let _ = ready.send(Err(e.into()));
            return;
        }
    };
    if ready.send(Ok(())).is_err() {
        return;
    }

    let period_size = params.period_size;
    let window_len = spec.window.max(1);
    let mut read_buf = vec![0f32; period_size];
    // Accumulation buffer for one capture window
    let mut accum_buf: Vec<f32> = Vec::with_capacity(window_len * 2);
    let mut dropped = 0u64;

    log::info!(
        "Recording started: rate={}, period={}, window={}",
        params.sample_rate,
        period_size,
        window_len,
    );

    while running.load(Ordering::Relaxed) {
        match io.readi(&mut read_buf) {
            Ok(frames) => {
                accum_buf.extend_from_slice(&read_buf[..frames]);

                while accum_buf.len() >= window_len {
                    let window: Vec<f32> = accum_buf.drain(..window_len).collect();
                    match sink.try_capture(window) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            dropped += 1;
                            log::warn!("Session inbox full, capture window dropped ({} total)", dropped);
                        }
                        Err(TrySendError::Closed(_)) => {
                            log::info!("Session inbox closed, stopping capture");
                            return;
                        }
                    }
                }
            }
            Err(e) => {
                log::warn!("ALSA capture error: {}, recovering...", e);
                if let Err(e2) = pcm.prepare() {
                    log::error!("Failed to recover PCM capture: {}", e2);
                    break;
                }
            }
        }
    }

    log::info!("Recording stopped");
}
