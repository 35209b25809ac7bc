//! Power-management lock for the duration of a session.
//!
//! On Linux the lock is a `systemd-inhibit` child process: the inhibitor is
//! held for as long as the child is alive. The near-silent keep-alive tone
//! lives in the output device's mixer; this module only owns the lock.

use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::process::{Child, Command};

const INHIBIT_PROGRAM: &str = "systemd-inhibit";

pub trait PowerLock: Send {
    /// False once the platform revoked the lock or it was released.
    fn is_held(&mut self) -> bool;

    /// Drop the lock. Calling it again is a no-op.
    fn release(&mut self);
}

pub struct InhibitorLock {
    child: Option<Child>,
}

impl InhibitorLock {
    pub fn acquire(who: &str) -> Result<Self> {
        let child = Command::new(INHIBIT_PROGRAM)
            .arg("--what=idle:sleep")
            .arg("--mode=block")
            .arg(format!("--who={}", who))
            .arg("--why=Live voice session in progress")
            .arg("sleep")
            .arg("infinity")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn {}", INHIBIT_PROGRAM))?;

        log::info!("Power lock acquired (pid {:?})", child.id());
        Ok(Self { child: Some(child) })
    }
}

impl PowerLock for InhibitorLock {
    fn is_held(&mut self) -> bool {
        match self.child.as_mut().map(|c| c.try_wait()) {
            Some(Ok(None)) => true,
            Some(Ok(Some(status))) => {
                log::warn!("Power lock process exited: {}", status);
                self.child = None;
                false
            }
            Some(Err(e)) => {
                log::warn!("Power lock status unknown: {}", e);
                false
            }
            None => false,
        }
    }

    fn release(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                log::warn!("Failed to release power lock: {}", e);
            } else {
                log::info!("Power lock released");
            }
        }
    }
}

impl Drop for InhibitorLock {
    fn drop(&mut self) {
        self.release();
    }
}
