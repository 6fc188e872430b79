// SPDX-License-Identifier: Apache-2.0
//! polling
//!
//! Layer: Application
//! Purpose:
//! - bounded re-probing for operations the host completes out of band
//!
//! Notes:
//! - `attempts` counts probes; the delay only sits between probes.
//! - Cancellation is checked before every probe, never inside a delay.

use std::{future::Future, time::Duration};

use tokio::sync::watch;
use tracing::debug;

use crate::error::{Error, Result};

/// Read side of the engine's stop signal.
#[derive(Debug, Clone)]
pub struct Cancellation {
    rx: watch::Receiver<bool>,
}

impl Cancellation {
    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

/// Probe until `Some`, at most `attempts` times.
async fn probe_until<T, F, Fut>(
    what: &'static str,
    attempts: u32,
    delay: Duration,
    cancel: &Cancellation,
    mut probe: F,
) -> Result<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    for attempt in 1..=attempts {
        cancel.check()?;
        if let Some(found) = probe().await? {
            return Ok(Some(found));
        }
        if attempt < attempts {
            debug!(what, attempt, attempts, "not ready; retrying");
            tokio::time::sleep(delay).await;
        }
    }
    Ok(None)
}

/// Group membership lookup. Gives up quietly: exhaustion is `Ok(None)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MembershipPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for MembershipPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_secs(1),
        }
    }
}

impl MembershipPolicy {
    pub async fn run<T, F, Fut>(&self, cancel: &Cancellation, probe: F) -> Result<Option<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        probe_until("room membership", self.attempts, self.delay, cancel, probe).await
    }
}

/// Host-produced results (voice transcoding, OCR). Exhaustion is
/// `Error::Timeout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultPolicy {
    pub attempts: u32,
    pub delay: Duration,
    what: &'static str,
}

impl ResultPolicy {
    pub fn audio() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(1),
            what: "get audio msg",
        }
    }

    pub fn ocr() -> Self {
        Self {
            attempts: 2,
            delay: Duration::from_secs(1),
            what: "get ocr result",
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub async fn run<T, F, Fut>(&self, cancel: &Cancellation, probe: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        probe_until(self.what, self.attempts, self.delay, cancel, probe)
            .await?
            .ok_or(Error::Timeout(self.what))
    }
}

/// Image decryption after an attachment download. Exhaustion is
/// `Error::DecryptFailed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecryptPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for DecryptPolicy {
    fn default() -> Self {
        Self {
            attempts: 30,
            delay: Duration::from_secs(1),
        }
    }
}

impl DecryptPolicy {
    pub async fn run<T, F, Fut>(&self, cancel: &Cancellation, probe: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        probe_until("decrypt image", self.attempts, self.delay, cancel, probe)
            .await?
            .ok_or(Error::DecryptFailed)
    }
}
