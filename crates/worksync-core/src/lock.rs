//! Cross-workspace toolchain exclusivity
//!
//! Project generation and builds from different workspaces on the same
//! machine must not overlap. All engines sharing a machine are handed the
//! same [`ToolchainSlot`]; a run acquires it once before its first
//! exclusive phase and the [`SlotGuard`] releases it when dropped, whether
//! the run succeeds, fails, or is canceled.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::cancel::CancellationToken;
use crate::{Error, Result};

const WAIT_SLICE: Duration = Duration::from_millis(100);

/// A single machine-wide slot for exclusive toolchain phases.
#[derive(Debug, Default)]
pub struct ToolchainSlot {
    held: Mutex<bool>,
    released: Condvar,
}

impl ToolchainSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the slot, waiting up to `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `Error::SlotTimeout` if the slot is still held at the
    /// deadline, or `Error::Canceled` if the token trips while waiting.
    pub fn acquire(
        self: &Arc<Self>,
        timeout: Duration,
        token: &CancellationToken,
    ) -> Result<SlotGuard> {
        let deadline = Instant::now() + timeout;
        let mut held = self.held.lock().expect("toolchain slot lock");
        while *held {
            token.check()?;
            if Instant::now() >= deadline {
                return Err(Error::SlotTimeout);
            }
            let (guard, _) = self
                .released
                .wait_timeout(held, WAIT_SLICE)
                .expect("toolchain slot lock");
            held = guard;
        }
        *held = true;
        debug!("toolchain slot acquired");
        Ok(SlotGuard {
            slot: Arc::clone(self),
        })
    }
}

/// Holds the slot until dropped.
#[derive(Debug)]
pub struct SlotGuard {
    slot: Arc<ToolchainSlot>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let mut held = self.slot.held.lock().expect("toolchain slot lock");
        *held = false;
        self.slot.released.notify_all();
        debug!("toolchain slot released");
    }
}
