//! Dedicated worker thread for engine runs
//!
//! Each workspace owns at most one run at a time. Starting a new run
//! cancels and joins whatever is in flight first, then executes the new
//! run on a fresh thread and delivers the outcome through a single
//! completion callback. The callback receives the final context back so a
//! pausing outcome can be resumed by starting another run with it.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tracing::debug;

use crate::cancel::CancellationToken;
use crate::context::{UpdateContext, UpdateResult};
use crate::engine::SyncEngine;

/// Callback invoked exactly once when a run finishes, pauses, or fails.
pub type CompletionCallback = Box<dyn FnOnce(UpdateContext, UpdateResult, String) + Send>;

struct ActiveRun {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the single in-flight run of one workspace.
#[derive(Default)]
pub struct WorkspaceWorker {
    active: Mutex<Option<ActiveRun>>,
}

impl WorkspaceWorker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a run, canceling and joining any run already in flight.
    pub fn start(
        &self,
        engine: Arc<SyncEngine>,
        mut context: UpdateContext,
        on_complete: CompletionCallback,
    ) {
        self.cancel();

        let token = CancellationToken::new();
        let run_token = token.clone();
        let handle = std::thread::spawn(move || {
            let (result, message) = engine.run(&mut context, &run_token);
            on_complete(context, result, message);
        });

        *self.active.lock().expect("worker lock") = Some(ActiveRun { token, handle });
    }

    /// Cancel the in-flight run, if any, and wait for it to finish. The
    /// run's completion callback still fires, with a `Canceled` result.
    pub fn cancel(&self) {
        let active = self.active.lock().expect("worker lock").take();
        if let Some(run) = active {
            debug!("Canceling in-flight run");
            run.token.cancel();
            let _ = run.handle.join();
        }
    }

    /// True while a run is executing.
    pub fn is_busy(&self) -> bool {
        let mut active = self.active.lock().expect("worker lock");
        match active.as_ref() {
            Some(run) if run.handle.is_finished() => {
                // Reap the finished thread so the handle is not leaked.
                if let Some(run) = active.take() {
                    let _ = run.handle.join();
                }
                false
            }
            Some(_) => true,
            None => false,
        }
    }
}

impl Drop for WorkspaceWorker {
    fn drop(&mut self) {
        self.cancel();
    }
}
