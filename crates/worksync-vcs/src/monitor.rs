//! Background polling feed of submitted changes
//!
//! The monitor periodically queries the newest changes for the workspace
//! paths and tracks two watermarks: the newest change of any kind, and the
//! newest *code* change. The engine uses the code watermark as the
//! "compatible" version number when stamping version files, so that local
//! builds and precompiled binaries agree on a version even when content-only
//! changes land in between.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::Result;
use crate::client::VcsClient;
use crate::types::ChangeDetails;

/// File extensions that classify a change as a code change.
pub const CODE_EXTENSIONS: &[&str] = &[
    "c", "cc", "cpp", "h", "hpp", "inl", "cs", "usf", "ush", "uproject", "uplugin",
];

/// Most recent change numbers observed by the monitor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorSnapshot {
    /// Newest submitted change across the watched paths
    pub latest_change: Option<i64>,
    /// Newest change that touched code files
    pub latest_code_change: Option<i64>,
}

/// Polls the server for new changes on a background thread.
pub struct ChangesMonitor {
    client: Arc<dyn VcsClient>,
    filespecs: Vec<String>,
    interval: Duration,
    snapshot: Arc<Mutex<MonitorSnapshot>>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ChangesMonitor {
    /// How many changes one poll inspects per filespec.
    const POLL_WINDOW: usize = 10;

    pub fn new(client: Arc<dyn VcsClient>, filespecs: Vec<String>, interval: Duration) -> Self {
        Self {
            client,
            filespecs,
            interval,
            snapshot: Arc::new(Mutex::new(MonitorSnapshot::default())),
            stop: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// The most recent snapshot. Never blocks on the server.
    pub fn snapshot(&self) -> MonitorSnapshot {
        *self.snapshot.lock().expect("monitor snapshot lock")
    }

    /// Run one poll synchronously and return the updated snapshot.
    pub fn poll_once(&self) -> Result<MonitorSnapshot> {
        let updated = poll(
            self.client.as_ref(),
            &self.filespecs,
            self.snapshot(),
        )?;
        *self.snapshot.lock().expect("monitor snapshot lock") = updated;
        Ok(updated)
    }

    /// Start the background polling thread. Errors inside the loop are
    /// logged and retried on the next interval; the previous snapshot stays
    /// visible in the meantime.
    pub fn start(&mut self) {
        if self.handle.is_some() {
            return;
        }
        let client = Arc::clone(&self.client);
        let filespecs = self.filespecs.clone();
        let snapshot = Arc::clone(&self.snapshot);
        let stop = Arc::clone(&self.stop);
        let interval = self.interval;

        self.handle = Some(std::thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                let current = *snapshot.lock().expect("monitor snapshot lock");
                match poll(client.as_ref(), &filespecs, current) {
                    Ok(updated) => {
                        *snapshot.lock().expect("monitor snapshot lock") = updated;
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "Change poll failed, will retry");
                    }
                }
                // Sleep in short slices so shutdown stays responsive
                let mut remaining = interval;
                while !stop.load(Ordering::Relaxed) && !remaining.is_zero() {
                    let slice = remaining.min(Duration::from_millis(100));
                    std::thread::sleep(slice);
                    remaining = remaining.saturating_sub(slice);
                }
            }
        }));
    }

    /// Stop the polling thread and wait for it to exit.
    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ChangesMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Does this change touch any code file?
pub fn is_code_change(details: &ChangeDetails) -> bool {
    details.files.iter().any(|file| {
        file.depot_path
            .rsplit('.')
            .next()
            .is_some_and(|ext| CODE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
    })
}

fn poll(
    client: &dyn VcsClient,
    filespecs: &[String],
    mut snapshot: MonitorSnapshot,
) -> Result<MonitorSnapshot> {
    for filespec in filespecs {
        let changes = client.changes(filespec, ChangesMonitor::POLL_WINDOW)?;
        for change in changes {
            if snapshot.latest_change.is_some_and(|seen| change.number <= seen) {
                continue;
            }
            let details = client.describe(change.number)?;
            if is_code_change(&details) {
                snapshot.latest_code_change = snapshot
                    .latest_code_change
                    .max(Some(change.number));
            }
        }
        if let Some(newest) = client.changes(filespec, 1)?.first() {
            snapshot.latest_change = snapshot.latest_change.max(Some(newest.number));
        }
    }
    tracing::debug!(?snapshot, "Change poll complete");
    Ok(snapshot)
}
