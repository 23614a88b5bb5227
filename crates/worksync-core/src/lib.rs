//! Workspace sync and build orchestration engine for Worksync
//!
//! Drives one workspace through sync, archive reconciliation, project file
//! generation, and build phases against a version-control server, pausing
//! for user decisions on clobbers and unresolved files and reporting
//! progress through a shared progress value.

pub mod cancel;
pub mod context;
pub mod engine;
pub mod error;
pub mod lock;
pub mod process;
pub mod progress;
pub mod project;
pub mod stamp;
pub mod worker;

pub use cancel::CancellationToken;
pub use context::{EngineStatus, UpdateContext, UpdateOptions, UpdateResult};
pub use engine::{ENGINE_DIR, SyncEngine, WorkspaceState};
pub use error::{Error, Result};
pub use lock::{SlotGuard, ToolchainSlot};
pub use process::{CommandLine, run_streamed, spawn_detached};
pub use progress::{ProgressScanner, ProgressValue};
pub use project::ProjectConfig;
pub use stamp::{STAMP_FILES, VersionStamper};
pub use worker::{CompletionCallback, WorkspaceWorker};
