//! Build step model

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of action a build step performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKind {
    /// Invoke the compiler toolchain for a target
    Compile,
    /// Run a packaging-tool profile
    Cook,
    /// Run an arbitrary external executable
    Other,
}

/// Type-specific parameters for a build step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepAction {
    Compile {
        target: String,
        platform: String,
        configuration: String,
        arguments: String,
    },
    Cook {
        profile: String,
    },
    Other {
        executable: String,
        arguments: String,
        /// Stream output through the engine log when true; fire-and-forget
        /// when false
        use_log_window: bool,
    },
}

impl StepAction {
    pub fn kind(&self) -> StepKind {
        match self {
            Self::Compile { .. } => StepKind::Compile,
            Self::Cook { .. } => StepKind::Cook,
            Self::Other { .. } => StepKind::Other,
        }
    }
}

/// One merged, immutable build step.
///
/// Identity is the GUID, which survives edits across configuration layers.
/// Steps are ordered by `order_index` at execution time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStep {
    /// Stable unique identity across layers and edits
    pub id: Uuid,
    /// Execution order (lower runs first)
    pub order_index: i32,
    /// Human-readable description shown in logs
    pub description: String,
    /// Short status text shown while the step runs
    pub status_text: String,
    /// The action this step performs
    pub action: StepAction,
    /// Run this step on a normal interactive sync
    pub normal_sync: bool,
    /// Run this step on a scheduled/unattended sync
    pub scheduled_sync: bool,
    /// True when the user layer introduced or modified this step
    pub user_defined: bool,
}
