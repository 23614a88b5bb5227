//! Per-run update context and result model
//!
//! An [`UpdateContext`] carries everything one engine run needs: the target
//! change, the requested phases, filter rules, archive requests, clobber
//! decisions, the merged step set, and the variable table. The whole
//! context is serializable so a caller can persist a paused run and resume
//! it later by resubmitting the same value, decisions filled in.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use worksync_filter::FilterRule;
use worksync_steps::BuildStepSet;

/// Which phases an engine run should perform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateOptions {
    /// Sync the workspace to the target change
    pub sync: bool,
    /// Sync only the files touched by the target change
    pub sync_single_change: bool,
    /// Attempt automatic resolve before pausing on conflicts
    pub auto_resolve_conflicts: bool,
    /// Run the project file generator after sync
    pub generate_project_files: bool,
    /// Reconcile requested archives after sync
    pub sync_archives: bool,
    /// Run the build steps after sync
    pub build: bool,
    /// Skip the pre-build clean invocation
    pub use_incremental_builds: bool,
    /// This is a scheduled/unattended run
    pub scheduled_build: bool,
    /// Run the project's post-sync commands
    pub run_after_sync: bool,
    /// Launch the generated solution when the run succeeds
    pub open_solution_after_sync: bool,
    /// Content-only sync; code files are excluded
    pub content_only: bool,
}

/// The mutable unit of work for one engine run.
///
/// A paused run (`FilesToClobber`, `FilesToResolve`) is resumed by
/// resubmitting the same context after the caller has filled in decisions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateContext {
    /// Change number to sync to
    pub target_change: i64,
    pub options: UpdateOptions,
    /// Source rules for the user's path filter
    pub filter_rules: Vec<FilterRule>,
    /// Archive-type name to depot path; `None` removes the archive
    pub archives: BTreeMap<String, Option<String>>,
    /// Local path to "overwrite it" decision, filled in across pauses
    pub clobber_decisions: BTreeMap<String, bool>,
    /// Merged build steps for this run
    pub steps: BuildStepSet,
    /// When non-empty, run exactly these steps and nothing else
    pub step_subset: Vec<Uuid>,
    /// `$(Var)` substitution table for step arguments and commands
    pub variables: HashMap<String, String>,
}

impl UpdateContext {
    pub fn new(target_change: i64, options: UpdateOptions) -> Self {
        Self {
            target_change,
            options,
            ..Self::default()
        }
    }
}

/// Outcome of one engine run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateResult {
    Success,
    Canceled,
    /// Version-control or transport failure
    FailedToSync,
    /// Pausing outcome; unresolved files need user resolution
    FilesToResolve,
    /// Pausing outcome; clobber candidates need per-file decisions
    FilesToClobber,
    FailedToCompile,
    /// Compile failure reproducible from a clean sync, with no local edits
    /// and no user-supplied steps
    FailedToCompileWithCleanWorkspace,
}

impl UpdateResult {
    /// Pausing outcomes expect the caller to decide and resubmit the
    /// context rather than treat the run as finished.
    pub fn is_pausing(self) -> bool {
        matches!(self, Self::FilesToResolve | Self::FilesToClobber)
    }
}

/// Coarse engine state visible to the owning shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineStatus {
    #[default]
    Idle,
    Syncing,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn pausing_results_are_the_two_decision_outcomes() {
        assert!(UpdateResult::FilesToClobber.is_pausing());
        assert!(UpdateResult::FilesToResolve.is_pausing());
        assert!(!UpdateResult::Success.is_pausing());
        assert!(!UpdateResult::FailedToCompile.is_pausing());
        assert!(!UpdateResult::Canceled.is_pausing());
    }

    #[test]
    fn context_round_trips_through_serde() {
        let mut context = UpdateContext::new(
            100,
            UpdateOptions {
                sync: true,
                build: true,
                ..UpdateOptions::default()
            },
        );
        context.filter_rules.push(FilterRule::exclude("*.pdb"));
        context
            .archives
            .insert("Editor".to_string(), Some("//depot/archives/editor.tar.gz".to_string()));
        context.archives.insert("Tools".to_string(), None);
        context
            .clobber_decisions
            .insert("Engine/Config/Base.ini".to_string(), true);
        context
            .variables
            .insert("Stream".to_string(), "//dev/main".to_string());

        let json = serde_json::to_string(&context).unwrap();
        let restored: UpdateContext = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.target_change, 100);
        assert_eq!(restored.options, context.options);
        assert_eq!(restored.filter_rules, context.filter_rules);
        assert_eq!(restored.archives, context.archives);
        assert_eq!(restored.clobber_decisions, context.clobber_decisions);
        assert_eq!(restored.variables.get("Stream"), context.variables.get("Stream"));
    }
}
