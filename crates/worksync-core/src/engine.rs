//! Workspace sync and build orchestration
//!
//! [`SyncEngine::run`] drives one update of a workspace through its phases:
//! sync, archive reconciliation, project file generation, and build. The
//! run is a sequence of blocking calls executed on the caller's thread
//! (normally a [`WorkspaceWorker`](crate::worker::WorkspaceWorker) thread),
//! checking the cancellation token at phase boundaries and around every
//! external call.
//!
//! Clobber and resolve conflicts pause the run instead of failing it: the
//! engine returns [`UpdateResult::FilesToClobber`] or
//! [`UpdateResult::FilesToResolve`] with the context updated, and the
//! caller resubmits the same context once the user has decided.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use worksync_archive::{extract_archive, remove_archive_files};
use worksync_filter::{FilterTree, FilterTreeBuilder, RulePolarity};
use worksync_fs::WorkspacePath;
use worksync_steps::{StepAction, expand_variables, split_command_line};
use worksync_vcs::{ChangesMonitor, FileAction, SyncFlags, VcsClient};

use crate::Error;
use crate::cancel::CancellationToken;
use crate::context::{EngineStatus, UpdateContext, UpdateResult};
use crate::lock::ToolchainSlot;
use crate::process::{CommandLine, run_streamed, spawn_detached};
use crate::progress::{ProgressScanner, ProgressValue};
use crate::project::ProjectConfig;
use crate::stamp::{STAMP_FILES, VersionStamper};

/// Directory under the workspace root holding engine bookkeeping files.
pub const ENGINE_DIR: &str = ".worksync";

/// Shader source extensions excluded from a content-only sync.
const SHADER_EXTENSIONS: [&str; 2] = ["usf", "ush"];

const DEFAULT_SLOT_TIMEOUT: Duration = Duration::from_secs(600);

/// Change numbers the engine tracks for one workspace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkspaceState {
    /// Change the workspace was last fully synced to
    pub current_change: Option<i64>,
    /// Change the build steps last completed against
    pub last_built_change: Option<i64>,
}

/// A phase-terminating outcome: either a pause or a failure, with the
/// message shown to the user.
struct Interrupt {
    result: UpdateResult,
    message: String,
}

impl Interrupt {
    fn new(result: UpdateResult, message: impl Into<String>) -> Self {
        Self {
            result,
            message: message.into(),
        }
    }
}

impl From<Error> for Interrupt {
    fn from(error: Error) -> Self {
        match error {
            Error::Canceled => Self::new(UpdateResult::Canceled, "Update canceled"),
            other => Self::new(UpdateResult::FailedToSync, other.to_string()),
        }
    }
}

type Phase<T> = std::result::Result<T, Interrupt>;

/// Orchestrates updates of one workspace.
pub struct SyncEngine {
    client: Arc<dyn VcsClient>,
    project: ProjectConfig,
    local_root: WorkspacePath,
    slot: Arc<ToolchainSlot>,
    slot_timeout: Duration,
    monitor: Option<Arc<ChangesMonitor>>,
    progress: Arc<ProgressValue>,
    state: Mutex<WorkspaceState>,
    status: Mutex<EngineStatus>,
}

impl SyncEngine {
    pub fn new(
        client: Arc<dyn VcsClient>,
        project: ProjectConfig,
        local_root: WorkspacePath,
        slot: Arc<ToolchainSlot>,
    ) -> Self {
        Self {
            client,
            project,
            local_root,
            slot,
            slot_timeout: DEFAULT_SLOT_TIMEOUT,
            monitor: None,
            progress: Arc::new(ProgressValue::new()),
            state: Mutex::new(WorkspaceState::default()),
            status: Mutex::new(EngineStatus::Idle),
        }
    }

    /// Attach a changes monitor supplying the latest code change for
    /// version stamping.
    pub fn with_monitor(mut self, monitor: Arc<ChangesMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn with_slot_timeout(mut self, timeout: Duration) -> Self {
        self.slot_timeout = timeout;
        self
    }

    pub fn progress(&self) -> &Arc<ProgressValue> {
        &self.progress
    }

    pub fn status(&self) -> EngineStatus {
        *self.status.lock().expect("engine status lock")
    }

    pub fn state(&self) -> WorkspaceState {
        *self.state.lock().expect("engine state lock")
    }

    /// Restore persisted change numbers, for callers reopening a workspace.
    pub fn restore_state(&self, state: WorkspaceState) {
        *self.state.lock().expect("engine state lock") = state;
    }

    /// Run one update to completion, pause, failure, or cancellation.
    ///
    /// The context is mutated in place (clobber decisions are added) so a
    /// pausing result can be resumed by resubmitting the same context.
    pub fn run(
        &self,
        context: &mut UpdateContext,
        token: &CancellationToken,
    ) -> (UpdateResult, String) {
        *self.status.lock().expect("engine status lock") = EngineStatus::Syncing;
        self.progress.set_message("Starting update");
        self.progress.set(0.0);

        let outcome = self.execute(context, token);
        *self.status.lock().expect("engine status lock") = EngineStatus::Idle;

        match outcome {
            Ok(()) => {
                self.progress.set(1.0);
                info!(target_change = context.target_change, "Update complete");
                (UpdateResult::Success, "Update complete".to_string())
            }
            Err(interrupt) => {
                info!(
                    result = ?interrupt.result,
                    message = %interrupt.message,
                    "Update did not complete"
                );
                (interrupt.result, interrupt.message)
            }
        }
    }

    fn execute(&self, context: &mut UpdateContext, token: &CancellationToken) -> Phase<()> {
        token.check().map_err(Interrupt::from)?;

        if context.options.sync || context.options.sync_single_change {
            self.sync_phase(context, token)?;
        }

        if context.options.sync_archives {
            self.archive_phase(context, token)?;
        }

        // Project generation and builds share non-reentrant toolchain state
        // across workspaces, so the slot is acquired once for both phases
        // and released when the guard drops, on every exit path.
        let _slot_guard = if context.options.generate_project_files || context.options.build {
            Some(
                self.slot
                    .acquire(self.slot_timeout, token)
                    .map_err(compile_interrupt)?,
            )
        } else {
            None
        };

        if context.options.generate_project_files {
            self.generate_phase(context, token)?;
        }

        if context.options.build {
            self.build_phase(context, token)?;
        }

        if context.options.open_solution_after_sync {
            self.open_solution(context);
        }

        Ok(())
    }

    // ---- Sync ----

    fn sync_phase(&self, context: &mut UpdateContext, token: &CancellationToken) -> Phase<()> {
        self.progress.set_message("Finding files to sync...");

        // What the server has at the target change that we don't. A
        // single-change sync is limited to the files that change touched.
        let mut candidates = BTreeSet::new();
        if context.options.sync_single_change {
            let details = self
                .client
                .describe(context.target_change)
                .map_err(Error::from)?;
            candidates.extend(details.files.into_iter().map(|f| f.depot_path));
        } else {
            for filespec in self.project.sync_filespecs() {
                token.check().map_err(Interrupt::from)?;
                let preview = self
                    .client
                    .sync(
                        std::slice::from_ref(&filespec),
                        context.target_change,
                        SyncFlags {
                            preview: true,
                            force: false,
                        },
                        &mut |_| {},
                    )
                    .map_err(Error::from)?;
                candidates.extend(preview.synced);
            }
        }

        // Files open for edit are synced too so a resolve gets scheduled;
        // newly-added files have no server revision to sync.
        for opened in self.client.opened().map_err(Error::from)? {
            if !matches!(opened.action, FileAction::Add | FileAction::MoveAdd) {
                candidates.insert(opened.depot_path);
            }
        }

        let filter = self.build_sync_filter(context);
        let depot_root = WorkspacePath::new(&self.project.depot_root);
        let files: Vec<String> = candidates
            .into_iter()
            .filter(|depot_path| {
                let full = WorkspacePath::new(depot_path);
                let relative = full
                    .strip_prefix(&depot_root)
                    .unwrap_or(depot_path.as_str());
                filter.matches(relative)
            })
            .collect();
        debug!(files = files.len(), "Sync candidates after filtering");

        token.check().map_err(Interrupt::from)?;
        self.progress.set_message("Syncing files...");
        self.progress.push(0.8);
        let total = files.len().max(1) as f32;
        let mut done = 0usize;
        let summary = self
            .client
            .sync(
                &files,
                context.target_change,
                SyncFlags::default(),
                &mut |depot_path| {
                    done += 1;
                    self.progress.set_message(format!("Syncing {depot_path}"));
                    self.progress.set(done as f32 / total);
                },
            )
            .map_err(Error::from)?;
        self.progress.pop();

        if !summary.clobbered.is_empty() {
            self.handle_clobbers(context, &summary.clobbered)?;
        }

        self.check_unresolved(context)?;

        if !context.options.sync_single_change {
            self.stamp_version(context)?;
        }

        if context.options.run_after_sync {
            self.run_post_sync_commands(context, token)?;
        }

        // Only a fully completed sync moves the workspace's change number.
        self.state.lock().expect("engine state lock").current_change =
            Some(context.target_change);
        Ok(())
    }

    /// User rules plus the built-in exclusions, added last so they always
    /// win over anything the user included.
    fn build_sync_filter(&self, context: &UpdateContext) -> FilterTree {
        let mut builder = FilterTreeBuilder::new(RulePolarity::Include);
        builder.add_all(&context.filter_rules);
        for stamp in STAMP_FILES {
            builder.exclude(&format!("/{stamp}"));
        }
        if context.options.content_only {
            for ext in SHADER_EXTENSIONS {
                builder.exclude(&format!("*.{ext}"));
            }
        }
        builder.build()
    }

    /// Collect clobber decisions, pausing if any candidate is undecided,
    /// then force-sync the files the user approved.
    fn handle_clobbers(&self, context: &mut UpdateContext, clobbered: &[String]) -> Phase<()> {
        let mut mapped = Vec::new();
        let mut undecided = 0usize;
        for depot_path in clobbered {
            let mapping = self.client.map_path(depot_path).map_err(Error::from)?;
            if !context.clobber_decisions.contains_key(&mapping.local_path) {
                context
                    .clobber_decisions
                    .insert(mapping.local_path.clone(), false);
                undecided += 1;
            }
            mapped.push((depot_path.clone(), mapping.local_path));
        }

        if undecided > 0 {
            return Err(Interrupt::new(
                UpdateResult::FilesToClobber,
                format!("{undecided} file(s) would overwrite writable local copies"),
            ));
        }

        for (depot_path, local_path) in mapped {
            if context.clobber_decisions.get(&local_path) == Some(&true) {
                self.client
                    .force_sync(&depot_path, context.target_change)
                    .map_err(Error::from)?;
            } else {
                debug!(path = %local_path, "Leaving writable file in place");
            }
        }
        Ok(())
    }

    fn check_unresolved(&self, context: &UpdateContext) -> Phase<()> {
        let mut unresolved = self.client.unresolved().map_err(Error::from)?;
        if context.options.auto_resolve_conflicts && !unresolved.is_empty() {
            for file in &unresolved {
                self.client.resolve(file).map_err(Error::from)?;
            }
            unresolved = self.client.unresolved().map_err(Error::from)?;
        }
        if unresolved.is_empty() {
            Ok(())
        } else {
            Err(Interrupt::new(
                UpdateResult::FilesToResolve,
                format!("{} file(s) need to be resolved", unresolved.len()),
            ))
        }
    }

    /// Write the version stamps, using the newest known code change as the
    /// compatible number so content-only syncs keep matching their binary.
    fn stamp_version(&self, context: &UpdateContext) -> Phase<()> {
        let compatible = self
            .monitor
            .as_ref()
            .and_then(|m| m.snapshot().latest_code_change)
            .filter(|&change| change <= context.target_change)
            .unwrap_or(context.target_change);
        let stamper = VersionStamper::new(self.local_root.clone(), &self.project.branch);
        stamper.stamp(context.target_change, compatible)?;
        Ok(())
    }

    fn run_post_sync_commands(
        &self,
        context: &UpdateContext,
        token: &CancellationToken,
    ) -> Phase<()> {
        for command in &self.project.post_sync_commands {
            let expanded = expand_variables(command, &context.variables);
            let mut parts = split_command_line(&expanded);
            if parts.is_empty() {
                continue;
            }
            let command_line = CommandLine::new(parts.remove(0), parts)
                .working_dir(self.local_root.to_native());
            self.progress
                .set_message(format!("Running {}", command_line.display()));
            let scanner = Arc::new(ProgressScanner::new(Arc::clone(&self.progress)));
            let code = run_streamed(&command_line, &scanner, token)?;
            if code != 0 {
                return Err(Interrupt::new(
                    UpdateResult::FailedToSync,
                    format!(
                        "Post-sync command '{}' exited with code {code}",
                        command_line.display()
                    ),
                ));
            }
        }
        Ok(())
    }

    // ---- Archives ----

    fn archive_phase(&self, context: &UpdateContext, token: &CancellationToken) -> Phase<()> {
        for (name, depot_path) in &context.archives {
            token.check().map_err(Interrupt::from)?;
            let manifest_path = self
                .local_root
                .join(&format!("{ENGINE_DIR}/{name}.manifest"));

            // Reconcile away the previous extraction before replacing or
            // removing the archive.
            if manifest_path.is_file() {
                self.progress.set_message(format!("Cleaning {name} files..."));
                let report = remove_archive_files(&manifest_path, &self.local_root)
                    .map_err(Error::from)?;
                debug!(
                    archive = %name,
                    deleted = report.deleted.len(),
                    skipped = report.skipped.len(),
                    "Reconciled previous archive"
                );
            }

            let Some(depot_path) = depot_path else {
                continue;
            };

            self.progress.set_message(format!("Downloading {name}..."));
            let temp = NamedTempFile::new().map_err(Error::from)?;
            self.client
                .download(depot_path, context.target_change, temp.path())
                .map_err(Error::from)?;

            token.check().map_err(Interrupt::from)?;
            self.progress.set_message(format!("Extracting {name}..."));
            let progress = Arc::clone(&self.progress);
            extract_archive(temp.path(), &self.local_root, &manifest_path, &mut |f| {
                progress.set(f);
            })
            .map_err(Error::from)?;
        }
        Ok(())
    }

    // ---- Generate project files ----

    fn generate_phase(&self, context: &UpdateContext, token: &CancellationToken) -> Phase<()> {
        let Some(generator) = &self.project.project_file_generator else {
            debug!("No project file generator configured, skipping");
            return Ok(());
        };
        self.progress.set_message("Generating project files...");

        let expanded = expand_variables(generator, &context.variables);
        let mut parts = split_command_line(&expanded);
        if parts.is_empty() {
            return Ok(());
        }
        let command_line =
            CommandLine::new(parts.remove(0), parts).working_dir(self.local_root.to_native());
        let scanner = Arc::new(ProgressScanner::new(Arc::clone(&self.progress)));
        let code = run_streamed(&command_line, &scanner, token).map_err(compile_interrupt)?;
        if code != 0 {
            return Err(Interrupt::new(
                UpdateResult::FailedToCompile,
                format!("Project file generator exited with code {code}"),
            ));
        }
        Ok(())
    }

    // ---- Build ----

    fn build_phase(&self, context: &UpdateContext, token: &CancellationToken) -> Phase<()> {
        let steps = if !context.step_subset.is_empty() {
            context.steps.subset(&context.step_subset)
        } else {
            context.steps.for_schedule(context.options.scheduled_build)
        };
        if steps.steps().is_empty() {
            debug!("No build steps selected");
            return Ok(());
        }

        let force_clean = self.crosses_clean_boundary(context.target_change);
        let clean_first = force_clean || !context.options.use_incremental_builds;

        let step_count = steps.steps().len() as f32;
        for (index, step) in steps.steps().iter().enumerate() {
            token.check().map_err(Interrupt::from)?;
            self.progress.set_message(step.status_text.clone());
            self.progress.push((index as f32 + 1.0) / step_count);
            info!(step = %step.description, "Running build step");

            let outcome = match &step.action {
                StepAction::Compile {
                    target,
                    platform,
                    configuration,
                    arguments,
                } => self.run_compile_step(
                    context,
                    token,
                    target,
                    platform,
                    configuration,
                    arguments,
                    clean_first,
                ),
                StepAction::Cook { profile } => self.run_cook_step(context, token, profile),
                StepAction::Other {
                    executable,
                    arguments,
                    use_log_window,
                } => self.run_other_step(context, token, executable, arguments, *use_log_window),
            };
            self.progress.pop();
            // A failing step aborts the rest of the set.
            outcome?;
        }

        if context.step_subset.is_empty() {
            self.state
                .lock()
                .expect("engine state lock")
                .last_built_change = Some(context.target_change);
        }
        Ok(())
    }

    /// Force a clean build when the last built change and the target sit on
    /// opposite sides of the project's clean boundary.
    fn crosses_clean_boundary(&self, target_change: i64) -> bool {
        let Some(boundary) = self.project.force_clean_above else {
            return false;
        };
        let Some(last_built) = self.state().last_built_change else {
            return false;
        };
        (last_built <= boundary) != (target_change <= boundary)
    }

    #[allow(clippy::too_many_arguments)]
    fn run_compile_step(
        &self,
        context: &UpdateContext,
        token: &CancellationToken,
        target: &str,
        platform: &str,
        configuration: &str,
        arguments: &str,
        clean_first: bool,
    ) -> Phase<()> {
        let Some(tool) = context.variables.get("CompileTool") else {
            return Err(Interrupt::new(
                UpdateResult::FailedToCompile,
                "No CompileTool variable configured",
            ));
        };

        let mut args = split_command_line(&expand_variables(arguments, &context.variables));
        args.push(target.to_string());
        args.push(platform.to_string());
        args.push(configuration.to_string());

        // The clean pass is advisory; the real invocation decides the step.
        if clean_first {
            let mut clean_args = args.clone();
            clean_args.push("-clean".to_string());
            let clean_line = CommandLine::new(tool.clone(), clean_args)
                .working_dir(self.local_root.to_native());
            let code = self.stream_tool(&clean_line, token)?;
            if code != 0 {
                warn!(code, "Clean pass for {target} failed, continuing with the build");
            }
        }

        let command_line =
            CommandLine::new(tool.clone(), args).working_dir(self.local_root.to_native());
        let code = self.stream_tool(&command_line, token)?;
        if code != 0 {
            return Err(self.classify_compile_failure(context, target, code));
        }
        Ok(())
    }

    fn run_cook_step(
        &self,
        context: &UpdateContext,
        token: &CancellationToken,
        profile: &str,
    ) -> Phase<()> {
        let Some(tool) = context.variables.get("CookTool") else {
            return Err(Interrupt::new(
                UpdateResult::FailedToCompile,
                "No CookTool variable configured",
            ));
        };
        let profile = expand_variables(profile, &context.variables);
        let command_line = CommandLine::new(tool.clone(), vec![profile.clone()])
            .working_dir(self.local_root.to_native());
        let code = self.stream_tool(&command_line, token)?;
        if code != 0 {
            return Err(Interrupt::new(
                UpdateResult::FailedToCompile,
                format!("Cook profile '{profile}' exited with code {code}"),
            ));
        }
        Ok(())
    }

    fn run_other_step(
        &self,
        context: &UpdateContext,
        token: &CancellationToken,
        executable: &str,
        arguments: &str,
        use_log_window: bool,
    ) -> Phase<()> {
        let executable = expand_variables(executable, &context.variables);
        let args = split_command_line(&expand_variables(arguments, &context.variables));
        let command_line =
            CommandLine::new(executable, args).working_dir(self.local_root.to_native());

        if use_log_window {
            let code = self.stream_tool(&command_line, token)?;
            if code != 0 {
                return Err(Interrupt::new(
                    UpdateResult::FailedToCompile,
                    format!(
                        "Step '{}' exited with code {code}",
                        command_line.display()
                    ),
                ));
            }
        } else {
            spawn_detached(&command_line).map_err(compile_interrupt)?;
        }
        Ok(())
    }

    fn stream_tool(&self, command_line: &CommandLine, token: &CancellationToken) -> Phase<i32> {
        let scanner = Arc::new(ProgressScanner::new(Arc::clone(&self.progress)));
        run_streamed(command_line, &scanner, token).map_err(compile_interrupt)
    }

    /// A compile failure with no local edits and no user-supplied steps is
    /// reproducible from the clean synced state; anything else may be the
    /// user's own doing.
    fn classify_compile_failure(
        &self,
        context: &UpdateContext,
        target: &str,
        code: i32,
    ) -> Interrupt {
        let clean_workspace = match self.client.opened() {
            Ok(opened) => opened.is_empty() && !context.steps.any_user_defined(),
            Err(error) => {
                warn!(%error, "Could not enumerate opened files for failure classification");
                false
            }
        };
        let result = if clean_workspace {
            UpdateResult::FailedToCompileWithCleanWorkspace
        } else {
            UpdateResult::FailedToCompile
        };
        Interrupt::new(result, format!("Compile of {target} exited with code {code}"))
    }

    fn open_solution(&self, context: &UpdateContext) {
        let Some(solution) = &self.project.solution_path else {
            return;
        };
        let expanded = expand_variables(solution, &context.variables);
        let command_line = CommandLine::new(expanded, Vec::new());
        if let Err(error) = spawn_detached(&command_line) {
            warn!(%error, "Could not open solution");
        }
    }
}

fn compile_interrupt(error: Error) -> Interrupt {
    match error {
        Error::Canceled => Interrupt::new(UpdateResult::Canceled, "Update canceled"),
        other => Interrupt::new(UpdateResult::FailedToCompile, other.to_string()),
    }
}
