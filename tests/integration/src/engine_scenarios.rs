//! End-to-end engine scenarios against the scripted version-control client
//!
//! Exercises the full update flow: preview, filter, sync, clobber and
//! resolve pauses, version stamping, and build steps, the way a shell
//! drives the engine.

use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tempfile::TempDir;
use uuid::Uuid;
use worksync_core::{
    CancellationToken, ProjectConfig, SyncEngine, ToolchainSlot, UpdateContext, UpdateOptions,
    UpdateResult, WorkspaceState, WorkspaceWorker,
};
use worksync_filter::FilterRule;
use worksync_fs::{WorkspacePath, read_text};
use worksync_steps::{BuildStepSet, StepKind, StepOverride};
use worksync_test_utils::MockVcs;
use worksync_vcs::{ChangesMonitor, VcsClient};

const DEPOT_ROOT: &str = "//depot/shooter";

struct Workspace {
    _dir: TempDir,
    root: WorkspacePath,
    vcs: Arc<MockVcs>,
    engine: Arc<SyncEngine>,
}

fn workspace() -> Workspace {
    workspace_with(|project| project)
}

fn workspace_with(adjust: impl FnOnce(ProjectConfig) -> ProjectConfig) -> Workspace {
    let dir = TempDir::new().unwrap();
    let root = WorkspacePath::new(dir.path());
    let vcs = Arc::new(MockVcs::new(DEPOT_ROOT, root.as_str()));
    let project = adjust(ProjectConfig {
        name: "Shooter".to_string(),
        depot_root: DEPOT_ROOT.to_string(),
        branch: "//depot/shooter/main".to_string(),
        sync_roots: Vec::new(),
        post_sync_commands: Vec::new(),
        force_clean_above: None,
        project_file_generator: None,
        solution_path: None,
    });
    let engine = Arc::new(SyncEngine::new(
        Arc::clone(&vcs) as Arc<dyn VcsClient>,
        project,
        root.clone(),
        Arc::new(ToolchainSlot::new()),
    ));
    Workspace {
        _dir: dir,
        root,
        vcs,
        engine,
    }
}

fn sync_options() -> UpdateOptions {
    UpdateOptions {
        sync: true,
        ..UpdateOptions::default()
    }
}

#[test]
fn sync_from_90_to_100_succeeds_and_commits_the_change() {
    let ws = workspace();
    ws.engine.restore_state(WorkspaceState {
        current_change: Some(90),
        last_built_change: None,
    });
    ws.vcs.set_files_to_sync(vec![
        format!("{DEPOT_ROOT}/Engine/Source/Core.cpp"),
        format!("{DEPOT_ROOT}/Game/Content/Map.umap"),
    ]);

    let mut context = UpdateContext::new(100, sync_options());
    let (result, _) = ws.engine.run(&mut context, &CancellationToken::new());

    assert_eq!(result, UpdateResult::Success);
    assert_eq!(ws.engine.state().current_change, Some(100));
    assert_eq!(ws.vcs.synced_files().len(), 2);
}

#[test]
fn one_clobbered_file_pauses_with_exactly_that_decision() {
    let ws = workspace();
    let blocked = format!("{DEPOT_ROOT}/Engine/Config/Base.ini");
    ws.vcs.set_files_to_sync(vec![
        format!("{DEPOT_ROOT}/Engine/Source/Core.cpp"),
        blocked.clone(),
    ]);
    ws.vcs.set_clobbered(vec![blocked]);

    let mut context = UpdateContext::new(100, sync_options());
    let (result, _) = ws.engine.run(&mut context, &CancellationToken::new());

    assert_eq!(result, UpdateResult::FilesToClobber);
    assert_eq!(context.clobber_decisions.len(), 1);
    let (local, decision) = context.clobber_decisions.iter().next().unwrap();
    assert!(local.ends_with("Engine/Config/Base.ini"));
    assert_eq!(decision, &false);
    // The non-blocked file synced normally; nothing else was touched.
    assert_eq!(
        ws.vcs.synced_files(),
        vec![format!("{DEPOT_ROOT}/Engine/Source/Core.cpp")]
    );
    assert!(ws.vcs.force_synced_files().is_empty());
    assert_eq!(ws.engine.state().current_change, None);
}

#[test]
fn resubmitting_the_paused_context_resumes_the_run() {
    let ws = workspace();
    let blocked = format!("{DEPOT_ROOT}/Engine/Config/Base.ini");
    ws.vcs.set_files_to_sync(vec![blocked.clone()]);
    ws.vcs.set_clobbered(vec![blocked.clone()]);

    let mut context = UpdateContext::new(100, sync_options());
    let (result, _) = ws.engine.run(&mut context, &CancellationToken::new());
    assert_eq!(result, UpdateResult::FilesToClobber);

    // The shell persists the context, asks the user, and resubmits.
    let json = serde_json::to_string(&context).unwrap();
    let mut restored: UpdateContext = serde_json::from_str(&json).unwrap();
    for decision in restored.clobber_decisions.values_mut() {
        *decision = true;
    }

    let (result, _) = ws.engine.run(&mut restored, &CancellationToken::new());
    assert_eq!(result, UpdateResult::Success);
    assert_eq!(ws.vcs.force_synced_files(), vec![blocked]);
    assert_eq!(ws.engine.state().current_change, Some(100));
}

#[test]
fn filter_rules_shape_what_reaches_the_server() {
    let ws = workspace();
    ws.vcs.set_files_to_sync(vec![
        format!("{DEPOT_ROOT}/Engine/Binaries/App.dll"),
        format!("{DEPOT_ROOT}/Engine/Binaries/Win64/App.exe"),
        format!("{DEPOT_ROOT}/Engine/Source/Core.cpp"),
    ]);

    let mut context = UpdateContext::new(100, sync_options());
    context.filter_rules.push(FilterRule::exclude("Binaries/"));
    context.filter_rules.push(FilterRule::include("*.exe"));
    let (result, _) = ws.engine.run(&mut context, &CancellationToken::new());

    assert_eq!(result, UpdateResult::Success);
    assert_eq!(
        ws.vcs.synced_files(),
        vec![
            format!("{DEPOT_ROOT}/Engine/Binaries/Win64/App.exe"),
            format!("{DEPOT_ROOT}/Engine/Source/Core.cpp"),
        ]
    );
}

#[test]
fn full_sync_stamps_version_files_idempotently() {
    let ws = workspace();

    let mut context = UpdateContext::new(100, sync_options());
    let (result, _) = ws.engine.run(&mut context, &CancellationToken::new());
    assert_eq!(result, UpdateResult::Success);

    let stamp = ws.root.join("Build.version");
    let first = read_text(&stamp).unwrap();
    assert!(first.contains("\"Changelist\": 100"));
    assert!(first.contains("//depot/shooter/main"));
    let mtime_before = std::fs::metadata(stamp.to_native()).unwrap().modified().unwrap();

    // Re-running at the same change rewrites nothing.
    let mut again = UpdateContext::new(100, sync_options());
    let (result, _) = ws.engine.run(&mut again, &CancellationToken::new());
    assert_eq!(result, UpdateResult::Success);
    let mtime_after = std::fs::metadata(stamp.to_native()).unwrap().modified().unwrap();
    assert_eq!(mtime_before, mtime_after);
}

#[test]
fn single_change_sync_only_touches_that_changes_files() {
    let ws = workspace();
    let changed = format!("{DEPOT_ROOT}/Engine/Source/Core.cpp");
    ws.vcs.add_change(100, "Fix server crash", &[changed.as_str()]);
    // The preview diff would also pull in an unrelated outstanding file.
    ws.vcs.set_files_to_sync(vec![
        changed.clone(),
        format!("{DEPOT_ROOT}/Game/Content/Map.umap"),
    ]);

    let mut context = UpdateContext::new(
        100,
        UpdateOptions {
            sync_single_change: true,
            ..UpdateOptions::default()
        },
    );
    let (result, _) = ws.engine.run(&mut context, &CancellationToken::new());

    assert_eq!(result, UpdateResult::Success);
    assert_eq!(ws.vcs.synced_files(), vec![changed]);
}

#[test]
fn monitor_watermarks_separate_code_from_content() {
    let ws = workspace();
    let code = format!("{DEPOT_ROOT}/Engine/Source/Core.cpp");
    let content = format!("{DEPOT_ROOT}/Game/Content/Map.umap");
    ws.vcs.add_change(95, "Refactor core", &[code.as_str()]);
    ws.vcs.add_change(98, "New map", &[content.as_str()]);

    let monitor = ChangesMonitor::new(
        Arc::clone(&ws.vcs) as Arc<dyn VcsClient>,
        vec![format!("{DEPOT_ROOT}/...")],
        Duration::from_secs(60),
    );
    let snapshot = monitor.poll_once().unwrap();

    assert_eq!(snapshot.latest_change, Some(98));
    assert_eq!(snapshot.latest_code_change, Some(95));
}

#[test]
fn compatible_changelist_uses_the_code_watermark_capped_at_target() {
    let dir = TempDir::new().unwrap();
    let root = WorkspacePath::new(dir.path());
    let vcs = Arc::new(MockVcs::new(DEPOT_ROOT, root.as_str()));
    let code = format!("{DEPOT_ROOT}/Engine/Source/Core.cpp");
    let content = format!("{DEPOT_ROOT}/Game/Content/Map.umap");
    vcs.add_change(95, "Refactor core", &[code.as_str()]);
    vcs.add_change(98, "New map", &[content.as_str()]);

    let monitor = Arc::new(ChangesMonitor::new(
        Arc::clone(&vcs) as Arc<dyn VcsClient>,
        vec![format!("{DEPOT_ROOT}/...")],
        Duration::from_secs(60),
    ));
    monitor.poll_once().unwrap();

    let engine = SyncEngine::new(
        Arc::clone(&vcs) as Arc<dyn VcsClient>,
        ProjectConfig {
            name: "Shooter".to_string(),
            depot_root: DEPOT_ROOT.to_string(),
            branch: "//depot/shooter/main".to_string(),
            sync_roots: Vec::new(),
            post_sync_commands: Vec::new(),
            force_clean_above: None,
            project_file_generator: None,
            solution_path: None,
        },
        root.clone(),
        Arc::new(ToolchainSlot::new()),
    )
    .with_monitor(Arc::clone(&monitor));

    // Syncing past the code watermark stamps the watermark as compatible.
    let mut context = UpdateContext::new(100, sync_options());
    let (result, _) = engine.run(&mut context, &CancellationToken::new());
    assert_eq!(result, UpdateResult::Success);
    let stamp = read_text(&root.join("Build.version")).unwrap();
    assert!(stamp.contains("\"Changelist\": 100"));
    assert!(stamp.contains("\"CompatibleChangelist\": 95"));

    // Syncing below it caps the compatible change at the sync target.
    let mut context = UpdateContext::new(90, sync_options());
    let (result, _) = engine.run(&mut context, &CancellationToken::new());
    assert_eq!(result, UpdateResult::Success);
    let stamp = read_text(&root.join("Build.version")).unwrap();
    assert!(stamp.contains("\"Changelist\": 90"));
    assert!(stamp.contains("\"CompatibleChangelist\": 90"));
}

#[test]
fn stamp_files_are_never_sync_candidates() {
    let ws = workspace();
    ws.vcs.set_files_to_sync(vec![
        format!("{DEPOT_ROOT}/Build.version"),
        format!("{DEPOT_ROOT}/Engine/Source/Core.cpp"),
    ]);

    let mut context = UpdateContext::new(100, sync_options());
    let (result, _) = ws.engine.run(&mut context, &CancellationToken::new());

    assert_eq!(result, UpdateResult::Success);
    assert_eq!(
        ws.vcs.synced_files(),
        vec![format!("{DEPOT_ROOT}/Engine/Source/Core.cpp")]
    );
}

fn compile_step(order: i32, target: &str, arguments: &str) -> StepOverride {
    StepOverride {
        kind: Some(StepKind::Compile),
        order_index: Some(order),
        target: Some(target.to_string()),
        platform: Some("Linux".to_string()),
        configuration: Some("Development".to_string()),
        arguments: Some(arguments.to_string()),
        ..StepOverride::new(Uuid::new_v4())
    }
}

#[test]
fn first_failing_compile_step_stops_the_build() {
    let ws = workspace();
    let sentinel = ws.root.join("second-compile-ran");
    let first = compile_step(10, "Editor", "-c \"exit 1\"");
    let second = compile_step(
        20,
        "Game",
        &format!("-c \"touch {}\"", sentinel.as_str()),
    );
    let steps = BuildStepSet::merge(&[first, second], &[], &[]);

    let mut context = UpdateContext::new(
        100,
        UpdateOptions {
            build: true,
            use_incremental_builds: true,
            ..UpdateOptions::default()
        },
    );
    context.steps = steps;
    context
        .variables
        .insert("CompileTool".to_string(), "sh".to_string());

    let (result, message) = ws.engine.run(&mut context, &CancellationToken::new());

    // No local edits and no user steps, so the failure is attributable to
    // the clean synced state.
    assert_eq!(result, UpdateResult::FailedToCompileWithCleanWorkspace);
    assert!(message.contains("Editor"));
    assert!(!sentinel.is_file());
    assert_eq!(ws.engine.state().last_built_change, None);
}

#[test]
fn sync_and_build_together_advance_both_watermarks() {
    let ws = workspace();
    ws.vcs
        .set_files_to_sync(vec![format!("{DEPOT_ROOT}/Engine/Source/Core.cpp")]);
    let steps = BuildStepSet::merge(&[compile_step(10, "Editor", "-c \"exit 0\"")], &[], &[]);

    let mut context = UpdateContext::new(
        100,
        UpdateOptions {
            sync: true,
            build: true,
            use_incremental_builds: true,
            ..UpdateOptions::default()
        },
    );
    context.steps = steps;
    context
        .variables
        .insert("CompileTool".to_string(), "sh".to_string());

    let (result, _) = ws.engine.run(&mut context, &CancellationToken::new());

    assert_eq!(result, UpdateResult::Success);
    assert_eq!(
        ws.engine.state(),
        WorkspaceState {
            current_change: Some(100),
            last_built_change: Some(100),
        }
    );
}

#[test]
fn builds_from_two_workspaces_serialize_on_the_shared_slot() {
    let slot = Arc::new(ToolchainSlot::new());
    let mut engines = Vec::new();
    let mut dirs = Vec::new();
    for _ in 0..2 {
        let dir = TempDir::new().unwrap();
        let root = WorkspacePath::new(dir.path());
        let vcs = Arc::new(MockVcs::new(DEPOT_ROOT, root.as_str()));
        engines.push(Arc::new(SyncEngine::new(
            vcs as Arc<dyn VcsClient>,
            ProjectConfig {
                name: "Shooter".to_string(),
                depot_root: DEPOT_ROOT.to_string(),
                branch: "//depot/shooter/main".to_string(),
                sync_roots: Vec::new(),
                post_sync_commands: Vec::new(),
                force_clean_above: None,
                project_file_generator: None,
                solution_path: None,
            },
            root,
            Arc::clone(&slot),
        )));
        dirs.push(dir);
    }

    // Each build sleeps briefly while holding the slot; both must finish.
    let handles: Vec<_> = engines
        .into_iter()
        .map(|engine| {
            std::thread::spawn(move || {
                let steps = BuildStepSet::merge(
                    &[compile_step(10, "Editor", "-c \"sleep 0.2\"")],
                    &[],
                    &[],
                );
                let mut context = UpdateContext::new(
                    100,
                    UpdateOptions {
                        build: true,
                        use_incremental_builds: true,
                        ..UpdateOptions::default()
                    },
                );
                context.steps = steps;
                context
                    .variables
                    .insert("CompileTool".to_string(), "sh".to_string());
                engine.run(&mut context, &CancellationToken::new()).0
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), UpdateResult::Success);
    }
}

#[test]
fn worker_delivers_the_final_context_through_the_callback() {
    let ws = workspace();
    ws.vcs
        .set_files_to_sync(vec![format!("{DEPOT_ROOT}/Engine/Source/Core.cpp")]);

    let worker = WorkspaceWorker::new();
    let (tx, rx) = mpsc::channel();
    worker.start(
        Arc::clone(&ws.engine),
        UpdateContext::new(100, sync_options()),
        Box::new(move |context, result, message| {
            tx.send((context.target_change, result, message)).unwrap();
        }),
    );

    let (target, result, message) = rx.recv_timeout(Duration::from_secs(10)).unwrap();
    assert_eq!(target, 100);
    assert_eq!(result, UpdateResult::Success);
    assert_eq!(message, "Update complete");
    assert_eq!(ws.engine.state().current_change, Some(100));
}
