//! Archive download, extraction, and removal through the engine
//!
//! The engine downloads precompiled-binary archives from the server,
//! extracts them under a manifest, and reconcile-deletes them on
//! replacement or removal, leaving user-modified files in place.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use tempfile::TempDir;
use worksync_core::{
    CancellationToken, ENGINE_DIR, ProjectConfig, SyncEngine, ToolchainSlot, UpdateContext,
    UpdateOptions, UpdateResult,
};
use worksync_fs::WorkspacePath;
use worksync_test_utils::{MockVcs, targz};
use worksync_vcs::VcsClient;

const DEPOT_ROOT: &str = "//depot/shooter";
const ARCHIVE_PATH: &str = "//depot/shooter-archives/editor.tar.gz";

struct Workspace {
    _dir: TempDir,
    root: WorkspacePath,
    vcs: Arc<MockVcs>,
    engine: SyncEngine,
}

fn workspace() -> Workspace {
    let dir = TempDir::new().unwrap();
    let root = WorkspacePath::new(dir.path());
    let vcs = Arc::new(MockVcs::new(DEPOT_ROOT, root.as_str()));
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
    );
    Workspace {
        _dir: dir,
        root,
        vcs,
        engine,
    }
}

fn archive_context(depot_path: Option<&str>) -> UpdateContext {
    let mut context = UpdateContext::new(
        100,
        UpdateOptions {
            sync_archives: true,
            ..UpdateOptions::default()
        },
    );
    context
        .archives
        .insert("Editor".to_string(), depot_path.map(str::to_string));
    context
}

#[test]
fn archive_is_downloaded_extracted_and_manifested() {
    let ws = workspace();
    ws.vcs.set_download(
        ARCHIVE_PATH,
        targz(&[
            ("Engine/Binaries/App", b"binary payload"),
            ("Engine/Binaries/App.pdb", b"symbols"),
        ]),
    );

    let mut context = archive_context(Some(ARCHIVE_PATH));
    let (result, _) = ws.engine.run(&mut context, &CancellationToken::new());

    assert_eq!(result, UpdateResult::Success);
    assert!(ws.root.join("Engine/Binaries/App").is_file());
    assert!(ws.root.join("Engine/Binaries/App.pdb").is_file());
    assert!(
        ws.root
            .join(&format!("{ENGINE_DIR}/Editor.manifest"))
            .is_file()
    );
    // The archive is requested as of the change being synced to.
    assert_eq!(
        ws.vcs.downloaded_files(),
        vec![(ARCHIVE_PATH.to_string(), 100)]
    );
}

#[test]
fn replacing_an_archive_removes_the_previous_files() {
    let ws = workspace();
    ws.vcs.set_download(
        ARCHIVE_PATH,
        targz(&[("Engine/Binaries/Old", b"old payload")]),
    );
    let (result, _) = ws.engine.run(
        &mut archive_context(Some(ARCHIVE_PATH)),
        &CancellationToken::new(),
    );
    assert_eq!(result, UpdateResult::Success);
    assert!(ws.root.join("Engine/Binaries/Old").is_file());

    ws.vcs.set_download(
        ARCHIVE_PATH,
        targz(&[("Engine/Binaries/New", b"new payload")]),
    );
    let (result, _) = ws.engine.run(
        &mut archive_context(Some(ARCHIVE_PATH)),
        &CancellationToken::new(),
    );
    assert_eq!(result, UpdateResult::Success);

    assert!(!ws.root.join("Engine/Binaries/Old").is_file());
    assert!(ws.root.join("Engine/Binaries/New").is_file());
}

#[test]
fn removing_an_archive_deletes_its_files_and_manifest() {
    let ws = workspace();
    ws.vcs.set_download(
        ARCHIVE_PATH,
        targz(&[("Engine/Binaries/App", b"binary payload")]),
    );
    let (result, _) = ws.engine.run(
        &mut archive_context(Some(ARCHIVE_PATH)),
        &CancellationToken::new(),
    );
    assert_eq!(result, UpdateResult::Success);

    // A null depot path means the archive is being removed entirely.
    let (result, _) = ws
        .engine
        .run(&mut archive_context(None), &CancellationToken::new());
    assert_eq!(result, UpdateResult::Success);

    assert!(!ws.root.join("Engine/Binaries/App").is_file());
    assert!(
        !ws.root
            .join(&format!("{ENGINE_DIR}/Editor.manifest"))
            .is_file()
    );
}

#[test]
fn user_modified_files_survive_archive_removal() {
    let ws = workspace();
    ws.vcs.set_download(
        ARCHIVE_PATH,
        targz(&[
            ("Engine/Binaries/App", b"binary payload"),
            ("Engine/Binaries/Config.ini", b"defaults"),
        ]),
    );
    let (result, _) = ws.engine.run(
        &mut archive_context(Some(ARCHIVE_PATH)),
        &CancellationToken::new(),
    );
    assert_eq!(result, UpdateResult::Success);

    // The user edits one extracted file before the archive goes away.
    let edited = ws.root.join("Engine/Binaries/Config.ini");
    std::fs::write(edited.to_native(), b"defaults plus local tweaks").unwrap();

    let (result, _) = ws
        .engine
        .run(&mut archive_context(None), &CancellationToken::new());
    assert_eq!(result, UpdateResult::Success);

    assert!(!ws.root.join("Engine/Binaries/App").is_file());
    assert_eq!(
        std::fs::read(edited.to_native()).unwrap(),
        b"defaults plus local tweaks"
    );
}

#[test]
fn missing_archive_download_fails_the_sync() {
    let ws = workspace();

    let mut context = archive_context(Some("//depot/shooter-archives/missing.tar.gz"));
    let (result, message) = ws.engine.run(&mut context, &CancellationToken::new());

    assert_eq!(result, UpdateResult::FailedToSync);
    assert!(message.contains("missing.tar.gz"));
}
