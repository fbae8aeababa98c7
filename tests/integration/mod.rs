//! Library-level migrations against a copy of the fixture app.
//!
//! Each test copies `tests/fixtures/chat-app` into a temp dir and runs the
//! repository's `patches/` against it through `FsStore` and `Runner`,
//! with the ledger at its default location unless a test opts out.

mod chat_search;
mod profile_username;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use text_patcher::config::{compile, load_from_path, TargetedSet};
use text_patcher::{FsStore, Runner, SetRun, DEFAULT_LEDGER_PATH};
use walkdir::WalkDir;

fn manifest_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

/// Fresh copy of the fixture app.
pub(crate) fn setup_fixture_app() -> TempDir {
    let dir = TempDir::new().unwrap();
    let source = manifest_dir().join("tests/fixtures/chat-app");

    for entry in WalkDir::new(&source) {
        let entry = entry.unwrap();
        let relative = entry.path().strip_prefix(&source).unwrap();
        let target = dir.path().join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).unwrap();
        } else {
            fs::copy(entry.path(), &target).unwrap();
        }
    }

    dir
}

pub(crate) fn load_patch(name: &str) -> Vec<TargetedSet> {
    let file = load_from_path(manifest_dir().join("patches").join(name)).unwrap();
    compile(&file, &BTreeMap::new()).unwrap()
}

/// Run every set the way `text-patcher apply` does, ledger included.
pub(crate) fn apply_all(root: &Path, targets: &[TargetedSet]) -> Vec<SetRun> {
    let store = FsStore::new(root).unwrap();
    let mut runner = Runner::new(&store)
        .with_ledger_file(root.join(DEFAULT_LEDGER_PATH))
        .unwrap();
    let runs = targets
        .iter()
        .map(|target| runner.apply(target).unwrap())
        .collect();
    runner.finish().unwrap();
    runs
}

/// Run every set with no ledger, so only the text guards decide.
pub(crate) fn apply_unrecorded(root: &Path, targets: &[TargetedSet]) -> Vec<SetRun> {
    let store = FsStore::new(root).unwrap();
    let mut runner = Runner::new(&store);
    targets
        .iter()
        .map(|target| runner.apply(target).unwrap())
        .collect()
}

pub(crate) fn read(root: &Path, key: &str) -> String {
    fs::read_to_string(root.join(key)).unwrap()
}
