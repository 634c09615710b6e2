use std::{
    fs, io,
    path::{Path, PathBuf},
};

use tracing::{info, warn};

use crate::{cli::AssertionGeneration, error::Result};

/// Files and directories FixCheck leaves in its output directory.
pub const OUTPUT_ARTIFACTS: [&str; 5] = [
    "report.csv",
    "scores-failing-tests.csv",
    "failing-tests",
    "passing-tests",
    "non-compiling-tests",
];

pub const RESULTS_SUBDIR: &str = "defects-repairing";

pub fn subject_output_dir(
    outputs_dir: &Path,
    subject_id: &str,
    assertion_generation: AssertionGeneration,
) -> PathBuf {
    outputs_dir
        .join(RESULTS_SUBDIR)
        .join(subject_id)
        .join(assertion_generation.as_str())
}

/// Moves the artifacts of the last FixCheck run into `destination`.
///
/// Existing entries in `destination` are replaced. Missing artifacts are skipped.
/// Returns the paths that were moved, in their new location.
pub fn relocate_outputs(outputs_dir: &Path, run_log: &Path, destination: &Path) -> Result<Vec<PathBuf>> {
    info!(destination = %destination.display(), "moving all outputs");
    fs::create_dir_all(destination)?;

    let sources = OUTPUT_ARTIFACTS
        .iter()
        .map(|name| outputs_dir.join(name))
        .chain(std::iter::once(run_log.to_path_buf()));

    let mut moved = Vec::new();
    for source in sources {
        let Some(name) = source.file_name() else {
            continue;
        };
        let target = destination.join(name);

        if !source.exists() {
            warn!(path = %source.display(), "output not found, skipping");
            continue;
        }
        match move_entry(&source, &target) {
            Ok(()) => moved.push(target),
            Err(err) => warn!(path = %source.display(), %err, "failed to move output"),
        }
    }
    Ok(moved)
}

fn remove_entry(path: &Path) -> io::Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

fn move_entry(source: &Path, target: &Path) -> io::Result<()> {
    if target.symlink_metadata().is_ok() {
        remove_entry(target)?;
    }
    if fs::rename(source, target).is_ok() {
        return Ok(());
    }
    // rename fails across file systems
    copy_entry(source, target)?;
    remove_entry(source)
}

fn copy_entry(source: &Path, target: &Path) -> io::Result<()> {
    if source.is_dir() {
        fs::create_dir_all(target)?;
        for entry in fs::read_dir(source)? {
            let entry = entry?;
            copy_entry(&entry.path(), &target.join(entry.file_name()))?;
        }
        Ok(())
    } else {
        fs::copy(source, target).map(|_| ())
    }
}

#[test]
fn output_dir_layout() {
    let dir = subject_output_dir(
        Path::new("fixcheck-output"),
        "Patch12",
        AssertionGeneration::NoAssertion,
    );
    assert_eq!(
        dir,
        PathBuf::from("fixcheck-output/defects-repairing/Patch12/no-assertion")
    );
}

#[test]
fn moves_artifacts_and_replaces_stale_ones() {
    let work = tempfile::tempdir().unwrap();
    let outputs = work.path().join("fixcheck-output");
    fs::create_dir_all(outputs.join("failing-tests")).unwrap();
    fs::create_dir_all(outputs.join("passing-tests")).unwrap();
    fs::write(outputs.join("report.csv"), "fresh").unwrap();
    fs::write(outputs.join("failing-tests/Test1.java"), "class Test1 {}").unwrap();
    let run_log = work.path().join("log.out");
    fs::write(&run_log, "log").unwrap();

    let destination = subject_output_dir(&outputs, "Patch1", AssertionGeneration::LlmAssertion);
    fs::create_dir_all(destination.join("failing-tests")).unwrap();
    fs::write(destination.join("failing-tests/Stale.java"), "stale").unwrap();
    fs::write(destination.join("report.csv"), "stale").unwrap();

    let moved = relocate_outputs(&outputs, &run_log, &destination).unwrap();

    // scores-failing-tests.csv and non-compiling-tests were never produced
    assert_eq!(moved.len(), 4);
    assert_eq!(fs::read_to_string(destination.join("report.csv")).unwrap(), "fresh");
    assert!(destination.join("failing-tests/Test1.java").exists());
    assert!(!destination.join("failing-tests/Stale.java").exists());
    assert!(destination.join("passing-tests").is_dir());
    assert!(destination.join("log.out").exists());
    assert!(!destination.join("non-compiling-tests").exists());

    assert!(!outputs.join("report.csv").exists());
    assert!(!outputs.join("failing-tests").exists());
    assert!(!run_log.exists());
}

#[test]
fn copy_entry_copies_trees() {
    let work = tempfile::tempdir().unwrap();
    let source = work.path().join("src");
    fs::create_dir_all(source.join("nested")).unwrap();
    fs::write(source.join("nested/a.txt"), "a").unwrap();

    let target = work.path().join("dst");
    copy_entry(&source, &target).unwrap();
    assert_eq!(fs::read_to_string(target.join("nested/a.txt")).unwrap(), "a");
}
