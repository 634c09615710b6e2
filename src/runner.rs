use std::path::PathBuf;

use tracing::info;

use crate::{
    cli::{AssertionGeneration, RunnerArgs},
    dataset::Dataset,
    error::{ExperimentError, Result},
    fixcheck::{subject_base_dir, Invocation},
    metadata::extract_bug_metadata,
    relocate::{relocate_outputs, subject_output_dir},
};

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub subject_id: String,
    pub assertion_generation: AssertionGeneration,
    pub dataset: PathBuf,
    pub dataset_root: PathBuf,
    pub bug_info_dir: PathBuf,
    pub outputs_dir: PathBuf,
    pub fixcheck: PathBuf,
    pub run_log: PathBuf,
}

impl TryFrom<RunnerArgs> for RunConfig {
    type Error = ExperimentError;

    fn try_from(args: RunnerArgs) -> Result<RunConfig> {
        Ok(RunConfig {
            subject_id: args.subject_id,
            assertion_generation: args.assertion_generation,
            dataset: args.dataset,
            dataset_root: args.dataset_root.ok_or(ExperimentError::MissingDatasetRoot)?,
            bug_info_dir: args.bug_info_dir,
            outputs_dir: args.outputs_dir,
            fixcheck: args.fixcheck,
            run_log: args.run_log,
        })
    }
}

/// Runs FixCheck on one subject and files its outputs. Returns the relocated paths.
pub fn run_subject(config: &RunConfig) -> Result<Vec<PathBuf>> {
    info!(subject = %config.subject_id, mode = %config.assertion_generation, "running FixCheck for subject");

    let dataset = Dataset::load(&config.dataset)?;
    let subject = dataset.subject(&config.subject_id)?;
    let base_dir = subject_base_dir(&config.dataset_root, subject);

    if let Some(fixcheck_home) = std::env::var_os("FIXCHECK") {
        info!(fixcheck = %PathBuf::from(fixcheck_home).display(), "using FixCheck installation");
    }

    let metadata = extract_bug_metadata(&config.bug_info_dir, &subject.project, &subject.bug);
    info!(root_cause = %metadata.root_cause, error_location = %metadata.error_location, "bug metadata");

    let invocation = Invocation::new(&base_dir, subject, config.assertion_generation, metadata);
    invocation.run(&config.fixcheck)?;

    let destination = subject_output_dir(&config.outputs_dir, &config.subject_id, config.assertion_generation);
    relocate_outputs(&config.outputs_dir, &config.run_log, &destination)
}

#[cfg(test)]
fn args(dataset_root: Option<PathBuf>) -> RunnerArgs {
    RunnerArgs {
        subject_id: "Patch1".to_string(),
        assertion_generation: AssertionGeneration::NoAssertion,
        dataset: PathBuf::from("subjects.csv"),
        dataset_root,
        bug_info_dir: PathBuf::from("bug_info"),
        outputs_dir: PathBuf::from("fixcheck-output"),
        fixcheck: PathBuf::from("./fixcheck.sh"),
        run_log: PathBuf::from("log.out"),
    }
}

#[test]
fn dataset_root_is_required() {
    assert!(matches!(
        RunConfig::try_from(args(None)),
        Err(ExperimentError::MissingDatasetRoot)
    ));
    let config = RunConfig::try_from(args(Some(PathBuf::from("/data")))).unwrap();
    assert_eq!(config.dataset_root, PathBuf::from("/data"));
}

#[test]
fn unknown_subject_fails_before_running() {
    let work = tempfile::tempdir().unwrap();
    let dataset = work.path().join("subjects.csv");
    std::fs::write(&dataset, "id,project,bug,correctness\nPatch2,Lang,2,Incorrect\n").unwrap();

    let mut config = RunConfig::try_from(args(Some(work.path().to_path_buf()))).unwrap();
    config.dataset = dataset;
    config.fixcheck = work.path().join("never-called.sh");

    assert!(matches!(
        run_subject(&config),
        Err(ExperimentError::SubjectNotFound { .. })
    ));
}

#[cfg(unix)]
#[test]
fn runs_tool_and_relocates_outputs() {
    use std::os::unix::fs::PermissionsExt;

    let work = tempfile::tempdir().unwrap();
    let root = work.path();
    std::fs::write(
        root.join("subjects.csv"),
        "id,project,bug,main_dep,tests_build,target_test,target_test_methods,tests_src_dir,target_class,input_class,correctness\n\
         Patch1,Chart,1,build,build-tests,TestA,testFoo,tests,A,B,Incorrect\n",
    )
    .unwrap();
    std::fs::create_dir_all(root.join("bug_info")).unwrap();
    std::fs::write(
        root.join("bug_info/chart_bug_info.txt"),
        "Summary for Bug: Chart-1\nRoot cause in triggering tests:\n - org.jfree.TestA::testFoo\nList of modified sources:\n - org.jfree.A\n",
    )
    .unwrap();

    // Stand-in for FixCheck: writes a report and a log that mention the metadata.
    let outputs = root.join("fixcheck-output");
    let run_log = root.join("log.out");
    let script = root.join("fixcheck.sh");
    std::fs::write(
        &script,
        format!(
            "#!/bin/sh\nmkdir -p '{out}/failing-tests'\necho \"$ROOT_CAUSE\" > '{out}/report.csv'\necho \"$1\" > '{log}'\n",
            out = outputs.display(),
            log = run_log.display()
        ),
    )
    .unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    let config = RunConfig {
        subject_id: "Patch1".to_string(),
        assertion_generation: AssertionGeneration::LlmAssertion,
        dataset: root.join("subjects.csv"),
        dataset_root: root.join("dataset"),
        bug_info_dir: root.join("bug_info"),
        outputs_dir: outputs.clone(),
        fixcheck: script,
        run_log,
    };
    let moved = run_subject(&config).unwrap();
    assert_eq!(moved.len(), 3);

    let destination = outputs.join("defects-repairing/Patch1/llm-assertion");
    assert_eq!(
        std::fs::read_to_string(destination.join("report.csv")).unwrap(),
        "- org.jfree.TestA::testFoo\n"
    );
    let classpath = root.join("dataset/tmp/Patch1/Chart1b");
    assert_eq!(
        std::fs::read_to_string(destination.join("log.out")).unwrap(),
        format!("{}/build:{}/build-tests\n", classpath.display(), classpath.display())
    );
    assert!(destination.join("failing-tests").is_dir());
}
