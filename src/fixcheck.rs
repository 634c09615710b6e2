use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::{Command, ExitStatus},
};

use tracing::{info, warn};

use crate::{
    cli::AssertionGeneration,
    dataset::SubjectRow,
    error::{ExperimentError, Result},
    metadata::BugMetadata,
};

/// Where a subject's checkout lives inside the dataset root.
pub fn subject_base_dir(dataset_root: &Path, subject: &SubjectRow) -> PathBuf {
    dataset_root
        .join("tmp")
        .join(&subject.id)
        .join(format!("{}{}b", subject.project, subject.bug))
}

/// Joins every `:`-separated dependency onto `base_dir` and appends the test classes.
pub fn build_classpath(base_dir: &Path, main_dep: &str, test_classes_path: &Path) -> String {
    let mut classpath = main_dep
        .split(':')
        .map(|dep| base_dir.join(dep).display().to_string())
        .collect::<Vec<_>>()
        .join(":");
    classpath.push(':');
    classpath.push_str(&test_classes_path.display().to_string());
    classpath
}

/// Everything one FixCheck invocation needs, in argument order.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub classpath: String,
    pub test_classes_path: PathBuf,
    pub target_test: String,
    pub target_test_methods: String,
    pub target_test_dir: PathBuf,
    pub target_class: String,
    pub input_class: String,
    pub failure_log: PathBuf,
    pub assertion_generation: AssertionGeneration,
    pub metadata: BugMetadata,
}

impl Invocation {
    pub fn new(
        base_dir: &Path,
        subject: &SubjectRow,
        assertion_generation: AssertionGeneration,
        metadata: BugMetadata,
    ) -> Invocation {
        let test_classes_path = base_dir.join(&subject.tests_build);
        Invocation {
            classpath: build_classpath(base_dir, &subject.main_dep, &test_classes_path),
            test_classes_path,
            target_test: subject.target_test.clone(),
            target_test_methods: subject.target_test_methods.clone(),
            target_test_dir: base_dir.join(&subject.tests_src_dir),
            target_class: subject.target_class.clone(),
            input_class: subject.input_class.clone(),
            failure_log: base_dir.join("failing_tests"),
            assertion_generation,
            metadata,
        }
    }

    pub fn args(&self) -> Vec<OsString> {
        vec![
            self.classpath.clone().into(),
            self.test_classes_path.clone().into(),
            self.target_test.clone().into(),
            self.target_test_methods.clone().into(),
            self.target_test_dir.clone().into(),
            self.target_class.clone().into(),
            self.input_class.clone().into(),
            self.failure_log.clone().into(),
            self.assertion_generation.as_str().into(),
        ]
    }

    /// The child inherits our environment plus the bug metadata.
    pub fn command(&self, program: &Path) -> Command {
        let mut command = Command::new(program);
        command
            .args(self.args())
            .env("ROOT_CAUSE", &self.metadata.root_cause)
            .env("ERROR_LOCATION", &self.metadata.error_location);
        command
    }

    /// Blocks until FixCheck exits. A non-zero exit is only reported.
    pub fn run(&self, program: &Path) -> Result<ExitStatus> {
        info!(program = %program.display(), mode = %self.assertion_generation, "running FixCheck");
        let status = self
            .command(program)
            .status()
            .map_err(|source| ExperimentError::Spawn {
                program: program.to_path_buf(),
                source,
            })?;

        if !status.success() {
            warn!(%status, "FixCheck exited unsuccessfully, relocating whatever it produced");
        }
        Ok(status)
    }
}

#[cfg(test)]
fn subject() -> SubjectRow {
    SubjectRow {
        id: "Patch7".to_string(),
        project: "Lang".to_string(),
        bug: "43".to_string(),
        base_dir: "ignored".to_string(),
        main_dep: "target/classes:lib/commons-io.jar".to_string(),
        tests_build: "target/tests".to_string(),
        target_test: "org.apache.commons.lang.text.ExtendedMessageFormatTest".to_string(),
        target_test_methods: "testEscapedQuote_LANG_477".to_string(),
        tests_src_dir: "src/test/java".to_string(),
        target_class: "org.apache.commons.lang.text.ExtendedMessageFormat".to_string(),
        input_class: "java.lang.String".to_string(),
        correctness: "Incorrect".to_string(),
    }
}

#[test]
fn base_dir_uses_project_and_bug() {
    let base = subject_base_dir(Path::new("/data"), &subject());
    assert_eq!(base, PathBuf::from("/data/tmp/Patch7/Lang43b"));
}

#[test]
fn classpath_prefixes_each_dependency() {
    let classpath = build_classpath(
        Path::new("/base"),
        "build:lib/a.jar:lib/b.jar",
        Path::new("/base/build-tests"),
    );
    assert_eq!(
        classpath,
        "/base/build:/base/lib/a.jar:/base/lib/b.jar:/base/build-tests"
    );
}

#[test]
fn arguments_follow_tool_order() {
    let invocation = Invocation::new(
        Path::new("/base"),
        &subject(),
        AssertionGeneration::LlmAssertion,
        BugMetadata::default(),
    );
    let args: Vec<String> = invocation
        .args()
        .into_iter()
        .map(|arg| arg.into_string().unwrap())
        .collect();

    assert_eq!(
        args,
        vec![
            "/base/target/classes:/base/lib/commons-io.jar:/base/target/tests",
            "/base/target/tests",
            "org.apache.commons.lang.text.ExtendedMessageFormatTest",
            "testEscapedQuote_LANG_477",
            "/base/src/test/java",
            "org.apache.commons.lang.text.ExtendedMessageFormat",
            "java.lang.String",
            "/base/failing_tests",
            "llm-assertion",
        ]
    );
}

#[test]
fn missing_program_is_a_spawn_error() {
    let invocation = Invocation::new(
        Path::new("/base"),
        &subject(),
        AssertionGeneration::NoAssertion,
        BugMetadata::default(),
    );
    let result = invocation.run(Path::new("/nonexistent/fixcheck.sh"));
    assert!(matches!(result, Err(ExperimentError::Spawn { .. })));
}

#[cfg(unix)]
#[test]
fn child_sees_metadata_and_arguments() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let capture = dir.path().join("capture.txt");
    let script = dir.path().join("fixcheck.sh");
    std::fs::write(
        &script,
        format!(
            "#!/bin/sh\nprintf '%s|%s|%s|%s\\n' \"$ROOT_CAUSE\" \"$ERROR_LOCATION\" \"$3\" \"$9\" > '{}'\nexit 3\n",
            capture.display()
        ),
    )
    .unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    let metadata = BugMetadata {
        root_cause: "- some.Test::method --> NPE".to_string(),
        error_location: "some.Test".to_string(),
    };
    let invocation = Invocation::new(
        Path::new("/base"),
        &subject(),
        AssertionGeneration::PreviousAssertion,
        metadata,
    );

    let status = invocation.run(&script).unwrap();
    assert_eq!(status.code(), Some(3));

    let captured = std::fs::read_to_string(&capture).unwrap();
    assert_eq!(
        captured,
        "- some.Test::method --> NPE|some.Test|org.apache.commons.lang.text.ExtendedMessageFormatTest|previous-assertion\n"
    );
}
