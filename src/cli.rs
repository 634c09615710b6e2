use std::{fmt, path::PathBuf};

use clap::{builder::PossibleValuesParser, command, Arg, ArgMatches};

pub const DEFAULT_DATASET: &str = "experiments/defect-repairing-subjects.csv";
pub const DEFAULT_BUG_INFO_DIR: &str = "/root/defects4j_bug_info";
pub const DEFAULT_OUTPUTS_DIR: &str = "fixcheck-output";
pub const DEFAULT_RESULTS_ROOT: &str = "fixcheck-output/defects-repairing";
pub const DEFAULT_FIXCHECK: &str = "./fixcheck.sh";
pub const DEFAULT_RUN_LOG: &str = "log.out";

/// How FixCheck builds the oracles of the tests it generates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertionGeneration {
    NoAssertion,
    PreviousAssertion,
    LlmAssertion,
}

impl AssertionGeneration {
    pub const NAMES: [&'static str; 3] = ["no-assertion", "previous-assertion", "llm-assertion"];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssertionGeneration::NoAssertion => "no-assertion",
            AssertionGeneration::PreviousAssertion => "previous-assertion",
            AssertionGeneration::LlmAssertion => "llm-assertion",
        }
    }

    pub fn parse(name: &str) -> Option<AssertionGeneration> {
        match name {
            "no-assertion" => Some(AssertionGeneration::NoAssertion),
            "previous-assertion" => Some(AssertionGeneration::PreviousAssertion),
            "llm-assertion" => Some(AssertionGeneration::LlmAssertion),
            _ => None,
        }
    }
}

impl fmt::Display for AssertionGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct RunnerArgs {
    pub subject_id: String,
    pub assertion_generation: AssertionGeneration,
    pub dataset: PathBuf,
    pub dataset_root: Option<PathBuf>,
    pub bug_info_dir: PathBuf,
    pub outputs_dir: PathBuf,
    pub fixcheck: PathBuf,
    pub run_log: PathBuf,
}

#[derive(Debug)]
pub struct ResultsArgs {
    pub assertion_generation: AssertionGeneration,
    pub dataset: PathBuf,
    pub results_root: PathBuf,
    pub export: Option<PathBuf>,
}

fn mode_arg(index: usize) -> Arg {
    Arg::new("assertion_generation")
        .help("Assertion generation mode")
        .required(true)
        .index(index)
        .value_parser(PossibleValuesParser::new(AssertionGeneration::NAMES))
}

fn dataset_arg() -> Arg {
    Arg::new("dataset")
        .help("CSV file describing the benchmark subjects")
        .long("dataset")
        .default_value(DEFAULT_DATASET)
}

fn path_of(arguments: &ArgMatches, id: &str) -> PathBuf {
    arguments
        .get_one::<String>(id)
        .map(PathBuf::from)
        .unwrap_or_default()
}

fn mode_of(arguments: &ArgMatches) -> AssertionGeneration {
    // The value parser only lets the three known names through.
    arguments
        .get_one::<String>("assertion_generation")
        .and_then(|mode| AssertionGeneration::parse(mode))
        .unwrap_or(AssertionGeneration::NoAssertion)
}

pub fn runner_cli() -> RunnerArgs {
    let arguments = command!("run-fixcheck")
        .about("Runs FixCheck on one defect-repairing subject and files its outputs under the subject's directory.")
        .arg(
            Arg::new("subject_id")
                .help("Subject (patch) id from the dataset, e.g. Patch1")
                .required(true)
                .index(1),
        )
        .arg(mode_arg(2))
        .arg(dataset_arg())
        .arg(
            Arg::new("dataset_root")
                .help("Root of the defect-repairing dataset checkout")
                .long("dataset-root")
                .env("DEFECT_REPAIRING_DATASET"),
        )
        .arg(
            Arg::new("bug_info_dir")
                .help("Directory holding <project>_bug_info.txt files")
                .long("bug-info-dir")
                .default_value(DEFAULT_BUG_INFO_DIR),
        )
        .arg(
            Arg::new("outputs_dir")
                .help("Directory FixCheck writes its outputs to")
                .long("outputs-dir")
                .default_value(DEFAULT_OUTPUTS_DIR),
        )
        .arg(
            Arg::new("fixcheck")
                .help("FixCheck launcher script")
                .long("fixcheck")
                .default_value(DEFAULT_FIXCHECK),
        )
        .arg(
            Arg::new("run_log")
                .help("Log file FixCheck leaves in the working directory")
                .long("run-log")
                .default_value(DEFAULT_RUN_LOG),
        )
        .get_matches();

    RunnerArgs {
        subject_id: arguments
            .get_one::<String>("subject_id")
            .cloned()
            .unwrap_or_default(),
        assertion_generation: mode_of(&arguments),
        dataset: path_of(&arguments, "dataset"),
        dataset_root: arguments.get_one::<String>("dataset_root").map(PathBuf::from),
        bug_info_dir: path_of(&arguments, "bug_info_dir"),
        outputs_dir: path_of(&arguments, "outputs_dir"),
        fixcheck: path_of(&arguments, "fixcheck"),
        run_log: path_of(&arguments, "run_log"),
    }
}

pub fn results_cli() -> ResultsArgs {
    let arguments = command!("fixcheck-results")
        .about("Summarizes FixCheck outcomes over the incorrect patches of the defect-repairing dataset.")
        .arg(mode_arg(1))
        .arg(dataset_arg())
        .arg(
            Arg::new("results_root")
                .help("Directory holding <patch>/<mode>/report.csv")
                .long("results-root")
                .default_value(DEFAULT_RESULTS_ROOT),
        )
        .arg(
            Arg::new("export")
                .help("Also write the per-patch table to this CSV file")
                .long("export"),
        )
        .get_matches();

    ResultsArgs {
        assertion_generation: mode_of(&arguments),
        dataset: path_of(&arguments, "dataset"),
        results_root: path_of(&arguments, "results_root"),
        export: arguments.get_one::<String>("export").map(PathBuf::from),
    }
}

#[test]
fn mode_names_round_trip() {
    for name in AssertionGeneration::NAMES {
        let mode = AssertionGeneration::parse(name).unwrap();
        assert_eq!(mode.to_string(), name);
    }
    assert_eq!(AssertionGeneration::parse("some-assertion"), None);
}
