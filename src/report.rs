use std::{
    fs::File,
    io::{self, Write},
    path::{Path, PathBuf},
};

use csv::{Reader, Writer};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    cli::AssertionGeneration,
    dataset::{Dataset, SubjectRow},
    error::Result,
};

/// Scores at or above this flag a high-confidence detection.
pub const THRESHOLD: f64 = 0.40;

pub const REPORT_FILE: &str = "report.csv";
pub const SCORES_FILE: &str = "scores-failing-tests.csv";

/// Cells may be empty or written as floats (`10.0`); empty cells count as zero.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReportRow {
    output_prefixes: Option<f64>,
    passing_prefixes: Option<f64>,
    crashing_prefixes: Option<f64>,
    assertion_failing_prefixes: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ScoreRow {
    #[serde(default)]
    prefix: String,
    score: f64,
}

/// Prefix counts summed over every row of a `report.csv`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TestCounts {
    pub total: u64,
    pub passing: u64,
    pub crashing: u64,
    pub assertion_failing: u64,
}

impl TestCounts {
    /// Whatever is neither passing nor failing did not compile. Never negative.
    pub fn non_compiling(&self) -> u64 {
        self.total
            .saturating_sub(self.passing + self.crashing + self.assertion_failing)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreStats {
    pub count: u64,
    pub sum: f64,
    pub over_count: u64,
    pub over_sum: f64,
}

impl ScoreStats {
    pub fn push(&mut self, score: f64) {
        self.count += 1;
        self.sum += score;
        if score >= THRESHOLD {
            self.over_count += 1;
            self.over_sum += score;
        }
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    pub fn over_mean(&self) -> Option<f64> {
        (self.over_count > 0).then(|| self.over_sum / self.over_count as f64)
    }
}

/// Failing-test scores split by the kind of failure.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FailingScores {
    pub assertion_failing: ScoreStats,
    pub crashing: ScoreStats,
}

impl FailingScores {
    /// FixCheck names assertion-failing prefixes `...with...`; everything else crashed.
    pub fn push(&mut self, prefix: &str, score: f64) {
        if prefix.contains("with") {
            self.assertion_failing.push(score);
        } else {
            self.crashing.push(score);
        }
    }
}

/// Two decimals, ties to the even digit (0.125 -> 0.12).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Percentage of `total`, rounded to two decimals. 0.0 when there is nothing to divide.
pub fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        round2(part as f64 / total as f64 * 100.0)
    }
}

pub fn read_test_counts<P: AsRef<Path>>(path: P) -> Result<TestCounts> {
    let mut rdr = Reader::from_path(path)?;
    let (mut total, mut passing, mut crashing, mut assertion_failing) = (0.0, 0.0, 0.0, 0.0);
    for result in rdr.deserialize() {
        let row: ReportRow = result?;
        total += row.output_prefixes.unwrap_or(0.0);
        passing += row.passing_prefixes.unwrap_or(0.0);
        crashing += row.crashing_prefixes.unwrap_or(0.0);
        assertion_failing += row.assertion_failing_prefixes.unwrap_or(0.0);
    }
    // fractional sums truncate, negative ones become 0
    Ok(TestCounts {
        total: total as u64,
        passing: passing as u64,
        crashing: crashing as u64,
        assertion_failing: assertion_failing as u64,
    })
}

pub fn read_scores<P: AsRef<Path>>(path: P) -> Result<FailingScores> {
    let mut rdr = Reader::from_path(path)?;
    let mut scores = FailingScores::default();
    for result in rdr.deserialize() {
        let row: ScoreRow = result?;
        scores.push(&row.prefix, row.score);
    }
    Ok(scores)
}

/// Outcome of FixCheck on one patch. Column names match the exported table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatchReport {
    pub project: String,
    pub patch_id: String,
    pub correctness: String,
    pub total_tests: u64,
    pub passing_tests: u64,
    pub non_compiling_tests: u64,
    pub assertion_failing_tests: u64,
    pub crashing_tests: u64,
    pub passing_ratio: f64,
    pub non_compiling_ratio: f64,
    pub assertion_failing_ratio: f64,
    pub crashing_ratio: f64,
    pub af_score_count: u64,
    pub af_score_over_count: u64,
    pub af_score_sum: f64,
    pub af_score_over_sum: f64,
    pub af_score_mean: Option<f64>,
    pub af_score_over_mean: Option<f64>,
    pub crash_score_count: u64,
    pub crash_score_over_count: u64,
}

impl PatchReport {
    /// A report with every count at zero, used as is when FixCheck left nothing behind.
    pub fn empty(subject: &SubjectRow) -> PatchReport {
        PatchReport {
            project: subject.project.clone(),
            patch_id: subject.id.clone(),
            correctness: subject.correctness.clone(),
            total_tests: 0,
            passing_tests: 0,
            non_compiling_tests: 0,
            assertion_failing_tests: 0,
            crashing_tests: 0,
            passing_ratio: 0.0,
            non_compiling_ratio: 0.0,
            assertion_failing_ratio: 0.0,
            crashing_ratio: 0.0,
            af_score_count: 0,
            af_score_over_count: 0,
            af_score_sum: 0.0,
            af_score_over_sum: 0.0,
            af_score_mean: None,
            af_score_over_mean: None,
            crash_score_count: 0,
            crash_score_over_count: 0,
        }
    }

    pub fn with_counts(mut self, counts: TestCounts) -> PatchReport {
        let non_compiling = counts.non_compiling();
        self.total_tests = counts.total;
        self.passing_tests = counts.passing;
        self.non_compiling_tests = non_compiling;
        self.assertion_failing_tests = counts.assertion_failing;
        self.crashing_tests = counts.crashing;
        self.passing_ratio = ratio(counts.passing, counts.total);
        self.non_compiling_ratio = ratio(non_compiling, counts.total);
        self.assertion_failing_ratio = ratio(counts.assertion_failing, counts.total);
        self.crashing_ratio = ratio(counts.crashing, counts.total);
        self
    }

    pub fn with_scores(mut self, scores: &FailingScores) -> PatchReport {
        let af = &scores.assertion_failing;
        self.af_score_count = af.count;
        self.af_score_over_count = af.over_count;
        self.af_score_sum = af.sum;
        self.af_score_over_sum = af.over_sum;
        self.af_score_mean = af.mean();
        self.af_score_over_mean = af.over_mean();
        self.crash_score_count = scores.crashing.count;
        self.crash_score_over_count = scores.crashing.over_count;
        self
    }

    /// Score rows and report.csv should agree on the assertion failures.
    pub fn scores_consistent(&self) -> bool {
        self.assertion_failing_tests == 0 || self.af_score_count == self.assertion_failing_tests
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out)?;
        writeln!(
            out,
            "[Patch] {} (project={}, correctness={})",
            self.patch_id, self.project, self.correctness
        )?;
        writeln!(out, "  total tests        : {}", self.total_tests)?;
        writeln!(out, "  passing            : {} ({:.2}%)", self.passing_tests, self.passing_ratio)?;
        writeln!(out, "  non-compiling      : {} ({:.2}%)", self.non_compiling_tests, self.non_compiling_ratio)?;
        writeln!(out, "  assertion-failing  : {} ({:.2}%)", self.assertion_failing_tests, self.assertion_failing_ratio)?;
        writeln!(out, "  crashing           : {} ({:.2}%)", self.crashing_tests, self.crashing_ratio)?;

        match self.af_score_mean {
            Some(mean) => {
                let over_ratio = self.af_score_over_count as f64 / self.af_score_count as f64 * 100.0;
                writeln!(out, "  [assertion-failing scores] count={}, mean={:.4} ", self.af_score_count, mean)?;
                write!(out, "    >= {:.2}: {} ({:.2}%)", THRESHOLD, self.af_score_over_count, over_ratio)?;
                match self.af_score_over_mean {
                    Some(over_mean) => writeln!(out, ", mean(over)={:.4}", over_mean)?,
                    None => writeln!(out)?,
                }
            }
            None => writeln!(out, "  [assertion-failing scores] none")?,
        }

        if self.crash_score_count > 0 {
            let over_ratio = self.crash_score_over_count as f64 / self.crash_score_count as f64 * 100.0;
            writeln!(
                out,
                "  [crashing scores] count={}, >= {:.2}: {} ({:.2}%)",
                self.crash_score_count, THRESHOLD, self.crash_score_over_count, over_ratio
            )?;
        } else {
            writeln!(out, "  [crashing scores] none")?;
        }
        Ok(())
    }
}

/// Where the runner filed a patch's outputs for one mode.
pub fn patch_results_dir(results_root: &Path, patch_id: &str, assertion_generation: AssertionGeneration) -> PathBuf {
    results_root.join(patch_id).join(assertion_generation.as_str())
}

/// Builds the report of one patch. `None` means its report.csv is missing or unreadable.
pub fn read_patch_report(subject: &SubjectRow, results_dir: &Path) -> Option<PatchReport> {
    let report_path = results_dir.join(REPORT_FILE);
    if !report_path.exists() {
        warn!(patch_id = %subject.id, dir = %results_dir.display(), "report.csv not found");
        return None;
    }
    let counts = match read_test_counts(&report_path) {
        Ok(counts) => counts,
        Err(err) => {
            warn!(patch_id = %subject.id, path = %report_path.display(), %err, "unreadable report.csv");
            return None;
        }
    };
    let mut report = PatchReport::empty(subject).with_counts(counts);

    let scores_path = results_dir.join(SCORES_FILE);
    if scores_path.exists() {
        match read_scores(&scores_path) {
            Ok(scores) => report = report.with_scores(&scores),
            Err(err) => {
                warn!(patch_id = %subject.id, path = %scores_path.display(), %err, "unreadable scores, ignoring them")
            }
        }
        if !report.scores_consistent() {
            warn!(
                patch_id = %subject.id,
                assertion_failing_tests = report.assertion_failing_tests,
                af_score_count = report.af_score_count,
                "score prefixes disagree with report.csv"
            );
        }
    }
    Some(report)
}

#[derive(Debug, Clone)]
pub struct ResultsConfig {
    pub dataset: PathBuf,
    pub results_root: PathBuf,
    pub assertion_generation: AssertionGeneration,
}

/// Reports of the analyzed patches in target order, plus the ids whose report was missing.
#[derive(Debug, Default)]
pub struct Collection {
    pub reports: Vec<PatchReport>,
    pub missing: Vec<String>,
}

/// Collects the incorrect patches among `targets`. Only an unreadable dataset is fatal.
pub fn collect_reports(config: &ResultsConfig, targets: &[String]) -> Result<Collection> {
    let dataset = Dataset::load(&config.dataset)?;
    Ok(collect_from(&dataset, targets, &config.results_root, config.assertion_generation))
}

pub fn collect_from(
    dataset: &Dataset,
    targets: &[String],
    results_root: &Path,
    assertion_generation: AssertionGeneration,
) -> Collection {
    let mut collection = Collection::default();

    for patch_id in targets {
        let Some(subject) = dataset.find(patch_id) else {
            warn!(%patch_id, dataset = %dataset.path().display(), "patch not found in dataset");
            continue;
        };
        if subject.is_correct() {
            continue;
        }

        let results_dir = patch_results_dir(results_root, patch_id, assertion_generation);
        let report = match read_patch_report(subject, &results_dir) {
            Some(report) => report,
            None => {
                collection.missing.push(patch_id.clone());
                PatchReport::empty(subject)
            }
        };
        collection.reports.push(report);
    }
    collection
}

pub fn export_csv<P: AsRef<Path>>(reports: &[PatchReport], path: P) -> Result<()> {
    let mut writer = Writer::from_writer(File::create(path)?);
    for report in reports {
        writer.serialize(report)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
use std::fs;

#[cfg(test)]
fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[cfg(test)]
fn subject(id: &str, project: &str, correctness: &str) -> SubjectRow {
    SubjectRow {
        id: id.to_string(),
        project: project.to_string(),
        correctness: correctness.to_string(),
        ..SubjectRow::default()
    }
}

#[cfg(test)]
const REPORT_HEADER: &str = "output_prefixes,passing_prefixes,crashing_prefixes,assertion_failing_prefixes\n";

#[test]
fn non_compiling_never_negative() {
    let inconsistent = TestCounts {
        total: 3,
        passing: 2,
        crashing: 1,
        assertion_failing: 1,
    };
    assert_eq!(inconsistent.non_compiling(), 0);

    let report = PatchReport::empty(&subject("Patch1", "Chart", "Incorrect")).with_counts(inconsistent);
    assert_eq!(report.non_compiling_tests, 0);
    assert!(approx(report.non_compiling_ratio, 0.0));
}

#[test]
fn zero_total_gives_zero_ratios() {
    let report = PatchReport::empty(&subject("Patch1", "Chart", "Incorrect")).with_counts(TestCounts::default());
    assert_eq!(report.passing_ratio, 0.0);
    assert_eq!(report.non_compiling_ratio, 0.0);
    assert_eq!(report.assertion_failing_ratio, 0.0);
    assert_eq!(report.crashing_ratio, 0.0);
}

#[test]
fn ratios_round_to_two_decimals() {
    assert!(approx(ratio(1, 3), 33.33));
    assert!(approx(ratio(2, 3), 66.67));
    assert!(approx(ratio(0, 7), 0.0));
}

#[test]
fn scores_split_on_with() {
    let mut scores = FailingScores::default();
    scores.push("t1-with-assert", 0.5);
    scores.push("t1-crash", 0.2);
    scores.push("t2-with-assert", 0.3);
    scores.push("without", 0.9);

    assert_eq!(scores.assertion_failing.count, 3);
    assert_eq!(scores.crashing.count, 1);
    assert_eq!(scores.crashing.over_count, 0);
}

#[test]
fn threshold_is_inclusive() {
    let mut stats = ScoreStats::default();
    stats.push(0.40);
    stats.push(0.39999);
    assert_eq!(stats.over_count, 1);
    assert!(approx(stats.over_mean().unwrap(), 0.40));
    assert_eq!(ScoreStats::default().mean(), None);
}

#[test]
fn report_counts_and_ratios() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(REPORT_FILE), format!("{}10,6,1,2\n", REPORT_HEADER)).unwrap();

    let report = read_patch_report(&subject("Patch1", "Chart", "Incorrect"), dir.path()).unwrap();
    assert_eq!(report.total_tests, 10);
    assert_eq!(report.non_compiling_tests, 1);
    assert!(approx(report.passing_ratio, 60.0));
    assert!(approx(report.crashing_ratio, 10.0));
    assert!(approx(report.assertion_failing_ratio, 20.0));
    assert!(approx(report.non_compiling_ratio, 10.0));
    // no scores file
    assert_eq!(report.af_score_count, 0);
    assert_eq!(report.crash_score_count, 0);
}

#[test]
fn report_rows_are_summed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(REPORT_FILE);
    fs::write(&path, format!("{}10,6,1,2\n5,1,1,0\n", REPORT_HEADER)).unwrap();

    let counts = read_test_counts(&path).unwrap();
    assert_eq!(
        counts,
        TestCounts {
            total: 15,
            passing: 7,
            crashing: 2,
            assertion_failing: 2,
        }
    );
}

#[test]
fn score_statistics() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(REPORT_FILE), format!("{}10,6,1,2\n", REPORT_HEADER)).unwrap();
    fs::write(
        dir.path().join(SCORES_FILE),
        "prefix,score\nt1-with-assert,0.5\nt1-crash,0.2\nt2-with-assert,0.3\n",
    )
    .unwrap();

    let report = read_patch_report(&subject("Patch1", "Chart", "Incorrect"), dir.path()).unwrap();
    assert_eq!(report.af_score_count, 2);
    assert!(approx(report.af_score_mean.unwrap(), 0.4));
    assert_eq!(report.af_score_over_count, 1);
    assert!(approx(report.af_score_over_mean.unwrap(), 0.5));
    assert_eq!(report.crash_score_count, 1);
    assert_eq!(report.crash_score_over_count, 0);
    assert!(report.scores_consistent());
}

#[test]
fn missing_reports_are_zero_filled() {
    let work = tempfile::tempdir().unwrap();
    let dataset_path = work.path().join("subjects.csv");
    fs::write(
        &dataset_path,
        "id,project,bug,correctness\nPatch1,Chart,1,Incorrect\nPatch2,Lang,2,Correct\nPatch4,Math,4,Incorrect\n",
    )
    .unwrap();
    let results_root = work.path().join("defects-repairing");
    let patch4 = patch_results_dir(&results_root, "Patch4", AssertionGeneration::NoAssertion);
    fs::create_dir_all(&patch4).unwrap();
    fs::write(patch4.join(REPORT_FILE), format!("{}4,4,0,0\n", REPORT_HEADER)).unwrap();

    let config = ResultsConfig {
        dataset: dataset_path,
        results_root,
        assertion_generation: AssertionGeneration::NoAssertion,
    };
    let targets: Vec<String> = ["Patch1", "Patch2", "Patch3", "Patch4"]
        .iter()
        .map(|id| id.to_string())
        .collect();
    let collection = collect_reports(&config, &targets).unwrap();

    let ids: Vec<&str> = collection.reports.iter().map(|r| r.patch_id.as_str()).collect();
    assert_eq!(ids, vec!["Patch1", "Patch4"]);
    assert_eq!(collection.missing, vec!["Patch1".to_string()]);
    assert_eq!(collection.reports[0], PatchReport::empty(&subject("Patch1", "Chart", "Incorrect")));
    assert_eq!(collection.reports[1].passing_tests, 4);
}

#[test]
fn malformed_report_counts_as_missing() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(REPORT_FILE), format!("{}ten,6,1,2\n", REPORT_HEADER)).unwrap();
    assert!(read_patch_report(&subject("Patch1", "Chart", "Incorrect"), dir.path()).is_none());
}

#[test]
fn patch_block_formatting() {
    let mut scores = FailingScores::default();
    scores.push("t1-with-assert", 0.5);
    scores.push("t1-crash", 0.2);
    scores.push("t2-with-assert", 0.3);
    let report = PatchReport::empty(&subject("Patch1", "Chart", "Incorrect"))
        .with_counts(TestCounts {
            total: 10,
            passing: 6,
            crashing: 1,
            assertion_failing: 2,
        })
        .with_scores(&scores);

    let mut out = Vec::new();
    report.write_to(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert_eq!(
        text,
        "\n[Patch] Patch1 (project=Chart, correctness=Incorrect)\n\
         \x20 total tests        : 10\n\
         \x20 passing            : 6 (60.00%)\n\
         \x20 non-compiling      : 1 (10.00%)\n\
         \x20 assertion-failing  : 2 (20.00%)\n\
         \x20 crashing           : 1 (10.00%)\n\
         \x20 [assertion-failing scores] count=2, mean=0.4000 \n\
         \x20   >= 0.40: 1 (50.00%), mean(over)=0.5000\n\
         \x20 [crashing scores] count=1, >= 0.40: 0 (0.00%)\n"
    );
}

#[test]
fn export_writes_one_row_per_patch() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("patches.csv");
    let reports = vec![
        PatchReport::empty(&subject("Patch1", "Chart", "Incorrect")),
        PatchReport::empty(&subject("Patch4", "Math", "Incorrect")),
    ];
    export_csv(&reports, &path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    let mut lines = text.lines();
    let header = lines.next().unwrap();
    assert!(header.starts_with("project,patch_id,correctness,total_tests,"));
    assert!(header.ends_with("crash_score_count,crash_score_over_count"));
    assert_eq!(lines.count(), 2);
}

#[test]
fn ratio_ties_round_to_even() {
    assert!(approx(ratio(1, 800), 0.12));
    assert!(approx(ratio(3, 800), 0.38));
    assert!(approx(round2(12.5), 12.5));
}

#[test]
fn report_cells_may_be_empty_or_float() {
    let dir = tempfile::tempdir().unwrap();
    let empty_cell = dir.path().join("empty.csv");
    fs::write(&empty_cell, format!("{}10,6,,2\n4,,1,\n", REPORT_HEADER)).unwrap();
    assert_eq!(
        read_test_counts(&empty_cell).unwrap(),
        TestCounts {
            total: 14,
            passing: 6,
            crashing: 1,
            assertion_failing: 2,
        }
    );

    let floats = dir.path().join("floats.csv");
    fs::write(&floats, format!("{}10.0,6.0,1.0,2.0\n", REPORT_HEADER)).unwrap();
    assert_eq!(read_test_counts(&floats).unwrap().passing, 6);

    fs::write(dir.path().join(REPORT_FILE), format!("{}10,6,,2\n", REPORT_HEADER)).unwrap();
    let report = read_patch_report(&subject("Patch1", "Chart", "Incorrect"), dir.path()).unwrap();
    assert_eq!(report.crashing_tests, 0);
    assert_eq!(report.non_compiling_tests, 2);
}

#[test]
fn score_rows_disagreeing_with_report() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(REPORT_FILE), format!("{}10,6,1,2\n", REPORT_HEADER)).unwrap();
    fs::write(
        dir.path().join(SCORES_FILE),
        "prefix,score\nt1-with-assert,0.5\nt1-crash,0.2\n",
    )
    .unwrap();

    let report = read_patch_report(&subject("Patch1", "Chart", "Incorrect"), dir.path()).unwrap();
    assert_eq!(report.assertion_failing_tests, 2);
    assert_eq!(report.af_score_count, 1);
    assert!(!report.scores_consistent());
}

#[test]
fn no_assertion_failures_is_always_consistent() {
    let mut scores = FailingScores::default();
    scores.push("t1-with-assert", 0.7);
    let report = PatchReport::empty(&subject("Patch1", "Chart", "Incorrect"))
        .with_counts(TestCounts {
            total: 5,
            passing: 4,
            crashing: 1,
            assertion_failing: 0,
        })
        .with_scores(&scores);

    assert_eq!(report.af_score_count, 1);
    assert!(report.scores_consistent());
}
