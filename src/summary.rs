use std::io::{self, Write};

use crate::{
    report::{Collection, PatchReport, THRESHOLD},
    targets::PROJECTS,
};

pub const TOTAL: &str = "TOTAL";

/// Counts summed over the patches of one project, or over all of them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupSummary {
    pub name: String,
    pub patches: usize,
    pub total_tests: u64,
    pub passing_tests: u64,
    pub non_compiling_tests: u64,
    pub assertion_failing_tests: u64,
    pub crashing_tests: u64,
    pub af_score_count: u64,
    pub af_score_sum: f64,
    pub af_score_over_count: u64,
    pub af_score_over_sum: f64,
    pub crash_score_count: u64,
    pub crash_score_over_count: u64,
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

impl GroupSummary {
    /// `None` when no patch falls in the group.
    pub fn of(reports: &[PatchReport], group: &str) -> Option<GroupSummary> {
        let mut summary = GroupSummary {
            name: group.to_string(),
            ..GroupSummary::default()
        };

        for report in reports
            .iter()
            .filter(|report| group == TOTAL || report.project == group)
        {
            summary.patches += 1;
            summary.total_tests += report.total_tests;
            summary.passing_tests += report.passing_tests;
            summary.non_compiling_tests += report.non_compiling_tests;
            summary.assertion_failing_tests += report.assertion_failing_tests;
            summary.crashing_tests += report.crashing_tests;
            summary.af_score_count += report.af_score_count;
            summary.af_score_sum += report.af_score_sum;
            summary.af_score_over_count += report.af_score_over_count;
            summary.af_score_over_sum += report.af_score_over_sum;
            summary.crash_score_count += report.crash_score_count;
            summary.crash_score_over_count += report.crash_score_over_count;
        }

        (summary.patches > 0).then_some(summary)
    }

    pub fn passing_ratio(&self) -> f64 {
        percent(self.passing_tests, self.total_tests)
    }

    pub fn non_compiling_ratio(&self) -> f64 {
        percent(self.non_compiling_tests, self.total_tests)
    }

    pub fn assertion_failing_ratio(&self) -> f64 {
        percent(self.assertion_failing_tests, self.total_tests)
    }

    pub fn crashing_ratio(&self) -> f64 {
        percent(self.crashing_tests, self.total_tests)
    }

    /// Weighted by score rows, not an average of per-patch means.
    pub fn af_score_mean(&self) -> Option<f64> {
        (self.af_score_count > 0).then(|| self.af_score_sum / self.af_score_count as f64)
    }

    pub fn af_score_over_mean(&self) -> Option<f64> {
        (self.af_score_over_count > 0).then(|| self.af_score_over_sum / self.af_score_over_count as f64)
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out)?;
        writeln!(out, "=== {} ===", self.name)?;
        writeln!(out, " #patches           : {}", self.patches)?;
        writeln!(out, " total tests        : {}", self.total_tests)?;
        writeln!(out, " passing            : {} ({:.2}%)", self.passing_tests, self.passing_ratio())?;
        writeln!(out, " non-compiling      : {} ({:.2}%)", self.non_compiling_tests, self.non_compiling_ratio())?;
        writeln!(out, " assertion-failing  : {} ({:.2}%)", self.assertion_failing_tests, self.assertion_failing_ratio())?;
        writeln!(out, " crashing           : {} ({:.2}%)", self.crashing_tests, self.crashing_ratio())?;

        match self.af_score_mean() {
            Some(mean) => writeln!(out, " assertion-failing score mean (all): {:.4}", mean)?,
            None => writeln!(out, " assertion-failing score mean (all): N/A")?,
        }
        match self.af_score_over_mean() {
            Some(mean) => writeln!(out, " assertion-failing score mean (>= {:.2}): {:.4}", THRESHOLD, mean)?,
            None => writeln!(out, " assertion-failing score mean (>= {:.2}): N/A", THRESHOLD)?,
        }

        if self.af_score_count > 0 {
            writeln!(
                out,
                " assertion-failing score >= {:.2}: {}/{} ({:.2}%)",
                THRESHOLD,
                self.af_score_over_count,
                self.af_score_count,
                percent(self.af_score_over_count, self.af_score_count)
            )?;
        } else {
            writeln!(out, " assertion-failing score >= {:.2}: N/A", THRESHOLD)?;
        }

        if self.crash_score_count > 0 {
            writeln!(
                out,
                " crashing score >= {:.2}: {}/{} ({:.2}%)",
                THRESHOLD,
                self.crash_score_over_count,
                self.crash_score_count,
                percent(self.crash_score_over_count, self.crash_score_count)
            )?;
        } else {
            writeln!(out, " crashing score >= {:.2}: N/A", THRESHOLD)?;
        }
        Ok(())
    }
}

/// Per-patch blocks, then per-project and overall summaries, then the missing reports.
pub fn write_report<W: Write>(collection: &Collection, out: &mut W) -> io::Result<()> {
    for report in collection.reports.iter().filter(|report| report.total_tests > 0) {
        report.write_to(out)?;
    }

    writeln!(out, "\n\n[Project-level summary]")?;
    for group in PROJECTS.iter().copied().chain(std::iter::once(TOTAL)) {
        if let Some(summary) = GroupSummary::of(&collection.reports, group) {
            summary.write_to(out)?;
        }
    }

    if collection.missing.is_empty() {
        writeln!(out, "\n[INFO] All analyzed incorrect patches had report.csv.")?;
    } else {
        writeln!(
            out,
            "\n[WARN] report.csv not found for the following patches (excluded from detailed test stats):"
        )?;
        writeln!(out, "  {}", collection.missing.join(" "))?;
    }
    Ok(())
}

#[cfg(test)]
use crate::{
    dataset::SubjectRow,
    report::{FailingScores, TestCounts},
};

#[cfg(test)]
fn patch(id: &str, project: &str, counts: TestCounts, af_scores: &[f64]) -> PatchReport {
    let subject = SubjectRow {
        id: id.to_string(),
        project: project.to_string(),
        correctness: "Incorrect".to_string(),
        ..SubjectRow::default()
    };
    let mut scores = FailingScores::default();
    for score in af_scores {
        scores.push("test-with-assertion", *score);
    }
    PatchReport::empty(&subject).with_counts(counts).with_scores(&scores)
}

#[cfg(test)]
fn counts(total: u64, passing: u64) -> TestCounts {
    TestCounts {
        total,
        passing,
        ..TestCounts::default()
    }
}

#[test]
fn group_mean_weights_by_count() {
    let reports = vec![
        patch("Patch1", "Chart", counts(4, 1), &[3.0]),
        patch("Patch2", "Chart", counts(4, 1), &[0.5, 0.5, 1.0]),
    ];
    let summary = GroupSummary::of(&reports, "Chart").unwrap();

    assert_eq!(summary.af_score_count, 4);
    assert!((summary.af_score_mean().unwrap() - 1.25).abs() < 1e-9);
}

#[test]
fn groups_filter_by_project() {
    let reports = vec![
        patch("Patch1", "Chart", counts(10, 5), &[]),
        patch("Patch2", "Lang", counts(30, 3), &[]),
    ];

    let chart = GroupSummary::of(&reports, "Chart").unwrap();
    assert_eq!(chart.patches, 1);
    assert!((chart.passing_ratio() - 50.0).abs() < 1e-9);

    let total = GroupSummary::of(&reports, TOTAL).unwrap();
    assert_eq!(total.patches, 2);
    assert_eq!(total.total_tests, 40);
    assert_eq!(total.passing_tests, 8);

    assert!(GroupSummary::of(&reports, "Time").is_none());
}

#[test]
fn empty_group_totals_do_not_divide_by_zero() {
    let reports = vec![patch("Patch1", "Math", TestCounts::default(), &[])];
    let summary = GroupSummary::of(&reports, "Math").unwrap();

    assert_eq!(summary.passing_ratio(), 0.0);
    assert_eq!(summary.crashing_ratio(), 0.0);
    assert_eq!(summary.af_score_mean(), None);

    let mut out = Vec::new();
    summary.write_to(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains(" assertion-failing score mean (all): N/A\n"));
    assert!(text.contains(" crashing score >= 0.40: N/A\n"));
}

#[test]
fn report_lists_missing_patches() {
    let collection = Collection {
        reports: vec![
            patch("Patch1", "Chart", counts(10, 6), &[0.5, 0.3]),
            patch("Patch4", "Time", TestCounts::default(), &[]),
        ],
        missing: vec!["Patch4".to_string()],
    };

    let mut out = Vec::new();
    write_report(&collection, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert!(text.contains("[Patch] Patch1"));
    // nothing to show for a patch without tests
    assert!(!text.contains("[Patch] Patch4"));
    assert!(text.contains("=== Chart ==="));
    assert!(text.contains("=== Time ==="));
    assert!(!text.contains("=== Lang ==="));
    assert!(text.contains(" assertion-failing score >= 0.40: 1/2 (50.00%)\n"));
    assert!(text.ends_with(
        "\n[WARN] report.csv not found for the following patches (excluded from detailed test stats):\n  Patch4\n"
    ));

    let chart = text.find("=== Chart ===").unwrap();
    let total = text.find("=== TOTAL ===").unwrap();
    assert!(chart < total);
}

#[test]
fn report_without_missing_patches() {
    let collection = Collection {
        reports: vec![patch("Patch1", "Lang", counts(1, 1), &[])],
        missing: Vec::new(),
    };

    let mut out = Vec::new();
    write_report(&collection, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.ends_with("\n[INFO] All analyzed incorrect patches had report.csv.\n"));
}
