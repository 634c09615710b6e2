//! Scrapes the root cause and first modified source of a bug out of the
//! Defects4J `<project>_bug_info.txt` dumps.
//!
//! The anchors `Summary for Bug:`, `Root cause` and `List of modified sources:`
//! are the format contract with those files.

use std::{fs, path::Path};

use regex::Regex;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BugMetadata {
    pub root_cause: String,
    pub error_location: String,
}

pub fn bug_info_file(bug_info_dir: &Path, project: &str) -> std::path::PathBuf {
    bug_info_dir.join(format!("{}_bug_info.txt", project.to_lowercase()))
}

/// Reads the project's bug-info file. Anything missing yields empty fields.
pub fn extract_bug_metadata(bug_info_dir: &Path, project: &str, bug: &str) -> BugMetadata {
    match fs::read_to_string(bug_info_file(bug_info_dir, project)) {
        Ok(text) => parse_bug_metadata(&text, project, bug),
        Err(_) => BugMetadata::default(),
    }
}

pub fn parse_bug_metadata(text: &str, project: &str, bug: &str) -> BugMetadata {
    let mut metadata = BugMetadata::default();

    // \b keeps Chart-1 from matching the section of Chart-10.
    let section_pattern = format!(
        r"Summary for Bug: {}-{}\b[\s\S]*?List of modified sources:",
        regex::escape(project),
        regex::escape(bug)
    );
    let Ok(section_re) = Regex::new(&section_pattern) else {
        return metadata;
    };
    let Some(section) = section_re.find(text) else {
        return metadata;
    };
    let section = section.as_str();

    if let Ok(root_cause_re) = Regex::new(r"Root cause.*?:([\s\S]*?)List of modified sources") {
        if let Some(captures) = root_cause_re.captures(section) {
            metadata.root_cause = captures[1].trim().replace('\n', " ");
        }
    }

    if let Ok(location_re) = Regex::new(r"- ([\w./]+)") {
        if let Some(captures) = location_re.captures(section) {
            metadata.error_location = captures[1].trim().to_string();
        }
    }

    metadata
}

#[cfg(test)]
const CHART_INFO: &str = "\
Summary for Bug: Chart-1
--------------------------------------------------------------------------------
Revision ID (fixed version):
2266
--------------------------------------------------------------------------------
Root cause in triggering tests:
 - org.jfree.chart.renderer.category.junit.AbstractCategoryItemRendererTests::test2947660
   --> junit.framework.AssertionFailedError: expected:<1> but was:<0>
--------------------------------------------------------------------------------
List of modified sources:
 - org.jfree.chart.renderer.category.AbstractCategoryItemRenderer
--------------------------------------------------------------------------------

Summary for Bug: Chart-10
--------------------------------------------------------------------------------
Root cause in triggering tests:
 - org.jfree.chart.imagemap.junit.StandardToolTipTagFragmentGeneratorTests::testGenerateURLFragment
--------------------------------------------------------------------------------
List of modified sources:
 - org.jfree.chart.imagemap.StandardToolTipTagFragmentGenerator
--------------------------------------------------------------------------------
";

#[test]
fn extracts_root_cause_and_location() {
    let metadata = parse_bug_metadata(CHART_INFO, "Chart", "1");

    assert!(metadata
        .root_cause
        .starts_with("- org.jfree.chart.renderer.category.junit.AbstractCategoryItemRendererTests::test2947660"));
    assert!(metadata
        .root_cause
        .contains("AssertionFailedError: expected:<1> but was:<0>"));
    assert!(!metadata.root_cause.contains('\n'));
    assert!(metadata.root_cause.ends_with("-----"));
    // The first "- name" in the section is the first listed triggering test.
    assert_eq!(
        metadata.error_location,
        "org.jfree.chart.renderer.category.junit.AbstractCategoryItemRendererTests"
    );
}

#[test]
fn bug_id_is_not_a_prefix_match() {
    let metadata = parse_bug_metadata(CHART_INFO, "Chart", "10");
    assert!(metadata.root_cause.contains("testGenerateURLFragment"));

    let text = CHART_INFO.replace("Summary for Bug: Chart-1\n", "Summary for Bug: Chart-7\n");
    assert_eq!(parse_bug_metadata(&text, "Chart", "1"), BugMetadata::default());
}

#[test]
fn missing_section_yields_empty() {
    assert_eq!(parse_bug_metadata(CHART_INFO, "Lang", "1"), BugMetadata::default());
    assert_eq!(parse_bug_metadata("", "Chart", "1"), BugMetadata::default());
}

#[test]
fn section_without_root_cause_or_location() {
    let text = "Summary for Bug: Time-4\nnothing useful here\nList of modified sources:\n";
    assert_eq!(parse_bug_metadata(text, "Time", "4"), BugMetadata::default());
}

#[test]
fn missing_file_yields_empty() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(
        extract_bug_metadata(dir.path(), "Chart", "1"),
        BugMetadata::default()
    );
}

#[test]
fn reads_lowercased_project_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("chart_bug_info.txt"), CHART_INFO).unwrap();

    let metadata = extract_bug_metadata(dir.path(), "Chart", "10");
    assert_eq!(
        metadata.error_location,
        "org.jfree.chart.imagemap.junit.StandardToolTipTagFragmentGeneratorTests"
    );
}
