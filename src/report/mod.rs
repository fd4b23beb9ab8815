//! Post-processing of downloaded result files.

pub mod flaky;
pub mod junit;

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub use flaky::{flaky_case_names, flaky_message, flaky_suites, FlakyMessage};
pub use junit::{parse_junit_xml, read_junit_file, TestCase, TestReport, TestSuite};

/// Every `*.xml` file below `dir`, in path order.
pub fn find_xml_reports(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .map_or(false, |ext| ext.eq_ignore_ascii_case("xml"))
        })
        .collect();
    files.sort();
    files
}

/// Flaky test-case names across all JUnit reports below `dir`. Files that
/// cannot be read or parsed are skipped with a warning.
pub fn collect_flaky_test_cases(dir: &Path) -> Vec<String> {
    let mut suites = Vec::new();
    for path in find_xml_reports(dir) {
        match read_junit_file(&path) {
            Ok(report) => suites.extend(flaky_suites(&report)),
            Err(err) => log::warn!("Skipping test report: {:#}", err),
        }
    }
    flaky_case_names(&suites)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_collects_across_report_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("Pixel2-28")).unwrap();
        fs::write(
            dir.path().join("Pixel2-28").join("test_result_1.xml"),
            r#"<testsuites><testsuite name="Pixel2">
                <testcase classname="LoginTest" name="valid"><failure/></testcase>
                <testcase classname="LoginTest" name="valid"/>
            </testsuite></testsuites>"#,
        )
        .unwrap();
        fs::write(dir.path().join("broken.xml"), "<testsuite>").unwrap();
        fs::write(dir.path().join("logcat"), "not xml").unwrap();

        assert_eq!(
            find_xml_reports(dir.path()),
            vec![
                dir.path().join("Pixel2-28").join("test_result_1.xml"),
                dir.path().join("broken.xml"),
            ]
        );
        assert_eq!(collect_flaky_test_cases(dir.path()), vec!["Pixel2.LoginTest.valid".to_string()]);
    }

    #[test]
    fn test_no_reports() {
        let dir = tempfile::tempdir().unwrap();
        assert!(collect_flaky_test_cases(dir.path()).is_empty());
    }
}
