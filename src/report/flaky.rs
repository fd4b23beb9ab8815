use super::junit::{TestCase, TestReport, TestSuite};
use std::collections::{HashMap, HashSet};

pub const FLAKY_TEST_CASES_KEY: &str = "BITRISE_FLAKY_TEST_CASES";
pub const FLAKY_TEST_CASES_SIZE_LIMIT: usize = 1024;

/// Suites reduced to their flaky cases: a case is flaky when it appears more
/// than once in a suite and a later run's failed state differs from the
/// first one. Each flaky case is reported once; suites without any are
/// dropped.
pub fn flaky_suites(report: &TestReport) -> Vec<TestSuite> {
    report
        .suites
        .iter()
        .filter_map(|suite| {
            let mut first_status: HashMap<String, bool> = HashMap::new();
            let mut reported: HashSet<String> = HashSet::new();
            let mut cases = Vec::new();

            for case in &suite.cases {
                let id = case.id();
                match first_status.get(&id) {
                    None => {
                        first_status.insert(id, case.failed);
                    }
                    Some(&first_failed) => {
                        if first_failed != case.failed && reported.insert(id) {
                            cases.push(TestCase {
                                failed: false,
                                ..case.clone()
                            });
                        }
                    }
                }
            }

            (!cases.is_empty()).then(|| TestSuite {
                name: suite.name.clone(),
                cases,
            })
        })
        .collect()
}

/// Fully qualified `suite.class.name` for each flaky case, de-duplicated.
/// Empty suite or class names are left out.
pub fn flaky_case_names(suites: &[TestSuite]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();

    for suite in suites {
        for case in &suite.cases {
            let mut name = case.name.clone();
            if !case.class_name.is_empty() {
                name = format!("{}.{}", case.class_name, name);
            }
            if !suite.name.is_empty() {
                name = format!("{}.{}", suite.name, name);
            }
            if seen.insert(name.clone()) {
                names.push(name);
            }
        }
    }
    names
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlakyMessage {
    pub text: String,
    /// Cases left out because the size limit was reached.
    pub skipped: usize,
}

/// One `- name` line per case, cut off before the message would exceed
/// `limit` bytes.
pub fn flaky_message(names: &[String], limit: usize) -> FlakyMessage {
    let mut text = String::new();
    for (i, name) in names.iter().enumerate() {
        let line = format!("- {}\n", name);
        if text.len() + line.len() > limit {
            return FlakyMessage {
                text,
                skipped: names.len() - i,
            };
        }
        text.push_str(&line);
    }
    FlakyMessage { text, skipped: 0 }
}
