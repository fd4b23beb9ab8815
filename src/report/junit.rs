use anyhow::{Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestCase {
    pub class_name: String,
    pub name: String,
    /// A `<failure>` or `<error>` child was present.
    pub failed: bool,
}

impl TestCase {
    /// Identity of a case within its suite.
    pub fn id(&self) -> String {
        format!("{}.{}", self.class_name, self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestSuite {
    pub name: String,
    pub cases: Vec<TestCase>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestReport {
    pub suites: Vec<TestSuite>,
}

fn attribute(element: &BytesStart<'_>, key: &[u8]) -> Result<String> {
    for attr in element.attributes() {
        let attr = attr.context("Malformed attribute")?;
        if attr.key.as_ref() == key {
            return Ok(attr.unescape_value().context("Malformed attribute value")?.into_owned());
        }
    }
    Ok(String::new())
}

fn test_case(element: &BytesStart<'_>) -> Result<TestCase> {
    Ok(TestCase {
        class_name: attribute(element, b"classname")?,
        name: attribute(element, b"name")?,
        failed: false,
    })
}

/// Parse a JUnit XML document. Nested suites are flattened; test cases
/// outside of any suite land in an unnamed suite.
pub fn parse_junit_xml(xml: &str) -> Result<TestReport> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut report = TestReport::default();
    let mut open_suites: Vec<TestSuite> = Vec::new();
    let mut loose = TestSuite::default();
    let mut current: Option<TestCase> = None;

    loop {
        let event = reader
            .read_event()
            .with_context(|| format!("Invalid XML at position {}", reader.buffer_position()))?;

        match event {
            Event::Start(e) => match e.name().as_ref() {
                b"testsuite" => open_suites.push(TestSuite {
                    name: attribute(&e, b"name")?,
                    cases: Vec::new(),
                }),
                b"testcase" => current = Some(test_case(&e)?),
                b"failure" | b"error" => {
                    if let Some(case) = current.as_mut() {
                        case.failed = true;
                    }
                }
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"testsuite" => report.suites.push(TestSuite {
                    name: attribute(&e, b"name")?,
                    cases: Vec::new(),
                }),
                b"testcase" => {
                    let case = test_case(&e)?;
                    open_suites.last_mut().unwrap_or(&mut loose).cases.push(case);
                }
                b"failure" | b"error" => {
                    if let Some(case) = current.as_mut() {
                        case.failed = true;
                    }
                }
                _ => {}
            },
            Event::End(e) => match e.name().as_ref() {
                b"testcase" => {
                    if let Some(case) = current.take() {
                        open_suites.last_mut().unwrap_or(&mut loose).cases.push(case);
                    }
                }
                b"testsuite" => {
                    if let Some(suite) = open_suites.pop() {
                        report.suites.push(suite);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if !loose.cases.is_empty() {
        report.suites.push(loose);
    }
    Ok(report)
}

pub fn read_junit_file(path: &Path) -> Result<TestReport> {
    let xml = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read test report ({})", path.display()))?;
    parse_junit_xml(&xml).with_context(|| format!("Failed to parse test report ({})", path.display()))
}
