//! Exporting step outputs as environment variables for later CI steps.

use crate::report::flaky::{flaky_message, FLAKY_TEST_CASES_KEY, FLAKY_TEST_CASES_SIZE_LIMIT};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use colored::Colorize;
use std::path::Path;

pub const DOWNLOADED_FILES_DIR_KEY: &str = "VDTESTING_DOWNLOADED_FILES_DIR";

#[async_trait]
pub trait OutputExporter: Send + Sync {
    async fn export_output(&self, key: &str, value: &str) -> Result<()>;
}

/// Exports through the `envman` CLI.
#[derive(Debug, Clone)]
pub struct EnvmanExporter {
    program: String,
}

impl Default for EnvmanExporter {
    fn default() -> Self {
        Self {
            program: "envman".to_string(),
        }
    }
}

impl EnvmanExporter {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl OutputExporter for EnvmanExporter {
    async fn export_output(&self, key: &str, value: &str) -> Result<()> {
        let output = tokio::process::Command::new(&self.program)
            .args(["add", "--key", key, "--value", value])
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.program))?;

        if !output.status.success() {
            bail!(
                "{} add --key {} failed: {}",
                self.program,
                key,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}

pub async fn export_test_results_dir(exporter: &dyn OutputExporter, dir: &Path) -> Result<()> {
    let dir = dir.display().to_string();
    exporter.export_output(DOWNLOADED_FILES_DIR_KEY, &dir).await?;
    println!(
        "{} The downloaded test assets path ({}) is exported to the {} environment variable.",
        "✓".green(),
        dir,
        DOWNLOADED_FILES_DIR_KEY
    );
    Ok(())
}

/// Export flaky test-case names. Nothing is exported when there are none.
pub async fn export_flaky_test_cases(exporter: &dyn OutputExporter, names: &[String]) -> Result<()> {
    if names.is_empty() {
        return Ok(());
    }

    println!(
        "{} {} flaky test case(s) detected, exporting {} env var",
        "✓".green(),
        names.len(),
        FLAKY_TEST_CASES_KEY
    );

    let message = flaky_message(names, FLAKY_TEST_CASES_SIZE_LIMIT);
    if message.skipped > 0 {
        log::warn!(
            "{} env var size limit ({} characters) exceeded. Skipping {} test cases.",
            FLAKY_TEST_CASES_KEY,
            FLAKY_TEST_CASES_SIZE_LIMIT,
            message.skipped
        );
    }

    exporter
        .export_output(FLAKY_TEST_CASES_KEY, &message.text)
        .await
        .with_context(|| format!("Failed to export {}", FLAKY_TEST_CASES_KEY))
}
