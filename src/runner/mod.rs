//! The step pipeline: upload, start, poll, judge, download and export.

use crate::api::model::ListStepsResponse;
use crate::api::{self, TestingApiClient};
use crate::config::Config;
use crate::export::{export_flaky_test_cases, export_test_results_dir, OutputExporter};
use crate::report::collect_flaky_test_cases;
use crate::results::render::results_table;
use crate::results::{evaluate, RetryPolicy, RunVerdict, Step};
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Outcome of a full run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub verdict: RunVerdict,
    pub steps: Vec<Step>,
    pub downloaded_dir: Option<PathBuf>,
}

impl RunReport {
    pub fn success(&self) -> bool {
        self.verdict.success
    }
}

fn section(title: &str) {
    println!("\n{} {}", "▶".green().bold(), title.bold());
}

/// Run the whole pipeline against the testing service.
pub async fn run(config: &Config, exporter: &dyn OutputExporter, stop: Arc<AtomicBool>) -> Result<RunReport> {
    let client = TestingApiClient::new(config.api.clone())?;

    section("Uploading test assets");
    let uploaded = api::upload_test_assets(&client, config)
        .await
        .context("Failed to upload test assets")?;
    println!("{} Test assets uploaded", "✓".green());

    section("Starting test");
    let matrix = api::build_matrix(config, &uploaded)?;
    api::start_test_run(&client, &matrix).await?;
    println!("{} Test started", "✓".green());

    section("Waiting for test results");
    let api_steps = api::wait_for_completion(&client, config.poll_interval, stop).await?;
    println!("{} Test finished", "✓".green());

    let steps: Vec<Step> = api_steps.into_iter().map(Step::from).collect();
    let verdict = judge(&steps, &config.retry_policy);

    let downloaded_dir = if config.download_test_results {
        section("Downloading test assets");
        let dir = api::create_download_dir()?;
        api::download_test_assets(&client, &dir)
            .await
            .context("Failed to download test assets")?;
        println!("{} Assets downloaded", "✓".green());
        export_downloads(exporter, &dir).await;
        Some(dir)
    } else {
        None
    };

    Ok(RunReport {
        verdict: verdict?,
        steps,
        downloaded_dir,
    })
}

/// Print the results table, then decide the run under `policy`.
///
/// The table is printed before judging so per-device outcomes are visible
/// even when the decision itself fails.
pub fn judge(steps: &[Step], policy: &RetryPolicy) -> Result<RunVerdict> {
    println!("\n{}", "Test results:".blue().bold());
    print!("{}", results_table(steps));

    let empty_dimensions = steps.iter().filter(|step| step.dimension.is_empty()).count();
    if empty_dimensions > 0 {
        log::warn!(
            "{} step(s) have no device dimension; they are judged as a single device",
            empty_dimensions
        );
    }

    let verdict = evaluate(steps, policy)?;

    for key in &verdict.recovered_dimensions {
        log::info!("Passed after retry on {}", key);
    }
    for key in &verdict.failing_dimensions {
        log::error!("Failed on {}", key);
    }
    Ok(verdict)
}

async fn export_downloads(exporter: &dyn OutputExporter, dir: &Path) {
    if let Err(err) = export_test_results_dir(exporter, dir).await {
        log::warn!("Failed to export environment ({}): {:#}", crate::export::DOWNLOADED_FILES_DIR_KEY, err);
    }

    let flaky = collect_flaky_test_cases(dir);
    if let Err(err) = export_flaky_test_cases(exporter, &flaky).await {
        log::warn!("{:#}", err);
    }
}

/// Judge a saved step-list response without talking to the service.
pub fn evaluate_saved_steps(path: &Path, policy: &RetryPolicy) -> Result<RunVerdict> {
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let response: ListStepsResponse = serde_json::from_str(&body)
        .with_context(|| format!("Failed to parse step list ({})", path.display()))?;

    let steps: Vec<Step> = response.steps.into_iter().map(Step::from).collect();
    judge(&steps, policy)
}
