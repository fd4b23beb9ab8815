use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use vdtesting::export::EnvmanExporter;
use vdtesting::{runner, Config, RetryPolicy, StepInputs};

#[derive(Parser)]
#[command(name = "vdtesting")]
#[command(version = "0.1.0")]
#[command(about = "Run Android tests on virtual devices and judge the results", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload the app, run the test matrix and wait for the results
    Run(StepInputs),

    /// Judge a saved step list without running anything
    Evaluate {
        /// Path to a saved step-list JSON response
        steps: PathBuf,

        /// Number of reattempts the run was started with, 0-10
        #[arg(long, default_value_t = 0)]
        num_flaky_test_attempts: u32,

        /// Enable debug logging
        #[arg(long, default_value = "false")]
        verbose: bool,
    },
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        println!("\n{} {}", "✓".green().bold(), "All test runs passed".green());
        ExitCode::SUCCESS
    } else {
        println!("\n{} {}", "✗".red().bold(), "Some test runs failed".red());
        ExitCode::FAILURE
    }
}

async fn execute(command: Commands) -> anyhow::Result<bool> {
    match command {
        Commands::Run(inputs) => {
            init_logging(inputs.verbose);

            let config = Config::from_inputs(&inputs).context("Issue with input")?;
            config.print();

            let stop_flag = Arc::new(AtomicBool::new(false));
            let stop_flag_handler = stop_flag.clone();
            ctrlc::set_handler(move || {
                println!("\n{} Stopping...", "⏹".yellow());
                stop_flag_handler.store(true, Ordering::SeqCst);
            })?;

            let report = runner::run(&config, &EnvmanExporter::default(), stop_flag).await?;
            Ok(report.success())
        }
        Commands::Evaluate {
            steps,
            num_flaky_test_attempts,
            verbose,
        } => {
            init_logging(verbose);

            let policy = RetryPolicy::from_flaky_attempts(num_flaky_test_attempts).ok_or_else(|| {
                anyhow::anyhow!("num_flaky_test_attempts: {} is out of range [0..10]", num_flaky_test_attempts)
            })?;
            let verdict = runner::evaluate_saved_steps(&steps, &policy)?;
            Ok(verdict.success)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match execute(cli.command).await {
        Ok(success) => exit_code(success),
        Err(err) => {
            eprintln!("{} {:#}", "Error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}
