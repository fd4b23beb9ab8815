pub mod parse;

use crate::api::model::{AndroidDevice, EnvironmentVariable, RoboDirective};
use crate::results::{RetryPolicy, MAX_FLAKY_TEST_ATTEMPTS};
use clap::{ArgAction, Args};
use colored::Colorize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}: required variable is not present")]
    Missing(&'static str),

    #[error("{input}: {reason}")]
    Invalid { input: &'static str, reason: String },

    #[error("{input}: failed to get file info for ({}), error: {source}", path.display())]
    FileNotFound {
        input: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ConfigError {
    pub fn invalid(input: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            input,
            reason: reason.into(),
        }
    }
}

/// Raw step inputs, read from flags or the environment.
#[derive(Debug, Clone, Default, Args)]
pub struct StepInputs {
    /// Base URL of the device-testing API
    #[arg(long, env = "api_base_url", default_value = "")]
    pub api_base_url: String,

    /// Build slug of the CI build
    #[arg(long, env = "BITRISE_BUILD_SLUG", default_value = "")]
    pub build_slug: String,

    /// App slug of the CI app
    #[arg(long, env = "BITRISE_APP_SLUG", default_value = "")]
    pub app_slug: String,

    /// API token for the device-testing API
    #[arg(long, env = "api_token", default_value = "", hide_env_values = true)]
    pub api_token: String,

    /// Path of the APK or AAB under test
    #[arg(long, env = "app_path", default_value = "")]
    pub app_path: String,

    /// Deprecated, use --app-path
    #[arg(long, env = "apk_path", default_value = "", hide = true)]
    pub apk_path: String,

    /// Path of the instrumentation test APK
    #[arg(long, env = "test_apk_path", default_value = "")]
    pub test_apk_path: String,

    /// Test type (instrumentation, robo, gameloop)
    #[arg(long, env = "test_type", default_value = "robo")]
    pub test_type: String,

    /// Devices, one per line: model,version,locale,orientation
    #[arg(long, env = "test_devices", default_value = "NexusLowRes,24,en,portrait")]
    pub test_devices: String,

    /// Package ID of the app (deprecated, read from the manifest)
    #[arg(long, env = "app_package_id", default_value = "")]
    pub app_package_id: String,

    /// Sign in to a Google test account before the test starts
    #[arg(long, env = "auto_google_login", default_value_t = false, action = ArgAction::Set)]
    pub auto_google_login: bool,

    /// Environment variables for the test run, one KEY=VALUE per line
    #[arg(long, env = "environment_variables", default_value = "")]
    pub environment_variables: String,

    /// OBB files to push to the device, one path per line
    #[arg(long, env = "obb_files_list", default_value = "")]
    pub obb_files_list: String,

    /// Maximum test duration in seconds
    #[arg(long, env = "test_timeout", default_value = "900")]
    pub test_timeout: String,

    /// Number of reattempts for failed (flaky) test executions, 0-10
    #[arg(long, env = "num_flaky_test_attempts", default_value_t = 0)]
    pub num_flaky_test_attempts: u32,

    /// Download result assets after the run
    #[arg(long, env = "download_test_results", default_value_t = false, action = ArgAction::Set)]
    pub download_test_results: bool,

    /// Device directories to pull after the run, one per line
    #[arg(long, env = "directories_to_pull", default_value = "")]
    pub directories_to_pull: String,

    /// Enable debug logging
    #[arg(long, env = "use_verbose_log", default_value_t = false, action = ArgAction::Set)]
    pub verbose: bool,

    /// Instrumentation: test package ID (deprecated, read from the manifest)
    #[arg(long, env = "inst_test_package_id", default_value = "")]
    pub inst_test_package_id: String,

    /// Instrumentation: runner class
    #[arg(long, env = "inst_test_runner_class", default_value = "")]
    pub inst_test_runner_class: String,

    /// Instrumentation: comma-separated test targets
    #[arg(long, env = "inst_test_targets", default_value = "")]
    pub inst_test_targets: String,

    /// Instrumentation: run each test in its own instrumentation invocation
    #[arg(long, env = "inst_use_orchestrator", default_value_t = false, action = ArgAction::Set)]
    pub inst_use_orchestrator: bool,

    /// Instrumentation: number of uniform shards (0 disables sharding)
    #[arg(long, env = "num_uniform_shards", default_value = "0")]
    pub num_uniform_shards: String,

    /// Robo: initial activity
    #[arg(long, env = "robo_initial_activity", default_value = "")]
    pub robo_initial_activity: String,

    /// Robo: directives, one resource,input,action per line
    #[arg(long, env = "robo_directives", default_value = "")]
    pub robo_directives: String,

    /// Robo: scenario file
    #[arg(long, env = "robo_scenario_file", default_value = "")]
    pub robo_scenario_file: String,

    /// Robo: maximum crawl depth
    #[arg(long, env = "robo_max_depth", default_value = "")]
    pub robo_max_depth: String,

    /// Robo: maximum crawl steps
    #[arg(long, env = "robo_max_steps", default_value = "")]
    pub robo_max_steps: String,

    /// Game loop: comma-separated scenario numbers
    #[arg(long, env = "loop_scenarios", default_value = "")]
    pub loop_scenarios: String,

    /// Game loop: comma-separated scenario labels
    #[arg(long, env = "loop_scenario_labels", default_value = "")]
    pub loop_scenario_labels: String,

    /// Game loop: scenario numbers (informational)
    #[arg(long, env = "loop_scenario_numbers", default_value = "")]
    pub loop_scenario_numbers: String,

    /// Seconds between status polls
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestType {
    Instrumentation,
    Robo,
    GameLoop,
}

impl TestType {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim() {
            "instrumentation" => Ok(TestType::Instrumentation),
            "robo" => Ok(TestType::Robo),
            "gameloop" => Ok(TestType::GameLoop),
            other => Err(ConfigError::invalid(
                "TestType",
                format!("unknown test type ({}), expected instrumentation, robo or gameloop", other),
            )),
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TestType::Instrumentation => "instrumentation",
            TestType::Robo => "robo",
            TestType::GameLoop => "gameloop",
        })
    }
}

/// Endpoint and credentials of the testing API.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub app_slug: String,
    pub build_slug: String,
    pub token: String,
}

#[derive(Debug, Clone, Default)]
pub struct InstrumentationOptions {
    pub test_apk_path: PathBuf,
    pub test_package_id: Option<String>,
    pub runner_class: Option<String>,
    pub targets: Vec<String>,
    pub use_orchestrator: bool,
    pub uniform_shards: u32,
}

#[derive(Debug, Clone, Default)]
pub struct RoboOptions {
    pub initial_activity: Option<String>,
    pub directives: Vec<RoboDirective>,
    pub scenario_file: Option<PathBuf>,
    pub max_depth: Option<i64>,
    pub max_steps: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct GameLoopOptions {
    pub scenarios: Vec<i64>,
    pub labels: Vec<String>,
    pub scenario_numbers: String,
}

/// Test-type specific settings; exactly one kind per run.
#[derive(Debug, Clone)]
pub enum TestKind {
    Instrumentation(InstrumentationOptions),
    Robo(RoboOptions),
    GameLoop(GameLoopOptions),
}

impl TestKind {
    pub fn test_type(&self) -> TestType {
        match self {
            TestKind::Instrumentation(_) => TestType::Instrumentation,
            TestKind::Robo(_) => TestType::Robo,
            TestKind::GameLoop(_) => TestType::GameLoop,
        }
    }
}

/// Validated configuration for one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiSettings,
    pub app_path: PathBuf,
    pub app_package_id: Option<String>,
    pub kind: TestKind,
    pub devices: Vec<AndroidDevice>,
    pub auto_google_login: bool,
    pub environment_variables: Vec<EnvironmentVariable>,
    pub obb_files: Vec<PathBuf>,
    pub test_timeout_secs: f64,
    pub retry_policy: RetryPolicy,
    pub download_test_results: bool,
    pub directories_to_pull: Vec<String>,
    pub verbose: bool,
    pub poll_interval: Duration,
}

fn required(input: &'static str, value: &str) -> Result<String, ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::Missing(input));
    }
    Ok(value.to_string())
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl Config {
    /// Validate raw inputs, apply deprecations and parse list inputs.
    pub fn from_inputs(inputs: &StepInputs) -> Result<Self, ConfigError> {
        let base_url = inputs.api_base_url.trim();
        if base_url.is_empty() {
            if std::env::var_os("BITRISE_IO").is_none() {
                log::warn!(
                    "Please make sure that the Virtual Device Testing add-on is turned on under your app's settings tab."
                );
            }
            return Err(ConfigError::Missing("APIBaseURL"));
        }
        let api = ApiSettings {
            base_url: base_url.trim_end_matches('/').to_string(),
            app_slug: required("AppSlug", &inputs.app_slug)?,
            build_slug: required("BuildSlug", &inputs.build_slug)?,
            token: required("APIToken", &inputs.api_token)?,
        };

        let mut app_path = inputs.app_path.trim().to_string();
        if let Some(apk_path) = optional(&inputs.apk_path) {
            log::warn!("'Apk path' (apk_path) input is deprecated, use 'App path' (app_path) instead.");
            log::warn!("'Apk path' ({}) is specified, overrides App path ({})", apk_path, app_path);
            app_path = apk_path;
        }
        let app_path = PathBuf::from(required("AppPath", &app_path)?);

        let app_package_id = optional(&inputs.app_package_id);
        if app_package_id.is_some() {
            log::warn!("'App package ID' (app_package_id) input is deprecated. Leave empty to automatically extract it from the App manifest");
        }

        let retry_policy = RetryPolicy::from_flaky_attempts(inputs.num_flaky_test_attempts)
            .ok_or_else(|| {
                ConfigError::invalid(
                    "FlakyTestAttempts",
                    format!(
                        "{} is out of range [0..{}]",
                        inputs.num_flaky_test_attempts, MAX_FLAKY_TEST_ATTEMPTS
                    ),
                )
            })?;

        if inputs.poll_interval_secs == 0 {
            return Err(ConfigError::invalid("PollInterval", "must be at least 1 second"));
        }

        let kind = match TestType::parse(&inputs.test_type)? {
            TestType::Instrumentation => TestKind::Instrumentation(instrumentation_options(inputs)?),
            TestType::Robo => TestKind::Robo(robo_options(inputs)?),
            TestType::GameLoop => TestKind::GameLoop(GameLoopOptions {
                scenarios: parse::loop_scenarios(&inputs.loop_scenarios)?,
                labels: parse::comma_list(&inputs.loop_scenario_labels),
                scenario_numbers: inputs.loop_scenario_numbers.trim().to_string(),
            }),
        };

        Ok(Self {
            api,
            app_path,
            app_package_id,
            kind,
            devices: parse::device_list(&inputs.test_devices)?,
            auto_google_login: inputs.auto_google_login,
            environment_variables: parse::environment_variables(&inputs.environment_variables),
            obb_files: parse::obb_files(&inputs.obb_files_list)?,
            test_timeout_secs: parse::test_timeout(&inputs.test_timeout)?,
            retry_policy,
            download_test_results: inputs.download_test_results,
            directories_to_pull: parse::directories_to_pull(&inputs.directories_to_pull),
            verbose: inputs.verbose,
            poll_interval: Duration::from_secs(inputs.poll_interval_secs),
        })
    }

    /// App bundles are uploaded and referenced differently from APKs.
    pub fn is_bundle(&self) -> bool {
        is_bundle_path(&self.app_path)
    }

    /// Timeout as the API expects it, e.g. `900.000000s`.
    pub fn test_timeout_arg(&self) -> String {
        format!("{:.6}s", self.test_timeout_secs)
    }

    /// Print the configuration summary.
    pub fn print(&self) {
        println!("{}", "Configs:".blue().bold());
        println!("- AppPath: {}", self.app_path.display());
        if let Some(ref id) = self.app_package_id {
            println!("- AppPackageID: {}", id);
        }
        println!("- TestTimeout: {:.6}", self.test_timeout_secs);
        println!("- FlakyTestAttempts: {}", self.retry_policy.max_attempts);
        println!("- DownloadTestResults: {}", self.download_test_results);
        println!("- DirectoriesToPull: {}", self.directories_to_pull.join(", "));
        println!("- AutoGoogleLogin: {}", self.auto_google_login);
        println!(
            "- EnvironmentVariables: {}",
            self.environment_variables
                .iter()
                .map(|env| env.key.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!(
            "- ObbFiles: {}",
            self.obb_files
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!("- TestDevices:\n---");
        print!("{}", device_table(&self.devices));
        println!("---");
        println!("- TestType: {}", self.kind.test_type());

        match &self.kind {
            TestKind::Instrumentation(opts) => {
                println!("- TestApkPath: {}", opts.test_apk_path.display());
                println!("- InstTestPackageID: {}", opts.test_package_id.as_deref().unwrap_or_default());
                println!("- InstTestRunnerClass: {}", opts.runner_class.as_deref().unwrap_or_default());
                println!("- InstTestTargets: {}", opts.targets.join(","));
                println!("- UseOrchestrator: {}", opts.use_orchestrator);
                println!("- NumberOfUniformShards: {}", opts.uniform_shards);
            }
            TestKind::Robo(opts) => {
                println!("- RoboInitialActivity: {}", opts.initial_activity.as_deref().unwrap_or_default());
                println!(
                    "- RoboScenarioFile: {}",
                    opts.scenario_file.as_deref().map(Path::display).map(|d| d.to_string()).unwrap_or_default()
                );
                println!("- RoboDirectives: {}", opts.directives.len());
                println!("- RoboMaxDepth: {}", opts.max_depth.map(|d| d.to_string()).unwrap_or_default());
                println!("- RoboMaxSteps: {}", opts.max_steps.map(|s| s.to_string()).unwrap_or_default());
            }
            TestKind::GameLoop(opts) => {
                println!(
                    "- LoopScenarios: {}",
                    opts.scenarios.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(",")
                );
                println!("- LoopScenarioLabels: {}", opts.labels.join(","));
                println!("- LoopScenarioNumbers: {}", opts.scenario_numbers);
            }
        }
    }
}

pub fn is_bundle_path(path: &Path) -> bool {
    path.extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("aab"))
}

fn instrumentation_options(inputs: &StepInputs) -> Result<InstrumentationOptions, ConfigError> {
    const HINT: &str = "Is it possible that you used gradle-runner step and forgot to set `assembleDebugAndroidTest` task?";

    let test_apk_path = optional(&inputs.test_apk_path).ok_or_else(|| {
        ConfigError::invalid("TestApkPath", format!("required variable is not present. {}", HINT))
    })?;
    let test_apk_path = parse::existing_file("TestApkPath", Path::new(&test_apk_path))?;

    let test_package_id = optional(&inputs.inst_test_package_id);
    if test_package_id.is_some() {
        log::warn!("'Test package ID' (inst_test_package_id) input is deprecated. Leave empty to automatically extract it from the App manifest");
    }

    let shards = parse::integer("NumberOfUniformShards", optional(&inputs.num_uniform_shards).as_deref().unwrap_or("0"))?;
    let uniform_shards = u32::try_from(shards)
        .map_err(|_| ConfigError::invalid("NumberOfUniformShards", format!("{} is not a valid shard count", shards)))?;

    Ok(InstrumentationOptions {
        test_apk_path,
        test_package_id,
        runner_class: optional(&inputs.inst_test_runner_class),
        targets: parse::comma_list(&inputs.inst_test_targets),
        use_orchestrator: inputs.inst_use_orchestrator,
        uniform_shards,
    })
}

fn robo_options(inputs: &StepInputs) -> Result<RoboOptions, ConfigError> {
    let scenario_file = match optional(&inputs.robo_scenario_file) {
        Some(path) => Some(parse::existing_file("RoboScenarioFile", Path::new(&path))?),
        None => None,
    };

    Ok(RoboOptions {
        initial_activity: optional(&inputs.robo_initial_activity),
        directives: parse::robo_directives(&inputs.robo_directives)?,
        scenario_file,
        max_depth: parse::optional_integer("RoboMaxDepth", &inputs.robo_max_depth)?,
        max_steps: parse::optional_integer("RoboMaxSteps", &inputs.robo_max_steps)?,
    })
}

fn device_table(devices: &[AndroidDevice]) -> String {
    let rows: Vec<[&str; 4]> = std::iter::once(["Model", "API Level", "Locale", "Orientation"])
        .chain(devices.iter().map(|d| {
            [
                d.android_model_id.as_str(),
                d.android_version_id.as_str(),
                d.locale.as_str(),
                d.orientation.as_str(),
            ]
        }))
        .collect();

    let mut widths = [0usize; 4];
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    for row in rows {
        let line: Vec<String> = row
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect();
        out.push_str(line.join("   ").trim_end());
        out.push('\n');
    }
    out
}

#[cfg(test)]
pub(crate) fn sample_config(app_path: PathBuf, kind: TestKind) -> Config {
    Config {
        api: ApiSettings {
            base_url: String::new(),
            app_slug: "app".into(),
            build_slug: "build".into(),
            token: "token".into(),
        },
        app_path,
        app_package_id: None,
        kind,
        devices: Vec::new(),
        auto_google_login: false,
        environment_variables: Vec::new(),
        obb_files: Vec::new(),
        test_timeout_secs: 900.0,
        retry_policy: RetryPolicy::disabled(),
        download_test_results: false,
        directories_to_pull: Vec::new(),
        verbose: false,
        poll_interval: Duration::from_secs(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn base_inputs() -> StepInputs {
        StepInputs {
            api_base_url: "https://vdt.example.com/".into(),
            build_slug: "build".into(),
            app_slug: "app".into(),
            api_token: "token".into(),
            app_path: "/tmp/app.apk".into(),
            test_type: "robo".into(),
            test_devices: "NexusLowRes,24,en,portrait".into(),
            test_timeout: "900".into(),
            num_uniform_shards: "0".into(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            ..Default::default()
        }
    }

    #[test]
    fn test_robo_defaults() {
        let config = Config::from_inputs(&base_inputs()).unwrap();
        assert_eq!(config.api.base_url, "https://vdt.example.com");
        assert_eq!(config.kind.test_type(), TestType::Robo);
        assert_eq!(config.devices.len(), 1);
        assert!(!config.retry_policy.enabled);
        assert_eq!(config.test_timeout_arg(), "900.000000s");
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert!(!config.is_bundle());
    }

    #[test]
    fn test_missing_api_settings() {
        let mut inputs = base_inputs();
        inputs.api_base_url = "  ".into();
        assert!(matches!(Config::from_inputs(&inputs), Err(ConfigError::Missing("APIBaseURL"))));

        let mut inputs = base_inputs();
        inputs.api_token = String::new();
        assert!(matches!(Config::from_inputs(&inputs), Err(ConfigError::Missing("APIToken"))));
    }

    #[test]
    fn test_deprecated_apk_path_overrides_app_path() {
        let mut inputs = base_inputs();
        inputs.apk_path = "/tmp/legacy.AAB".into();
        let config = Config::from_inputs(&inputs).unwrap();
        assert_eq!(config.app_path, PathBuf::from("/tmp/legacy.AAB"));
        assert!(config.is_bundle());
    }

    #[test]
    fn test_flaky_attempts_range() {
        let mut inputs = base_inputs();
        inputs.num_flaky_test_attempts = 3;
        let config = Config::from_inputs(&inputs).unwrap();
        assert!(config.retry_policy.enabled);
        assert_eq!(config.retry_policy.max_attempts, 3);

        inputs.num_flaky_test_attempts = 11;
        assert!(matches!(
            Config::from_inputs(&inputs),
            Err(ConfigError::Invalid { input: "FlakyTestAttempts", .. })
        ));
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        let mut inputs = base_inputs();
        inputs.poll_interval_secs = 0;
        assert!(matches!(
            Config::from_inputs(&inputs),
            Err(ConfigError::Invalid { input: "PollInterval", .. })
        ));

        inputs.poll_interval_secs = 1;
        assert_eq!(Config::from_inputs(&inputs).unwrap().poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_instrumentation_requires_test_apk() {
        let mut inputs = base_inputs();
        inputs.test_type = "instrumentation".into();
        let err = Config::from_inputs(&inputs).unwrap_err();
        assert!(err.to_string().contains("assembleDebugAndroidTest"));

        let dir = tempfile::tempdir().unwrap();
        let test_apk = dir.path().join("app-debug-androidTest.apk");
        fs::write(&test_apk, b"apk").unwrap();
        inputs.test_apk_path = test_apk.display().to_string();
        inputs.inst_test_targets = "class com.example.A, package com.example.b".into();
        inputs.num_uniform_shards = "4".into();

        let config = Config::from_inputs(&inputs).unwrap();
        match config.kind {
            TestKind::Instrumentation(opts) => {
                assert_eq!(opts.test_apk_path, test_apk);
                assert_eq!(opts.targets, vec!["class com.example.A", "package com.example.b"]);
                assert_eq!(opts.uniform_shards, 4);
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_unknown_test_type() {
        let mut inputs = base_inputs();
        inputs.test_type = "espresso".into();
        assert!(matches!(Config::from_inputs(&inputs), Err(ConfigError::Invalid { input: "TestType", .. })));
    }

    #[test]
    fn test_robo_scenario_file_must_exist() {
        let mut inputs = base_inputs();
        inputs.robo_scenario_file = "/definitely/not/here.json".into();
        assert!(matches!(Config::from_inputs(&inputs), Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_game_loop_options() {
        let mut inputs = base_inputs();
        inputs.test_type = "gameloop".into();
        inputs.loop_scenarios = "1,2".into();
        inputs.loop_scenario_labels = "smoke,nightly".into();
        let config = Config::from_inputs(&inputs).unwrap();
        match config.kind {
            TestKind::GameLoop(opts) => {
                assert_eq!(opts.scenarios, vec![1, 2]);
                assert_eq!(opts.labels, vec!["smoke", "nightly"]);
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_device_table() {
        let devices = parse::device_list("Pixel2,28,en,portrait").unwrap();
        assert_eq!(
            device_table(&devices),
            "Model    API Level   Locale   Orientation\nPixel2   28          en       portrait\n"
        );
    }
}
