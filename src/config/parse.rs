//! Parsers for the multi-line and comma-separated step inputs.

use super::ConfigError;
use crate::api::model::{AndroidDevice, EnvironmentVariable, RoboDirective};
use regex::Regex;
use std::path::{Path, PathBuf};

/// Accepted forms: `900`, `900s`, `90.5`, `90.5s` (at most nine decimals).
const TIMEOUT_PATTERN: &str = r"^\d+s?$|^\d+\.\d{1,9}s?$";
pub const MAX_TEST_TIMEOUT_SECS: f64 = 3600.0;

fn non_blank_lines(input: &str) -> impl Iterator<Item = &str> {
    input.lines().map(str::trim).filter(|line| !line.is_empty())
}

/// One device per line: `model,version,locale,orientation`.
pub fn device_list(input: &str) -> Result<Vec<AndroidDevice>, ConfigError> {
    non_blank_lines(input)
        .map(|line| {
            let params: Vec<&str> = line.split(',').collect();
            match params.as_slice() {
                [model, version, locale, orientation] => Ok(AndroidDevice {
                    android_model_id: model.to_string(),
                    android_version_id: version.to_string(),
                    locale: locale.to_string(),
                    orientation: orientation.to_string(),
                }),
                _ => Err(ConfigError::invalid(
                    "TestDevices",
                    format!("invalid test device configuration: {}", line),
                )),
            }
        })
        .collect()
}

/// Newline separated OBB files; each one has to exist.
pub fn obb_files(input: &str) -> Result<Vec<PathBuf>, ConfigError> {
    non_blank_lines(input)
        .map(|line| existing_file("ObbFiles", Path::new(line)))
        .collect()
}

pub fn directories_to_pull(input: &str) -> Vec<String> {
    non_blank_lines(input).map(str::to_string).collect()
}

/// `KEY=VALUE` per line. Lines without `=` are ignored and the value keeps
/// any further `=` characters.
pub fn environment_variables(input: &str) -> Vec<EnvironmentVariable> {
    input
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| EnvironmentVariable {
            key: key.to_string(),
            value: value.to_string(),
        })
        .collect()
}

/// `resource,input,action` per line.
pub fn robo_directives(input: &str) -> Result<Vec<RoboDirective>, ConfigError> {
    non_blank_lines(input)
        .map(|line| {
            let params: Vec<&str> = line.split(',').collect();
            match params.as_slice() {
                [resource, text, action] => Ok(RoboDirective {
                    resource_name: resource.to_string(),
                    input_text: text.to_string(),
                    action_type: action.to_string(),
                }),
                _ => Err(ConfigError::invalid(
                    "RoboDirectives",
                    format!("invalid directive configuration: {}", line),
                )),
            }
        })
        .collect()
}

/// Comma-separated list with surrounding whitespace removed. Empty input
/// yields an empty list.
pub fn comma_list(input: &str) -> Vec<String> {
    let input = input.trim();
    if input.is_empty() {
        return Vec::new();
    }
    input.split(',').map(|item| item.trim().to_string()).collect()
}

pub fn loop_scenarios(input: &str) -> Result<Vec<i64>, ConfigError> {
    comma_list(input)
        .iter()
        .map(|scenario| integer("LoopScenarios", scenario))
        .collect()
}

pub fn integer(input_name: &'static str, value: &str) -> Result<i64, ConfigError> {
    value.trim().parse().map_err(|_| {
        ConfigError::invalid(
            input_name,
            format!("failed to parse string({}) to integer", value),
        )
    })
}

pub fn optional_integer(input_name: &'static str, value: &str) -> Result<Option<i64>, ConfigError> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    integer(input_name, value).map(Some)
}

/// Test timeout in seconds, `0 < t <= 3600`.
pub fn test_timeout(value: &str) -> Result<f64, ConfigError> {
    let value = value.trim();
    let pattern = Regex::new(TIMEOUT_PATTERN)
        .map_err(|e| ConfigError::invalid("TestTimeout", e.to_string()))?;
    if !pattern.is_match(value) {
        return Err(ConfigError::invalid(
            "TestTimeout",
            format!("invalid timeout value ({}), expected seconds", value),
        ));
    }

    let seconds: f64 = value
        .trim_end_matches('s')
        .parse()
        .map_err(|_| ConfigError::invalid("TestTimeout", format!("invalid number: {}", value)))?;
    if seconds <= 0.0 || seconds > MAX_TEST_TIMEOUT_SECS {
        return Err(ConfigError::invalid(
            "TestTimeout",
            format!("{} is out of range ]0..{}]", seconds, MAX_TEST_TIMEOUT_SECS),
        ));
    }
    Ok(seconds)
}

pub fn existing_file(input_name: &'static str, path: &Path) -> Result<PathBuf, ConfigError> {
    std::fs::metadata(path).map_err(|source| ConfigError::FileNotFound {
        input: input_name,
        path: path.to_path_buf(),
        source,
    })?;
    Ok(path.to_path_buf())
}
