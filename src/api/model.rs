//! Wire types of the device-testing service.
//!
//! Only the fields the step reads or writes are modelled. Requests use
//! camelCase keys and omit empty optionals.

use crate::results::{
    DeviceDimension, FailureDetail, InconclusiveDetail, SkippedDetail, Step, StepOutcome,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Step state reported once an execution has finished.
pub const STATE_COMPLETE: &str = "complete";

// ---------------------------------------------------------------------------
// Status polling
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListStepsResponse {
    #[serde(default)]
    pub steps: Vec<ApiStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub dimension_value: Vec<DimensionEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ApiOutcome>,
}

impl ApiStep {
    pub fn is_complete(&self) -> bool {
        self.state == STATE_COMPLETE
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DimensionEntry {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
}

/// Protobuf-style timestamp; int64 seconds arrive as JSON strings.
///
/// Values chrono cannot represent are rejected while parsing, so a step
/// never silently loses its completion time.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
#[serde(try_from = "RawTimestamp")]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: u32,
}

#[derive(Deserialize)]
struct RawTimestamp {
    #[serde(default, deserialize_with = "int64_from_string_or_number")]
    seconds: i64,
    #[serde(default)]
    nanos: u32,
}

impl TryFrom<RawTimestamp> for Timestamp {
    type Error = String;

    fn try_from(raw: RawTimestamp) -> Result<Self, Self::Error> {
        if DateTime::from_timestamp(raw.seconds, raw.nanos).is_none() {
            return Err(format!(
                "timestamp out of range (seconds: {}, nanos: {})",
                raw.seconds, raw.nanos
            ));
        }
        Ok(Self {
            seconds: raw.seconds,
            nanos: raw.nanos,
        })
    }
}

impl Timestamp {
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.seconds, self.nanos)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiOutcome {
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_detail: Option<FailureDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inconclusive_detail: Option<InconclusiveDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped_detail: Option<SkippedDetail>,
}

impl From<ApiOutcome> for StepOutcome {
    fn from(outcome: ApiOutcome) -> Self {
        match outcome.summary.as_str() {
            "success" => StepOutcome::Success,
            "failure" => StepOutcome::Failure(outcome.failure_detail.unwrap_or_default()),
            "inconclusive" => {
                StepOutcome::Inconclusive(outcome.inconclusive_detail.unwrap_or_default())
            }
            "skipped" => StepOutcome::Skipped(outcome.skipped_detail.unwrap_or_default()),
            "" => StepOutcome::Unrecognized("unset".to_string()),
            other => StepOutcome::Unrecognized(other.to_string()),
        }
    }
}

impl From<ApiStep> for Step {
    fn from(step: ApiStep) -> Self {
        let dimension: DeviceDimension = step
            .dimension_value
            .into_iter()
            .map(|entry| (entry.key, entry.value))
            .collect();
        let outcome = step
            .outcome
            .map(StepOutcome::from)
            .unwrap_or_else(|| StepOutcome::Unrecognized("unset".to_string()));

        Step::new(
            dimension,
            step.completion_time.and_then(Timestamp::to_datetime),
            outcome,
        )
    }
}

fn int64_from_string_or_number<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Int64 {
        Number(i64),
        Text(String),
    }

    match Int64::deserialize(deserializer)? {
        Int64::Number(n) => Ok(n),
        Int64::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

// ---------------------------------------------------------------------------
// Asset upload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestAsset {
    #[serde(default)]
    pub upload_url: String,
    #[serde(default)]
    pub gcs_path: String,
    #[serde(default)]
    pub filename: String,
}

impl TestAsset {
    pub fn named(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            ..Default::default()
        }
    }
}

/// Both the upload-URL request (file names only) and its response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestAssets {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apk: Option<TestAsset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aab: Option<TestAsset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_apk: Option<TestAsset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub robo_script: Option<TestAsset>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub obb_files: Vec<TestAsset>,
}

// ---------------------------------------------------------------------------
// Test matrix
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestMatrix {
    pub environment_matrix: EnvironmentMatrix,
    pub flaky_test_attempts: u8,
    pub test_specification: TestSpecification,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentMatrix {
    pub android_device_list: AndroidDeviceList,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AndroidDeviceList {
    pub android_devices: Vec<AndroidDevice>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AndroidDevice {
    pub android_model_id: String,
    pub android_version_id: String,
    pub locale: String,
    pub orientation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSpecification {
    pub test_timeout: String,
    pub test_setup: TestSetup,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub android_instrumentation_test: Option<AndroidInstrumentationTest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub android_robo_test: Option<AndroidRoboTest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub android_test_loop: Option<AndroidTestLoop>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSetup {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub environment_variables: Vec<EnvironmentVariable>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files_to_push: Vec<DeviceFile>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub directories_to_pull: Vec<String>,
    /// Absent means no Google account is signed in before the test.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<Account>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnvironmentVariable {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceFile {
    pub obb_file: ObbFile,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObbFile {
    pub obb: FileReference,
    pub obb_file_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub google_auto: GoogleAuto,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GoogleAuto {}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReference {
    pub gcs_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppBundle {
    pub bundle_location: FileReference,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AndroidInstrumentationTest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_apk: Option<FileReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_bundle: Option<AppBundle>,
    pub test_apk: FileReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_package_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_package_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_runner_class: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub test_targets: Vec<String>,
    pub orchestrator_option: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sharding_option: Option<ShardingOption>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShardingOption {
    pub uniform_sharding: UniformSharding,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UniformSharding {
    pub num_shards: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AndroidRoboTest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_apk: Option<FileReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_bundle: Option<AppBundle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_package_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_initial_activity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub robo_directives: Vec<RoboDirective>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub robo_script: Option<FileReference>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoboDirective {
    pub resource_name: String,
    pub input_text: String,
    pub action_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AndroidTestLoop {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_apk: Option<FileReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_bundle: Option<AppBundle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_package_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scenarios: Vec<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scenario_labels: Vec<String>,
}
