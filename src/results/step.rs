use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Attribute pairs describing the device a step executed on
/// (model, OS version, locale, orientation).
///
/// Entries keep the order in which the service reported them. Equality of
/// dimensions is decided by [`DimensionKey`](super::DimensionKey), never by
/// comparing this list directly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDimension {
    entries: Vec<(String, String)>,
}

impl DeviceDimension {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion, mostly used by tests and fixtures.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    /// Last value recorded for `key`; later entries override earlier ones.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for DeviceDimension
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureDetail {
    #[serde(default)]
    pub crashed: bool,
    #[serde(default)]
    pub not_installed: bool,
    #[serde(default)]
    pub other_native_crash: bool,
    #[serde(default)]
    pub timed_out: bool,
    #[serde(default)]
    pub unable_to_crawl: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InconclusiveDetail {
    #[serde(default)]
    pub aborted_by_user: bool,
    #[serde(default)]
    pub infrastructure_failure: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedDetail {
    #[serde(default)]
    pub incompatible_app_version: bool,
    #[serde(default)]
    pub incompatible_architecture: bool,
    #[serde(default)]
    pub incompatible_device: bool,
}

/// Outcome classification of a single step.
///
/// Detail flags only feed the rendered label; the pass/fail decision looks
/// at the variant alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Success,
    Failure(FailureDetail),
    Inconclusive(InconclusiveDetail),
    Skipped(SkippedDetail),
    /// Summary the service reported that is none of the above
    /// (`unset`, `flaky`, or a missing outcome). Never counts as success.
    Unrecognized(String),
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Success)
    }

    /// Base classification word as the service spells it.
    pub fn summary(&self) -> &str {
        match self {
            StepOutcome::Success => "success",
            StepOutcome::Failure(_) => "failure",
            StepOutcome::Inconclusive(_) => "inconclusive",
            StepOutcome::Skipped(_) => "skipped",
            StepOutcome::Unrecognized(summary) => summary,
        }
    }
}

/// One executed test attempt on one device configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub dimension: DeviceDimension,
    pub completion_time: Option<DateTime<Utc>>,
    pub outcome: StepOutcome,
}

impl Step {
    pub fn new(
        dimension: DeviceDimension,
        completion_time: Option<DateTime<Utc>>,
        outcome: StepOutcome,
    ) -> Self {
        Self {
            dimension,
            completion_time,
            outcome,
        }
    }
}
