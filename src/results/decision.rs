use super::dimension::DimensionKey;
use super::error::AggregationError;
use super::grouping::group_for_last_attempt;
use super::step::Step;

/// Upper bound for flaky-test reattempts accepted by the testing service.
pub const MAX_FLAKY_TEST_ATTEMPTS: u8 = 10;

/// How reruns of flaky tests are treated when judging a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    pub enabled: bool,
    pub max_attempts: u8,
}

impl RetryPolicy {
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Policy for a configured number of reattempts; retries are enabled for
    /// any count above zero. Returns `None` outside `0..=10`.
    pub fn from_flaky_attempts(attempts: u32) -> Option<Self> {
        let max_attempts = u8::try_from(attempts)
            .ok()
            .filter(|n| *n <= MAX_FLAKY_TEST_ATTEMPTS)?;
        Some(Self {
            enabled: max_attempts > 0,
            max_attempts,
        })
    }

    /// Decide whether the run succeeded. See [`evaluate`].
    pub fn decide(&self, steps: &[Step]) -> Result<bool, AggregationError> {
        decide(steps, self)
    }
}

/// Result of judging one complete set of steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunVerdict {
    pub success: bool,
    /// Dimensions whose deciding attempt did not succeed.
    pub failing_dimensions: Vec<DimensionKey>,
    /// Dimensions that failed at least once but passed on their final attempt.
    /// Always empty when retries are disabled.
    pub recovered_dimensions: Vec<DimensionKey>,
}

/// Judge a frozen set of steps under `policy`.
///
/// With retries disabled every step has to succeed. With retries enabled the
/// steps are grouped per dimension and only the chronologically last attempt
/// of each group counts, so earlier flaky failures are forgiven.
pub fn evaluate(steps: &[Step], policy: &RetryPolicy) -> Result<RunVerdict, AggregationError> {
    if !policy.enabled {
        let mut failing_dimensions: Vec<DimensionKey> = steps
            .iter()
            .filter(|step| !step.outcome.is_success())
            .map(|step| DimensionKey::of(&step.dimension))
            .collect();
        failing_dimensions.sort();
        failing_dimensions.dedup();

        return Ok(RunVerdict {
            success: failing_dimensions.is_empty(),
            failing_dimensions,
            recovered_dimensions: Vec::new(),
        });
    }

    let groups = group_for_last_attempt(steps)?;

    let mut failing_dimensions = Vec::new();
    let mut recovered_dimensions = Vec::new();
    for (key, attempts) in groups {
        let Some(last) = attempts.last() else {
            continue;
        };
        if !last.outcome.is_success() {
            failing_dimensions.push(key);
        } else if attempts.iter().any(|step| !step.outcome.is_success()) {
            recovered_dimensions.push(key);
        }
    }

    Ok(RunVerdict {
        success: failing_dimensions.is_empty(),
        failing_dimensions,
        recovered_dimensions,
    })
}

/// Overall success of a run; the boolean form of [`evaluate`].
pub fn decide(steps: &[Step], policy: &RetryPolicy) -> Result<bool, AggregationError> {
    evaluate(steps, policy).map(|verdict| verdict.success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::step::{
        DeviceDimension, FailureDetail, InconclusiveDetail, SkippedDetail, StepOutcome,
    };
    use chrono::DateTime;

    fn step(os: &str, seconds: Option<i64>, outcome: StepOutcome) -> Step {
        Step::new(
            DeviceDimension::new().with("os", os),
            seconds.and_then(|s| DateTime::from_timestamp(s, 0)),
            outcome,
        )
    }

    fn failure() -> StepOutcome {
        StepOutcome::Failure(FailureDetail::default())
    }

    fn enabled() -> RetryPolicy {
        RetryPolicy::from_flaky_attempts(2).unwrap()
    }

    #[test]
    fn test_policy_from_flaky_attempts() {
        assert_eq!(RetryPolicy::from_flaky_attempts(0), Some(RetryPolicy::disabled()));
        let policy = RetryPolicy::from_flaky_attempts(10).unwrap();
        assert!(policy.enabled);
        assert_eq!(policy.max_attempts, 10);
        assert_eq!(RetryPolicy::from_flaky_attempts(11), None);
        assert_eq!(RetryPolicy::from_flaky_attempts(300), None);
    }

    #[test]
    fn test_disabled_requires_every_step_to_pass() {
        let steps = vec![
            step("android", None, failure()),
            step("android", None, StepOutcome::Success),
            step("ios", None, StepOutcome::Success),
        ];
        assert!(!decide(&steps, &RetryPolicy::disabled()).unwrap());
    }

    #[test]
    fn test_disabled_ignores_missing_completion_time() {
        let steps = vec![step("android", None, StepOutcome::Success)];
        assert!(decide(&steps, &RetryPolicy::disabled()).unwrap());
    }

    #[test]
    fn test_any_non_success_outcome_fails_disabled_policy() {
        for outcome in [
            failure(),
            StepOutcome::Inconclusive(InconclusiveDetail::default()),
            StepOutcome::Skipped(SkippedDetail::default()),
            StepOutcome::Unrecognized("unset".to_string()),
        ] {
            let steps = vec![step("android", None, StepOutcome::Success), step("ios", None, outcome)];
            assert!(!decide(&steps, &RetryPolicy::disabled()).unwrap());
        }
    }

    #[test]
    fn test_enabled_uses_last_attempt_regardless_of_input_order() {
        // Final success arrives first in the input but completed last.
        let steps = vec![
            step("android", Some(9), StepOutcome::Success),
            step("android", Some(1), failure()),
            step("android", Some(4), failure()),
        ];
        assert!(decide(&steps, &enabled()).unwrap());

        let steps = vec![
            step("android", Some(1), StepOutcome::Success),
            step("android", Some(9), failure()),
        ];
        assert!(!decide(&steps, &enabled()).unwrap());
    }

    #[test]
    fn test_verdict_lists_failing_and_recovered_dimensions() {
        let steps = vec![
            step("android", Some(2), failure()),
            step("android", Some(4), StepOutcome::Success),
            step("ios", Some(3), failure()),
            step("web", Some(3), StepOutcome::Success),
        ];

        let verdict = evaluate(&steps, &enabled()).unwrap();

        assert!(!verdict.success);
        let failing: Vec<String> = verdict.failing_dimensions.iter().map(|k| k.to_string()).collect();
        let recovered: Vec<String> = verdict.recovered_dimensions.iter().map(|k| k.to_string()).collect();
        assert_eq!(failing, vec!["os=ios"]);
        assert_eq!(recovered, vec!["os=android"]);
    }

    #[test]
    fn test_disabled_verdict_deduplicates_failing_dimensions() {
        let steps = vec![
            step("ios", None, failure()),
            step("ios", None, failure()),
            step("android", None, failure()),
        ];

        let verdict = evaluate(&steps, &RetryPolicy::disabled()).unwrap();
        assert_eq!(verdict.failing_dimensions.len(), 2);
        assert!(verdict.recovered_dimensions.is_empty());
    }

    #[test]
    fn test_enabled_errors_when_every_step_lacks_time() {
        let steps = vec![
            step("android", None, StepOutcome::Success),
            step("android", None, StepOutcome::Success),
        ];
        assert!(matches!(
            decide(&steps, &enabled()),
            Err(AggregationError::MissingCompletionTime { index: 0, .. })
        ));
    }

    #[test]
    fn test_method_form_matches_free_function() {
        let steps = vec![step("android", Some(1), StepOutcome::Success)];
        let policy = enabled();
        assert_eq!(policy.decide(&steps).unwrap(), decide(&steps, &policy).unwrap());
    }
}
