use super::step::Step;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AggregationError {
    /// A step needed for last-attempt resolution has no completion time, so
    /// the final attempt of its dimension cannot be identified.
    #[error("step #{index} ({dimension}) has no completion time; cannot determine its final attempt")]
    MissingCompletionTime {
        index: usize,
        dimension: String,
        step: Box<Step>,
    },
}
