//! Aggregation of per-device test steps into a single pass/fail verdict.
//!
//! Everything in here is pure: no I/O, no logging, no global state. The
//! runner feeds it the final step list once polling has seen every step
//! complete.

pub mod decision;
pub mod dimension;
pub mod error;
pub mod grouping;
pub mod render;
pub mod step;

pub use decision::{decide, evaluate, RetryPolicy, RunVerdict, MAX_FLAKY_TEST_ATTEMPTS};
pub use dimension::DimensionKey;
pub use error::AggregationError;
pub use grouping::{group_and_order, group_for_last_attempt, StepGroups};
pub use step::{
    DeviceDimension, FailureDetail, InconclusiveDetail, SkippedDetail, Step, StepOutcome,
};
