pub mod api;
pub mod config;
pub mod export;
pub mod report;
pub mod results;
pub mod runner;

// Re-export common items
pub use config::{Config, ConfigError, StepInputs};
pub use results::{decide, evaluate, AggregationError, RetryPolicy, RunVerdict};
pub use runner::{evaluate_saved_steps, run, RunReport};
