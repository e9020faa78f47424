//! Orchestration for the `cifar-concat` binary: TOML config, the
//! train/summary/evaluate/gen-synthetic pipelines, and the JSON report.

pub mod config;
pub mod pipeline;
pub mod results;
