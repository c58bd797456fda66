//! Staged load generation.
//!
//! The [`engine`] drives any [`engine::Scenario`] through a ramp profile of
//! timed stages, records every iteration into sharded latency histograms,
//! evaluates observational checks, and renders a threshold verdict once the
//! load phase ends. [`workload`] holds the concrete HTTP scenarios.

pub mod engine;
pub mod error;
pub mod http;
pub mod output;
pub mod types;
pub mod workload;
