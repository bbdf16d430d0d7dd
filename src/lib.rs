//! Veredicto - statistical rollout decisions for A/B conversion experiments
//!
//! This library cleans raw experiment event tables into a per-user sample,
//! runs a sample ratio mismatch guard, a two-proportion Z-test, power
//! analysis, Beta-Binomial posteriors and a corrected segment breakdown,
//! and combines them into a ship / hold / keep-current recommendation.

pub mod cli;
pub mod config;
pub mod dataset;
pub mod decision;
pub mod error;
pub mod impact;
pub mod inference;
pub mod pipeline;
pub mod report;

pub use error::{AnalysisError, Result};
