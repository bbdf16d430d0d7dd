//! Business impact projection of the measured lift
//!
//! Translates the absolute conversion lift into revenue for a set of rollout
//! scenarios: monthly = visitors × rollout share × lift × revenue per conversion.

use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};

/// A rollout scenario to project the lift onto
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactScenario {
    pub name: String,
    pub monthly_visitors: u64,
    pub revenue_per_conversion: f64,
    /// Share of traffic receiving the treatment, in [0, 1]
    pub rollout_percentage: f64,
}

impl ImpactScenario {
    pub fn validate(&self) -> Result<()> {
        if !(self.revenue_per_conversion.is_finite() && self.revenue_per_conversion >= 0.0) {
            return Err(AnalysisError::invalid(
                format!("scenarios[{}].revenue_per_conversion", self.name),
                self.revenue_per_conversion,
                "a finite value >= 0",
            ));
        }
        if !(0.0..=1.0).contains(&self.rollout_percentage) {
            return Err(AnalysisError::invalid(
                format!("scenarios[{}].rollout_percentage", self.name),
                self.rollout_percentage,
                "a share in [0, 1]",
            ));
        }
        Ok(())
    }
}

/// Projected revenue change for one scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactEstimate {
    pub scenario: String,
    pub absolute_lift: f64,
    pub monthly_revenue_impact: f64,
    pub yearly_revenue_impact: f64,
}

pub fn estimate_impact(absolute_lift: f64, scenario: &ImpactScenario) -> ImpactEstimate {
    let effective_visitors = scenario.monthly_visitors as f64 * scenario.rollout_percentage;
    let monthly = effective_visitors * absolute_lift * scenario.revenue_per_conversion;
    ImpactEstimate {
        scenario: scenario.name.clone(),
        absolute_lift,
        monthly_revenue_impact: monthly,
        yearly_revenue_impact: monthly * 12.0,
    }
}
