// Per-arm conversion counts

use crate::dataset::{CleanRecord, Group};
use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};

/// Users, conversions and conversion rate of one arm
///
/// Deserialization goes through `new`, so `conversions <= n` always holds and
/// `rate` is recomputed from the counts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GroupCounts")]
pub struct GroupSummary {
    pub group: Group,
    pub n: u64,
    pub conversions: u64,
    pub rate: f64,
}

#[derive(Deserialize)]
struct GroupCounts {
    group: Group,
    n: u64,
    conversions: u64,
}

impl TryFrom<GroupCounts> for GroupSummary {
    type Error = AnalysisError;

    fn try_from(counts: GroupCounts) -> Result<Self> {
        Self::new(counts.group, counts.n, counts.conversions)
    }
}

impl GroupSummary {
    /// Summary from raw counts; `conversions` may not exceed `n`
    pub fn new(group: Group, n: u64, conversions: u64) -> Result<Self> {
        if conversions > n {
            return Err(AnalysisError::invalid(
                format!("{} conversions", group),
                conversions,
                format!("<= n ({})", n),
            ));
        }
        Ok(Self::from_counts(group, n, conversions))
    }

    /// Count the records belonging to `group`
    pub fn from_records<'a, I>(group: Group, records: I) -> Self
    where
        I: IntoIterator<Item = &'a CleanRecord>,
    {
        let (n, conversions) = records
            .into_iter()
            .filter(|r| r.group == group)
            .fold((0u64, 0u64), |(n, c), r| (n + 1, c + u64::from(r.converted)));
        Self::from_counts(group, n, conversions)
    }

    fn from_counts(group: Group, n: u64, conversions: u64) -> Self {
        let rate = if n == 0 {
            0.0
        } else {
            conversions as f64 / n as f64
        };
        Self {
            group,
            n,
            conversions,
            rate,
        }
    }

    pub fn failures(&self) -> u64 {
        self.n - self.conversions
    }
}
