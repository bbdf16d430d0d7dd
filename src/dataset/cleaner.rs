//! Cleaning raw event and country rows into one record per user
//!
//! Steps, in order:
//! 1. Inner-join events with countries on `user_id`
//! 2. Drop rows with a missing required field
//! 3. Drop rows whose group and landing page disagree
//! 4. Keep each user's latest event; equal timestamps keep the earliest row
//! 5. Verify `user_id` uniqueness and the minimum sample size

use crate::dataset::records::{CleanRecord, Group, RawCountry, RawEvent};
use crate::error::{AnalysisError, Result};
use crate::inference::GroupSummary;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Data-quality counts collected while cleaning
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleaningSummary {
    pub raw_events: usize,
    pub raw_countries: usize,
    /// Event rows whose user has no country row
    pub unmatched_country: usize,
    pub missing_fields: usize,
    /// Rows where group and landing page disagree
    pub mismatched_assignments: usize,
    pub duplicates_removed: usize,
    /// Users seen in both arms before deduplication
    pub users_in_both_groups: usize,
    pub clean_records: usize,
}

impl CleaningSummary {
    pub fn removed_records(&self) -> usize {
        self.raw_events.saturating_sub(self.clean_records)
    }

    pub fn pct_removed(&self) -> f64 {
        if self.raw_events == 0 {
            return 0.0;
        }
        self.removed_records() as f64 / self.raw_events as f64 * 100.0
    }
}

/// Validated per-user sample shared read-only by every analysis
///
/// Only `DataCleaner::clean` and `from_records` build one, so `user_id` is
/// always unique.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanedSample {
    records: Vec<CleanRecord>,
    summary: CleaningSummary,
}

impl CleanedSample {
    /// Build a sample from already-clean records, enforcing `user_id` uniqueness
    pub fn from_records(records: Vec<CleanRecord>) -> Result<Self> {
        ensure_unique_users(&records)?;
        let summary = CleaningSummary {
            raw_events: records.len(),
            clean_records: records.len(),
            ..CleaningSummary::default()
        };
        Ok(Self { records, summary })
    }

    pub fn records(&self) -> &[CleanRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn summary(&self) -> &CleaningSummary {
        &self.summary
    }

    /// Conversion counts for one arm
    pub fn group_summary(&self, group: Group) -> GroupSummary {
        GroupSummary::from_records(group, self.records.iter())
    }

    /// (control, treatment) summaries
    pub fn summaries(&self) -> (GroupSummary, GroupSummary) {
        (
            self.group_summary(Group::Control),
            self.group_summary(Group::Treatment),
        )
    }
}

/// Turns raw tables into a `CleanedSample`
#[derive(Debug, Clone)]
pub struct DataCleaner {
    min_sample_size: usize,
}

impl DataCleaner {
    pub fn new(min_sample_size: usize) -> Self {
        Self { min_sample_size }
    }

    pub fn clean(&self, events: &[RawEvent], countries: &[RawCountry]) -> Result<CleanedSample> {
        let mut summary = CleaningSummary {
            raw_events: events.len(),
            raw_countries: countries.len(),
            ..CleaningSummary::default()
        };

        let country_of = index_countries(countries)?;

        // Steps 1-3: join, completeness, assignment consistency
        let mut candidates: Vec<CleanRecord> = Vec::with_capacity(events.len());
        let mut groups_seen: HashMap<&str, (bool, bool)> = HashMap::new();
        for event in events {
            let Some(user_id) = event.user_id.as_deref() else {
                summary.missing_fields += 1;
                continue;
            };
            let Some(country) = country_of.get(user_id) else {
                summary.unmatched_country += 1;
                continue;
            };
            let (Some(timestamp), Some(group), Some(landing_page), Some(converted)) = (
                event.timestamp,
                event.group,
                event.landing_page,
                event.converted,
            ) else {
                summary.missing_fields += 1;
                continue;
            };
            if group.expected_page() != landing_page {
                summary.mismatched_assignments += 1;
                continue;
            }

            let seen = groups_seen.entry(user_id).or_default();
            match group {
                Group::Control => seen.0 = true,
                Group::Treatment => seen.1 = true,
            }

            candidates.push(CleanRecord {
                user_id: user_id.to_string(),
                timestamp,
                group,
                landing_page,
                converted,
                country: (*country).to_string(),
            });
        }
        summary.users_in_both_groups = groups_seen.values().filter(|(c, t)| *c && *t).count();

        // Step 4: latest timestamp wins, ties keep the earlier row
        let mut winner: HashMap<&str, usize> = HashMap::with_capacity(candidates.len());
        for (idx, record) in candidates.iter().enumerate() {
            winner
                .entry(record.user_id.as_str())
                .and_modify(|current| {
                    if record.timestamp > candidates[*current].timestamp {
                        *current = idx;
                    }
                })
                .or_insert(idx);
        }
        let keep: HashSet<usize> = winner.into_values().collect();
        let candidate_count = candidates.len();
        let records: Vec<CleanRecord> = candidates
            .into_iter()
            .enumerate()
            .filter(|(idx, _)| keep.contains(idx))
            .map(|(_, record)| record)
            .collect();
        summary.duplicates_removed = candidate_count - records.len();

        // Step 5: invariants
        ensure_unique_users(&records)?;
        summary.clean_records = records.len();

        if records.len() < self.min_sample_size {
            return Err(AnalysisError::data_integrity(
                "cleaned sample",
                format!(
                    "{} records remain after cleaning, fewer than min_sample_size = {} \
                     (raw={}, unmatched_country={}, missing_fields={}, mismatched={}, duplicates={})",
                    records.len(),
                    self.min_sample_size,
                    summary.raw_events,
                    summary.unmatched_country,
                    summary.missing_fields,
                    summary.mismatched_assignments,
                    summary.duplicates_removed
                ),
            ));
        }

        tracing::info!(
            raw = summary.raw_events,
            clean = summary.clean_records,
            mismatched = summary.mismatched_assignments,
            duplicates = summary.duplicates_removed,
            unmatched_country = summary.unmatched_country,
            "cleaned experiment data"
        );

        Ok(CleanedSample { records, summary })
    }
}

/// user_id → country, rejecting users mapped to two different countries
fn index_countries(countries: &[RawCountry]) -> Result<HashMap<&str, &str>> {
    let mut index: HashMap<&str, &str> = HashMap::with_capacity(countries.len());
    for row in countries {
        let (Some(user_id), Some(country)) = (row.user_id.as_deref(), row.country.as_deref())
        else {
            continue;
        };
        if let Some(existing) = index.insert(user_id, country) {
            if existing != country {
                return Err(AnalysisError::data_integrity(
                    "countries",
                    format!(
                        "user {} maps to both '{}' and '{}'",
                        user_id, existing, country
                    ),
                ));
            }
        }
    }
    Ok(index)
}

fn ensure_unique_users(records: &[CleanRecord]) -> Result<()> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if !seen.insert(record.user_id.as_str()) {
            return Err(AnalysisError::data_integrity(
                "cleaned sample",
                format!("user {} appears more than once", record.user_id),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::records::LandingPage;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2017, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn event(user: &str, day: u32, group: Group, page: LandingPage, converted: bool) -> RawEvent {
        RawEvent::new(user, ts(day, 12), group, page, converted)
    }

    fn countries(users: &[&str]) -> Vec<RawCountry> {
        users.iter().map(|u| RawCountry::new(*u, "US")).collect()
    }

    #[test]
    fn test_drops_mismatched_assignments() {
        let events = vec![
            event("1", 2, Group::Control, LandingPage::OldPage, false),
            event("2", 2, Group::Control, LandingPage::NewPage, true),
            event("3", 2, Group::Treatment, LandingPage::OldPage, true),
            event("4", 2, Group::Treatment, LandingPage::NewPage, false),
        ];
        let sample = DataCleaner::new(1)
            .clean(&events, &countries(&["1", "2", "3", "4"]))
            .unwrap();

        assert_eq!(sample.len(), 2);
        assert_eq!(sample.summary().mismatched_assignments, 2);
        for record in sample.records() {
            assert_eq!(record.group.expected_page(), record.landing_page);
        }
    }

    #[test]
    fn test_keeps_latest_event_per_user() {
        let events = vec![
            event("1", 5, Group::Control, LandingPage::OldPage, false),
            event("1", 9, Group::Control, LandingPage::OldPage, true),
            event("1", 7, Group::Control, LandingPage::OldPage, false),
            event("2", 3, Group::Treatment, LandingPage::NewPage, false),
        ];
        let sample = DataCleaner::new(1)
            .clean(&events, &countries(&["1", "2"]))
            .unwrap();

        assert_eq!(sample.len(), 2);
        let user1 = sample.records().iter().find(|r| r.user_id == "1").unwrap();
        assert_eq!(user1.timestamp, ts(9, 12));
        assert!(user1.converted);
        assert_eq!(sample.summary().duplicates_removed, 2);
    }

    #[test]
    fn test_timestamp_tie_keeps_first_row() {
        let events = vec![
            event("1", 5, Group::Control, LandingPage::OldPage, true),
            event("1", 5, Group::Control, LandingPage::OldPage, false),
        ];
        let sample = DataCleaner::new(1).clean(&events, &countries(&["1"])).unwrap();
        assert_eq!(sample.len(), 1);
        assert!(sample.records()[0].converted);
    }

    #[test]
    fn test_user_in_both_groups_resolved_to_latest() {
        let events = vec![
            event("1", 5, Group::Control, LandingPage::OldPage, false),
            event("1", 6, Group::Treatment, LandingPage::NewPage, true),
        ];
        let sample = DataCleaner::new(1).clean(&events, &countries(&["1"])).unwrap();
        assert_eq!(sample.len(), 1);
        assert_eq!(sample.records()[0].group, Group::Treatment);
        assert_eq!(sample.summary().users_in_both_groups, 1);
    }

    #[test]
    fn test_inner_join_drops_users_without_country() {
        let events = vec![
            event("1", 2, Group::Control, LandingPage::OldPage, false),
            event("2", 2, Group::Treatment, LandingPage::NewPage, false),
        ];
        let sample = DataCleaner::new(1).clean(&events, &countries(&["1"])).unwrap();
        assert_eq!(sample.len(), 1);
        assert_eq!(sample.summary().unmatched_country, 1);
    }

    #[test]
    fn test_missing_fields_dropped() {
        let mut incomplete = event("2", 2, Group::Treatment, LandingPage::NewPage, false);
        incomplete.converted = None;
        let events = vec![
            event("1", 2, Group::Control, LandingPage::OldPage, false),
            incomplete,
        ];
        let sample = DataCleaner::new(1)
            .clean(&events, &countries(&["1", "2"]))
            .unwrap();
        assert_eq!(sample.len(), 1);
        assert_eq!(sample.summary().missing_fields, 1);
    }

    #[test]
    fn test_below_minimum_sample_size_fails() {
        let events = vec![event("1", 2, Group::Control, LandingPage::OldPage, false)];
        let err = DataCleaner::new(10)
            .clean(&events, &countries(&["1"]))
            .unwrap_err();
        assert!(matches!(err, AnalysisError::DataIntegrity { .. }));
        assert!(err.to_string().contains("min_sample_size = 10"));
    }

    #[test]
    fn test_conflicting_country_rows_fail() {
        let events = vec![event("1", 2, Group::Control, LandingPage::OldPage, false)];
        let countries = vec![RawCountry::new("1", "US"), RawCountry::new("1", "UK")];
        let err = DataCleaner::new(1).clean(&events, &countries).unwrap_err();
        assert!(err.to_string().contains("maps to both"));
    }

    #[test]
    fn test_group_summaries_partition_sample() {
        let events = vec![
            event("1", 2, Group::Control, LandingPage::OldPage, true),
            event("2", 2, Group::Control, LandingPage::OldPage, false),
            event("3", 2, Group::Treatment, LandingPage::NewPage, true),
        ];
        let sample = DataCleaner::new(1)
            .clean(&events, &countries(&["1", "2", "3"]))
            .unwrap();
        let (control, treatment) = sample.summaries();
        assert_eq!(control.n + treatment.n, sample.len() as u64);
        assert_eq!(control.conversions, 1);
        assert_eq!(treatment.conversions, 1);
    }

    #[test]
    fn test_from_records_rejects_duplicates() {
        let record = CleanRecord {
            user_id: "1".to_string(),
            timestamp: ts(2, 1),
            group: Group::Control,
            landing_page: LandingPage::OldPage,
            converted: false,
            country: "US".to_string(),
        };
        assert!(CleanedSample::from_records(vec![record.clone(), record]).is_err());
    }
}
