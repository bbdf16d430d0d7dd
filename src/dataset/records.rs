//! Record types for the event and country tables

use chrono::{Datelike, NaiveDateTime};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Experiment arm a user was randomized into
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Group {
    Control,
    Treatment,
}

impl Group {
    pub fn as_str(self) -> &'static str {
        match self {
            Group::Control => "control",
            Group::Treatment => "treatment",
        }
    }

    /// Landing page a correctly instrumented user in this arm sees
    pub fn expected_page(self) -> LandingPage {
        match self {
            Group::Control => LandingPage::OldPage,
            Group::Treatment => LandingPage::NewPage,
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Group {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "control" => Ok(Group::Control),
            "treatment" => Ok(Group::Treatment),
            other => Err(format!(
                "unknown group '{}' (expected control or treatment)",
                other
            )),
        }
    }
}

/// Page variant actually served
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandingPage {
    OldPage,
    NewPage,
}

impl LandingPage {
    pub fn as_str(self) -> &'static str {
        match self {
            LandingPage::OldPage => "old_page",
            LandingPage::NewPage => "new_page",
        }
    }
}

impl fmt::Display for LandingPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LandingPage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "old_page" => Ok(LandingPage::OldPage),
            "new_page" => Ok(LandingPage::NewPage),
            other => Err(format!(
                "unknown landing_page '{}' (expected old_page or new_page)",
                other
            )),
        }
    }
}

/// One row of the event table as parsed; empty cells are `None`
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub user_id: Option<String>,
    pub timestamp: Option<NaiveDateTime>,
    pub group: Option<Group>,
    pub landing_page: Option<LandingPage>,
    pub converted: Option<bool>,
}

impl RawEvent {
    /// Convenience constructor for a fully populated row
    pub fn new(
        user_id: impl Into<String>,
        timestamp: NaiveDateTime,
        group: Group,
        landing_page: LandingPage,
        converted: bool,
    ) -> Self {
        Self {
            user_id: Some(user_id.into()),
            timestamp: Some(timestamp),
            group: Some(group),
            landing_page: Some(landing_page),
            converted: Some(converted),
        }
    }
}

/// One row of the country lookup table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCountry {
    pub user_id: Option<String>,
    pub country: Option<String>,
}

impl RawCountry {
    pub fn new(user_id: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            country: Some(country.into()),
        }
    }
}

/// A validated, joined, per-user record of the cleaned sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanRecord {
    pub user_id: String,
    pub timestamp: NaiveDateTime,
    pub group: Group,
    pub landing_page: LandingPage,
    pub converted: bool,
    pub country: String,
}

impl CleanRecord {
    /// Label of this record under the given segmentation key
    pub fn segment_label(&self, key: SegmentKey) -> String {
        match key {
            SegmentKey::Country => self.country.clone(),
            SegmentKey::Weekday => self.timestamp.weekday().to_string(),
        }
    }
}

/// Attribute used to partition the cleaned sample for segment analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKey {
    #[default]
    Country,
    Weekday,
}

impl SegmentKey {
    pub fn as_str(self) -> &'static str {
        match self {
            SegmentKey::Country => "country",
            SegmentKey::Weekday => "weekday",
        }
    }
}

impl fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
