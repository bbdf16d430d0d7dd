// Experiment data ingestion and cleaning
//
// Raw event and country tables come in as delimited text, are parsed into
// row structs with optional fields, then reduced by the cleaner to a single
// validated record per user. Everything downstream reads the resulting
// `CleanedSample` and never the raw rows.

mod cleaner;
mod loader;
mod records;

pub use cleaner::{CleanedSample, CleaningSummary, DataCleaner};
pub use loader::{
    load_countries, load_events, parse_countries, parse_events, parse_timestamp, split_record,
    COUNTRY_COLUMNS, EVENT_COLUMNS,
};
pub use records::{CleanRecord, Group, LandingPage, RawCountry, RawEvent, SegmentKey};
