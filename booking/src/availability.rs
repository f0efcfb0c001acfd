//! Unavailable-date filtering.
//!
//! Catalog data lists every date a car is blocked, including long-gone ones.
//! Only dates on or after the reference day matter for display or for
//! checking a proposed rental range. Pure; no async, no IO.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate};
use tracing::warn;

/// Calendar dates a car cannot be booked, ascending and de-duplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnavailableDateSet(BTreeSet<NaiveDate>);

impl UnavailableDateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse ISO dates, skipping entries that are not dates.
    pub fn from_iso<I, S>(dates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::new();

        for raw in dates {
            let raw = raw.as_ref();
            match parse_day(raw) {
                Some(day) => {
                    set.insert(day);
                }
                None => warn!(value = raw, "skipping unparseable unavailable date"),
            }
        }

        Self(set)
    }

    /// Keep only dates on or after `reference_day`.
    pub fn filter_future(&self, reference_day: NaiveDate) -> Self {
        Self(self.0.range(reference_day..).copied().collect())
    }

    /// Dates of this set inside the inclusive range `[start, end]`.
    pub fn conflicts(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        if end < start {
            return Vec::new();
        }
        self.0.range(start..=end).copied().collect()
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.0.contains(&day)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.0.iter().copied()
    }

    pub fn to_iso_strings(&self) -> Vec<String> {
        self.0.iter().map(|d| d.format("%Y-%m-%d").to_string()).collect()
    }
}

impl FromIterator<NaiveDate> for UnavailableDateSet {
    fn from_iter<T: IntoIterator<Item = NaiveDate>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// `YYYY-MM-DD`, or an RFC 3339 timestamp reduced to the date it names.
pub fn parse_day(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

/// Drop every date strictly before `reference_day`; output is sorted ISO dates.
pub fn filter_future<I, S>(dates: I, reference_day: NaiveDate) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    UnavailableDateSet::from_iso(dates)
        .filter_future(reference_day)
        .to_iso_strings()
}
