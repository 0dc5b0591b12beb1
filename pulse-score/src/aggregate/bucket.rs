//! Time bucketing
//!
//! Bucket keys are deterministic string keys per (timestamp, granularity).
//! Week buckets key off the Monday of the ISO week; day-of-week boundary
//! bugs are a classic source of off-by-one aggregation errors, so the rule
//! is stated here once and tested at year boundaries.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc, Weekday};

/// Aggregation granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Day,
    Week,
    Month,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
        }
    }

    pub fn parse(value: &str) -> Option<Granularity> {
        match value {
            "day" => Some(Granularity::Day),
            "week" => Some(Granularity::Week),
            "month" => Some(Granularity::Month),
            _ => None,
        }
    }
}

/// Monday of the ISO week containing `date`
fn iso_week_monday(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Deterministic bucket key for a timestamp at a granularity
///
/// Day: `YYYY-MM-DD`. Week: the ISO-week Monday's `YYYY-MM-DD`.
/// Month: `YYYY-MM`.
pub fn bucket_key(timestamp: DateTime<Utc>, granularity: Granularity) -> String {
    let date = timestamp.date_naive();
    match granularity {
        Granularity::Day => date.format("%Y-%m-%d").to_string(),
        Granularity::Week => iso_week_monday(date).format("%Y-%m-%d").to_string(),
        Granularity::Month => date.format("%Y-%m").to_string(),
    }
}

/// A recompute period: one bucket of one granularity, with its time range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Period {
    pub granularity: Granularity,
    pub key: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Period {
    /// Resolve a bucket key back into its half-open [start, end) range
    pub fn from_key(granularity: Granularity, key: &str) -> Option<Period> {
        let (start_date, end_date) = match granularity {
            Granularity::Day => {
                let date = NaiveDate::parse_from_str(key, "%Y-%m-%d").ok()?;
                (date, date + Duration::days(1))
            }
            Granularity::Week => {
                let date = NaiveDate::parse_from_str(key, "%Y-%m-%d").ok()?;
                if date.weekday() != Weekday::Mon {
                    return None;
                }
                (date, date + Duration::days(7))
            }
            Granularity::Month => {
                let date = NaiveDate::parse_from_str(&format!("{}-01", key), "%Y-%m-%d").ok()?;
                let next = if date.month() == 12 {
                    NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)?
                } else {
                    NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)?
                };
                (date, next)
            }
        };

        Some(Period {
            granularity,
            key: key.to_string(),
            start: Utc.from_utc_datetime(&start_date.and_hms_opt(0, 0, 0)?),
            end: Utc.from_utc_datetime(&end_date.and_hms_opt(0, 0, 0)?),
        })
    }

    /// The period containing `timestamp`
    pub fn containing(granularity: Granularity, timestamp: DateTime<Utc>) -> Option<Period> {
        Period::from_key(granularity, &bucket_key(timestamp, granularity))
    }

    /// The completed period immediately before the one containing `now`
    ///
    /// This is what the nightly/monthly sweep recomputes: the bucket that
    /// just closed, never the still-filling current one.
    pub fn previous(granularity: Granularity, now: DateTime<Utc>) -> Option<Period> {
        let current = Period::containing(granularity, now)?;
        let just_before = current.start - Duration::seconds(1);
        Period::containing(granularity, just_before)
    }
}
