use chrono::{Datelike, Days, NaiveDate, TimeDelta, TimeZone};

use crate::error::DigestError;

const MINUTES_PER_DAY: i64 = 24 * 60;

/// Calendar days `[start, end)`, each bound taken at local midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Epoch seconds of a window, as the history cursor expects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub oldest: i64,
    pub latest: i64,
}

impl Window {
    /// The Sunday-to-Sunday week that contained the day `weeks_ago` weeks
    /// before `today`.
    pub fn week(today: NaiveDate, weeks_ago: u32) -> Result<Self, DigestError> {
        let out_of_range = || DigestError::configuration(format!("--week {weeks_ago} is out of range"));

        let ago = today
            .checked_sub_days(Days::new(u64::from(weeks_ago) * 7))
            .ok_or_else(out_of_range)?;
        let start = ago
            .checked_sub_days(Days::new(u64::from(ago.weekday().num_days_from_sunday())))
            .ok_or_else(out_of_range)?;
        let end = start
            .checked_add_days(Days::new(7))
            .ok_or_else(out_of_range)?;

        Ok(Self { start, end })
    }

    /// Week selection with optional explicit bounds overriding either end.
    pub fn resolve(
        today: NaiveDate,
        weeks_ago: u32,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Self, DigestError> {
        let week = Self::week(today, weeks_ago)?;
        let window = Self {
            start: start.unwrap_or(week.start),
            end: end.unwrap_or(week.end),
        };

        if window.start > window.end {
            return Err(DigestError::configuration(format!(
                "start date {} is after end date {}",
                window.start, window.end
            )));
        }

        Ok(window)
    }

    pub fn bounds<Tz: TimeZone>(&self, tz: &Tz) -> Result<Bounds, DigestError> {
        Ok(Bounds {
            oldest: midnight(self.start, tz)?,
            latest: midnight(self.end, tz)?,
        })
    }
}

/// Epoch seconds of the day's first local instant. When a DST gap skips
/// midnight, that is the first valid local time after the gap.
fn midnight<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Result<i64, DigestError> {
    let no_midnight = || DigestError::configuration(format!("no local midnight on {date}"));
    let start = date.and_hms_opt(0, 0, 0).ok_or_else(no_midnight)?;

    (0..MINUTES_PER_DAY)
        .filter_map(|minute| start.checked_add_signed(TimeDelta::minutes(minute)))
        .find_map(|naive| tz.from_local_datetime(&naive).earliest())
        .map(|datetime| datetime.timestamp())
        .ok_or_else(no_midnight)
}
