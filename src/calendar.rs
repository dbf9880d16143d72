// src/calendar.rs

use anyhow::{anyhow, bail, Result};
use chrono::{Datelike, Days, NaiveDate};
use tracing::{debug, instrument};

use crate::config::CalendarConfig;
use crate::source::RawRecord;

/// Maps a row ordinal onto a repeating window of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntheticCalendar {
    start: NaiveDate,
    window_days: u32,
}

/// A source row with its identity and event date assigned. `member_id` is
/// assigned here once; the member dimension and the fact table both read it
/// from this struct and never derive it again.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberEvent {
    pub member_id: i64,
    pub event_date: NaiveDate,
    pub record: RawRecord,
}

impl SyntheticCalendar {
    pub fn new(start: NaiveDate, window_days: u32) -> Result<Self> {
        if window_days == 0 {
            bail!("synthetic calendar window must be at least one day");
        }
        Ok(Self { start, window_days })
    }

    pub fn from_config(cfg: &CalendarConfig) -> Result<Self> {
        Self::new(cfg.start_date, cfg.window_days)
    }

    /// `start + (ordinal mod window)`.
    pub fn date_for(&self, ordinal: i64) -> Result<NaiveDate> {
        let offset = ordinal.rem_euclid(i64::from(self.window_days)) as u64;
        self.start
            .checked_add_days(Days::new(offset))
            .ok_or_else(|| anyhow!("date overflow at ordinal {}", ordinal))
    }

    /// Assign `member_id` (the row's position in the file) and its event date.
    #[instrument(level = "debug", skip_all, fields(rows = records.len()))]
    pub fn assign(&self, records: Vec<RawRecord>) -> Result<Vec<MemberEvent>> {
        let events = records
            .into_iter()
            .enumerate()
            .map(|(ordinal, record)| {
                let member_id = ordinal as i64;
                Ok(MemberEvent {
                    member_id,
                    event_date: self.date_for(member_id)?,
                    record,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(start = %self.start, window = self.window_days, "assigned event dates");
        Ok(events)
    }
}

/// `YYYYMMDD` as an integer, e.g. 2020-03-07 → 20200307.
pub fn date_key(date: NaiveDate) -> i32 {
    date.year() * 10_000 + date.month() as i32 * 100 + date.day() as i32
}

/// `yyyy-MM` month label.
pub fn event_month(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}
