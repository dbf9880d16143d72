// src/dims/date.rs

use anyhow::Result;
use arrow::{
    array::{ArrayRef, BooleanArray, Date32Array, Int32Array, StringArray},
    datatypes::{DataType, Date32Type, Field, Schema as ArrowSchema},
};
use chrono::{Datelike, NaiveDate, Weekday};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::Arc,
};
use tracing::{info, instrument};

use super::date_source::fetch_external_dates;
use crate::calendar::{date_key, MemberEvent};
use crate::config::DateSourceConfig;
use crate::store::TableRow;

/// Which strategy produced the date dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOrigin {
    External,
    Derived,
}

impl fmt::Display for DateOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::External => write!(f, "external date table"),
            Self::Derived => write!(f, "derived from synthesized event dates"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRow {
    pub date_key: i32,
    pub full_date: NaiveDate,
    pub year: i32,
    pub quarter: i32,
    pub month: i32,
    pub month_name: String,
    pub day_of_month: i32,
    /// ISO weekday, Monday = 1
    pub day_of_week: i32,
    pub day_name: String,
    pub is_weekend: bool,
}

impl DateRow {
    /// Calendar attributes for `full_date`, keyed by `date_key`.
    pub fn new(date_key: i32, full_date: NaiveDate) -> Self {
        let weekday = full_date.weekday();
        Self {
            date_key,
            full_date,
            year: full_date.year(),
            quarter: (full_date.month0() / 3 + 1) as i32,
            month: full_date.month() as i32,
            month_name: full_date.format("%B").to_string(),
            day_of_month: full_date.day() as i32,
            day_of_week: weekday.number_from_monday() as i32,
            day_name: full_date.format("%A").to_string(),
            is_weekend: matches!(weekday, Weekday::Sat | Weekday::Sun),
        }
    }

    pub fn from_date(full_date: NaiveDate) -> Self {
        Self::new(date_key(full_date), full_date)
    }
}

/// Distinct synthesized event dates, ascending.
pub fn derive_date_dim(events: &[MemberEvent]) -> Vec<DateRow> {
    events
        .iter()
        .map(|e| e.event_date)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(DateRow::from_date)
        .collect()
}

/// Rows from an external table: first occurrence of each key wins, sorted by key.
pub fn date_dim_from_pairs(pairs: impl IntoIterator<Item = (i32, NaiveDate)>) -> Vec<DateRow> {
    let mut by_key: BTreeMap<i32, NaiveDate> = BTreeMap::new();
    for (key, date) in pairs {
        by_key.entry(key).or_insert(date);
    }
    by_key
        .into_iter()
        .map(|(key, date)| DateRow::new(key, date))
        .collect()
}

/// External table first; fall back to the synthesized dates when it is not
/// configured or yields no usable rows.
#[instrument(level = "info", skip_all, fields(external = source.is_some()))]
pub async fn resolve_date_dim(
    source: Option<&DateSourceConfig>,
    events: &[MemberEvent],
) -> Result<(Vec<DateRow>, DateOrigin)> {
    if let Some(cfg) = source {
        if let Some(pairs) = fetch_external_dates(cfg).await? {
            let rows = date_dim_from_pairs(pairs);
            info!(dates = rows.len(), "date dimension loaded from external table");
            return Ok((rows, DateOrigin::External));
        }
    }
    let rows = derive_date_dim(events);
    info!(dates = rows.len(), "date dimension derived from event dates");
    Ok((rows, DateOrigin::Derived))
}

impl TableRow for DateRow {
    fn schema() -> ArrowSchema {
        ArrowSchema::new(vec![
            Field::new("date_key", DataType::Int32, false),
            Field::new("full_date", DataType::Date32, false),
            Field::new("year", DataType::Int32, false),
            Field::new("quarter", DataType::Int32, false),
            Field::new("month", DataType::Int32, false),
            Field::new("month_name", DataType::Utf8, false),
            Field::new("day_of_month", DataType::Int32, false),
            Field::new("day_of_week", DataType::Int32, false),
            Field::new("day_name", DataType::Utf8, false),
            Field::new("is_weekend", DataType::Boolean, false),
        ])
    }

    fn to_arrays(rows: &[Self]) -> Vec<ArrayRef> {
        let ints = |f: fn(&DateRow) -> i32| -> ArrayRef {
            Arc::new(Int32Array::from_iter_values(rows.iter().map(f)))
        };
        vec![
            ints(|r| r.date_key),
            Arc::new(Date32Array::from_iter_values(
                rows.iter().map(|r| Date32Type::from_naive_date(r.full_date)),
            )),
            ints(|r| r.year),
            ints(|r| r.quarter),
            ints(|r| r.month),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| &r.month_name))),
            ints(|r| r.day_of_month),
            ints(|r| r.day_of_week),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| &r.day_name))),
            Arc::new(rows.iter().map(|r| Some(r.is_weekend)).collect::<BooleanArray>()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::SyntheticCalendar;
    use crate::source::RawRecord;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn calendar_attributes() {
        let row = DateRow::from_date(ymd(2020, 2, 29));
        assert_eq!(row.date_key, 20_200_229);
        assert_eq!(row.quarter, 1);
        assert_eq!(row.month_name, "February");
        assert_eq!(row.day_name, "Saturday");
        assert_eq!(row.day_of_week, 6);
        assert!(row.is_weekend);
    }

    #[tokio::test]
    async fn falls_back_to_event_dates_without_source() -> Result<()> {
        let cal = SyntheticCalendar::new(ymd(2020, 1, 1), 3)?;
        let events = cal.assign(vec![RawRecord::default(); 7])?;
        let (rows, origin) = resolve_date_dim(None, &events).await?;

        assert_eq!(origin, DateOrigin::Derived);
        assert_eq!(
            rows.iter().map(|r| r.date_key).collect::<Vec<_>>(),
            vec![20_200_101, 20_200_102, 20_200_103]
        );
        for ev in &events {
            assert!(rows.iter().any(|r| r.date_key == date_key(ev.event_date)));
        }
        Ok(())
    }

    #[test]
    fn external_pairs_dedupe_by_key() {
        let rows = date_dim_from_pairs(vec![
            (20_200_102, ymd(2020, 1, 2)),
            (20_200_101, ymd(2020, 1, 1)),
            (20_200_102, ymd(1999, 1, 1)),
        ]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date_key, 20_200_101);
        assert_eq!(rows[1].full_date, ymd(2020, 1, 2));
    }
}
