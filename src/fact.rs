// src/fact.rs

use arrow::{
    array::{ArrayRef, Date32Array, Float64Array, Int32Array, Int64Array},
    datatypes::{DataType, Date32Type, Field, Schema as ArrowSchema},
};
use chrono::NaiveDate;
use std::{collections::HashSet, sync::Arc};
use tracing::{info, instrument, warn};

use crate::calendar::{date_key, MemberEvent};
use crate::dims::member::members_by_id;
use crate::dims::risk_profile::risk_profile_keys;
use crate::dims::{plan_key_for, DateRow, MemberRow, PlanRow, RiskProfileRow};
use crate::store::TableRow;

/// One row per member event.
#[derive(Debug, Clone, PartialEq)]
pub struct FactRow {
    pub date_key: i32,
    pub member_id: i64,
    pub region_key: Option<i32>,
    pub plan_key: i32,
    pub risk_profile_key: Option<i32>,
    pub charge_amount: Option<f64>,
    pub event_date: NaiveDate,
}

/// Everything the fact join reads. Dimensions must be built first.
pub struct FactInputs<'a> {
    pub events: &'a [MemberEvent],
    pub members: &'a [MemberRow],
    pub plans: &'a [PlanRow],
    pub dates: &'a [DateRow],
    pub risk_profiles: &'a [RiskProfileRow],
}

/// Rows that found no partner in a left join. Never dropped, only counted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OrphanCounts {
    pub member: usize,
    pub date: usize,
    pub plan: usize,
    pub risk_profile: usize,
}

/// Left-join every member event against the dimensions. The output always
/// has exactly one row per event.
#[instrument(level = "info", skip_all, fields(events = inputs.events.len()))]
pub fn build_fact_table(inputs: &FactInputs<'_>) -> (Vec<FactRow>, OrphanCounts) {
    let members = members_by_id(inputs.members);
    let date_keys: HashSet<i32> = inputs.dates.iter().map(|d| d.date_key).collect();
    let plan_keys: HashSet<i32> = inputs.plans.iter().map(|p| p.plan_key).collect();
    let profiles = risk_profile_keys(inputs.risk_profiles);
    let mut orphans = OrphanCounts::default();

    let rows: Vec<FactRow> = inputs
        .events
        .iter()
        .map(|ev| {
            let plan_key = plan_key_for(ev.member_id);
            let key = date_key(ev.event_date);

            // member → (sex, smoker, region_key)
            let member = members.get(&ev.member_id);
            if member.is_none() {
                orphans.member += 1;
            }
            let region_key = member.and_then(|m| m.region_key);

            if !date_keys.contains(&key) {
                orphans.date += 1;
            }
            if !plan_keys.contains(&plan_key) {
                orphans.plan += 1;
            }

            let risk_profile_key = member.and_then(|m| {
                let triple = (m.sex.as_deref()?, m.smoker.as_deref()?, m.region_key?);
                profiles.get(&triple).copied()
            });
            if risk_profile_key.is_none() {
                orphans.risk_profile += 1;
            }

            FactRow {
                date_key: key,
                member_id: ev.member_id,
                region_key,
                plan_key,
                risk_profile_key,
                charge_amount: ev.record.charges,
                event_date: ev.event_date,
            }
        })
        .collect();

    if orphans != OrphanCounts::default() {
        warn!(
            member = orphans.member,
            date = orphans.date,
            plan = orphans.plan,
            risk_profile = orphans.risk_profile,
            "fact rows without a dimension match"
        );
    }
    info!(rows = rows.len(), "built fact table");
    (rows, orphans)
}

impl TableRow for FactRow {
    fn schema() -> ArrowSchema {
        ArrowSchema::new(vec![
            Field::new("date_key", DataType::Int32, false),
            Field::new("member_id", DataType::Int64, false),
            Field::new("region_key", DataType::Int32, true),
            Field::new("plan_key", DataType::Int32, false),
            Field::new("risk_profile_key", DataType::Int32, true),
            Field::new("charge_amount", DataType::Float64, true),
            Field::new("event_date", DataType::Date32, false),
        ])
    }

    fn to_arrays(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.date_key))),
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.member_id))),
            Arc::new(rows.iter().map(|r| r.region_key).collect::<Int32Array>()),
            Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.plan_key))),
            Arc::new(rows.iter().map(|r| r.risk_profile_key).collect::<Int32Array>()),
            Arc::new(rows.iter().map(|r| r.charge_amount).collect::<Float64Array>()),
            Arc::new(Date32Array::from_iter_values(
                rows.iter().map(|r| Date32Type::from_naive_date(r.event_date)),
            )),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::SyntheticCalendar;
    use crate::dims::{
        build_member_dim, build_region_dim, build_risk_profile_dim, plan_dim, DateRow,
    };
    use crate::source::RawRecord;

    fn record(sex: Option<&str>, smoker: &str, region: &str, charges: Option<f64>) -> RawRecord {
        RawRecord {
            age: Some(30),
            sex: sex.map(str::to_string),
            bmi: Some(25.0),
            children: Some(0),
            smoker: Some(smoker.to_string()),
            region: Some(region.to_string()),
            charges,
        }
    }

    fn events() -> Vec<MemberEvent> {
        let cal = SyntheticCalendar::new(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(), 1_461)
            .unwrap();
        cal.assign(vec![
            record(Some("female"), "yes", "southwest", Some(100.0)),
            record(Some("male"), "no", "southeast", None),
            record(None, "no", "southeast", Some(50.0)),
            record(Some("female"), "yes", "southwest", Some(10.0)),
            record(Some("male"), "no", "northeast", Some(1.5)),
        ])
        .unwrap()
    }

    #[test]
    fn one_fact_row_per_event() {
        let events = events();
        let regions = build_region_dim(&events);
        let members = build_member_dim(&events, &regions);
        let profiles = build_risk_profile_dim(&members);
        let plans = plan_dim();
        let dates: Vec<DateRow> = events.iter().map(|e| DateRow::from_date(e.event_date)).collect();

        let (facts, orphans) = build_fact_table(&FactInputs {
            events: &events,
            members: &members,
            plans: &plans,
            dates: &dates,
            risk_profiles: &profiles,
        });

        assert_eq!(facts.len(), events.len());
        for (fact, ev) in facts.iter().zip(&events) {
            assert_eq!(fact.member_id, ev.member_id);
            assert_eq!(fact.plan_key as i64, ev.member_id % 4 + 1);
            assert!((1..=4).contains(&fact.plan_key));
            assert_eq!(fact.date_key, date_key(ev.event_date));
        }

        // same triple → same key
        assert_eq!(facts[0].risk_profile_key, facts[3].risk_profile_key);
        assert!(facts[0].risk_profile_key.is_some());
        // null sex never joins
        assert_eq!(facts[2].risk_profile_key, None);
        assert_eq!(facts[2].region_key, facts[1].region_key);

        assert_eq!(facts[1].charge_amount, None);
        assert_eq!(orphans.risk_profile, 1);
        assert_eq!(orphans.date, 0);
        assert_eq!(orphans.plan, 0);
    }

    #[test]
    fn dates_outside_dimension_are_kept() {
        let events = events();
        let regions = build_region_dim(&events);
        let members = build_member_dim(&events, &regions);
        let profiles = build_risk_profile_dim(&members);
        let plans = plan_dim();

        let (facts, orphans) = build_fact_table(&FactInputs {
            events: &events,
            members: &members,
            plans: &plans,
            dates: &[],
            risk_profiles: &profiles,
        });
        assert_eq!(facts.len(), events.len());
        assert_eq!(orphans.date, events.len());
    }
}
