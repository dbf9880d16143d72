// src/aggregate.rs

use arrow::{
    array::{ArrayRef, Float64Array, Int64Array, StringArray},
    datatypes::{DataType, Field, Schema as ArrowSchema},
};
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};
use tracing::{debug, instrument};

use crate::calendar::event_month;
use crate::dims::member::members_by_id;
use crate::dims::{MemberRow, RegionRow};
use crate::fact::FactRow;
use crate::store::TableRow;

/// Round half away from zero to 2 decimal places, on the shortest decimal
/// form of `v` rather than its binary value: `1.005` becomes `1.01`.
pub fn round2(v: f64) -> f64 {
    if !v.is_finite() {
        return v;
    }
    let text = v.abs().to_string();
    let (int, frac) = text.split_once('.').unwrap_or((text.as_str(), ""));
    if frac.len() <= 2 {
        return v;
    }
    let Ok(mut cents) = format!("{}{}", int, &frac[..2]).parse::<u128>() else {
        return v;
    };
    if frac.as_bytes()[2] >= b'5' {
        cents += 1;
    }
    format!("{}.{:02}", cents / 100, cents % 100)
        .parse::<f64>()
        .map_or(v, |r| r.copysign(v))
}

/// count(*), sum and avg with null-skipping semantics.
#[derive(Debug, Default, Clone, Copy)]
struct ChargeStats {
    rows: i64,
    non_null: i64,
    sum: f64,
}

impl ChargeStats {
    fn add(&mut self, charge: Option<f64>) {
        self.rows += 1;
        if let Some(v) = charge {
            self.non_null += 1;
            self.sum += v;
        }
    }

    fn total(&self) -> Option<f64> {
        (self.non_null > 0).then(|| round2(self.sum))
    }

    fn average(&self) -> Option<f64> {
        (self.non_null > 0).then(|| round2(self.sum / self.non_null as f64))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionSmokerSummary {
    pub region: Option<String>,
    pub smoker: Option<String>,
    pub claim_count: i64,
    pub total_charges: Option<f64>,
    pub avg_charges: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlySummary {
    pub event_month: String,
    pub claim_count: i64,
    pub total_charges: Option<f64>,
    pub avg_charges: Option<f64>,
}

/// Group facts by (region name, smoker), ordered by region then smoker,
/// nulls first. Facts left-join members for `smoker` and regions for the name.
#[instrument(level = "info", skip_all, fields(facts = facts.len()))]
pub fn region_smoker_summary(
    facts: &[FactRow],
    members: &[MemberRow],
    regions: &[RegionRow],
) -> Vec<RegionSmokerSummary> {
    let members = members_by_id(members);
    let region_names: HashMap<i32, &str> = regions
        .iter()
        .map(|r| (r.region_key, r.region.as_str()))
        .collect();

    let mut groups: BTreeMap<(Option<&str>, Option<&str>), ChargeStats> = BTreeMap::new();
    for fact in facts {
        let region = fact
            .region_key
            .and_then(|k| region_names.get(&k).copied());
        let smoker = members
            .get(&fact.member_id)
            .and_then(|m| m.smoker.as_deref());
        groups
            .entry((region, smoker))
            .or_default()
            .add(fact.charge_amount);
    }

    let rows: Vec<RegionSmokerSummary> = groups
        .into_iter()
        .map(|((region, smoker), stats)| RegionSmokerSummary {
            region: region.map(str::to_string),
            smoker: smoker.map(str::to_string),
            claim_count: stats.rows,
            total_charges: stats.total(),
            avg_charges: stats.average(),
        })
        .collect();
    debug!(groups = rows.len(), "region x smoker summary");
    rows
}

/// Group facts by `yyyy-MM` of the event date, ascending.
#[instrument(level = "info", skip_all, fields(facts = facts.len()))]
pub fn monthly_summary(facts: &[FactRow]) -> Vec<MonthlySummary> {
    let mut groups: BTreeMap<String, ChargeStats> = BTreeMap::new();
    for fact in facts {
        groups
            .entry(event_month(fact.event_date))
            .or_default()
            .add(fact.charge_amount);
    }

    let rows: Vec<MonthlySummary> = groups
        .into_iter()
        .map(|(event_month, stats)| MonthlySummary {
            event_month,
            claim_count: stats.rows,
            total_charges: stats.total(),
            avg_charges: stats.average(),
        })
        .collect();
    debug!(months = rows.len(), "monthly summary");
    rows
}

fn measure_fields() -> [Field; 3] {
    [
        Field::new("claim_count", DataType::Int64, false),
        Field::new("total_charges", DataType::Float64, true),
        Field::new("avg_charges", DataType::Float64, true),
    ]
}

impl TableRow for RegionSmokerSummary {
    fn schema() -> ArrowSchema {
        let mut fields = vec![
            Field::new("region", DataType::Utf8, true),
            Field::new("smoker", DataType::Utf8, true),
        ];
        fields.extend(measure_fields());
        ArrowSchema::new(fields)
    }

    fn to_arrays(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            Arc::new(rows.iter().map(|r| r.region.as_deref()).collect::<StringArray>()),
            Arc::new(rows.iter().map(|r| r.smoker.as_deref()).collect::<StringArray>()),
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.claim_count))),
            Arc::new(rows.iter().map(|r| r.total_charges).collect::<Float64Array>()),
            Arc::new(rows.iter().map(|r| r.avg_charges).collect::<Float64Array>()),
        ]
    }
}

impl TableRow for MonthlySummary {
    fn schema() -> ArrowSchema {
        let mut fields = vec![Field::new("event_month", DataType::Utf8, false)];
        fields.extend(measure_fields());
        ArrowSchema::new(fields)
    }

    fn to_arrays(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| &r.event_month))),
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.claim_count))),
            Arc::new(rows.iter().map(|r| r.total_charges).collect::<Float64Array>()),
            Arc::new(rows.iter().map(|r| r.avg_charges).collect::<Float64Array>()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn fact(member_id: i64, region_key: Option<i32>, charge: Option<f64>, day: (i32, u32, u32)) -> FactRow {
        let event_date = NaiveDate::from_ymd_opt(day.0, day.1, day.2).unwrap();
        FactRow {
            date_key: crate::calendar::date_key(event_date),
            member_id,
            region_key,
            plan_key: crate::dims::plan_key_for(member_id),
            risk_profile_key: None,
            charge_amount: charge,
            event_date,
        }
    }

    fn member(member_id: i64, smoker: &str, region_key: Option<i32>) -> MemberRow {
        MemberRow {
            member_id,
            age: None,
            sex: None,
            bmi: None,
            children: None,
            smoker: Some(smoker.to_string()),
            region_key,
        }
    }

    fn regions() -> Vec<RegionRow> {
        vec![
            RegionRow { region_key: 1, region: "northeast".into() },
            RegionRow { region_key: 2, region: "southeast".into() },
        ]
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round2(1.005), 1.01);
        assert_eq!(round2(1.005_000_1), 1.01);
        assert_eq!(round2(2.344), 2.34);
        assert_eq!(round2(-2.345), -2.35);
        assert_eq!(round2(16884.925), 16884.93);
        assert_eq!(round2(0.1), 0.1);
        assert_eq!(round2(7.0), 7.0);
    }

    #[test]
    fn null_charges_count_but_do_not_sum() {
        let members = vec![
            member(0, "yes", Some(1)),
            member(1, "yes", Some(1)),
            member(2, "no", Some(2)),
            member(3, "yes", Some(2)),
        ];
        let facts = vec![
            fact(0, Some(1), Some(100.0), (2020, 1, 1)),
            fact(1, Some(1), None, (2020, 1, 2)),
            fact(2, Some(2), Some(10.555), (2020, 2, 1)),
            fact(3, Some(2), None, (2020, 2, 2)),
        ];

        let summary = region_smoker_summary(&facts, &members, &regions());
        assert_eq!(
            summary,
            vec![
                RegionSmokerSummary {
                    region: Some("northeast".into()),
                    smoker: Some("yes".into()),
                    claim_count: 2,
                    total_charges: Some(100.0),
                    avg_charges: Some(100.0),
                },
                RegionSmokerSummary {
                    region: Some("southeast".into()),
                    smoker: Some("no".into()),
                    claim_count: 1,
                    total_charges: Some(round2(10.555)),
                    avg_charges: Some(round2(10.555)),
                },
                RegionSmokerSummary {
                    region: Some("southeast".into()),
                    smoker: Some("yes".into()),
                    claim_count: 1,
                    total_charges: None,
                    avg_charges: None,
                },
            ]
        );
    }

    #[test]
    fn null_region_groups_sort_first() {
        let members = vec![member(0, "no", None), member(1, "no", Some(1))];
        let facts = vec![
            fact(0, None, Some(5.0), (2020, 1, 1)),
            fact(1, Some(1), Some(7.0), (2020, 1, 1)),
        ];
        let summary = region_smoker_summary(&facts, &members, &regions());
        assert_eq!(summary[0].region, None);
        assert_eq!(summary[1].region.as_deref(), Some("northeast"));
    }

    #[test]
    fn months_ascending_with_averages() {
        let facts = vec![
            fact(0, None, Some(3.0), (2021, 3, 9)),
            fact(1, None, Some(1.0), (2020, 12, 31)),
            fact(2, None, Some(2.0), (2021, 3, 1)),
            fact(3, None, None, (2021, 3, 2)),
        ];
        let summary = monthly_summary(&facts);
        assert_eq!(
            summary,
            vec![
                MonthlySummary {
                    event_month: "2020-12".into(),
                    claim_count: 1,
                    total_charges: Some(1.0),
                    avg_charges: Some(1.0),
                },
                MonthlySummary {
                    event_month: "2021-03".into(),
                    claim_count: 3,
                    total_charges: Some(5.0),
                    avg_charges: Some(2.5),
                },
            ]
        );
    }
}
