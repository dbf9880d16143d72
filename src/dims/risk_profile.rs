// src/dims/risk_profile.rs

use arrow::{
    array::{ArrayRef, Int32Array, StringArray},
    datatypes::{DataType, Field, Schema as ArrowSchema},
};
use std::{collections::HashMap, sync::Arc};
use tracing::debug;

use super::dense_rank;
use super::member::MemberRow;
use crate::store::TableRow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskProfileRow {
    pub risk_profile_key: i32,
    pub sex: Option<String>,
    pub smoker: Option<String>,
    pub region_key: Option<i32>,
}

/// One row per distinct (sex, smoker, region_key) observed among members,
/// dense-ranked ascending on the triple with nulls first.
pub fn build_risk_profile_dim(members: &[MemberRow]) -> Vec<RiskProfileRow> {
    let triples = members
        .iter()
        .map(|m| (m.sex.clone(), m.smoker.clone(), m.region_key));
    let rows: Vec<RiskProfileRow> = dense_rank(triples)
        .into_iter()
        .map(|(risk_profile_key, (sex, smoker, region_key))| RiskProfileRow {
            risk_profile_key,
            sex,
            smoker,
            region_key,
        })
        .collect();
    debug!(profiles = rows.len(), "built risk profile dimension");
    rows
}

/// Equi-join index: only fully non-null triples can ever match.
pub fn risk_profile_keys(rows: &[RiskProfileRow]) -> HashMap<(&str, &str, i32), i32> {
    rows.iter()
        .filter_map(|r| {
            Some((
                (r.sex.as_deref()?, r.smoker.as_deref()?, r.region_key?),
                r.risk_profile_key,
            ))
        })
        .collect()
}

impl TableRow for RiskProfileRow {
    fn schema() -> ArrowSchema {
        ArrowSchema::new(vec![
            Field::new("risk_profile_key", DataType::Int32, false),
            Field::new("sex", DataType::Utf8, true),
            Field::new("smoker", DataType::Utf8, true),
            Field::new("region_key", DataType::Int32, true),
        ])
    }

    fn to_arrays(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            Arc::new(Int32Array::from_iter_values(
                rows.iter().map(|r| r.risk_profile_key),
            )),
            Arc::new(rows.iter().map(|r| r.sex.as_deref()).collect::<StringArray>()),
            Arc::new(rows.iter().map(|r| r.smoker.as_deref()).collect::<StringArray>()),
            Arc::new(rows.iter().map(|r| r.region_key).collect::<Int32Array>()),
        ]
    }
}
