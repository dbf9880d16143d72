// src/dims/member.rs

use arrow::{
    array::{ArrayRef, Float64Array, Int32Array, Int64Array, StringArray},
    datatypes::{DataType, Field, Schema as ArrowSchema},
};
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, warn};

use super::region::{region_keys, RegionRow};
use crate::calendar::MemberEvent;
use crate::store::TableRow;

/// One row per source record; acts as a member registry rather than a
/// deduplicated dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberRow {
    pub member_id: i64,
    pub age: Option<i64>,
    pub sex: Option<String>,
    pub bmi: Option<f64>,
    pub children: Option<i64>,
    pub smoker: Option<String>,
    pub region_key: Option<i32>,
}

/// Left-join each member event to the region dimension.
pub fn build_member_dim(events: &[MemberEvent], regions: &[RegionRow]) -> Vec<MemberRow> {
    let keys = region_keys(regions);
    let rows: Vec<MemberRow> = events
        .iter()
        .map(|e| MemberRow {
            member_id: e.member_id,
            age: e.record.age,
            sex: e.record.sex.clone(),
            bmi: e.record.bmi,
            children: e.record.children,
            smoker: e.record.smoker.clone(),
            region_key: e
                .record
                .region
                .as_deref()
                .and_then(|name| keys.get(name).copied()),
        })
        .collect();

    let unmatched = rows.iter().filter(|r| r.region_key.is_none()).count();
    if unmatched > 0 {
        warn!(unmatched, "members without a region key");
    }
    debug!(members = rows.len(), "built member dimension");
    rows
}

/// member_id → member row
pub fn members_by_id(rows: &[MemberRow]) -> HashMap<i64, &MemberRow> {
    rows.iter().map(|m| (m.member_id, m)).collect()
}

impl TableRow for MemberRow {
    fn schema() -> ArrowSchema {
        ArrowSchema::new(vec![
            Field::new("member_id", DataType::Int64, false),
            Field::new("age", DataType::Int64, true),
            Field::new("sex", DataType::Utf8, true),
            Field::new("bmi", DataType::Float64, true),
            Field::new("children", DataType::Int64, true),
            Field::new("smoker", DataType::Utf8, true),
            Field::new("region_key", DataType::Int32, true),
        ])
    }

    fn to_arrays(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.member_id))),
            Arc::new(rows.iter().map(|r| r.age).collect::<Int64Array>()),
            Arc::new(rows.iter().map(|r| r.sex.as_deref()).collect::<StringArray>()),
            Arc::new(rows.iter().map(|r| r.bmi).collect::<Float64Array>()),
            Arc::new(rows.iter().map(|r| r.children).collect::<Int64Array>()),
            Arc::new(rows.iter().map(|r| r.smoker.as_deref()).collect::<StringArray>()),
            Arc::new(rows.iter().map(|r| r.region_key).collect::<Int32Array>()),
        ]
    }
}
