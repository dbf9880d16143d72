// src/dims/region.rs

use arrow::{
    array::{ArrayRef, Int32Array, StringArray},
    datatypes::{DataType, Field, Schema as ArrowSchema},
};
use std::{collections::HashMap, sync::Arc};
use tracing::debug;

use super::dense_rank;
use crate::calendar::MemberEvent;
use crate::store::TableRow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionRow {
    pub region_key: i32,
    pub region: String,
}

/// Distinct non-null region names, keyed by alphabetical dense rank.
pub fn build_region_dim(events: &[MemberEvent]) -> Vec<RegionRow> {
    let rows: Vec<RegionRow> = dense_rank(events.iter().filter_map(|e| e.record.region.clone()))
        .into_iter()
        .map(|(region_key, region)| RegionRow { region_key, region })
        .collect();
    debug!(regions = rows.len(), "built region dimension");
    rows
}

/// region name → region_key
pub fn region_keys(rows: &[RegionRow]) -> HashMap<&str, i32> {
    rows.iter()
        .map(|r| (r.region.as_str(), r.region_key))
        .collect()
}

impl TableRow for RegionRow {
    fn schema() -> ArrowSchema {
        ArrowSchema::new(vec![
            Field::new("region_key", DataType::Int32, false),
            Field::new("region", DataType::Utf8, false),
        ])
    }

    fn to_arrays(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.region_key))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| &r.region))),
        ]
    }
}
