// src/dims/plan.rs

use arrow::{
    array::{ArrayRef, Float64Array, Int32Array, StringArray},
    datatypes::{DataType, Field, Schema as ArrowSchema},
};
use std::sync::Arc;

use crate::store::TableRow;

/// Number of plans; `plan_key` cycles through `1..=PLAN_COUNT`.
pub const PLAN_COUNT: i64 = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct PlanRow {
    pub plan_key: i32,
    pub plan_name: String,
    pub deductible: f64,
    pub copay: f64,
    pub coverage_tier: String,
}

/// Static reference data, not derived from the source.
pub fn plan_dim() -> Vec<PlanRow> {
    [
        (1, "Bronze", 6_000.0, 50.0, "Basic"),
        (2, "Silver", 4_000.0, 35.0, "Standard"),
        (3, "Gold", 2_000.0, 20.0, "Enhanced"),
        (4, "Platinum", 500.0, 10.0, "Premium"),
    ]
    .into_iter()
    .map(|(plan_key, name, deductible, copay, tier)| PlanRow {
        plan_key,
        plan_name: name.to_string(),
        deductible,
        copay,
        coverage_tier: tier.to_string(),
    })
    .collect()
}

/// Synthetic assignment: `(member_id mod 4) + 1`. Not a business rule.
pub fn plan_key_for(member_id: i64) -> i32 {
    (member_id.rem_euclid(PLAN_COUNT) + 1) as i32
}

impl TableRow for PlanRow {
    fn schema() -> ArrowSchema {
        ArrowSchema::new(vec![
            Field::new("plan_key", DataType::Int32, false),
            Field::new("plan_name", DataType::Utf8, false),
            Field::new("deductible", DataType::Float64, false),
            Field::new("copay", DataType::Float64, false),
            Field::new("coverage_tier", DataType::Utf8, false),
        ])
    }

    fn to_arrays(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.plan_key))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| &r.plan_name))),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.deductible))),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.copay))),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| &r.coverage_tier),
            )),
        ]
    }
}
