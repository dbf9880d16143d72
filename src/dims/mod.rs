// src/dims/mod.rs
pub mod date;
pub mod date_source;
pub mod member;
pub mod plan;
pub mod region;
pub mod risk_profile;

pub use date::{resolve_date_dim, DateOrigin, DateRow};
pub use member::{build_member_dim, MemberRow};
pub use plan::{plan_dim, plan_key_for, PlanRow};
pub use region::{build_region_dim, RegionRow};
pub use risk_profile::{build_risk_profile_dim, RiskProfileRow};

use std::collections::BTreeSet;

/// Dense rank (1-based) over the distinct values, ascending. `Option`
/// values order `None` first.
pub(crate) fn dense_rank<T: Ord>(values: impl IntoIterator<Item = T>) -> Vec<(i32, T)> {
    values
        .into_iter()
        .collect::<BTreeSet<T>>()
        .into_iter()
        .enumerate()
        .map(|(i, v)| (i as i32 + 1, v))
        .collect()
}
