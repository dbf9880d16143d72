// src/pipeline.rs

use anyhow::{Context, Result};
use std::{fmt, time::Instant};
use tracing::{info, instrument};

use crate::aggregate::{monthly_summary, region_smoker_summary};
use crate::calendar::SyntheticCalendar;
use crate::config::PipelineConfig;
use crate::dims::{
    build_member_dim, build_region_dim, build_risk_profile_dim, plan_dim, resolve_date_dim,
    DateOrigin,
};
use crate::fact::{build_fact_table, FactInputs};
use crate::source::{read_source, records_from_batch};
use crate::store::{TableStore, WrittenTable};

/// What a completed run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub source_rows: usize,
    pub date_origin: DateOrigin,
    pub tables: Vec<WrittenTable>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Pipeline complete: {} source rows, date dimension {}.",
            self.source_rows, self.date_origin
        )?;
        writeln!(f, "Created {} tables:", self.tables.len())?;
        for table in &self.tables {
            writeln!(f, "  - {}", table)?;
        }
        Ok(())
    }
}

/// Run every step in dependency order, writing each table as soon as it is
/// built. Any error aborts the run; tables already written stay written.
#[instrument(level = "info", skip(config), fields(source = %config.source_path))]
pub async fn run(config: &PipelineConfig) -> Result<RunSummary> {
    let start = Instant::now();
    let names = &config.tables;

    // ─── 1) read + cast source ─────────────────────────────────────────
    let batch = read_source(&config.source_path).await?;
    let records = records_from_batch(&batch).context("projecting source records")?;
    let source_rows = records.len();

    // ─── 2) member ids + synthetic dates, assigned once ────────────────
    let calendar = SyntheticCalendar::from_config(&config.calendar)?;
    let events = calendar.assign(records)?;

    let store = TableStore::new(&config.warehouse_dir)?;
    let mut tables = Vec::with_capacity(8);

    // ─── 3) dimensions ─────────────────────────────────────────────────
    let regions = build_region_dim(&events);
    tables.push(store.write_table(&names.dim_region, &regions)?);

    let members = build_member_dim(&events, &regions);
    tables.push(store.write_table(&names.dim_member, &members)?);

    let risk_profiles = build_risk_profile_dim(&members);
    tables.push(store.write_table(&names.dim_risk_profile, &risk_profiles)?);

    let plans = plan_dim();
    tables.push(store.write_table(&names.dim_plan, &plans)?);

    let (dates, date_origin) = resolve_date_dim(config.usable_date_source(), &events).await?;
    tables.push(store.write_table(&names.dim_date, &dates)?);

    // ─── 4) fact ───────────────────────────────────────────────────────
    let (facts, _orphans) = build_fact_table(&FactInputs {
        events: &events,
        members: &members,
        plans: &plans,
        dates: &dates,
        risk_profiles: &risk_profiles,
    });
    tables.push(store.write_table(&names.fact, &facts)?);

    // ─── 5) aggregates ─────────────────────────────────────────────────
    let by_region = region_smoker_summary(&facts, &members, &regions);
    tables.push(store.write_table(&names.agg_region_smoker, &by_region)?);

    let by_month = monthly_summary(&facts);
    tables.push(store.write_table(&names.agg_monthly, &by_month)?);

    info!(
        tables = tables.len(),
        elapsed = ?start.elapsed(),
        "pipeline complete"
    );
    Ok(RunSummary {
        source_rows,
        date_origin,
        tables,
    })
}
