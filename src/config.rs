// src/config.rs

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

/// Default first day of the synthetic calendar.
pub const DEFAULT_CALENDAR_START: (i32, u32, u32) = (2020, 1, 1);
/// Four years, leap day included.
pub const DEFAULT_WINDOW_DAYS: u32 = 1_461;

/// Everything the pipeline reads before it starts. Loaded once, never mutated.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Local path or `http(s)://` URL of the insurance CSV.
    pub source_path: String,
    /// Root directory holding one sub-directory per table.
    pub warehouse_dir: PathBuf,
    pub calendar: CalendarConfig,
    /// Optional external date reference table.
    pub date_source: Option<DateSourceConfig>,
    pub tables: TableNames,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_path: "data/insurance.csv".into(),
            warehouse_dir: PathBuf::from("warehouse"),
            calendar: CalendarConfig::default(),
            date_source: None,
            tables: TableNames::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    pub start_date: NaiveDate,
    pub window_days: u32,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        let (y, m, d) = DEFAULT_CALENDAR_START;
        Self {
            start_date: NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default(),
            window_days: DEFAULT_WINDOW_DAYS,
        }
    }
}

/// Connection details for the PostgreSQL date reference table.
#[derive(Debug, Clone, Deserialize)]
pub struct DateSourceConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_db_table")]
    pub table: String,
}

fn default_db_port() -> u16 {
    5432
}

fn default_db_table() -> String {
    "dim_date".into()
}

impl DateSourceConfig {
    /// Builds a config only when all four credentials are present and non-empty.
    pub fn from_parts(
        host: Option<String>,
        database: Option<String>,
        user: Option<String>,
        password: Option<String>,
    ) -> Option<Self> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Some(Self {
            host: non_empty(host)?,
            port: default_db_port(),
            database: non_empty(database)?,
            user: non_empty(user)?,
            password: non_empty(password)?,
            table: default_db_table(),
        })
    }
}

/// Output table identifiers; each one can be overridden from YAML.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TableNames {
    pub dim_date: String,
    pub dim_member: String,
    pub dim_region: String,
    pub dim_risk_profile: String,
    pub dim_plan: String,
    pub fact: String,
    pub agg_region_smoker: String,
    pub agg_monthly: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            dim_date: "dim_date".into(),
            dim_member: "dim_member".into(),
            dim_region: "dim_region".into(),
            dim_risk_profile: "dim_risk_profile".into(),
            dim_plan: "dim_plan".into(),
            fact: "fact_member_charges".into(),
            agg_region_smoker: "agg_region_smoker_charges".into(),
            agg_monthly: "agg_monthly_charges".into(),
        }
    }
}

impl TableNames {
    /// All eight names in write order.
    pub fn all(&self) -> [&str; 8] {
        [
            &self.dim_region,
            &self.dim_member,
            &self.dim_risk_profile,
            &self.dim_plan,
            &self.dim_date,
            &self.fact,
            &self.agg_region_smoker,
            &self.agg_monthly,
        ]
    }
}

impl PipelineConfig {
    /// Load from `ETL_CONFIG` (YAML) if set, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut cfg = match env::var("ETL_CONFIG") {
            Ok(path) => Self::from_yaml_file(&path)?,
            Err(_) => Self::default(),
        };
        cfg.apply_env(|key| env::var(key).ok())?;
        cfg.validate()?;
        info!(
            source = %cfg.source_path,
            warehouse = %cfg.warehouse_dir.display(),
            external_dates = cfg.date_source.is_some(),
            "configuration loaded"
        );
        Ok(cfg)
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("deserializing pipeline config")
    }

    /// Overlay values from a key lookup (the process environment in production).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SOURCE_PATH") {
            self.source_path = v;
        }
        if let Some(v) = lookup("WAREHOUSE_DIR") {
            self.warehouse_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("CALENDAR_START") {
            self.calendar.start_date = NaiveDate::parse_from_str(v.trim(), "%Y-%m-%d")
                .with_context(|| format!("CALENDAR_START `{}` is not YYYY-MM-DD", v))?;
        }
        if let Some(v) = lookup("CALENDAR_WINDOW_DAYS") {
            self.calendar.window_days = v
                .trim()
                .parse()
                .with_context(|| format!("CALENDAR_WINDOW_DAYS `{}` is not a number", v))?;
        }

        // Env credentials replace the YAML block only when all four are present.
        if let Some(mut ds) = DateSourceConfig::from_parts(
            lookup("DATE_DB_HOST"),
            lookup("DATE_DB_NAME"),
            lookup("DATE_DB_USER"),
            lookup("DATE_DB_PASSWORD"),
        ) {
            if let Some(existing) = &self.date_source {
                ds.port = existing.port;
                ds.table = existing.table.clone();
            }
            self.date_source = Some(ds);
        }
        if let Some(ds) = self.date_source.as_mut() {
            if let Some(v) = lookup("DATE_DB_PORT") {
                ds.port = v
                    .trim()
                    .parse()
                    .with_context(|| format!("DATE_DB_PORT `{}` is not a port", v))?;
            }
            if let Some(v) = lookup("DATE_DB_TABLE") {
                ds.table = v;
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.calendar.window_days == 0 {
            bail!("calendar window_days must be greater than zero");
        }
        if self.source_path.trim().is_empty() {
            bail!("source_path is empty");
        }
        if let Some(empty) = self.tables.all().iter().find(|n| n.trim().is_empty()) {
            bail!("table name `{}` is empty", empty);
        }
        Ok(())
    }

    /// The external date source, if every credential is usable. An incomplete
    /// YAML block disables it the same way missing env vars do.
    pub fn usable_date_source(&self) -> Option<&DateSourceConfig> {
        let ds = self.date_source.as_ref()?;
        let complete = [&ds.host, &ds.database, &ds.user, &ds.password]
            .iter()
            .all(|v| !v.trim().is_empty());
        if !complete {
            debug!("date source credentials incomplete");
            return None;
        }
        Some(ds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_have_no_date_source() {
        let cfg = PipelineConfig::default();
        assert!(cfg.usable_date_source().is_none());
        assert_eq!(cfg.calendar.window_days, 1_461);
        assert_eq!(
            cfg.calendar.start_date,
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
        );
        assert_eq!(cfg.tables.all().len(), 8);
    }

    #[test]
    fn partial_credentials_leave_source_disabled() -> Result<()> {
        let mut cfg = PipelineConfig::default();
        cfg.apply_env(lookup_from(&[
            ("DATE_DB_HOST", "db.local"),
            ("DATE_DB_NAME", "warehouse"),
            ("DATE_DB_USER", "etl"),
        ]))?;
        assert!(cfg.usable_date_source().is_none());
        Ok(())
    }

    #[test]
    fn full_credentials_enable_source() -> Result<()> {
        let mut cfg = PipelineConfig::default();
        cfg.apply_env(lookup_from(&[
            ("DATE_DB_HOST", "db.local"),
            ("DATE_DB_NAME", "warehouse"),
            ("DATE_DB_USER", "etl"),
            ("DATE_DB_PASSWORD", "secret"),
            ("DATE_DB_PORT", "6543"),
            ("CALENDAR_WINDOW_DAYS", "30"),
        ]))?;
        let ds = cfg.usable_date_source().expect("date source");
        assert_eq!(ds.port, 6543);
        assert_eq!(ds.table, "dim_date");
        assert_eq!(cfg.calendar.window_days, 30);
        Ok(())
    }

    #[test]
    fn yaml_overrides_table_names() -> Result<()> {
        let cfg = PipelineConfig::from_yaml_str(
            r#"
source_path: /data/insurance.csv
calendar:
  start_date: 2021-06-01
tables:
  fact: fact_charges
"#,
        )?;
        assert_eq!(cfg.source_path, "/data/insurance.csv");
        assert_eq!(cfg.tables.fact, "fact_charges");
        assert_eq!(cfg.tables.dim_region, "dim_region");
        assert_eq!(cfg.calendar.window_days, 1_461);
        cfg.validate()?;
        Ok(())
    }

    #[test]
    fn yaml_block_without_password_falls_back() -> Result<()> {
        let cfg = PipelineConfig::from_yaml_str(
            r#"
date_source:
  host: db
  database: dw
  user: etl
"#,
        )?;
        assert!(cfg.date_source.is_some());
        assert!(cfg.usable_date_source().is_none());
        cfg.validate()?;
        Ok(())
    }

    #[test]
    fn zero_window_is_rejected() {
        let mut cfg = PipelineConfig::default();
        cfg.calendar.window_days = 0;
        assert!(cfg.validate().is_err());
    }
}
