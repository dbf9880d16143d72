// src/dims/date_source.rs

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use sqlx::{
    postgres::PgConnectOptions,
    Column, Connection, Executor, PgConnection, Row,
};
use tracing::{debug, info, instrument, warn};

use crate::config::DateSourceConfig;

/// Normalized names accepted for the key column.
const KEY_COLUMNS: &[&str] = &["datekey"];
/// Normalized names accepted for the date column, in preference order.
const DATE_COLUMNS: &[&str] = &["fulldatealternatekey", "date"];

/// Read `(date_key, full_date)` pairs from the configured PostgreSQL table.
///
/// Returns `Ok(None)` when the table has no recognizable key/date columns or
/// none of its rows cast. Connection and query failures are errors: credentials
/// were supplied, so an unreachable source is not a fallback case.
#[instrument(level = "info", skip(cfg), fields(host = %cfg.host, db = %cfg.database, table = %cfg.table))]
pub async fn fetch_external_dates(cfg: &DateSourceConfig) -> Result<Option<Vec<(i32, NaiveDate)>>> {
    validate_table_ident(&cfg.table)?;

    let opts = PgConnectOptions::new()
        .host(&cfg.host)
        .port(cfg.port)
        .database(&cfg.database)
        .username(&cfg.user)
        .password(&cfg.password);
    let mut conn = PgConnection::connect_with(&opts)
        .await
        .with_context(|| format!("connecting to date source {}:{}", cfg.host, cfg.port))?;

    // 1) locate columns from the statement description, so an empty table still resolves
    let describe = conn
        .describe(&format!("SELECT * FROM {}", cfg.table))
        .await
        .with_context(|| format!("describing `{}`", cfg.table))?;
    let names: Vec<String> = describe
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    let Some((key_idx, date_idx)) = resolve_columns(&names) else {
        warn!(columns = ?names, "date table has no recognizable key/date columns; falling back");
        close(conn).await;
        return Ok(None);
    };
    debug!(
        key = %names[key_idx],
        date = %names[date_idx],
        "resolved date table columns"
    );

    // 2) fetch both columns as text; numeric, float, date and timestamp all render parseably
    let sql = projection_sql(&names[key_idx], &names[date_idx], &cfg.table);
    let rows = sqlx::query(&sql)
        .fetch_all(&mut conn)
        .await
        .with_context(|| format!("querying `{}`", cfg.table))?;
    close(conn).await;

    let raw = rows.iter().map(|row| {
        (
            row.try_get::<Option<String>, _>(0).ok().flatten(),
            row.try_get::<Option<String>, _>(1).ok().flatten(),
        )
    });
    Ok(pairs_from_text(raw))
}

async fn close(conn: PgConnection) {
    if let Err(e) = conn.close().await {
        debug!(error = %e, "closing date source connection");
    }
}

/// Lower-case and drop underscores: `Date_Key` and `DateKey` both become `datekey`.
fn normalize(name: &str) -> String {
    name.trim()
        .chars()
        .filter(|c| *c != '_')
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Indices of the key and date columns, if both can be found.
pub fn resolve_columns(names: &[String]) -> Option<(usize, usize)> {
    let normalized: Vec<String> = names.iter().map(|n| normalize(n)).collect();
    let find = |candidates: &[&str]| {
        candidates
            .iter()
            .find_map(|want| normalized.iter().position(|n| n == want))
    };
    Some((find(KEY_COLUMNS)?, find(DATE_COLUMNS)?))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn projection_sql(key: &str, date: &str, table: &str) -> String {
    format!(
        "SELECT {}::text, {}::text FROM {}",
        quote_ident(key),
        quote_ident(date),
        table
    )
}

/// `schema.table` or `table`, identifier characters only; the name is
/// interpolated into SQL.
fn validate_table_ident(table: &str) -> Result<()> {
    let ok = table.split('.').all(|part| {
        !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    });
    if !ok {
        bail!("date source table `{}` is not a plain identifier", table);
    }
    Ok(())
}

/// Cast text cells, skipping rows where either side fails. `None` when no
/// row survives, so the caller falls back to derived dates.
fn pairs_from_text(
    rows: impl IntoIterator<Item = (Option<String>, Option<String>)>,
) -> Option<Vec<(i32, NaiveDate)>> {
    let mut pairs = Vec::new();
    let mut skipped = 0usize;
    for (key, date) in rows {
        let key = key.as_deref().and_then(parse_key_text);
        let date = date.as_deref().and_then(parse_date_text);
        match (key, date) {
            (Some(key), Some(date)) => pairs.push((key, date)),
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!(skipped, "date rows with uncastable key or date skipped");
    }
    if pairs.is_empty() {
        warn!("date table yielded no usable rows; falling back");
        return None;
    }
    info!(rows = pairs.len(), "external date rows loaded");
    Some(pairs)
}

/// "20200101", "20200101.0" or "2.0200101e7"
fn parse_key_text(s: &str) -> Option<i32> {
    let s = s.trim();
    s.parse::<i32>().ok().or_else(|| {
        s.parse::<f64>()
            .ok()
            .filter(|f| f.fract() == 0.0 && *f >= f64::from(i32::MIN) && *f <= f64::from(i32::MAX))
            .map(|f| f as i32)
    })
}

/// Leading `YYYY-MM-DD`, so timestamps in text form also parse.
fn parse_date_text(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let head = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}
