// src/source/reader.rs

use anyhow::{Context, Result};
use arrow::compute::concat_batches;
use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use arrow::record_batch::RecordBatch;
use std::fmt;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};
use url::Url;

const BATCH_SIZE: usize = 8_192;

/// Where the source CSV lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Local(PathBuf),
    Remote(Url),
}

impl SourceLocation {
    /// `http://` and `https://` URLs are fetched; everything else is a path.
    pub fn parse(raw: &str) -> Self {
        match Url::parse(raw.trim()) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Self::Remote(url),
            _ => Self::Local(PathBuf::from(raw.trim())),
        }
    }

    async fn fetch(&self) -> Result<Vec<u8>> {
        match self {
            Self::Local(path) => tokio::fs::read(path)
                .await
                .with_context(|| format!("reading source file {}", path.display())),
            Self::Remote(url) => {
                let resp = reqwest::get(url.clone())
                    .await
                    .with_context(|| format!("requesting {}", url))?
                    .error_for_status()
                    .with_context(|| format!("fetching {}", url))?;
                let body = resp
                    .bytes()
                    .await
                    .with_context(|| format!("reading body of {}", url))?;
                Ok(body.to_vec())
            }
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => write!(f, "{}", url),
        }
    }
}

/// Load the whole source into one batch with an inferred schema.
#[instrument(level = "info", skip(raw), fields(source = %raw))]
pub async fn read_source(raw: &str) -> Result<RecordBatch> {
    let start = Instant::now();
    let location = SourceLocation::parse(raw);
    let bytes = location.fetch().await?;
    debug!(bytes = bytes.len(), "source loaded");

    let batch = parse_csv(&bytes).with_context(|| format!("parsing CSV from {}", location))?;
    info!(
        rows = batch.num_rows(),
        columns = batch.num_columns(),
        elapsed = ?start.elapsed(),
        "source read"
    );
    Ok(batch)
}

/// Infer column types over every record, then decode with that schema.
/// Scanning the full file keeps a late non-numeric cell from failing the
/// decode; such a column simply stays Utf8 and is cast defensively later.
pub fn parse_csv(bytes: &[u8]) -> Result<RecordBatch> {
    let format = Format::default().with_header(true);
    let (schema, scanned) = format
        .infer_schema(Cursor::new(bytes), None)
        .context("inferring CSV schema")?;
    let schema = Arc::new(schema);
    debug!(records = scanned, schema = ?schema, "inferred schema");

    let reader = ReaderBuilder::new(schema.clone())
        .with_format(format)
        .with_batch_size(BATCH_SIZE)
        .build(Cursor::new(bytes))
        .context("creating CSV reader")?;

    let batches = reader
        .collect::<Result<Vec<_>, _>>()
        .context("decoding CSV records")?;
    concat_batches(&schema, &batches).context("concatenating CSV batches")
}
