// src/store/mod.rs

use anyhow::{bail, Context, Result};
use arrow::{
    array::ArrayRef,
    datatypes::Schema as ArrowSchema,
    record_batch::RecordBatch,
};
use glob::glob;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::{
    fmt,
    fs::{self, File},
    io::BufWriter,
    path::PathBuf,
    sync::Arc,
};
use tracing::{debug, info, instrument};

/// Name of the single data file inside every table directory.
pub const PART_FILE: &str = "part-00000.parquet";

/// A row type that can be laid out as one Arrow batch.
pub trait TableRow: Sized {
    /// Arrow schema for this row type
    fn schema() -> ArrowSchema;
    /// Column arrays for `rows`, matching the schema
    fn to_arrays(rows: &[Self]) -> Vec<ArrayRef>;

    fn to_record_batch(rows: &[Self]) -> Result<RecordBatch> {
        RecordBatch::try_new(Arc::new(Self::schema()), Self::to_arrays(rows))
            .context("building record batch")
    }
}

/// A table that has just been written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenTable {
    pub name: String,
    pub rows: usize,
    pub path: PathBuf,
}

impl fmt::Display for WrittenTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} rows) → {}", self.name, self.rows, self.path.display())
    }
}

/// Directory-per-table Parquet store. Every write replaces the whole table.
pub struct TableStore {
    warehouse_dir: PathBuf,
    props: WriterProperties,
}

impl TableStore {
    /// Open the warehouse at `warehouse_dir`, creating the directory if needed.
    pub fn new(warehouse_dir: impl Into<PathBuf>) -> Result<Self> {
        let warehouse_dir = warehouse_dir.into();
        fs::create_dir_all(&warehouse_dir)
            .with_context(|| format!("creating warehouse directory {:?}", &warehouse_dir))?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        Ok(Self {
            warehouse_dir,
            props,
        })
    }

    pub fn table_dir(&self, name: &str) -> PathBuf {
        self.warehouse_dir.join(name)
    }

    /// Lay out `rows` as a batch and overwrite table `name` with it.
    pub fn write_table<R: TableRow>(&self, name: &str, rows: &[R]) -> Result<WrittenTable> {
        let batch = R::to_record_batch(rows).with_context(|| format!("table `{}`", name))?;
        self.write_batch(name, &batch)
    }

    /// Overwrite table `name` with `batch`.
    ///
    /// The batch is written to a hidden staging directory first; the previous
    /// table directory is removed only once the new file is closed, then the
    /// staging directory is renamed into place. No merge with prior contents.
    #[instrument(level = "info", skip(self, batch), fields(rows = batch.num_rows()))]
    pub fn write_batch(&self, name: &str, batch: &RecordBatch) -> Result<WrittenTable> {
        validate_table_name(name)?;

        // 1) fresh staging dir
        let staging = self.warehouse_dir.join(format!(".{}.staging", name));
        if staging.exists() {
            fs::remove_dir_all(&staging)
                .with_context(|| format!("clearing stale staging dir {}", staging.display()))?;
        }
        fs::create_dir_all(&staging)
            .with_context(|| format!("creating staging dir {}", staging.display()))?;

        // 2) write the part file
        let part_path = staging.join(PART_FILE);
        let file = File::create(&part_path)
            .with_context(|| format!("creating {}", part_path.display()))?;
        let mut writer =
            ArrowWriter::try_new(BufWriter::new(file), batch.schema(), Some(self.props.clone()))
                .with_context(|| format!("creating Parquet writer for `{}`", name))?;
        writer
            .write(batch)
            .with_context(|| format!("writing batch for `{}`", name))?;
        writer
            .close()
            .with_context(|| format!("closing Parquet writer for `{}`", name))?;

        // 3) swap it in
        let table_dir = self.table_dir(name);
        if table_dir.exists() {
            debug!(table = name, "replacing previous version");
            fs::remove_dir_all(&table_dir)
                .with_context(|| format!("removing previous {}", table_dir.display()))?;
        }
        fs::rename(&staging, &table_dir).with_context(|| {
            format!(
                "failed to rename `{}` to `{}`",
                staging.display(),
                table_dir.display()
            )
        })?;

        info!(table = name, rows = batch.num_rows(), "table written");
        Ok(WrittenTable {
            name: name.to_string(),
            rows: batch.num_rows(),
            path: table_dir,
        })
    }

    /// Read every Parquet file of table `name`, in file-name order.
    pub fn read_table(&self, name: &str) -> Result<Vec<RecordBatch>> {
        validate_table_name(name)?;
        let pattern = format!("{}/*.parquet", self.table_dir(name).display());
        let mut paths: Vec<PathBuf> = glob(&pattern)
            .with_context(|| format!("invalid glob pattern {}", pattern))?
            .filter_map(Result::ok)
            .collect();
        if paths.is_empty() {
            bail!("table `{}` has no data files", name);
        }
        paths.sort();

        let mut batches = Vec::new();
        for path in paths {
            let file =
                File::open(&path).with_context(|| format!("failed to open `{}`", path.display()))?;
            let reader = ParquetRecordBatchReaderBuilder::try_new(file)
                .with_context(|| format!("reading Parquet metadata of `{}`", path.display()))?
                .build()?;
            for batch in reader {
                batches.push(batch.with_context(|| format!("decoding `{}`", path.display()))?);
            }
        }
        Ok(batches)
    }

    /// Total rows currently stored in table `name`.
    pub fn row_count(&self, name: &str) -> Result<usize> {
        Ok(self.read_table(name)?.iter().map(|b| b.num_rows()).sum())
    }
}

/// Table names become directory names, so keep them to a single safe segment.
fn validate_table_name(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !ok {
        bail!("invalid table name `{}`", name);
    }
    Ok(())
}
