// src/source/record.rs

use anyhow::{anyhow, Context, Result};
use arrow::{array::ArrayRef, record_batch::RecordBatch};
use tracing::debug;

use super::cast::{float_values, int_values, string_values};

/// One source row after defensive casting. Immutable once read.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRecord {
    pub age: Option<i64>,
    pub sex: Option<String>,
    pub bmi: Option<f64>,
    pub children: Option<i64>,
    pub smoker: Option<String>,
    pub region: Option<String>,
    pub charges: Option<f64>,
}

/// Header lookup is case-insensitive and ignores surrounding whitespace.
fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    let idx = batch
        .schema()
        .fields()
        .iter()
        .position(|f| f.name().trim().eq_ignore_ascii_case(name))
        .ok_or_else(|| anyhow!("source is missing required column `{}`", name))?;
    Ok(batch.column(idx))
}

/// Project the source batch into typed records, in file order.
pub fn records_from_batch(batch: &RecordBatch) -> Result<Vec<RawRecord>> {
    let ages = int_values(column(batch, "age")?).context("column `age`")?;
    let sexes = string_values(column(batch, "sex")?).context("column `sex`")?;
    let bmis = float_values(column(batch, "bmi")?).context("column `bmi`")?;
    let children = int_values(column(batch, "children")?).context("column `children`")?;
    let smokers = string_values(column(batch, "smoker")?).context("column `smoker`")?;
    let regions = string_values(column(batch, "region")?).context("column `region`")?;
    let charges = float_values(column(batch, "charges")?).context("column `charges`")?;

    let records: Vec<RawRecord> = ages
        .into_iter()
        .zip(sexes)
        .zip(bmis)
        .zip(children)
        .zip(smokers)
        .zip(regions)
        .zip(charges)
        .map(
            |((((((age, sex), bmi), children), smoker), region), charges)| RawRecord {
                age,
                sex,
                bmi,
                children,
                smoker,
                region,
                charges,
            },
        )
        .collect();

    let null_charges = records.iter().filter(|r| r.charges.is_none()).count();
    debug!(
        rows = records.len(),
        null_charges, "projected source records"
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::reader::parse_csv;

    #[test]
    fn projects_with_case_insensitive_headers() -> Result<()> {
        let csv = "Age, SEX ,bmi,Children,smoker,Region,Charges\n\
19,female,27.9,0,yes,southwest,16884.924\n\
,male,oops,1,no,,N/A\n";
        let records = records_from_batch(&parse_csv(csv.as_bytes())?)?;
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0],
            RawRecord {
                age: Some(19),
                sex: Some("female".into()),
                bmi: Some(27.9),
                children: Some(0),
                smoker: Some("yes".into()),
                region: Some("southwest".into()),
                charges: Some(16884.924),
            }
        );
        assert_eq!(records[1].age, None);
        assert_eq!(records[1].bmi, None);
        assert_eq!(records[1].region, None);
        assert_eq!(records[1].charges, None);
        Ok(())
    }

    #[test]
    fn missing_column_is_fatal() -> Result<()> {
        let csv = "age,sex,bmi,children,smoker,charges\n19,female,27.9,0,yes,1.0\n";
        let err = records_from_batch(&parse_csv(csv.as_bytes())?).unwrap_err();
        assert!(err.to_string().contains("region"));
        Ok(())
    }
}
