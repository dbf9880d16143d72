// src/source/cast.rs

use anyhow::{Context, Result};
use arrow::{
    array::{Array, ArrayRef, AsArray, StringArray},
    compute::{cast, cast_with_options, CastOptions},
    datatypes::{DataType, Float64Type, Int64Type},
};
use std::sync::Arc;

/// Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Clean string cells in place; cells that clean to "" become null.
/// Non-string arrays are returned untouched.
fn cleaned(arr: &ArrayRef) -> Result<ArrayRef> {
    match arr.data_type() {
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => {
            let utf8 = cast(arr, &DataType::Utf8).context("casting to Utf8")?;
            let trimmed: StringArray = utf8
                .as_string::<i32>()
                .iter()
                .map(|opt| opt.map(clean_str).filter(|s| !s.is_empty()))
                .collect();
            Ok(Arc::new(trimmed) as ArrayRef)
        }
        _ => Ok(arr.clone()),
    }
}

/// Any column → cleaned strings.
pub fn string_values(arr: &ArrayRef) -> Result<Vec<Option<String>>> {
    let utf8 = cast(arr, &DataType::Utf8).context("casting to Utf8")?;
    Ok(utf8
        .as_string::<i32>()
        .iter()
        .map(|opt| opt.map(clean_str).filter(|s| !s.is_empty()))
        .collect())
}

/// Any column → f64; unparsable cells become null.
pub fn float_values(arr: &ArrayRef) -> Result<Vec<Option<f64>>> {
    let prepared = cleaned(arr)?;
    let floats = cast_with_options(&prepared, &DataType::Float64, &CastOptions::default())
        .context("casting to Float64")?;
    Ok(floats.as_primitive::<Float64Type>().iter().collect())
}

/// Any column → i64 through f64, so "19.0" parses and 19.7 truncates.
pub fn int_values(arr: &ArrayRef) -> Result<Vec<Option<i64>>> {
    let prepared = cleaned(arr)?;
    let ints = match prepared.data_type() {
        DataType::Int64 => prepared,
        _ => {
            let floats =
                cast_with_options(&prepared, &DataType::Float64, &CastOptions::default())
                    .context("casting to Float64")?;
            cast_with_options(&floats, &DataType::Int64, &CastOptions::default())
                .context("casting to Int64")?
        }
    };
    Ok(ints.as_primitive::<Int64Type>().iter().collect())
}
