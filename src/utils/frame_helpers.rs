//! DataFrame I/O and column validation helpers
//!
//! Every reference table is read with schema inference disabled, so all columns
//! arrive as strings and numeric casts happen explicitly at the call site.

use crate::error::AnnotateError;
use anyhow::{Context, Result};
use polars::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

/// Read a tab-separated file with a header row, every column as String
///
/// Quote characters are literal text: reference comments such as
/// `"older" name Mucorella` must not start a quoted field.
pub fn read_tsv(path: &Path) -> Result<DataFrame> {
    let parse_options = CsvParseOptions::default()
        .with_separator(b'\t')
        .with_quote_char(None);

    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .with_parse_options(parse_options)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .with_context(|| format!("Failed to create TSV reader: {:?}", path))?
        .finish()
        .with_context(|| format!("Failed to load TSV: {:?}", path))
}

/// Column names of a frame, in order
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect()
}

/// Materialize `columns` from `df` after checking they all exist
///
/// # Errors
/// [`AnnotateError::MissingColumn`] naming the first absent column.
pub fn materialize_with_columns(
    df: &DataFrame,
    columns: &[&str],
    table: &str,
) -> Result<DataFrame> {
    let available = column_names(df);
    let actual: HashSet<&str> = available.iter().map(String::as_str).collect();

    for &expected in columns {
        if !actual.contains(expected) {
            return Err(AnnotateError::MissingColumn {
                table: table.to_string(),
                column: expected.to_string(),
                available,
            }
            .into());
        }
    }

    let col_exprs: Vec<Expr> = columns.iter().map(|&name| col(name)).collect();

    df.clone()
        .lazy()
        .select(&col_exprs)
        .collect()
        .with_context(|| format!("{}: Failed to materialize columns {:?}", table, columns))
}

/// Owned copy of a string column
pub fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let values = df
        .column(name)
        .with_context(|| format!("Column '{}' not found", name))?
        .str()
        .with_context(|| format!("Column '{}' is not string type", name))?
        .into_iter()
        .map(|opt| opt.map(str::to_string))
        .collect();

    Ok(values)
}

/// Write a frame as TSV with header; absent values become empty fields
pub fn write_tsv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file = File::create(path)
        .with_context(|| format!("Failed to create output file: {:?}", path))?;

    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b'\t')
        .finish(df)
        .with_context(|| format!("Failed to write TSV: {:?}", path))
}

/// Write a frame as ZSTD-compressed Parquet
pub fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file: {:?}", path))?;

    ParquetWriter::new(file)
        .with_compression(ParquetCompression::Zstd(None))
        .finish(df)
        .with_context(|| format!("Failed to write Parquet: {:?}", path))?;

    Ok(())
}
