/*!
# Schema union
Combines per-sample annotation tables that share one header into a single table.
The header of the first table defines the schema; every other table must present the same ordered columns.
All headers are checked before the output is created, so a mismatch never produces a partial file.
*/
use anyhow::Context;
use log::{debug, info};
use std::path::{Path, PathBuf};

use crate::errors::CohortError;
use crate::parsing::table_reader::{read_header, tsv_reader};
use crate::writers::table_writer::{copy_passthrough, TableWriter};

/// Outcome of a union
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct UnionSummary {
    /// Number of input tables
    pub num_tables: usize,
    /// Number of data rows written; None when the single input was copied without parsing
    pub data_rows: Option<u64>,
}

/// Checks that every table presents the same ordered header as the first one.
/// Returns the shared header.
/// # Arguments
/// * `inputs` - the tables to check, the first one defines the schema
/// # Errors
/// * `NoInput` if the list is empty
/// * `SchemaMismatch` if a table has a different number of columns
/// * `ColumnOrderMismatch` if a table has the same number of columns with different names or order
pub fn validate_headers(inputs: &[PathBuf]) -> anyhow::Result<Vec<String>> {
    let first = inputs.first().ok_or(CohortError::NoInput)?;
    let expected = read_header(first)?;

    for filename in inputs.iter().skip(1) {
        let found = read_header(filename)?;
        if found.len() != expected.len() {
            return Err(CohortError::SchemaMismatch {
                filename: filename.clone(),
                expected: expected.len(),
                found: found.len()
            }.into());
        }

        if let Some(index) = expected.iter().zip(found.iter()).position(|(e, f)| e != f) {
            return Err(CohortError::ColumnOrderMismatch {
                filename: filename.clone(),
                index,
                expected: expected[index].clone(),
                found: found[index].clone()
            }.into());
        }
    }
    Ok(expected)
}

/// Writes the union of all input tables: one header, then every data row in input order.
/// A single input is copied byte-for-byte without parsing.
/// # Arguments
/// * `inputs` - per-sample tables, in output order
/// * `output` - the combined table path
/// # Errors
/// * if the header checks in `validate_headers` fail
/// * if any file cannot be read or the output cannot be written
pub fn combine_tables(inputs: &[PathBuf], output: &Path) -> anyhow::Result<UnionSummary> {
    if inputs.is_empty() {
        return Err(CohortError::NoInput.into());
    }

    if inputs.len() == 1 {
        info!("Single input table, copying {:?} to {output:?}...", inputs[0]);
        copy_passthrough(&inputs[0], output)?;
        return Ok(UnionSummary {
            num_tables: 1,
            data_rows: None
        });
    }

    let header = validate_headers(inputs)?;
    info!("All {} tables share a {}-column header.", inputs.len(), header.len());

    let mut writer = TableWriter::new(output)?;
    writer.write_record(&header)?;

    let mut data_rows: u64 = 0;
    for filename in inputs.iter() {
        let file_rows = append_data_rows(filename, &mut writer)?;
        debug!("{filename:?}: {file_rows} data rows");
        data_rows += file_rows;
    }

    writer.finish()?;
    Ok(UnionSummary {
        num_tables: inputs.len(),
        data_rows: Some(data_rows)
    })
}

/// Copies every row after the header of `filename` into the writer, returns the row count
fn append_data_rows(filename: &Path, writer: &mut TableWriter) -> anyhow::Result<u64> {
    let mut reader = tsv_reader(filename)?;
    let mut record = csv::StringRecord::new();

    // skip the header, already validated
    reader.read_record(&mut record)
        .with_context(|| format!("Error while reading {filename:?}:"))?;

    let mut rows = 0;
    while reader.read_record(&mut record)
        .with_context(|| format!("Error while reading {filename:?}:"))? {
        writer.write_record(&record)?;
        rows += 1;
    }
    Ok(rows)
}
