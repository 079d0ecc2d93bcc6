/*!
# Metadata joiner
Left-joins per-sample metadata onto the combined table using the sample identifier.
Every combined row is kept; rows for samples without metadata get `NA` in each metadata column.
*/
use anyhow::{bail, Context};
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::path::Path;

use crate::data_types::schema::{SchemaConfig, TableSchema};
use crate::parsing::metadata::{SampleMetadata, MISSING_VALUE};
use crate::parsing::table_reader::tsv_reader;
use crate::writers::table_writer::{copy_passthrough, TableWriter};

/// Value given in place of a metadata file when there is none
pub const NO_METADATA_SENTINEL: &str = "false";

/// Returns true if the provided metadata argument means "no metadata"
pub fn is_no_metadata(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value.eq_ignore_ascii_case(NO_METADATA_SENTINEL)
}

/// Outcome of a join
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct JoinSummary {
    /// Data rows written
    pub rows: u64,
    /// Rows that found a metadata record
    pub matched_rows: u64,
    /// Sample identifiers in the combined table without a metadata record
    pub unmatched_samples: BTreeSet<String>,
    /// True if no metadata was given and the table was copied unchanged
    pub passthrough: bool,
}

/// Writes the combined table with the metadata columns appended.
/// With no metadata, the combined table is copied byte-for-byte.
/// # Arguments
/// * `combined` - the combined table
/// * `metadata` - loaded metadata, or None
/// * `output` - destination of the enriched table
/// * `config` - declared field names; the sample identifier is the join key
/// # Errors
/// * if the combined table lacks the sample identifier column
/// * if a metadata column name already exists in the combined table
/// * if any file fails to read or write
pub fn join_metadata(
    combined: &Path, metadata: Option<&SampleMetadata>, output: &Path, config: &SchemaConfig
) -> anyhow::Result<JoinSummary> {
    let Some(metadata) = metadata else {
        info!("No metadata provided, copying {combined:?} to {output:?}...");
        copy_passthrough(combined, output)?;
        return Ok(JoinSummary {
            passthrough: true,
            ..Default::default()
        });
    };

    let mut reader = tsv_reader(combined)?;
    let mut record = csv::StringRecord::new();
    if !reader.read_record(&mut record)
        .with_context(|| format!("Error while reading header of {combined:?}:"))? {
        bail!("No header found in {combined:?}, file is empty");
    }

    let schema = TableSchema::from_header(record.iter().map(|s| s.to_string()).collect(), config);
    schema.require(&[config.sample_id.as_str()], combined)?;
    let sample_index = schema.column_index(&config.sample_id).unwrap_or_default();
    if let Some(collision) = metadata.columns().iter().find(|c| schema.contains(c)) {
        bail!("Metadata column {collision:?} already exists in {combined:?}");
    }

    let mut writer = TableWriter::new(output)?;
    writer.write_record(schema.columns().iter().chain(metadata.columns().iter()))?;

    let missing: Vec<String> = vec![MISSING_VALUE.to_string(); metadata.columns().len()];
    let mut summary = JoinSummary::default();
    while reader.read_record(&mut record)
        .with_context(|| format!("Error while reading {combined:?}:"))? {
        let sample_id = record.get(sample_index).unwrap_or_default();
        let values = match metadata.get(sample_id) {
            Some(values) => {
                summary.matched_rows += 1;
                values
            },
            None => {
                if !summary.unmatched_samples.contains(sample_id) {
                    debug!("No metadata found for sample {sample_id:?}");
                    summary.unmatched_samples.insert(sample_id.to_string());
                }
                missing.as_slice()
            }
        };

        // pad short rows so metadata always lands under its own header
        let width = schema.len();
        let fields = (0..width).map(|i| record.get(i).unwrap_or_default())
            .chain(values.iter().map(|v| v.as_str()));
        writer.write_record(fields)?;
        summary.rows += 1;
    }
    writer.finish()?;

    if !summary.unmatched_samples.is_empty() {
        warn!("{} samples had no metadata and were filled with {MISSING_VALUE}: {:?}", summary.unmatched_samples.len(), summary.unmatched_samples);
    }
    Ok(summary)
}
