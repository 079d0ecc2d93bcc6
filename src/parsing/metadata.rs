
use anyhow::Context;
use indexmap::IndexMap;
use log::warn;
use std::path::Path;

use crate::errors::CohortError;

/// Prefix added to every metadata column to avoid collisions with variant columns
pub const METADATA_PREFIX: &str = "METADATA_";
/// Value written for missing metadata
pub const MISSING_VALUE: &str = "NA";
/// Default metadata column holding the VCF file name of each sample
pub const DEFAULT_KEY_COLUMN: &str = "vcf";

/// Converts a metadata column name into its output name, e.g. `histological_type` -> `METADATA_HISTOLOGICAL_TYPE`
pub fn metadata_column_name(column: &str) -> String {
    format!("{METADATA_PREFIX}{}", column.trim().to_uppercase())
}

/// Derives the sample identifier from a metadata VCF name by stripping a `.vcf` suffix
pub fn sample_id_from_vcf(vcf_name: &str) -> &str {
    let vcf_name = vcf_name.trim();
    vcf_name.strip_suffix(".vcf").unwrap_or(vcf_name)
}

/// Per-sample metadata records, keyed by sample identifier.
#[derive(Clone, Debug, Default)]
pub struct SampleMetadata {
    /// Prefixed, upper-cased output column names; the key column is not included
    columns: Vec<String>,
    /// Sample ID -> values aligned with `columns`
    records: IndexMap<String, Vec<String>>,
}

impl SampleMetadata {
    /// Loads a comma-delimited metadata file with a header row.
    /// Empty or missing trailing values are stored as `NA`, and the first record wins if a sample appears twice.
    /// # Arguments
    /// * `filename` - the metadata CSV
    /// * `key_column` - the column containing VCF file names, matched case-insensitively
    /// # Errors
    /// * if the file cannot be parsed
    /// * if the key column is absent
    pub fn from_csv(filename: &Path, key_column: &str) -> anyhow::Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(b',')
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(filename)
            .with_context(|| format!("Error while opening {filename:?}:"))?;

        let headers = csv_reader.headers()
            .with_context(|| format!("Error while reading header of {filename:?}:"))?
            .clone();
        let key_index = headers.iter()
            .position(|h| h.eq_ignore_ascii_case(key_column))
            .ok_or_else(|| CohortError::MissingRequiredColumn {
                filename: filename.to_path_buf(),
                column: key_column.to_string()
            })?;

        let value_indices: Vec<usize> = (0..headers.len())
            .filter(|&i| i != key_index)
            .collect();
        let columns: Vec<String> = value_indices.iter()
            .map(|&i| metadata_column_name(&headers[i]))
            .collect();

        let mut records: IndexMap<String, Vec<String>> = Default::default();
        for result in csv_reader.records() {
            let row = result.with_context(|| format!("Error while reading {filename:?}:"))?;
            let sample_id = sample_id_from_vcf(row.get(key_index).unwrap_or_default()).to_string();
            if row.len() > headers.len() {
                warn!("Metadata for sample {sample_id:?} has {} values for {} columns, ignoring the extra values", row.len(), headers.len());
            }
            if records.contains_key(&sample_id) {
                warn!("Duplicate metadata entry for sample {sample_id:?}, keeping the first one");
                continue;
            }

            let values: Vec<String> = value_indices.iter()
                .map(|&i| {
                    match row.get(i) {
                        Some(v) if !v.is_empty() => v.to_string(),
                        _ => MISSING_VALUE.to_string()
                    }
                })
                .collect();
            records.insert(sample_id, values);
        }

        Ok(Self {
            columns,
            records
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn num_samples(&self) -> usize {
        self.records.len()
    }

    /// Returns the metadata values for a sample, aligned with `columns()`
    pub fn get(&self, sample_id: &str) -> Option<&[String]> {
        self.records.get(sample_id).map(|v| v.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_naming() {
        assert_eq!(metadata_column_name("histological_type"), "METADATA_HISTOLOGICAL_TYPE");
        assert_eq!(sample_id_from_vcf("sample_a.vcf"), "sample_a");
        assert_eq!(sample_id_from_vcf("sample_a"), "sample_a");
        assert_eq!(sample_id_from_vcf("sample_a.vcf.gz"), "sample_a.vcf.gz");
    }

    #[test]
    fn test_load_metadata() {
        let metadata = SampleMetadata::from_csv(Path::new("test_data/metadata/metadata.csv"), DEFAULT_KEY_COLUMN).unwrap();
        assert_eq!(metadata.columns(), &["METADATA_HISTOLOGICAL_TYPE".to_string(), "METADATA_AGE".to_string()][..]);
        assert_eq!(metadata.num_samples(), 2);
        assert_eq!(metadata.get("sample_a").unwrap(), &["Lung".to_string(), "61".to_string()][..]);
        assert_eq!(metadata.get("sample_c").unwrap()[0], "Breast");
        assert!(metadata.get("sample_b").is_none());
    }

    #[test]
    fn test_duplicate_sample() {
        let metadata = SampleMetadata::from_csv(Path::new("test_data/metadata/duplicate.csv"), "VCF").unwrap();
        assert_eq!(metadata.num_samples(), 1);
        assert_eq!(metadata.get("sample_a").unwrap()[0], "Lung");
    }

    #[test]
    fn test_ragged_rows() {
        let metadata = SampleMetadata::from_csv(Path::new("test_data/metadata/ragged.csv"), DEFAULT_KEY_COLUMN).unwrap();
        assert_eq!(metadata.num_samples(), 3);
        assert_eq!(metadata.get("sample_c").unwrap(), &["Breast".to_string(), MISSING_VALUE.to_string()][..]);
        assert_eq!(metadata.get("sample_d").unwrap(), &["Lung".to_string(), "70".to_string()][..]);
    }

    #[test]
    fn test_missing_key_column() {
        let result = SampleMetadata::from_csv(Path::new("test_data/metadata/no_key.csv"), DEFAULT_KEY_COLUMN);
        assert!(result.is_err());
    }
}
