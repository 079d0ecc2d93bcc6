/*!
# Pivots
The catalogue of cohort pivot tables.
Every pivot type is a key layout plus a list of column rules handed to the shared `GroupReducer`; only `gene-simple` adds the metadata totals.

## Example usage
```rust
use cohort_pivot::data_types::schema::SchemaConfig;
use cohort_pivot::pivots::{build_pivot, PivotConfigBuilder, PivotType};
use std::path::Path;

let out_dir = std::env::temp_dir().join(format!("pivot_doc_{}", std::process::id()));
std::fs::create_dir_all(&out_dir).unwrap();
let out_fn = out_dir.join(PivotType::Variant.output_filename());

let config = PivotConfigBuilder::default()
    .pivot_type(PivotType::Variant)
    .threads(2)
    .build().unwrap();
let summary = build_pivot(Path::new("test_data/pivot/combined.tsv"), &out_fn, &config, &SchemaConfig::default()).unwrap();
assert_eq!(summary.groups, 5);
std::fs::remove_dir_all(&out_dir).unwrap();
```
*/
use derive_builder::Builder;
use log::{debug, info, warn};
use serde::Serialize;
use std::path::Path;
use strum_macros::EnumString;

use crate::data_types::schema::SchemaConfig;
use crate::errors::CohortError;
use crate::group_reducer::{Aggregation, ColumnRule, GroupReducer};
use crate::metadata_aggregator::{MetadataAggregator, DEFAULT_CATEGORY_COLUMN};
use crate::metadata_joiner::is_no_metadata;
use crate::parsing::table_reader::{load_projected_table, read_header, DEFAULT_CHUNK_SIZE};
use crate::writers::table_writer::TableWriter;

/// Separator for single-valued pivots
pub const LIST_SEPARATOR: &str = ",";
/// Separator for the detailed gene-level pivots
pub const GENE_LIST_SEPARATOR: &str = ";";

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, strum_macros::Display, EnumString, Serialize, clap::ValueEnum)]
pub enum PivotType {
    /// One row per genomic change, listing the samples carrying it
    #[default]
    #[strum(ascii_case_insensitive, serialize = "variant")]
    #[clap(name = "variant")]
    Variant,
    /// One row per gene, variant class, and consequence
    #[strum(ascii_case_insensitive, serialize = "gene")]
    #[clap(name = "gene")]
    Gene,
    /// Like `gene`, with the gene name in the key and oncogene/tumor suppressor flags
    #[strum(ascii_case_insensitive, serialize = "gene-complete")]
    #[clap(name = "gene-complete")]
    GeneComplete,
    /// One row per gene with tier counts and optional metadata totals
    #[strum(ascii_case_insensitive, serialize = "gene-simple")]
    #[clap(name = "gene-simple")]
    GeneSimple,
}

impl PivotType {
    /// Well-known output file name for this pivot
    pub fn output_filename(&self) -> String {
        format!("pivot_{}.tsv", self.to_string().replace('-', "_"))
    }

    fn separator(&self) -> &'static str {
        match self {
            PivotType::Variant |
            PivotType::Gene => LIST_SEPARATOR,
            PivotType::GeneComplete |
            PivotType::GeneSimple => GENE_LIST_SEPARATOR,
        }
    }

    /// Grouping columns for this pivot
    pub fn key_columns(&self, config: &SchemaConfig) -> Vec<String> {
        match self {
            PivotType::Variant => vec![config.genomic_change.clone()],
            PivotType::Gene => vec![config.symbol.clone(), config.variant_class.clone(), config.consequence.clone()],
            PivotType::GeneComplete => vec![
                config.symbol.clone(), config.gene_name.clone(), config.variant_class.clone(), config.consequence.clone()
            ],
            PivotType::GeneSimple => vec![config.symbol.clone(), config.gene_name.clone()],
        }
    }

    /// Joined columns that always precede the extras
    pub fn listed_columns(&self, config: &SchemaConfig) -> Vec<String> {
        match self {
            PivotType::Variant => vec![config.sample_id.clone()],
            PivotType::Gene => vec![config.gene_name.clone(), config.sample_id.clone()],
            PivotType::GeneComplete |
            PivotType::GeneSimple => vec![config.oncogene.clone(), config.tumor_suppressor.clone(), config.sample_id.clone()],
        }
    }

    /// Every column the input must provide for this pivot
    pub fn mandatory_columns(&self, config: &SchemaConfig) -> Vec<String> {
        let mut columns = self.key_columns(config);
        columns.extend(self.listed_columns(config));
        if *self != PivotType::Variant {
            columns.push(config.genomic_change.clone());
        }
        if *self == PivotType::GeneSimple {
            columns.push(config.tier.clone());
        }
        columns
    }
}

/// Splits the extra column argument; `false` or an empty value means none
pub fn parse_extra_columns(value: &str) -> Vec<String> {
    if is_no_metadata(value) {
        return vec![];
    }
    value.split(',')
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(|c| c.to_string())
        .collect()
}

/// Controls a single pivot run
#[derive(Builder, Clone, Debug)]
#[builder(default)]
pub struct PivotConfig {
    pivot_type: PivotType,
    /// Additional columns to list per group
    extra_columns: Vec<String>,
    /// Worker pool size for the reduction
    threads: usize,
    /// Categorical metadata column for the `gene-simple` totals
    metadata_category: String,
    /// Rows per read chunk
    chunk_size: usize,
}

impl Default for PivotConfig {
    fn default() -> Self {
        Self {
            pivot_type: PivotType::default(),
            extra_columns: vec![],
            threads: 1,
            metadata_category: DEFAULT_CATEGORY_COLUMN.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE
        }
    }
}

impl PivotConfig {
    pub fn pivot_type(&self) -> PivotType {
        self.pivot_type
    }

    pub fn extra_columns(&self) -> &[String] {
        &self.extra_columns
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn metadata_category(&self) -> &str {
        &self.metadata_category
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

/// Outcome of a pivot run
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PivotSummary {
    /// Input data rows
    pub input_rows: usize,
    /// Output summary rows, one per group
    pub groups: usize,
    /// Extra columns that were requested but skipped
    pub skipped_extra_columns: Vec<String>,
    /// True if the metadata totals were appended
    pub metadata_totals: bool,
}

/// Resolves the requested extras against the table header.
/// Returns the usable extras and the skipped ones; absent columns are logged and skipped.
fn resolve_extra_columns(requested: &[String], header: &[String], mandatory: &[String]) -> (Vec<String>, Vec<String>) {
    let mut usable: Vec<String> = vec![];
    let mut skipped: Vec<String> = vec![];
    for column in requested.iter() {
        if !header.contains(column) {
            let error = CohortError::MissingColumn { column: column.clone() };
            warn!("Skipping extra column: {error}");
            skipped.push(column.clone());
        } else if mandatory.contains(column) || usable.contains(column) {
            debug!("Extra column {column:?} is already part of the pivot");
        } else {
            usable.push(column.clone());
        }
    }
    (usable, skipped)
}

/// Builds the reducer for a pivot type with the resolved extras
fn build_reducer(pivot_type: PivotType, extras: &[String], threads: usize, config: &SchemaConfig) -> GroupReducer {
    let mut rules: Vec<ColumnRule> = pivot_type.listed_columns(config).iter()
        .chain(extras.iter())
        .map(|c| ColumnRule::new(c, Aggregation::DistinctJoin))
        .collect();
    if pivot_type != PivotType::Variant {
        rules.push(ColumnRule::new(&config.genomic_change, Aggregation::DistinctCount));
    }
    if pivot_type == PivotType::GeneSimple {
        rules.push(ColumnRule::new(&config.tier, Aggregation::TierCounts));
    }
    GroupReducer::new(pivot_type.key_columns(config), rules, pivot_type.separator(), threads)
}

/// Reads the combined table and writes one pivot.
/// # Arguments
/// * `input` - the combined (optionally metadata-enriched or filtered) table
/// * `output` - destination of the pivot
/// * `pivot_config` - pivot type, extras, threads
/// * `config` - declared field names
/// # Errors
/// * `MissingRequiredColumn` if the input lacks a mandatory column of the pivot
/// * if reading, reducing or writing fails
pub fn build_pivot(input: &Path, output: &Path, pivot_config: &PivotConfig, config: &SchemaConfig) -> anyhow::Result<PivotSummary> {
    let pivot_type = pivot_config.pivot_type();
    let header = read_header(input)?;
    let mandatory = pivot_type.mandatory_columns(config);
    if let Some(missing) = mandatory.iter().find(|c| !header.contains(c)) {
        return Err(CohortError::MissingRequiredColumn {
            filename: input.to_path_buf(),
            column: missing.clone()
        }.into());
    }

    let (extras, skipped_extra_columns) = resolve_extra_columns(pivot_config.extra_columns(), &header, &mandatory);
    let reducer = build_reducer(pivot_type, &extras, pivot_config.threads(), config);

    let aggregator = if pivot_type == PivotType::GeneSimple {
        MetadataAggregator::from_table(input, &config.sample_id, pivot_config.metadata_category(), pivot_config.chunk_size())?
    } else {
        None
    };

    info!("Loading {} columns from {input:?}...", reducer.required_columns().len());
    let table = load_projected_table(input, &reducer.required_columns(), pivot_config.chunk_size())?;
    info!("Reducing {} rows into the {pivot_type} pivot...", table.len());
    let rows = reducer.reduce(&table, aggregator.as_ref())?;

    let mut writer = TableWriter::new(output)?;
    writer.write_record(reducer.output_header(aggregator.as_ref()))?;
    for row in rows.iter() {
        writer.write_record(row)?;
    }
    writer.finish()?;
    info!("Wrote {} groups to {output:?}", rows.len());

    Ok(PivotSummary {
        input_rows: table.len(),
        groups: rows.len(),
        skipped_extra_columns,
        metadata_totals: aggregator.is_some()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::str::FromStr;

    fn fixture() -> PathBuf {
        PathBuf::from("test_data/pivot/combined.tsv")
    }

    fn run_pivot(pivot_type: PivotType, extras: &[&str], threads: usize) -> (PivotSummary, Vec<Vec<String>>) {
        let tmp_dir = tempfile::tempdir().unwrap();
        let out_fn = tmp_dir.path().join(pivot_type.output_filename());
        let config = PivotConfigBuilder::default()
            .pivot_type(pivot_type)
            .extra_columns(extras.iter().map(|e| e.to_string()).collect())
            .threads(threads)
            .build().unwrap();
        let summary = build_pivot(&fixture(), &out_fn, &config, &SchemaConfig::default()).unwrap();
        let contents = std::fs::read_to_string(&out_fn).unwrap();
        let lines = contents.lines()
            .map(|l| l.split('\t').map(|v| v.to_string()).collect())
            .collect();
        (summary, lines)
    }

    #[test]
    fn test_pivot_type() {
        assert_eq!(PivotType::from_str("gene-complete").unwrap(), PivotType::GeneComplete);
        assert_eq!(PivotType::GeneSimple.output_filename(), "pivot_gene_simple.tsv");
        assert_eq!(PivotType::Variant.output_filename(), "pivot_variant.tsv");
    }

    #[test]
    fn test_parse_extra_columns() {
        assert!(parse_extra_columns("false").is_empty());
        assert!(parse_extra_columns("").is_empty());
        assert_eq!(parse_extra_columns("AF_TUMOR, CONSEQUENCE"), vec!["AF_TUMOR".to_string(), "CONSEQUENCE".to_string()]);
    }

    #[test]
    fn test_variant_pivot() {
        let (summary, lines) = run_pivot(PivotType::Variant, &[], 2);
        assert_eq!(summary.input_rows, 7);
        assert_eq!(summary.groups, 5);
        assert!(!summary.metadata_totals);
        assert_eq!(lines[0], vec!["Genomic change", "Vcf sample id"]);
        assert_eq!(lines[1], vec!["g1", "s1,s2"]);
        assert_eq!(lines[3], vec!["g3", "s3,s1"]);
    }

    #[test]
    fn test_gene_pivot() {
        let (summary, lines) = run_pivot(PivotType::Gene, &[], 3);
        assert_eq!(summary.groups, 5);
        assert_eq!(lines[0], vec![
            "Symbol", "Variant class", "Consequence", "Gene name", "Vcf sample id", "Number of variants"
        ]);
        assert_eq!(lines[2], vec!["KRAS", "SNV", "missense_variant", "KRAS proto-oncogene", "s3,s1", "1"]);
    }

    #[test]
    fn test_gene_complete_pivot() {
        let (summary, lines) = run_pivot(PivotType::GeneComplete, &["AF_TUMOR"], 2);
        assert_eq!(summary.groups, 5);
        assert_eq!(lines[0], vec![
            "Symbol", "Gene name", "Variant class", "Consequence",
            "Oncogene", "Tumor suppressor", "Vcf sample id", "Af tumor", "Number of variants"
        ]);
        assert_eq!(lines[4], vec![
            "TP53", "tumor protein p53", "SNV", "missense_variant", "False", "True", "s1;s2", "0.30;0.40", "1"
        ]);
    }

    #[test]
    fn test_gene_simple_pivot() {
        let (summary, lines) = run_pivot(PivotType::GeneSimple, &[], 4);
        assert_eq!(summary.groups, 3);
        assert!(summary.metadata_totals);
        assert_eq!(lines[0], vec![
            "Symbol", "Gene name", "Oncogene", "Tumor suppressor", "Vcf sample id", "Number of variants",
            "Tier 1", "Tier 2", "Tier 3", "Tier 4", "Noncoding",
            "Number breast", "Percentage breast", "Number lung", "Percentage lung"
        ]);
        assert_eq!(lines[1], vec![
            "BRCA2", "BRCA2 DNA repair associated", "False", "True", "s4", "1",
            "0", "0", "0", "0", "1", "0", "0.00", "0", "0.00"
        ]);
        assert_eq!(lines[2], vec![
            "KRAS", "KRAS proto-oncogene", "True", "False", "s3;s1;s2", "2",
            "2", "0", "1", "0", "0", "1", "100.00", "2", "100.00"
        ]);
        assert_eq!(lines[3], vec![
            "TP53", "tumor protein p53", "False", "True", "s1;s2", "2",
            "2", "1", "0", "0", "0", "1", "100.00", "1", "50.00"
        ]);
    }

    #[test]
    fn test_unknown_extra_column_skipped() {
        let (summary, lines) = run_pivot(PivotType::Variant, &["NOT_A_COLUMN", "VCF_SAMPLE_ID", "AF_TUMOR"], 1);
        assert_eq!(summary.skipped_extra_columns, vec!["NOT_A_COLUMN".to_string()]);
        assert_eq!(lines[0], vec!["Genomic change", "Vcf sample id", "Af tumor"]);
        assert_eq!(lines[1], vec!["g1", "s1,s2", "0.30,0.40"]);
    }

    #[test]
    fn test_missing_mandatory_column() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let out_fn = tmp_dir.path().join("pivot_gene.tsv");
        let config = PivotConfigBuilder::default()
            .pivot_type(PivotType::Gene)
            .build().unwrap();
        let err = build_pivot(
            Path::new("test_data/tables/sample_a.snvs_indels.tiers.tsv"), &out_fn, &config, &SchemaConfig::default()
        ).unwrap_err();
        assert!(matches!(err.downcast_ref::<CohortError>(), Some(CohortError::MissingRequiredColumn { .. })));
        assert!(!out_fn.exists());
    }
}
