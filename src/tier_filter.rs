/*!
# Tier filter
Keeps the rows of the tier tables whose clinical tier is admitted by a tier level, and remembers the identities of the kept variants.
The pass tables, which use a different column layout, are then filtered down to the admitted identities.
Identity is `<chrom>_<pos>` built from the declared chromosome and position columns of each layout.
*/
use anyhow::{bail, Context};
use log::{debug, info, warn};
use rustc_hash::FxHashSet as HashSet;
use std::path::{Path, PathBuf};

use crate::data_types::schema::{variant_identity, SchemaConfig, TableSchema};
use crate::data_types::tiers::TierLevel;
use crate::errors::CohortError;
use crate::parsing::table_reader::tsv_reader;
use crate::schema_union::validate_headers;
use crate::writers::table_writer::TableWriter;

/// File name suffix of the per-sample tier tables
pub const TIER_TABLE_SUFFIX: &str = ".tiers.tsv";
/// File name suffixes of the per-sample pass tables
pub const PASS_TABLE_SUFFIXES: [&str; 2] = ["pass.tsv.gz", "pass.tsv"];

/// Splits a mixed list of inputs into (tier tables, pass tables, unrecognized), preserving order
pub fn classify_inputs(inputs: &[PathBuf]) -> (Vec<PathBuf>, Vec<PathBuf>, Vec<PathBuf>) {
    let mut tier_tables = vec![];
    let mut pass_tables = vec![];
    let mut unrecognized = vec![];
    for filename in inputs.iter() {
        let name = filename.file_name().unwrap_or_default().to_string_lossy();
        if name.ends_with(TIER_TABLE_SUFFIX) {
            tier_tables.push(filename.clone());
        } else if PASS_TABLE_SUFFIXES.iter().any(|s| name.ends_with(s)) {
            pass_tables.push(filename.clone());
        } else {
            unrecognized.push(filename.clone());
        }
    }
    (tier_tables, pass_tables, unrecognized)
}

/// Counters reported after filtering
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TierFilterSummary {
    /// Data rows read from the tier tables
    pub tier_rows: u64,
    /// Tier rows written
    pub tier_rows_kept: u64,
    /// Distinct admitted variant identities
    pub admitted_variants: usize,
    /// Data rows read from the pass tables
    pub pass_rows: u64,
    /// Pass rows written
    pub pass_rows_kept: u64,
    /// Pass rows dropped for having the wrong number of columns
    pub malformed_pass_rows: u64,
}

/// The leading lines of a pass table
#[derive(Clone, Debug)]
struct PassHeader {
    /// Optional `#` comment line before the column names
    comment: Option<csv::StringRecord>,
    /// Column names
    columns: csv::StringRecord,
}

impl PassHeader {
    /// Reads the header, leaving the reader on the first data row.
    /// If the first line starts with `#` it is the comment and the second line is always the column names.
    fn read<R: std::io::Read>(reader: &mut csv::Reader<R>, filename: &Path) -> anyhow::Result<Self> {
        let mut first = csv::StringRecord::new();
        if !reader.read_record(&mut first)
            .with_context(|| format!("Error while reading header of {filename:?}:"))? {
            bail!("No header found in {filename:?}, file is empty");
        }
        if !first.get(0).is_some_and(|f| f.starts_with('#')) {
            return Ok(Self {
                comment: None,
                columns: first
            });
        }

        let mut columns = csv::StringRecord::new();
        if !reader.read_record(&mut columns)
            .with_context(|| format!("Error while reading header of {filename:?}:"))? {
            bail!("No header found after the comment line in {filename:?}");
        }
        Ok(Self {
            comment: Some(first),
            columns
        })
    }

    fn from_file(filename: &Path) -> anyhow::Result<Self> {
        let mut reader = tsv_reader(filename)?;
        Self::read(&mut reader, filename)
    }
}

/// Filters tier tables by tier level and pass tables by the admitted identities.
pub struct TierFilter {
    /// The requested tier level
    level: TierLevel,
    /// Declared field names
    config: SchemaConfig,
    /// Identities of every tier row that was kept
    admitted: HashSet<String>,
}

impl TierFilter {
    pub fn new(level: TierLevel, config: SchemaConfig) -> Self {
        Self {
            level,
            config,
            admitted: Default::default()
        }
    }

    pub fn is_admitted(&self, variant_id: &str) -> bool {
        self.admitted.contains(variant_id)
    }

    /// Runs the full filter: every header is checked before either output is created.
    /// The pass output is skipped if there are no pass tables.
    /// # Arguments
    /// * `tier_tables` - the per-sample tier tables
    /// * `pass_tables` - the per-sample pass tables
    /// * `tier_output` - destination of the filtered tier table
    /// * `pass_output` - destination of the filtered pass table
    /// # Errors
    /// * `NoInput` if there are no tier tables
    /// * if headers mismatch between tables of the same kind, or declared columns are absent
    /// * if any file fails to read or write
    pub fn run(
        &mut self,
        tier_tables: &[PathBuf], pass_tables: &[PathBuf],
        tier_output: &Path, pass_output: &Path
    ) -> anyhow::Result<TierFilterSummary> {
        // structural checks first
        let tier_header = validate_headers(tier_tables)?;
        let tier_schema = TableSchema::from_header(tier_header, &self.config);
        tier_schema.require(
            &[self.config.chrom.as_str(), self.config.pos.as_str(), self.config.tier.as_str()],
            &tier_tables[0]
        )?;
        let pass_header = self.validate_pass_headers(pass_tables)?;

        // neither output is moved into place until both streams are complete
        let mut summary = TierFilterSummary::default();
        info!("Filtering {} tier tables at level {} ({:?})...", tier_tables.len(), self.level, self.level.admitted_tiers());
        let mut tier_writer = TableWriter::new(tier_output)?;
        let (tier_rows, tier_rows_kept) = self.filter_tier_tables(tier_tables, &tier_schema, &mut tier_writer)?;
        summary.tier_rows = tier_rows;
        summary.tier_rows_kept = tier_rows_kept;
        summary.admitted_variants = self.admitted.len();

        let pass_writer = match pass_header {
            Some(pass_header) => {
                info!("Filtering {} pass tables against {} admitted variants...", pass_tables.len(), self.admitted.len());
                let mut pass_writer = TableWriter::new(pass_output)?;
                let (pass_rows, pass_rows_kept, malformed) = self.filter_pass_tables(pass_tables, &pass_header, &mut pass_writer)?;
                summary.pass_rows = pass_rows;
                summary.pass_rows_kept = pass_rows_kept;
                summary.malformed_pass_rows = malformed;
                Some(pass_writer)
            },
            None => {
                warn!("No pass tables provided, skipping {pass_output:?}");
                None
            }
        };

        tier_writer.finish()?;
        if let Some(pass_writer) = pass_writer {
            pass_writer.finish()?;
        }
        Ok(summary)
    }

    /// Checks that all pass tables share one header and declare the identity columns.
    /// Returns the header of the first table, or None if there are no pass tables.
    fn validate_pass_headers(&self, pass_tables: &[PathBuf]) -> anyhow::Result<Option<PassHeader>> {
        let Some(first) = pass_tables.first() else {
            return Ok(None);
        };
        let expected = PassHeader::from_file(first)?;
        for column in [&self.config.pass_chrom, &self.config.pass_pos] {
            if !expected.columns.iter().any(|c| c == column.as_str()) {
                return Err(CohortError::MissingRequiredColumn {
                    filename: first.clone(),
                    column: column.clone()
                }.into());
            }
        }

        for filename in pass_tables.iter().skip(1) {
            let found = PassHeader::from_file(filename)?;
            if found.columns.len() != expected.columns.len() {
                return Err(CohortError::SchemaMismatch {
                    filename: filename.clone(),
                    expected: expected.columns.len(),
                    found: found.columns.len()
                }.into());
            }
            if let Some(index) = expected.columns.iter().zip(found.columns.iter()).position(|(e, f)| e != f) {
                return Err(CohortError::ColumnOrderMismatch {
                    filename: filename.clone(),
                    index,
                    expected: expected.columns[index].to_string(),
                    found: found.columns[index].to_string()
                }.into());
            }
        }
        Ok(Some(expected))
    }

    /// Writes the admitted tier rows and records their identities.
    /// Returns (rows read, rows kept).
    fn filter_tier_tables(&mut self, tier_tables: &[PathBuf], schema: &TableSchema, writer: &mut TableWriter) -> anyhow::Result<(u64, u64)> {
        writer.write_record(schema.columns())?;

        let mut rows_read = 0;
        let mut rows_kept = 0;
        for filename in tier_tables.iter() {
            let mut reader = tsv_reader(filename)?;
            let mut record = csv::StringRecord::new();

            // header is shared and already written
            reader.read_record(&mut record)
                .with_context(|| format!("Error while reading {filename:?}:"))?;

            while reader.read_record(&mut record)
                .with_context(|| format!("Error while reading {filename:?}:"))? {
                rows_read += 1;
                let Some(row) = schema.parse_row(&record) else {
                    debug!("{filename:?} line {}: missing chromosome or position, skipping", record.position().map(|p| p.line()).unwrap_or_default());
                    continue;
                };

                if row.tier.is_some_and(|t| self.level.admits(t)) {
                    writer.write_record(&record)?;
                    self.admitted.insert(row.variant_id());
                    rows_kept += 1;
                }
            }
        }

        Ok((rows_read, rows_kept))
    }

    /// Writes the pass rows whose identity was admitted.
    /// Rows with a width other than the expected column count are dropped.
    /// Returns (rows read, rows kept, rows malformed).
    fn filter_pass_tables(&self, pass_tables: &[PathBuf], header: &PassHeader, writer: &mut TableWriter) -> anyhow::Result<(u64, u64, u64)> {
        let chrom_index = header.columns.iter().position(|c| c == self.config.pass_chrom).unwrap_or_default();
        let pos_index = header.columns.iter().position(|c| c == self.config.pass_pos).unwrap_or_default();
        let expected_width = self.config.pass_column_count.unwrap_or(header.columns.len());
        debug!("Pass rows must have {expected_width} columns");

        if let Some(comment) = header.comment.as_ref() {
            writer.write_record(comment)?;
        }
        writer.write_record(&header.columns)?;

        let mut rows_read = 0;
        let mut rows_kept = 0;
        let mut malformed = 0;
        for filename in pass_tables.iter() {
            let mut reader = tsv_reader(filename)?;
            PassHeader::read(&mut reader, filename)?;

            let mut record = csv::StringRecord::new();
            while reader.read_record(&mut record)
                .with_context(|| format!("Error while reading {filename:?}:"))? {
                rows_read += 1;
                if record.len() != expected_width {
                    let line = record.position().map(|p| p.line()).unwrap_or_default();
                    let err = CohortError::MalformedRow { line, expected: expected_width, found: record.len() };
                    debug!("{filename:?}: {err}, dropping");
                    malformed += 1;
                    continue;
                }

                let variant_id = variant_identity(
                    record.get(chrom_index).unwrap_or_default(),
                    record.get(pos_index).unwrap_or_default()
                );
                if self.is_admitted(&variant_id) {
                    writer.write_record(&record)?;
                    rows_kept += 1;
                }
            }
        }

        if malformed > 0 {
            warn!("Dropped {malformed} pass rows without exactly {expected_width} columns");
        }
        Ok((rows_read, rows_kept, malformed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_path(name: &str) -> PathBuf {
        PathBuf::from("test_data/tables").join(name)
    }

    fn tier_inputs() -> Vec<PathBuf> {
        vec![table_path("sample_a.snvs_indels.tiers.tsv"), table_path("sample_b.snvs_indels.tiers.tsv")]
    }

    fn pass_inputs() -> Vec<PathBuf> {
        vec![table_path("sample_a.pass.tsv"), table_path("sample_b.pass.tsv")]
    }

    fn run_level(level: TierLevel, config: SchemaConfig, out_dir: &Path) -> (TierFilterSummary, Vec<String>, Vec<String>) {
        let tier_fn = out_dir.join(format!("tiers_{level}.tsv"));
        let pass_fn = out_dir.join(format!("pass_{level}.tsv"));
        let mut filter = TierFilter::new(level, config);
        let summary = filter.run(&tier_inputs(), &pass_inputs(), &tier_fn, &pass_fn).unwrap();
        let tier_lines = std::fs::read_to_string(&tier_fn).unwrap().lines().map(|l| l.to_string()).collect();
        let pass_lines = std::fs::read_to_string(&pass_fn).unwrap().lines().map(|l| l.to_string()).collect();
        (summary, tier_lines, pass_lines)
    }

    #[test]
    fn test_classify_inputs() {
        let inputs = vec![
            PathBuf::from("a.snvs_indels.tiers.tsv"),
            PathBuf::from("a.pass.tsv.gz"),
            PathBuf::from("b.snvs_indels.tiers.tsv"),
            PathBuf::from("notes.txt"),
        ];
        let (tiers, pass, other) = classify_inputs(&inputs);
        assert_eq!(tiers, vec![inputs[0].clone(), inputs[2].clone()]);
        assert_eq!(pass, vec![inputs[1].clone()]);
        assert_eq!(other, vec![inputs[3].clone()]);
    }

    #[test]
    fn test_tier_1() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let (summary, tier_lines, pass_lines) = run_level(TierLevel::UpToTier1, SchemaConfig::default(), tmp_dir.path());

        assert_eq!(summary.tier_rows, 6);
        assert_eq!(summary.tier_rows_kept, 2);
        assert_eq!(summary.admitted_variants, 1);
        assert_eq!(tier_lines.len(), 3);
        assert!(tier_lines[1..].iter().all(|l| l.ends_with("\tTIER 1")));

        // comment, header, and the single admitted row
        assert_eq!(pass_lines.len(), 3);
        assert!(pass_lines[0].starts_with('#'));
        assert_eq!(pass_lines[1], "CHROM\tPOS\tREF\tALT\tDP_TUMOR");
        assert_eq!(pass_lines[2], "chr1\t1000\tA\tT\t50");
        assert_eq!(summary.malformed_pass_rows, 1);
    }

    #[test]
    fn test_all_tiers() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let (summary, tier_lines, pass_lines) = run_level(TierLevel::All, SchemaConfig::default(), tmp_dir.path());
        assert_eq!(summary.tier_rows_kept, 6);
        assert_eq!(summary.admitted_variants, 5);
        assert_eq!(tier_lines.len(), 7);
        assert_eq!(summary.pass_rows, 7);
        assert_eq!(summary.pass_rows_kept, 5);
        assert_eq!(pass_lines.len(), 7);
        assert!(!pass_lines.iter().any(|l| l.starts_with("chr9")));
    }

    #[test]
    fn test_levels_are_nested() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let levels = [TierLevel::All, TierLevel::UpToTier4, TierLevel::UpToTier3, TierLevel::UpToTier2, TierLevel::UpToTier1];
        let outputs: Vec<Vec<String>> = levels.iter()
            .map(|&level| run_level(level, SchemaConfig::default(), tmp_dir.path()).1)
            .collect();

        let kept: Vec<usize> = outputs.iter().map(|o| o.len() - 1).collect();
        assert_eq!(kept, vec![6, 5, 4, 3, 2]);
        for pair in outputs.windows(2) {
            for line in pair[1].iter() {
                assert!(pair[0].contains(line));
            }
        }
    }

    #[test]
    fn test_configured_pass_width() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let config = SchemaConfig {
            pass_column_count: Some(4),
            ..Default::default()
        };
        let (summary, _tier_lines, pass_lines) = run_level(TierLevel::All, config, tmp_dir.path());
        assert_eq!(summary.malformed_pass_rows, 6);
        assert_eq!(summary.pass_rows_kept, 1);
        assert_eq!(pass_lines[2], "chr1\t1000\tA\tT");
    }

    #[test]
    fn test_no_pass_tables() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let tier_fn = tmp_dir.path().join("tiers.tsv");
        let pass_fn = tmp_dir.path().join("pass.tsv");
        let mut filter = TierFilter::new(TierLevel::UpToTier2, SchemaConfig::default());
        let summary = filter.run(&tier_inputs(), &[], &tier_fn, &pass_fn).unwrap();
        assert_eq!(summary.tier_rows_kept, 3);
        assert!(filter.is_admitted("chr2_2500"));
        assert!(!filter.is_admitted("chr2_2000"));
        assert!(!pass_fn.exists());
    }

    #[test]
    fn test_failed_pass_table_leaves_no_output() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let broken_fn = tmp_dir.path().join("broken.pass.tsv");
        std::fs::write(&broken_fn, b"CHROM\tPOS\tREF\tALT\tDP_TUMOR\nchr1\t1000\tA\tT\t\xff\xfe\n").unwrap();

        let tier_fn = tmp_dir.path().join("tiers.tsv");
        let pass_fn = tmp_dir.path().join("pass.tsv");
        let pass_tables = vec![table_path("sample_a.pass.tsv"), broken_fn];
        let mut filter = TierFilter::new(TierLevel::All, SchemaConfig::default());
        let result = filter.run(&tier_inputs(), &pass_tables, &tier_fn, &pass_fn);
        assert!(result.is_err());
        assert!(!tier_fn.exists());
        assert!(!pass_fn.exists());
    }

    #[test]
    fn test_pass_header_lines() {
        let tmp_dir = tempfile::tempdir().unwrap();

        // the line after the comment is the header, even if it starts with '#'
        let commented_fn = tmp_dir.path().join("commented.pass.tsv");
        std::fs::write(&commented_fn, "#version=0.9.1\n#CHROM\tPOS\tREF\nchr1\t1000\tA\n").unwrap();
        let header = PassHeader::from_file(&commented_fn).unwrap();
        assert_eq!(header.comment.unwrap().get(0), Some("#version=0.9.1"));
        assert_eq!(header.columns.iter().collect::<Vec<&str>>(), vec!["#CHROM", "POS", "REF"]);

        let plain_fn = tmp_dir.path().join("plain.pass.tsv");
        std::fs::write(&plain_fn, "CHROM\tPOS\tREF\nchr1\t1000\tA\n").unwrap();
        let header = PassHeader::from_file(&plain_fn).unwrap();
        assert!(header.comment.is_none());
        assert_eq!(header.columns.get(0), Some("CHROM"));

        let comment_only_fn = tmp_dir.path().join("comment_only.pass.tsv");
        std::fs::write(&comment_only_fn, "#version=0.9.1\n").unwrap();
        assert!(PassHeader::from_file(&comment_only_fn).is_err());
    }

    #[test]
    fn test_missing_tier_column() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let tier_fn = tmp_dir.path().join("tiers.tsv");
        let pass_fn = tmp_dir.path().join("pass.tsv");
        let config = SchemaConfig {
            tier: "TIER_LABEL".to_string(),
            ..Default::default()
        };
        let mut filter = TierFilter::new(TierLevel::All, config);
        let err = filter.run(&tier_inputs(), &pass_inputs(), &tier_fn, &pass_fn).unwrap_err();
        assert!(matches!(err.downcast_ref::<CohortError>(), Some(CohortError::MissingRequiredColumn { .. })));
        assert!(!tier_fn.exists());
        assert!(!pass_fn.exists());
    }
}
