/*!
# Table schema
Declared field names for the annotation tables and their resolution against a concrete header.
Stages look columns up by name through `TableSchema`; rows can be read into the typed `VariantRow`.
*/
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::data_types::tiers::Tier;
use crate::errors::CohortError;

/// Names of the declared fields in the annotation tables.
/// Every field has a default matching the annotated tier tables, so a JSON override only needs the fields that differ.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct SchemaConfig {
    pub chrom: String,
    pub pos: String,
    pub genomic_change: String,
    pub sample_id: String,
    pub symbol: String,
    pub gene_name: String,
    pub variant_class: String,
    pub consequence: String,
    pub tier: String,
    pub oncogene: String,
    pub tumor_suppressor: String,
    /// Chromosome column in the pass tables
    pub pass_chrom: String,
    /// Position column in the pass tables
    pub pass_pos: String,
    /// Expected width of a pass table row; if None, the width of the pass header is used
    pub pass_column_count: Option<usize>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            chrom: "CHROM".to_string(),
            pos: "POS".to_string(),
            genomic_change: "GENOMIC_CHANGE".to_string(),
            sample_id: "VCF_SAMPLE_ID".to_string(),
            symbol: "SYMBOL".to_string(),
            gene_name: "GENE_NAME".to_string(),
            variant_class: "VARIANT_CLASS".to_string(),
            consequence: "CONSEQUENCE".to_string(),
            tier: "TIER".to_string(),
            oncogene: "ONCOGENE".to_string(),
            tumor_suppressor: "TUMOR_SUPPRESSOR".to_string(),
            pass_chrom: "CHROM".to_string(),
            pass_pos: "POS".to_string(),
            pass_column_count: None,
        }
    }
}

/// Builds the cross-table variant identity, `<chrom>_<pos>`.
/// This is a plain string key, positions are never parsed.
pub fn variant_identity(chrom: &str, pos: &str) -> String {
    format!("{chrom}_{pos}")
}

/// A header resolved against the declared fields; lookups are by name, never by position.
#[derive(Clone, Debug)]
pub struct TableSchema {
    /// The full ordered header
    columns: Vec<String>,
    /// Lookup from column name to index
    index: IndexMap<String, usize>,
    chrom: Option<usize>,
    pos: Option<usize>,
    genomic_change: Option<usize>,
    sample_id: Option<usize>,
    symbol: Option<usize>,
    gene_name: Option<usize>,
    variant_class: Option<usize>,
    consequence: Option<usize>,
    tier: Option<usize>,
}

impl TableSchema {
    /// Resolves a header against the declared field names.
    /// Fields that are absent are allowed here; use `require` when a stage needs one.
    pub fn from_header(columns: Vec<String>, config: &SchemaConfig) -> Self {
        let mut index: IndexMap<String, usize> = IndexMap::with_capacity(columns.len());
        for (i, c) in columns.iter().enumerate() {
            // first occurrence wins on duplicate names
            index.entry(c.clone()).or_insert(i);
        }
        let lookup = |name: &str| index.get(name).copied();
        Self {
            chrom: lookup(&config.chrom),
            pos: lookup(&config.pos),
            genomic_change: lookup(&config.genomic_change),
            sample_id: lookup(&config.sample_id),
            symbol: lookup(&config.symbol),
            gene_name: lookup(&config.gene_name),
            variant_class: lookup(&config.variant_class),
            consequence: lookup(&config.consequence),
            tier: lookup(&config.tier),
            columns,
            index,
        }
    }

    /// Verifies that every listed column is present in this header.
    /// # Errors
    /// * `MissingRequiredColumn` for the first absent column
    pub fn require(&self, names: &[&str], filename: &Path) -> Result<(), CohortError> {
        for &name in names.iter() {
            if !self.index.contains_key(name) {
                return Err(CohortError::MissingRequiredColumn {
                    filename: filename.to_path_buf(),
                    column: name.to_string()
                });
            }
        }
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Converts one record into a typed row.
    /// Returns None if the record is missing the chromosome or position, which are needed for identity.
    pub fn parse_row(&self, record: &csv::StringRecord) -> Option<VariantRow> {
        let get = |opt_i: Option<usize>| opt_i.and_then(|i| record.get(i)).map(|s| s.to_string());
        let chrom = get(self.chrom)?;
        let pos = get(self.pos)?;

        let declared = [
            self.chrom, self.pos, self.genomic_change, self.sample_id, self.symbol,
            self.gene_name, self.variant_class, self.consequence, self.tier
        ];
        let annotations: IndexMap<String, String> = self.columns.iter().enumerate()
            .filter(|(i, _c)| !declared.contains(&Some(*i)))
            .filter_map(|(i, c)| record.get(i).map(|v| (c.clone(), v.to_string())))
            .collect();

        Some(VariantRow {
            chrom,
            pos,
            genomic_change: get(self.genomic_change),
            sample_id: get(self.sample_id),
            symbol: get(self.symbol),
            gene_name: get(self.gene_name),
            variant_class: get(self.variant_class),
            consequence: get(self.consequence),
            tier: get(self.tier).and_then(|t| Tier::from_label(&t)),
            annotations
        })
    }
}

/// One variant-sample observation with the declared fields pulled out by name.
#[derive(Clone, Debug, PartialEq)]
pub struct VariantRow {
    pub chrom: String,
    pub pos: String,
    pub genomic_change: Option<String>,
    pub sample_id: Option<String>,
    pub symbol: Option<String>,
    pub gene_name: Option<String>,
    pub variant_class: Option<String>,
    pub consequence: Option<String>,
    /// None if the column is absent or the label is outside the tier taxonomy
    pub tier: Option<Tier>,
    /// All remaining columns, in header order
    pub annotations: IndexMap<String, String>,
}

impl VariantRow {
    /// Identity used to match this row against the pass tables
    pub fn variant_id(&self) -> String {
        variant_identity(&self.chrom, &self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_parse_row() {
        let config = SchemaConfig::default();
        let schema = TableSchema::from_header(
            header(&["CHROM", "POS", "GENOMIC_CHANGE", "VCF_SAMPLE_ID", "AF_TUMOR", "TIER"]),
            &config
        );
        let record = csv::StringRecord::from(vec!["chr1", "1000", "1:g.1000A>T", "s1", "0.25", "TIER 2"]);
        let row = schema.parse_row(&record).unwrap();
        assert_eq!(row.variant_id(), "chr1_1000");
        assert_eq!(row.genomic_change.as_deref(), Some("1:g.1000A>T"));
        assert_eq!(row.sample_id.as_deref(), Some("s1"));
        assert_eq!(row.symbol, None);
        assert_eq!(row.tier, Some(Tier::Tier2));
        assert_eq!(row.annotations.len(), 1);
        assert_eq!(row.annotations["AF_TUMOR"], "0.25");
    }

    #[test]
    fn test_missing_identity() {
        let schema = TableSchema::from_header(header(&["GENOMIC_CHANGE", "TIER"]), &SchemaConfig::default());
        let record = csv::StringRecord::from(vec!["1:g.1000A>T", "TIER 1"]);
        assert!(schema.parse_row(&record).is_none());
    }

    #[test]
    fn test_require() {
        let schema = TableSchema::from_header(header(&["CHROM", "POS"]), &SchemaConfig::default());
        assert!(schema.require(&["CHROM", "POS"], Path::new("a.tsv")).is_ok());
        let err = schema.require(&["CHROM", "TIER"], Path::new("a.tsv")).unwrap_err();
        assert!(matches!(err, CohortError::MissingRequiredColumn { column, .. } if column == "TIER"));
    }

    #[test]
    fn test_config_json_defaults() {
        let config: SchemaConfig = serde_json::from_str(r#"{"tier": "TIER_LABEL", "pass_column_count": 189}"#).unwrap();
        assert_eq!(config.tier, "TIER_LABEL");
        assert_eq!(config.chrom, "CHROM");
        assert_eq!(config.pass_column_count, Some(189));
    }
}
