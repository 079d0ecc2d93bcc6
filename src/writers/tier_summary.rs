
use log::debug;
use rustc_hash::FxHashSet as HashSet;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use strum::IntoEnumIterator;

use crate::data_types::schema::SchemaConfig;
use crate::data_types::tiers::Tier;
use crate::parsing::table_reader::ChunkedTableReader;
use crate::writers::table_writer::TableWriter;

/// Accumulates the number of distinct variants observed in each tier
#[derive(Default)]
pub struct TierSummaryWriter {
    /// Distinct (tier, genomic change) pairs seen so far
    observed: HashSet<(Tier, String)>,
    /// Rows whose tier label was not recognized
    unknown_tier_rows: u64,
}

/// Contains all the data written to each row of the tier summary
#[derive(Serialize)]
struct TierSummaryRow {
    /// Tier label, e.g. "Tier 1"
    tier: &'static str,
    /// Short description of the tier
    description: &'static str,
    /// Number of distinct variants in the tier
    variants: u64,
}

impl TierSummaryWriter {
    /// Adds one observation; repeated variants within a tier are only counted once
    /// # Arguments
    /// * `tier_label` - raw value of the tier column
    /// * `genomic_change` - variant identity
    pub fn add_observation(&mut self, tier_label: &str, genomic_change: &str) {
        match Tier::from_label(tier_label) {
            Some(tier) => {
                self.observed.insert((tier, genomic_change.to_string()));
            },
            None => {
                debug!("Ignoring unrecognized tier label {tier_label:?}");
                self.unknown_tier_rows += 1;
            }
        }
    }

    /// Loads observations from a combined table
    /// # Arguments
    /// * `filename` - the combined table
    /// * `config` - declared field names
    /// * `chunk_size` - rows per read chunk
    pub fn add_table(&mut self, filename: &Path, config: &SchemaConfig, chunk_size: usize) -> anyhow::Result<()> {
        let columns = vec![config.tier.clone(), config.genomic_change.clone()];
        for chunk in ChunkedTableReader::new(filename, &columns, chunk_size)? {
            for row in chunk?.iter() {
                self.add_observation(&row[0], &row[1]);
            }
        }
        Ok(())
    }

    /// Returns the distinct variant counts per tier, every tier included
    pub fn tier_counts(&self) -> BTreeMap<Tier, u64> {
        let mut counts: BTreeMap<Tier, u64> = Tier::iter().map(|t| (t, 0)).collect();
        for (tier, _gc) in self.observed.iter() {
            *counts.entry(*tier).or_default() += 1;
        }
        counts
    }

    pub fn unknown_tier_rows(&self) -> u64 {
        self.unknown_tier_rows
    }

    /// Will write the summary out to the given file path
    /// # Arguments
    /// * `filename` - the filename for the output (tsv/csv)
    pub fn write_summary(&self, filename: &Path) -> anyhow::Result<()> {
        let mut writer = TableWriter::new(filename)?;
        writer.write_record(["tier", "description", "variants"])?;
        for (tier, count) in self.tier_counts() {
            writer.serialize(&TierSummaryRow {
                tier: tier.column_label(),
                description: tier.description(),
                variants: count
            })?;
        }
        writer.finish()?;
        Ok(())
    }
}
