/*!
# Metadata aggregator
Counts a categorical metadata field (histological type by default) per sample, then totals those counts over the samples contributing to a summary row.
Each category yields an absolute `Number <category>` column and a `Percentage <category>` column relative to the cohort-wide total for that category.
*/
use log::{debug, info};
use rustc_hash::FxHashMap as HashMap;
use std::collections::BTreeSet;
use std::path::Path;

use crate::group_reducer::humanize_column;
use crate::parsing::metadata::MISSING_VALUE;
use crate::parsing::table_reader::ChunkedTableReader;

/// Default categorical column used for the cohort breakdown
pub const DEFAULT_CATEGORY_COLUMN: &str = "METADATA_HISTOLOGICAL_TYPE";
/// Decimal places written for percentages
pub const PERCENT_PRECISION: usize = 2;

/// Percentage of `count` in `total`, 0 when the total is 0
pub fn percentage(count: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

/// Per-sample category counts with cohort-wide totals.
#[derive(Clone, Debug, Default)]
pub struct MetadataAggregator {
    /// Column holding the sample identifier
    sample_column: String,
    /// Observed categories, sorted
    categories: Vec<String>,
    /// Sample -> counts aligned with `categories`
    sample_counts: HashMap<String, Vec<u64>>,
    /// Cohort-wide totals aligned with `categories`
    totals: Vec<u64>,
}

impl MetadataAggregator {
    /// Builds the per-sample counts from (sample, category) observations.
    /// Duplicate pairs count once, and missing categories (`NA` or empty) are ignored.
    /// # Arguments
    /// * `sample_column` - name of the sample column, used later to look up samples in a partition
    /// * `observations` - (sample, category) pairs
    pub fn from_observations<I, S>(sample_column: &str, observations: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: AsRef<str>
    {
        let distinct: BTreeSet<(String, String)> = observations.into_iter()
            .filter(|(_s, c)| !c.as_ref().is_empty() && c.as_ref() != MISSING_VALUE)
            .map(|(s, c)| (s.as_ref().to_string(), c.as_ref().to_string()))
            .collect();

        let categories: Vec<String> = distinct.iter()
            .map(|(_s, c)| c.clone())
            .collect::<BTreeSet<String>>()
            .into_iter()
            .collect();
        let category_index: HashMap<&str, usize> = categories.iter().enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        let mut sample_counts: HashMap<String, Vec<u64>> = Default::default();
        let mut totals: Vec<u64> = vec![0; categories.len()];
        for (sample, category) in distinct.iter() {
            let ci = category_index[category.as_str()];
            sample_counts.entry(sample.clone())
                .or_insert_with(|| vec![0; categories.len()])[ci] += 1;
            totals[ci] += 1;
        }

        Self {
            sample_column: sample_column.to_string(),
            categories,
            sample_counts,
            totals
        }
    }

    /// Reads the sample and category columns of a table in chunks.
    /// Returns None if the table has no category column, in which case the metadata columns are simply omitted downstream.
    /// # Arguments
    /// * `filename` - the enriched combined table
    /// * `sample_column` - sample identifier column
    /// * `category_column` - categorical metadata column
    /// * `chunk_size` - rows per read chunk
    pub fn from_table(filename: &Path, sample_column: &str, category_column: &str, chunk_size: usize) -> anyhow::Result<Option<Self>> {
        let header = crate::parsing::table_reader::read_header(filename)?;
        if !header.iter().any(|h| h == category_column) {
            info!("No {category_column} column in {filename:?}, metadata totals disabled");
            return Ok(None);
        }

        let columns = vec![sample_column.to_string(), category_column.to_string()];
        let mut observations: Vec<(String, String)> = vec![];
        for chunk in ChunkedTableReader::new(filename, &columns, chunk_size)? {
            for mut row in chunk? {
                let category = row.pop().unwrap_or_default();
                let sample = row.pop().unwrap_or_default();
                observations.push((sample, category));
            }
        }

        let aggregator = Self::from_observations(sample_column, observations);
        debug!("Metadata categories: {:?}, totals: {:?}", aggregator.categories, aggregator.totals);
        if aggregator.is_empty() {
            info!("No {category_column} values found in {filename:?}, metadata totals disabled");
            return Ok(None);
        }
        Ok(Some(aggregator))
    }

    pub fn sample_column(&self) -> &str {
        &self.sample_column
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn totals(&self) -> &[u64] {
        &self.totals
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Output headers, a number and a percentage column per category
    pub fn headers(&self) -> Vec<String> {
        self.categories.iter()
            .flat_map(|c| {
                [
                    humanize_column(&format!("Number_{c}")),
                    humanize_column(&format!("Percentage_{c}"))
                ]
            })
            .collect()
    }

    /// Sums the counts of the given samples; repeated or unknown samples contribute nothing extra.
    pub fn category_counts<'a>(&self, samples: impl Iterator<Item = &'a str>) -> Vec<u64> {
        let distinct: BTreeSet<&str> = samples.collect();
        let mut counts = vec![0; self.categories.len()];
        for sample in distinct {
            if let Some(sample_counts) = self.sample_counts.get(sample) {
                for (total, c) in counts.iter_mut().zip(sample_counts.iter()) {
                    *total += c;
                }
            }
        }
        counts
    }

    /// Output values aligned with `headers()`
    pub fn summarize<'a>(&self, samples: impl Iterator<Item = &'a str>) -> Vec<String> {
        self.category_counts(samples).into_iter()
            .zip(self.totals.iter())
            .flat_map(|(count, &total)| {
                [
                    count.to_string(),
                    format!("{:.*}", PERCENT_PRECISION, percentage(count, total))
                ]
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx_eq::assert_approx_eq;

    fn example() -> MetadataAggregator {
        MetadataAggregator::from_observations("VCF_SAMPLE_ID", [
            ("s1", "Lung"),
            ("s1", "Lung"),
            ("s2", "Breast"),
            ("s3", "Lung"),
            ("s4", "NA"),
        ])
    }

    #[test]
    fn test_percentage() {
        assert_approx_eq!(percentage(1, 3), 100.0 / 3.0);
        assert_approx_eq!(percentage(2, 2), 100.0);
        assert_approx_eq!(percentage(0, 0), 0.0);
    }

    #[test]
    fn test_totals() {
        let aggregator = example();
        assert_eq!(aggregator.categories(), &["Breast".to_string(), "Lung".to_string()][..]);
        assert_eq!(aggregator.totals(), &[1, 2][..]);
        assert_eq!(aggregator.headers(), vec![
            "Number breast".to_string(), "Percentage breast".to_string(),
            "Number lung".to_string(), "Percentage lung".to_string()
        ]);
    }

    #[test]
    fn test_summarize() {
        let aggregator = example();
        assert_eq!(aggregator.category_counts(["s1", "s2", "s1"].into_iter()), vec![1, 1]);
        assert_eq!(aggregator.summarize(["s1", "s2"].into_iter()), vec!["1", "100.00", "1", "50.00"]);
        assert_eq!(aggregator.summarize(["s4", "unknown"].into_iter()), vec!["0", "0.00", "0", "0.00"]);
    }

    #[test]
    fn test_from_table() {
        let aggregator = MetadataAggregator::from_table(
            Path::new("test_data/pivot/combined.tsv"), "VCF_SAMPLE_ID", DEFAULT_CATEGORY_COLUMN, 2
        ).unwrap().unwrap();
        assert_eq!(aggregator.categories(), &["Breast".to_string(), "Lung".to_string()][..]);
        assert_eq!(aggregator.totals(), &[1, 2][..]);
    }

    #[test]
    fn test_from_table_without_category() {
        let aggregator = MetadataAggregator::from_table(
            Path::new("test_data/tables/sample_a.snvs_indels.tiers.tsv"), "VCF_SAMPLE_ID", DEFAULT_CATEGORY_COLUMN, 10
        ).unwrap();
        assert!(aggregator.is_none());
    }
}
