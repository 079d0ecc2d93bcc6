/*!
# Group reducer
Partitions rows by the distinct values of one or more key columns and reduces every partition to a single summary row.

The partitioning and the parallel reduction are generic (`parallel_group_reduce`), and `GroupReducer` layers the per-column aggregation rules on top.
Each partition is reduced by a pure function of its own rows, so the result set does not depend on the number of worker threads.
Workers finish in any order, so `GroupReducer::reduce` sorts its output by the key columns.

## Example usage
```rust
use cohort_pivot::data_types::table::Table;
use cohort_pivot::group_reducer::{Aggregation, ColumnRule, GroupReducer};

let mut table = Table::new(vec!["GENOMIC_CHANGE".to_string(), "VCF_SAMPLE_ID".to_string()]);
for (gc, sample) in [("g1", "s1"), ("g2", "s1"), ("g1", "s2"), ("g1", "s1")] {
    table.push_row(vec![gc.to_string(), sample.to_string()]);
}

let reducer = GroupReducer::new(
    vec!["GENOMIC_CHANGE".to_string()],
    vec![ColumnRule::new("VCF_SAMPLE_ID", Aggregation::DistinctJoin)],
    ",", 2
);
assert_eq!(reducer.output_header(None), vec!["Genomic change".to_string(), "Vcf sample id".to_string()]);

let rows = reducer.reduce(&table, None).unwrap();
assert_eq!(rows, vec![
    vec!["g1".to_string(), "s1,s2".to_string()],
    vec!["g2".to_string(), "s1".to_string()],
]);
```
*/
use anyhow::Context;
use indexmap::IndexMap;
use indicatif::ParallelProgressIterator;
use itertools::Itertools;
use log::debug;
use rayon::prelude::*;
use std::hash::Hash;
use strum::IntoEnumIterator;

use crate::data_types::table::Table;
use crate::data_types::tiers::Tier;
use crate::errors::CohortError;
use crate::metadata_aggregator::MetadataAggregator;
use crate::util::progress_bar::get_progress_style;

/// Header used for the distinct variant count
pub const NUMBER_OF_VARIANTS: &str = "Number of variants";

/// Converts a column name into a display header: underscores become spaces, the first character is upper-cased and the rest lower-cased.
/// `VCF_SAMPLE_ID` becomes `Vcf sample id`.
pub fn humanize_column(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new()
    }
}

/// Groups items by key, keeping partitions in order of first appearance.
/// Every item lands in exactly one partition.
pub fn partition_by_key<T, K, KF>(items: impl IntoIterator<Item = T>, key_fn: KF) -> IndexMap<K, Vec<T>>
where
    K: Hash + Eq,
    KF: Fn(&T) -> K
{
    let mut partitions: IndexMap<K, Vec<T>> = IndexMap::new();
    for item in items {
        partitions.entry(key_fn(&item)).or_default().push(item);
    }
    partitions
}

/// Partitions the items by key and reduces each partition on a dedicated pool of `threads` workers.
/// The first failing reduction aborts the whole call and its error is returned.
/// Results come back in partition order, which is not guaranteed to be meaningful to the caller.
/// # Arguments
/// * `items` - everything to group
/// * `key_fn` - extracts the grouping key from an item
/// * `reduce_fn` - reduces one partition; must not depend on any other partition
/// * `threads` - size of the worker pool, 0 is treated as 1
pub fn parallel_group_reduce<T, K, R, KF, RF>(
    items: impl IntoIterator<Item = T>, key_fn: KF, reduce_fn: RF, threads: usize
) -> anyhow::Result<Vec<R>>
where
    T: Send,
    K: Hash + Eq + Send,
    R: Send,
    KF: Fn(&T) -> K,
    RF: Fn(&K, &[T]) -> anyhow::Result<R> + Sync
{
    let partitions: Vec<(K, Vec<T>)> = partition_by_key(items, key_fn).into_iter().collect();
    debug!("Reducing {} partitions with {threads} threads", partitions.len());

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .build()
        .context("Error while building reduction thread pool:")?;

    pool.install(|| {
        partitions.into_par_iter()
            .map(|(key, group)| reduce_fn(&key, group.as_slice()))
            .progress_with_style(get_progress_style())
            .collect::<anyhow::Result<Vec<R>>>()
    })
}

/// How a column is collapsed across the rows of a partition
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Aggregation {
    /// Distinct values in order of first appearance, joined with the reducer separator
    DistinctJoin,
    /// Number of distinct values
    DistinctCount,
    /// Occurrences of each tier label; expands into one output column per tier
    TierCounts,
}

/// One source column and the way it is aggregated
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ColumnRule {
    /// Source column name
    column: String,
    /// Output header; unused for `TierCounts`, which emits one header per tier
    header: String,
    aggregation: Aggregation,
}

impl ColumnRule {
    /// Creates a rule with the default header for the aggregation
    pub fn new(column: &str, aggregation: Aggregation) -> Self {
        let header = match aggregation {
            Aggregation::DistinctCount => NUMBER_OF_VARIANTS.to_string(),
            Aggregation::DistinctJoin |
            Aggregation::TierCounts => humanize_column(column),
        };
        Self {
            column: column.to_string(),
            header,
            aggregation
        }
    }

    /// The headers this rule contributes to the output
    pub fn output_headers(&self) -> Vec<String> {
        match self.aggregation {
            Aggregation::DistinctJoin |
            Aggregation::DistinctCount => vec![self.header.clone()],
            Aggregation::TierCounts => Tier::iter().map(|t| t.column_label().to_string()).collect(),
        }
    }

    /// Aggregates the values of this column in one partition
    fn aggregate<'a>(&self, values: impl Iterator<Item = &'a str>, separator: &str) -> Vec<String> {
        match self.aggregation {
            Aggregation::DistinctJoin => vec![values.unique().join(separator)],
            Aggregation::DistinctCount => vec![values.unique().count().to_string()],
            Aggregation::TierCounts => {
                let mut counts: IndexMap<Tier, u64> = Tier::iter().map(|t| (t, 0)).collect();
                for tier in values.filter_map(Tier::from_label) {
                    *counts.entry(tier).or_default() += 1;
                }
                counts.values().map(|c| c.to_string()).collect()
            }
        }
    }
}

/// Reduces a table to one row per distinct key using per-column rules.
#[derive(Clone, Debug)]
pub struct GroupReducer {
    /// Grouping columns, in output order
    key_columns: Vec<String>,
    /// Aggregated columns, in output order
    rules: Vec<ColumnRule>,
    /// Joins the distinct values of `DistinctJoin` columns
    separator: String,
    /// Size of the worker pool
    threads: usize,
}

impl GroupReducer {
    pub fn new(key_columns: Vec<String>, rules: Vec<ColumnRule>, separator: &str, threads: usize) -> Self {
        Self {
            key_columns,
            rules,
            separator: separator.to_string(),
            threads
        }
    }

    /// The columns the input must provide: keys first, then rule columns, without duplicates
    pub fn required_columns(&self) -> Vec<String> {
        self.key_columns.iter()
            .chain(self.rules.iter().map(|r| &r.column))
            .unique()
            .cloned()
            .collect()
    }

    /// Output header: humanized keys, the rule headers, then any metadata headers
    pub fn output_header(&self, aggregator: Option<&MetadataAggregator>) -> Vec<String> {
        let mut header: Vec<String> = self.key_columns.iter()
            .map(|k| humanize_column(k))
            .collect();
        for rule in self.rules.iter() {
            header.extend(rule.output_headers());
        }
        if let Some(agg) = aggregator {
            header.extend(agg.headers());
        }
        header
    }

    /// Reduces the table to one row per distinct key, sorted by key.
    /// # Arguments
    /// * `table` - must contain every column from `required_columns()`
    /// * `aggregator` - optional metadata totals appended to each row, looked up by the samples in the partition
    /// # Errors
    /// * `MissingColumn` if the table lacks a required column or the aggregator's sample column
    pub fn reduce(&self, table: &Table, aggregator: Option<&MetadataAggregator>) -> anyhow::Result<Vec<Vec<String>>> {
        let lookup = |name: &str| table.column_index(name)
            .ok_or_else(|| CohortError::MissingColumn { column: name.to_string() });
        let key_indices: Vec<usize> = self.key_columns.iter()
            .map(|k| lookup(k.as_str()))
            .collect::<Result<_, _>>()?;
        let rule_indices: Vec<usize> = self.rules.iter()
            .map(|r| lookup(r.column.as_str()))
            .collect::<Result<_, _>>()?;
        let sample_index: Option<usize> = match aggregator {
            Some(agg) => Some(lookup(agg.sample_column())?),
            None => None
        };

        let rows: Vec<&[String]> = table.rows().iter().map(|r| r.as_slice()).collect();
        let mut summaries = parallel_group_reduce(
            rows,
            |row| key_indices.iter().map(|&i| row[i].clone()).collect::<Vec<String>>(),
            |key, group| {
                let mut summary: Vec<String> = key.clone();
                for (rule, &ci) in self.rules.iter().zip(rule_indices.iter()) {
                    summary.extend(rule.aggregate(group.iter().map(|r| r[ci].as_str()), &self.separator));
                }
                if let (Some(agg), Some(si)) = (aggregator, sample_index) {
                    summary.extend(agg.summarize(group.iter().map(|r| r[si].as_str())));
                }
                Ok(summary)
            },
            self.threads
        )?;

        let num_keys = self.key_columns.len();
        summaries.sort_by(|a, b| a[..num_keys].cmp(&b[..num_keys]));
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    /// 6 rows with 2 distinct genomic changes
    fn six_row_table() -> Table {
        let mut table = Table::new(strings(&["GENOMIC_CHANGE", "VCF_SAMPLE_ID", "SYMBOL", "TIER"]));
        for row in [
            ["g1", "s1", "TP53", "TIER 1"],
            ["g2", "s1", "KRAS", "TIER 2"],
            ["g1", "s2", "TP53", "TIER 1"],
            ["g2", "s3", "KRAS", "TIER 2"],
            ["g1", "s3", "TP53", "TIER 1"],
            ["g1", "s2", "TP53", "TIER 1"],
        ] {
            table.push_row(strings(&row));
        }
        table
    }

    #[test]
    fn test_humanize_column() {
        assert_eq!(humanize_column("VCF_SAMPLE_ID"), "Vcf sample id");
        assert_eq!(humanize_column("SYMBOL"), "Symbol");
        assert_eq!(humanize_column("Number_Lung_Adenocarcinoma"), "Number lung adenocarcinoma");
        assert_eq!(humanize_column(""), "");
    }

    #[test]
    fn test_partition_complete() {
        let items: Vec<u32> = (0..100).collect();
        let partitions = partition_by_key(items.clone(), |v| v % 7);
        assert_eq!(partitions.len(), 7);

        // every item in exactly one partition
        let mut seen: Vec<u32> = partitions.values().flatten().copied().collect();
        seen.sort();
        assert_eq!(seen, items);
        for (key, group) in partitions.iter() {
            assert!(group.iter().all(|v| v % 7 == *key));
        }
    }

    #[test]
    fn test_reduce_by_genomic_change() {
        let reducer = GroupReducer::new(
            strings(&["GENOMIC_CHANGE"]),
            vec![ColumnRule::new("VCF_SAMPLE_ID", Aggregation::DistinctJoin)],
            ",", 2
        );
        let rows = reducer.reduce(&six_row_table(), None).unwrap();
        assert_eq!(rows, vec![
            strings(&["g1", "s1,s2,s3"]),
            strings(&["g2", "s1,s3"]),
        ]);
    }

    #[test]
    fn test_gene_level_rules() {
        let reducer = GroupReducer::new(
            strings(&["SYMBOL"]),
            vec![
                ColumnRule::new("VCF_SAMPLE_ID", Aggregation::DistinctJoin),
                ColumnRule::new("GENOMIC_CHANGE", Aggregation::DistinctCount),
                ColumnRule::new("TIER", Aggregation::TierCounts),
            ],
            ";", 1
        );
        assert_eq!(reducer.output_header(None), strings(&[
            "Symbol", "Vcf sample id", "Number of variants", "Tier 1", "Tier 2", "Tier 3", "Tier 4", "Noncoding"
        ]));
        assert_eq!(reducer.required_columns(), strings(&["SYMBOL", "VCF_SAMPLE_ID", "GENOMIC_CHANGE", "TIER"]));

        let rows = reducer.reduce(&six_row_table(), None).unwrap();
        assert_eq!(rows, vec![
            strings(&["KRAS", "s1;s3", "1", "0", "2", "0", "0", "0"]),
            strings(&["TP53", "s1;s2;s3", "1", "4", "0", "0", "0", "0"]),
        ]);
    }

    #[test]
    fn test_thread_count_independence() {
        let mut table = Table::new(strings(&["KEY", "VALUE"]));
        for i in 0..500 {
            table.push_row(vec![format!("k{}", i % 37), format!("v{}", i % 11)]);
        }
        let build = |threads| GroupReducer::new(
            strings(&["KEY"]),
            vec![ColumnRule::new("VALUE", Aggregation::DistinctJoin)],
            ",", threads
        );

        let single: BTreeSet<Vec<String>> = build(1).reduce(&table, None).unwrap().into_iter().collect();
        let multi: BTreeSet<Vec<String>> = build(4).reduce(&table, None).unwrap().into_iter().collect();
        assert_eq!(single.len(), 37);
        assert_eq!(single, multi);
    }

    #[test]
    fn test_first_error_aborts() {
        let items: Vec<u32> = (0..50).collect();
        let result = parallel_group_reduce(
            items,
            |v| v % 5,
            |key, group| {
                if *key == 3 {
                    anyhow::bail!("partition {key} failed");
                }
                Ok(group.len())
            },
            3
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_column() {
        let reducer = GroupReducer::new(
            strings(&["CONSEQUENCE"]),
            vec![ColumnRule::new("VCF_SAMPLE_ID", Aggregation::DistinctJoin)],
            ",", 1
        );
        let err = reducer.reduce(&six_row_table(), None).unwrap_err();
        assert!(matches!(err.downcast_ref::<CohortError>(), Some(CohortError::MissingColumn { column }) if column == "CONSEQUENCE"));
    }
}
