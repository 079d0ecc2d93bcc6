
/// Command line interface functionality
pub mod cli;
/// Contains various shared data types
pub mod data_types;
/// Error taxonomy shared by the pipeline stages
pub mod errors;
/// Generic parallel partition and reduce, plus the per-column aggregation rules
pub mod group_reducer;
/// Per-sample categorical metadata totals for gene-level pivots
pub mod metadata_aggregator;
/// Left join of sample metadata onto the combined table
pub mod metadata_joiner;
/// Tooling for parsing input files into meaningful structs / data
pub mod parsing;
/// The catalogue of pivot tables built on the group reducer
pub mod pivots;
/// Combines per-sample tables that share one header
pub mod schema_union;
/// Tier-level filtering of the tier and pass tables
pub mod tier_filter;
/// Various utility functions that tend to be very generic
pub mod util;
/// All output writers
pub mod writers;
