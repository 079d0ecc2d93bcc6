/*!
# CLI module
Command line interface for the cohort pipeline, one subcommand per stage.
*/

/// The main CLI module that contains the top-level CLI parser and help text
pub mod core;
/// The annotate CLI subcommand
pub mod annotate;
/// The combine CLI subcommand
pub mod combine;
/// The filter CLI subcommand
pub mod filter;
/// The pivot CLI subcommand
pub mod pivot;
/// The tier-summary CLI subcommand
pub mod tier_summary;
