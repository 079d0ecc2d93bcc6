/*!
# Writers module
Contains the logic for writing the output tables.
*/
/// Delimited table writer that only moves completed outputs into place
pub mod table_writer;
/// Generates the per-tier distinct variant counts
pub mod tier_summary;
