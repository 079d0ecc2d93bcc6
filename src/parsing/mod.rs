/*!
# Parsing module
Contains the logic for reading annotation tables and sample metadata.
*/
/// Loads the per-sample metadata CSV
pub mod metadata;
/// Gzip-aware TSV readers, including the chunked column-projecting reader
pub mod table_reader;
