
/// JSON loading and saving for schema overrides and debug settings
pub mod json_io;
/// Progress bar styling for the parallel reductions
pub mod progress_bar;
