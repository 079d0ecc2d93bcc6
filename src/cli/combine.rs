
use anyhow::ensure;
use clap::Args;
use log::info;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::core::{check_required_filename, AFTER_HELP, FULL_VERSION};

/// Well-known name of the combined table
pub const COMBINED_FILENAME: &str = "combined.tiers.tsv";

#[derive(Args, Clone, Debug, Default, Serialize)]
#[clap(author, about,
    after_help = &**AFTER_HELP
)]
pub struct CombineSettings {
    #[clap(default_value = "")]
    #[clap(hide = true)]
    cohort_pivot_version: String,

    /// Per-sample tier tables (TSV), combined in the provided order
    #[clap(required = true)]
    #[clap(short = 'i')]
    #[clap(long = "input")]
    #[clap(value_name = "TSV")]
    #[clap(help_heading = Some("Input/Output"))]
    pub input_tables: Vec<PathBuf>,

    /// Output folder
    #[clap(short = 'o')]
    #[clap(long = "output-folder")]
    #[clap(value_name = "DIR")]
    #[clap(default_value = ".")]
    #[clap(help_heading = Some("Input/Output"))]
    pub output_folder: PathBuf,

    /// Optional output debug folder
    #[clap(long = "output-debug")]
    #[clap(value_name = "DIR")]
    #[clap(help_heading = Some("Input/Output"))]
    pub debug_folder: Option<PathBuf>,

    /// Enable verbose output.
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

impl CombineSettings {
    pub fn output_filename(&self) -> PathBuf {
        self.output_folder.join(COMBINED_FILENAME)
    }
}

pub fn check_combine_settings(mut settings: CombineSettings) -> anyhow::Result<CombineSettings> {
    // hard code the version in
    settings.cohort_pivot_version = FULL_VERSION.clone();
    info!("cohort_pivot version: {:?}", &settings.cohort_pivot_version);
    info!("Sub-command: combine");
    info!("Inputs:");

    ensure!(!settings.input_tables.is_empty(), "at least one --input table is required");
    for (i, table_fn) in settings.input_tables.iter().enumerate() {
        check_required_filename(table_fn, format!("Input table #{i}").as_str())?;
        info!("\tInput table #{i}: {table_fn:?}");
    }

    info!("Outputs:");
    info!("\tCombined table: {:?}", settings.output_filename());
    if let Some(debug_folder) = settings.debug_folder.as_ref() {
        info!("\tDebug folder: {debug_folder:?}");
    }

    Ok(settings)
}
