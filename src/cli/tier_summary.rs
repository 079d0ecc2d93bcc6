
use anyhow::ensure;
use clap::Args;
use log::info;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::core::{check_optional_filename, check_required_filename, AFTER_HELP, FULL_VERSION};

/// Well-known name of the tier summary
pub const TIER_SUMMARY_FILENAME: &str = "tier_summary.tsv";

#[derive(Args, Clone, Debug, Default, Serialize)]
#[clap(author, about,
    after_help = &**AFTER_HELP
)]
pub struct TierSummarySettings {
    #[clap(default_value = "")]
    #[clap(hide = true)]
    cohort_pivot_version: String,

    /// Combined or filtered tier tables (TSV)
    #[clap(required = true)]
    #[clap(short = 'i')]
    #[clap(long = "input")]
    #[clap(value_name = "TSV")]
    #[clap(help_heading = Some("Input/Output"))]
    pub input_tables: Vec<PathBuf>,

    /// Optional schema override (JSON)
    #[clap(long = "schema")]
    #[clap(value_name = "JSON")]
    #[clap(help_heading = Some("Input/Output"))]
    pub schema_fn: Option<PathBuf>,

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

impl TierSummarySettings {
    pub fn output_filename(&self) -> PathBuf {
        self.output_folder.join(TIER_SUMMARY_FILENAME)
    }
}

pub fn check_tier_summary_settings(mut settings: TierSummarySettings) -> anyhow::Result<TierSummarySettings> {
    // hard code the version in
    settings.cohort_pivot_version = FULL_VERSION.clone();
    info!("cohort_pivot version: {:?}", &settings.cohort_pivot_version);
    info!("Sub-command: tier-summary");
    info!("Inputs:");

    ensure!(!settings.input_tables.is_empty(), "at least one --input table is required");
    for (i, table_fn) in settings.input_tables.iter().enumerate() {
        check_required_filename(table_fn, format!("Input table #{i}").as_str())?;
        info!("\tInput table #{i}: {table_fn:?}");
    }
    check_optional_filename(settings.schema_fn.as_deref(), "Schema")?;
    info!("\tSchema: {:?}", &settings.schema_fn);

    info!("Outputs:");
    info!("\tTier summary: {:?}", settings.output_filename());
    if let Some(debug_folder) = settings.debug_folder.as_ref() {
        info!("\tDebug folder: {debug_folder:?}");
    }

    Ok(settings)
}
