
use anyhow::ensure;
use clap::Args;
use log::{info, warn};
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::core::{check_optional_filename, check_required_filename, AFTER_HELP, FULL_VERSION};
use crate::data_types::tiers::TierLevel;
use crate::errors::CohortError;
use crate::tier_filter::classify_inputs;

/// Well-known name of the filtered tier table
pub const FILTERED_TIERS_FILENAME: &str = "combined.filtered.snvs_indels.tiers.tsv";
/// Well-known name of the filtered pass table
pub const FILTERED_PASS_FILENAME: &str = "combined.filtered.pass.tsv";

#[derive(Args, Clone, Debug, Default, Serialize)]
#[clap(author, about,
    after_help = &**AFTER_HELP
)]
pub struct FilterSettings {
    #[clap(default_value = "")]
    #[clap(hide = true)]
    cohort_pivot_version: String,

    /// Per-sample tier tables (*.tiers.tsv) and pass tables (*pass.tsv[.gz])
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

    /// Tier level to keep: all, 4, 3, 2, or 1
    #[clap(required = true)]
    #[clap(short = 't')]
    #[clap(long = "tier-level")]
    #[clap(value_name = "LEVEL")]
    #[clap(help_heading = Some("Filter parameters"))]
    pub tier_level: String,

    /// Enable verbose output.
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Tier tables, populated by the settings check
    #[clap(skip)]
    pub tier_tables: Vec<PathBuf>,

    /// Pass tables, populated by the settings check
    #[clap(skip)]
    pub pass_tables: Vec<PathBuf>,
}

impl FilterSettings {
    /// The parsed tier level
    /// # Errors
    /// * `InvalidTierLevel` if the level is not one of the named levels
    pub fn level(&self) -> Result<TierLevel, CohortError> {
        TierLevel::parse(&self.tier_level)
    }

    pub fn tier_output_filename(&self) -> PathBuf {
        self.output_folder.join(FILTERED_TIERS_FILENAME)
    }

    pub fn pass_output_filename(&self) -> PathBuf {
        self.output_folder.join(FILTERED_PASS_FILENAME)
    }
}

pub fn check_filter_settings(mut settings: FilterSettings) -> anyhow::Result<FilterSettings> {
    // hard code the version in
    settings.cohort_pivot_version = FULL_VERSION.clone();
    info!("cohort_pivot version: {:?}", &settings.cohort_pivot_version);
    info!("Sub-command: filter");

    // the level is checked before anything else so a bad value never creates output
    let level = settings.level()?;
    info!("Filter parameters:");
    info!("\tTier level: {level} => {:?}", level.admitted_tiers());

    info!("Inputs:");
    let (tier_tables, pass_tables, unrecognized) = classify_inputs(&settings.input_tables);
    for filename in unrecognized.iter() {
        warn!("\tIgnoring input with unrecognized suffix: {filename:?}");
    }
    ensure!(!tier_tables.is_empty(), CohortError::NoInput);
    for (i, table_fn) in tier_tables.iter().enumerate() {
        check_required_filename(table_fn, format!("Tier table #{i}").as_str())?;
        info!("\tTier table #{i}: {table_fn:?}");
    }
    for (i, table_fn) in pass_tables.iter().enumerate() {
        check_required_filename(table_fn, format!("Pass table #{i}").as_str())?;
        info!("\tPass table #{i}: {table_fn:?}");
    }
    check_optional_filename(settings.schema_fn.as_deref(), "Schema")?;
    info!("\tSchema: {:?}", &settings.schema_fn);
    settings.tier_tables = tier_tables;
    settings.pass_tables = pass_tables;

    info!("Outputs:");
    info!("\tFiltered tier table: {:?}", settings.tier_output_filename());
    info!("\tFiltered pass table: {:?}", settings.pass_output_filename());
    if let Some(debug_folder) = settings.debug_folder.as_ref() {
        info!("\tDebug folder: {debug_folder:?}");
    }

    Ok(settings)
}
