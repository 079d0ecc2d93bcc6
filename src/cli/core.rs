use anyhow::bail;
use clap::{Parser, Subcommand};
use chrono::Datelike;
use lazy_static::lazy_static;
use log::info;
use std::path::Path;

use crate::cli::annotate::AnnotateSettings;
use crate::cli::combine::CombineSettings;
use crate::cli::filter::FilterSettings;
use crate::cli::pivot::PivotSettings;
use crate::cli::tier_summary::TierSummarySettings;
use crate::data_types::schema::SchemaConfig;
use crate::util::json_io::load_json;

lazy_static! {
    /// Stores the full version string we plan to use, which is generated in build.rs
    /// # Examples
    /// * `0.3.1-6bb9635-dirty` - while on a dirty branch
    /// * `0.3.1-6bb9635` - with a fresh commit
    pub static ref FULL_VERSION: String = format!("{}-{}", env!("CARGO_PKG_VERSION"), env!("VERGEN_GIT_DESCRIBE"));

    /// Shared after help string
    pub static ref AFTER_HELP: String = format!("Copyright (C) 2021-{}     cohort_pivot contributors
This program comes with ABSOLUTELY NO WARRANTY; it is intended for
Research Use Only and not for use in diagnostic procedures.", chrono::Utc::now().year());
}

#[derive(Parser)]
#[clap(author,
    version = &**FULL_VERSION,
    about,
    after_help = &**AFTER_HELP)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands
}

/// cohort_pivot, cohort-level tables from per-sample somatic variant annotations.
/// Select a subcommand to see more usage information:
#[derive(Subcommand)]
pub enum Commands {
    /// Combines per-sample tier tables into one table
    Combine(Box<CombineSettings>),
    /// Joins per-sample metadata onto a combined table
    Annotate(Box<AnnotateSettings>),
    /// Filters tier and pass tables by clinical tier
    Filter(Box<FilterSettings>),
    /// Builds a variant or gene pivot from a combined table
    Pivot(Box<PivotSettings>),
    /// Counts distinct variants per clinical tier
    TierSummary(Box<TierSummarySettings>)
}

pub fn get_cli() -> Cli {
    Cli::parse()
}

/// Checks if a file exists and will otherwise exit
/// # Arguments
/// * `filename` - the file path to check for
/// * `label` - the label to use for error messages
pub fn check_required_filename(filename: &Path, label: &str) -> anyhow::Result<()> {
    if !filename.exists() {
        bail!("{} does not exist: \"{}\"", label, filename.display());
    }

    // file exists
    Ok(())
}

/// Checks if a file exists and will otherwise exit
/// # Arguments
/// * `filename` - the file path to check for
/// * `label` - the label to use for error messages
pub fn check_optional_filename(opt_filename: Option<&Path>, label: &str) -> anyhow::Result<()> {
    if let Some(filename) = opt_filename {
        if !filename.exists() {
            bail!("{} does not exist: \"{}\"", label, filename.display());
        }
    }

    // file either was not specified OR it exists
    Ok(())
}

/// Loads the declared field names, or the defaults if no schema file is given
/// # Arguments
/// * `opt_filename` - optional JSON schema override
pub fn load_schema_config(opt_filename: Option<&Path>) -> anyhow::Result<SchemaConfig> {
    match opt_filename {
        Some(filename) => {
            info!("Loading schema from {filename:?}...");
            load_json(filename)
        },
        None => Ok(SchemaConfig::default())
    }
}
