
use clap::Args;
use log::info;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::cli::core::{check_optional_filename, check_required_filename, AFTER_HELP, FULL_VERSION};
use crate::metadata_joiner::{is_no_metadata, NO_METADATA_SENTINEL};
use crate::parsing::metadata::DEFAULT_KEY_COLUMN;

/// Well-known name of the metadata-enriched table
pub const ANNOTATED_FILENAME: &str = "combined.metadata.tsv";

#[derive(Args, Clone, Debug, Default, Serialize)]
#[clap(author, about,
    after_help = &**AFTER_HELP
)]
pub struct AnnotateSettings {
    #[clap(default_value = "")]
    #[clap(hide = true)]
    cohort_pivot_version: String,

    /// Combined tier table (TSV)
    #[clap(required = true)]
    #[clap(short = 'c')]
    #[clap(long = "combined")]
    #[clap(value_name = "TSV")]
    #[clap(help_heading = Some("Input/Output"))]
    pub combined_fn: PathBuf,

    /// Sample metadata (CSV), or "false" for none
    #[clap(short = 'm')]
    #[clap(long = "metadata")]
    #[clap(value_name = "CSV")]
    #[clap(default_value = NO_METADATA_SENTINEL)]
    #[clap(help_heading = Some("Input/Output"))]
    pub metadata: String,

    /// Metadata column holding the VCF name of each sample
    #[clap(long = "metadata-key")]
    #[clap(value_name = "COLUMN")]
    #[clap(default_value = DEFAULT_KEY_COLUMN)]
    #[clap(help_heading = Some("Input/Output"))]
    pub metadata_key: String,

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

impl AnnotateSettings {
    /// The metadata file, or None if the sentinel was given
    pub fn metadata_fn(&self) -> Option<&Path> {
        if is_no_metadata(&self.metadata) {
            None
        } else {
            Some(Path::new(&self.metadata))
        }
    }

    pub fn output_filename(&self) -> PathBuf {
        self.output_folder.join(ANNOTATED_FILENAME)
    }
}

pub fn check_annotate_settings(mut settings: AnnotateSettings) -> anyhow::Result<AnnotateSettings> {
    // hard code the version in
    settings.cohort_pivot_version = FULL_VERSION.clone();
    info!("cohort_pivot version: {:?}", &settings.cohort_pivot_version);
    info!("Sub-command: annotate");
    info!("Inputs:");

    check_required_filename(&settings.combined_fn, "Combined table")?;
    info!("\tCombined table: {:?}", &settings.combined_fn);
    check_optional_filename(settings.metadata_fn(), "Metadata")?;
    if let Some(metadata_fn) = settings.metadata_fn() {
        info!("\tMetadata: {metadata_fn:?}");
        info!("\tMetadata key column: {:?}", &settings.metadata_key);
    } else {
        info!("\tMetadata: None");
    }
    check_optional_filename(settings.schema_fn.as_deref(), "Schema")?;
    info!("\tSchema: {:?}", &settings.schema_fn);

    info!("Outputs:");
    info!("\tAnnotated table: {:?}", settings.output_filename());
    if let Some(debug_folder) = settings.debug_folder.as_ref() {
        info!("\tDebug folder: {debug_folder:?}");
    }

    Ok(settings)
}
