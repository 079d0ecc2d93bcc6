
use anyhow::ensure;
use clap::Args;
use log::info;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::core::{check_optional_filename, check_required_filename, AFTER_HELP, FULL_VERSION};
use crate::metadata_aggregator::DEFAULT_CATEGORY_COLUMN;
use crate::metadata_joiner::NO_METADATA_SENTINEL;
use crate::parsing::table_reader::DEFAULT_CHUNK_SIZE;
use crate::pivots::{parse_extra_columns, PivotType};

#[derive(Args, Clone, Debug, Default, Serialize)]
#[clap(author, about,
    after_help = &**AFTER_HELP
)]
pub struct PivotSettings {
    #[clap(default_value = "")]
    #[clap(hide = true)]
    cohort_pivot_version: String,

    /// Combined table (TSV), optionally with metadata columns
    #[clap(required = true)]
    #[clap(short = 'i')]
    #[clap(long = "input")]
    #[clap(value_name = "TSV")]
    #[clap(help_heading = Some("Input/Output"))]
    pub input_fn: PathBuf,

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

    /// The pivot to build
    #[clap(required = true)]
    #[clap(short = 'p')]
    #[clap(long = "pivot-type")]
    #[clap(value_name = "TYPE")]
    #[clap(help_heading = Some("Pivot parameters"))]
    pub pivot_type: PivotType,

    /// Comma-separated extra columns to list per group, or "false" for none
    #[clap(short = 'e')]
    #[clap(long = "extra-columns")]
    #[clap(value_name = "COLUMNS")]
    #[clap(default_value = NO_METADATA_SENTINEL)]
    #[clap(help_heading = Some("Pivot parameters"))]
    pub extra_columns: String,

    /// Metadata column counted per gene in the gene-simple pivot
    #[clap(long = "metadata-category")]
    #[clap(value_name = "COLUMN")]
    #[clap(default_value = DEFAULT_CATEGORY_COLUMN)]
    #[clap(help_heading = Some("Pivot parameters"))]
    pub metadata_category: String,

    /// Number of threads to use in the reduction step
    #[clap(long = "threads")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "1")]
    pub threads: usize,

    /// Rows per read chunk (debug only)
    #[clap(hide = true)]
    #[clap(long = "chunk-size")]
    #[clap(default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Enable verbose output.
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

impl PivotSettings {
    pub fn extra_columns(&self) -> Vec<String> {
        parse_extra_columns(&self.extra_columns)
    }

    pub fn output_filename(&self) -> PathBuf {
        self.output_folder.join(self.pivot_type.output_filename())
    }
}

pub fn check_pivot_settings(mut settings: PivotSettings) -> anyhow::Result<PivotSettings> {
    // hard code the version in
    settings.cohort_pivot_version = FULL_VERSION.clone();
    info!("cohort_pivot version: {:?}", &settings.cohort_pivot_version);
    info!("Sub-command: pivot");
    info!("Inputs:");

    check_required_filename(&settings.input_fn, "Combined table")?;
    info!("\tCombined table: {:?}", &settings.input_fn);
    check_optional_filename(settings.schema_fn.as_deref(), "Schema")?;
    info!("\tSchema: {:?}", &settings.schema_fn);

    info!("Outputs:");
    info!("\tPivot table: {:?}", settings.output_filename());
    if let Some(debug_folder) = settings.debug_folder.as_ref() {
        info!("\tDebug folder: {debug_folder:?}");
    }

    info!("Pivot parameters:");
    info!("\tPivot type: {}", settings.pivot_type);
    info!("\tExtra columns: {:?}", settings.extra_columns());
    if settings.pivot_type == PivotType::GeneSimple {
        info!("\tMetadata category: {:?}", &settings.metadata_category);
    }
    ensure!(settings.chunk_size > 0, "--chunk-size must be >0");

    // 0 is just a sentinel for a single thread
    if settings.threads == 0 {
        settings.threads = 1;
    }
    info!("Processing threads: {}", settings.threads);

    Ok(settings)
}
