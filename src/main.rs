
use log::{LevelFilter, error, info, warn};
use serde::Serialize;
use std::path::Path;
use std::time::Instant;

use cohort_pivot::cli::annotate::{AnnotateSettings, check_annotate_settings};
use cohort_pivot::cli::combine::{CombineSettings, check_combine_settings};
use cohort_pivot::cli::core::{Commands, get_cli, load_schema_config};
use cohort_pivot::cli::filter::{FilterSettings, check_filter_settings};
use cohort_pivot::cli::pivot::{PivotSettings, check_pivot_settings};
use cohort_pivot::cli::tier_summary::{TierSummarySettings, check_tier_summary_settings};
use cohort_pivot::data_types::schema::SchemaConfig;
use cohort_pivot::metadata_joiner::join_metadata;
use cohort_pivot::parsing::metadata::SampleMetadata;
use cohort_pivot::parsing::table_reader::DEFAULT_CHUNK_SIZE;
use cohort_pivot::pivots::{PivotConfigBuilder, build_pivot};
use cohort_pivot::schema_union::combine_tables;
use cohort_pivot::tier_filter::TierFilter;
use cohort_pivot::util::json_io::save_json;
use cohort_pivot::writers::tier_summary::TierSummaryWriter;

/// Sets up logging before we check the other settings
fn init_logging(verbosity: u8) {
    let filter_level: LevelFilter = match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace
    };
    env_logger::builder()
        .format_timestamp_millis()
        .filter_level(filter_level)
        .init();
}

/// Creates the output folder and the optional debug folder, saving the checked settings into the latter
fn create_output_folders<S: Serialize>(output_folder: &Path, debug_folder: Option<&Path>, settings: &S) {
    info!("Creating output folder at {output_folder:?}...");
    if let Err(e) = std::fs::create_dir_all(output_folder) {
        error!("Error while creating output folder: {e}");
        std::process::exit(exitcode::IOERR);
    }

    if let Some(debug_folder) = debug_folder {
        info!("Creating debug folder at {debug_folder:?}...");
        if let Err(e) = std::fs::create_dir_all(debug_folder) {
            error!("Error while creating debug folder: {e}");
            std::process::exit(exitcode::IOERR);
        }

        // save the CLI options
        let cli_json = debug_folder.join("cli_settings.json");
        info!("Saving CLI options to {cli_json:?}...");
        if let Err(e) = save_json(settings, &cli_json) {
            error!("Error while saving CLI options: {e}");
            std::process::exit(exitcode::IOERR);
        }
    }
}

fn load_schema_or_exit(schema_fn: Option<&Path>) -> SchemaConfig {
    match load_schema_config(schema_fn) {
        Ok(config) => config,
        Err(e) => {
            error!("Error while loading schema: {e:#}");
            std::process::exit(exitcode::CONFIG);
        }
    }
}

fn run_combine(settings: CombineSettings) {
    let start_time = Instant::now();
    init_logging(settings.verbosity);

    let settings = match check_combine_settings(settings) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while verifying settings: {e:#}");
            std::process::exit(exitcode::CONFIG);
        }
    };
    create_output_folders(&settings.output_folder, settings.debug_folder.as_deref(), &settings);

    let out_fn = settings.output_filename();
    info!("Combining {} tables into {out_fn:?}...", settings.input_tables.len());
    let summary = match combine_tables(&settings.input_tables, &out_fn) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while combining tables: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    };

    match summary.data_rows {
        Some(rows) => info!("Combined {} tables with {rows} data rows.", summary.num_tables),
        None => info!("Single table copied unchanged.")
    };
    info!("Combine completed in {} seconds.", start_time.elapsed().as_secs_f64());
}

fn run_annotate(settings: AnnotateSettings) {
    let start_time = Instant::now();
    init_logging(settings.verbosity);

    let settings = match check_annotate_settings(settings) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while verifying settings: {e:#}");
            std::process::exit(exitcode::CONFIG);
        }
    };
    let schema_config = load_schema_or_exit(settings.schema_fn.as_deref());

    let metadata = settings.metadata_fn().map(|metadata_fn| {
        info!("Loading metadata from {metadata_fn:?}...");
        match SampleMetadata::from_csv(metadata_fn, &settings.metadata_key) {
            Ok(m) => {
                info!("Loaded {} metadata columns for {} samples.", m.columns().len(), m.num_samples());
                m
            },
            Err(e) => {
                error!("Error while loading metadata: {e:#}");
                std::process::exit(exitcode::IOERR);
            }
        }
    });
    create_output_folders(&settings.output_folder, settings.debug_folder.as_deref(), &settings);

    let out_fn = settings.output_filename();
    info!("Writing annotated table to {out_fn:?}...");
    let summary = match join_metadata(&settings.combined_fn, metadata.as_ref(), &out_fn, &schema_config) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while joining metadata: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    };

    if !summary.passthrough {
        info!("Annotated rows: {}, matched to metadata: {}", summary.rows, summary.matched_rows);
    }
    info!("Annotate completed in {} seconds.", start_time.elapsed().as_secs_f64());
}

fn run_filter(settings: FilterSettings) {
    let start_time = Instant::now();
    init_logging(settings.verbosity);

    let settings = match check_filter_settings(settings) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while verifying settings: {e:#}");
            std::process::exit(exitcode::CONFIG);
        }
    };
    let level = match settings.level() {
        Ok(l) => l,
        Err(e) => {
            error!("Error while verifying settings: {e}");
            std::process::exit(exitcode::CONFIG);
        }
    };
    let schema_config = load_schema_or_exit(settings.schema_fn.as_deref());
    create_output_folders(&settings.output_folder, settings.debug_folder.as_deref(), &settings);

    let mut tier_filter = TierFilter::new(level, schema_config);
    let summary = match tier_filter.run(
        &settings.tier_tables, &settings.pass_tables,
        &settings.tier_output_filename(), &settings.pass_output_filename()
    ) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while filtering tables: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    };

    info!("Tier rows kept: {} / {}", summary.tier_rows_kept, summary.tier_rows);
    info!("Admitted variants: {}", summary.admitted_variants);
    if !settings.pass_tables.is_empty() {
        info!("Pass rows kept: {} / {}", summary.pass_rows_kept, summary.pass_rows);
    }
    if summary.malformed_pass_rows > 0 {
        warn!("Malformed pass rows dropped: {}", summary.malformed_pass_rows);
    }
    info!("Filter completed in {} seconds.", start_time.elapsed().as_secs_f64());
}

fn run_pivot(settings: PivotSettings) {
    let start_time = Instant::now();
    init_logging(settings.verbosity);

    let settings = match check_pivot_settings(settings) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while verifying settings: {e:#}");
            std::process::exit(exitcode::CONFIG);
        }
    };
    let schema_config = load_schema_or_exit(settings.schema_fn.as_deref());
    create_output_folders(&settings.output_folder, settings.debug_folder.as_deref(), &settings);

    // build our pivot configuration
    let pivot_config = match PivotConfigBuilder::default()
        .pivot_type(settings.pivot_type)
        .extra_columns(settings.extra_columns())
        .threads(settings.threads)
        .metadata_category(settings.metadata_category.clone())
        .chunk_size(settings.chunk_size)
        .build() {
        Ok(pc) => pc,
        Err(e) => {
            error!("Error while building pivot config: {e:?}");
            std::process::exit(exitcode::SOFTWARE);
        }
    };

    let out_fn = settings.output_filename();
    let summary = match build_pivot(&settings.input_fn, &out_fn, &pivot_config, &schema_config) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while building {} pivot: {e:#}", settings.pivot_type);
            if e.downcast_ref::<rayon::ThreadPoolBuildError>().is_some() {
                std::process::exit(exitcode::OSERR);
            }
            std::process::exit(exitcode::IOERR);
        }
    };

    info!("Input rows: {}, pivot groups: {}", summary.input_rows, summary.groups);
    if !summary.skipped_extra_columns.is_empty() {
        warn!("Skipped extra columns: {:?}", summary.skipped_extra_columns);
    }
    info!("Pivot completed in {} seconds.", start_time.elapsed().as_secs_f64());
}

fn run_tier_summary(settings: TierSummarySettings) {
    let start_time = Instant::now();
    init_logging(settings.verbosity);

    let settings = match check_tier_summary_settings(settings) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while verifying settings: {e:#}");
            std::process::exit(exitcode::CONFIG);
        }
    };
    let schema_config = load_schema_or_exit(settings.schema_fn.as_deref());
    create_output_folders(&settings.output_folder, settings.debug_folder.as_deref(), &settings);

    let mut summary_writer = TierSummaryWriter::default();
    for table_fn in settings.input_tables.iter() {
        info!("Counting tiers in {table_fn:?}...");
        if let Err(e) = summary_writer.add_table(table_fn, &schema_config, DEFAULT_CHUNK_SIZE) {
            error!("Error while reading tier table: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    }

    for (tier, count) in summary_writer.tier_counts() {
        info!("\t{}: {count}", tier.column_label());
    }
    if summary_writer.unknown_tier_rows() > 0 {
        warn!("Rows with an unrecognized tier: {}", summary_writer.unknown_tier_rows());
    }

    let summary_fn = settings.output_filename();
    info!("Saving tier summary to {summary_fn:?}...");
    if let Err(e) = summary_writer.write_summary(&summary_fn) {
        error!("Error while saving tier summary: {e:#}");
        std::process::exit(exitcode::IOERR);
    }
    info!("Tier summary completed in {} seconds.", start_time.elapsed().as_secs_f64());
}

fn main() {
    let cli = get_cli();
    match cli.command {
        Commands::Combine(settings) => {
            run_combine(*settings);
        },
        Commands::Annotate(settings) => {
            run_annotate(*settings);
        },
        Commands::Filter(settings) => {
            run_filter(*settings);
        },
        Commands::Pivot(settings) => {
            run_pivot(*settings);
        },
        Commands::TierSummary(settings) => {
            run_tier_summary(*settings);
        }
    }

    info!("Process finished successfully.");
}
