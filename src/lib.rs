pub mod aggregate;
pub mod classify;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod io_utils;
pub mod normalize;
pub mod report;
pub mod rollup;
pub mod schema;
pub mod session;
pub mod summary;
pub mod table;

use std::{env, io::Write, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};
use serde::Serialize;

use crate::{
    classify::Role,
    cli::{Cli, Commands, InputArgs, OutputFormat},
    config::AnalysisConfig,
    session::{Dataset, Session},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sales_lens", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Probe(args) => handle_probe(&args),
        Commands::Normalize(args) => handle_normalize(&args),
        Commands::Aggregate(args) => rollup::execute_aggregate(&args),
        Commands::Series(args) => rollup::execute_series(&args),
        Commands::Summary(args) => report::execute_summary(&args),
        Commands::Charts(args) => report::execute_charts(&args),
    }
}

pub(crate) fn load_config(source: &InputArgs) -> Result<AnalysisConfig> {
    match &source.config {
        Some(path) => {
            AnalysisConfig::load(path).with_context(|| format!("Loading config from {path:?}"))
        }
        None => Ok(AnalysisConfig::default()),
    }
}

/// Reads the input file and runs inference and normalization over it.
pub(crate) fn load_dataset(source: &InputArgs, config: AnalysisConfig) -> Result<Dataset> {
    let encoding = io_utils::resolve_encoding(source.input_encoding.as_deref())?;
    if !io_utils::is_json_path(&source.input) {
        info!(
            "Reading '{}' with delimiter '{}'",
            source.input.display(),
            printable_delimiter(io_utils::resolve_input_delimiter(
                &source.input,
                source.delimiter
            ))
        );
    }
    let table = io_utils::read_table(&source.input, source.delimiter, encoding)
        .with_context(|| format!("Loading {:?}", source.input))?;
    let mut session = Session::new(config);
    session.ingest(&table, source.mode.into());
    session
        .into_dataset()
        .context("No dataset was installed for the input")
}

/// Writes `value` as JSON or YAML to stdout. Table output is handled by the
/// caller.
pub(crate) fn print_structured<T: Serialize>(value: &T, format: OutputFormat) -> Result<()> {
    let rendered = match format {
        OutputFormat::Yaml => serde_yaml::to_string(value).context("Serializing YAML")?,
        OutputFormat::Json | OutputFormat::Table => {
            let mut json = serde_json::to_string_pretty(value).context("Serializing JSON")?;
            json.push('\n');
            json
        }
    };
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(rendered.as_bytes())
        .context("Writing to stdout")?;
    Ok(())
}

fn handle_probe(args: &cli::ProbeArgs) -> Result<()> {
    let mut config = load_config(&args.source)?;
    if let Some(rows) = args.sample_rows {
        config.sample_rows = rows.max(1);
    }
    let dataset = load_dataset(&args.source, config)?;
    let report = &dataset.schema;
    info!(
        "Inferred roles for {} column(s) from {} sampled row(s)",
        report.per_column.len(),
        report.stats.sampled_rows
    );
    if args.format != OutputFormat::Table {
        return print_structured(report, args.format);
    }

    let headers = ["column", "role", "type", "samples"]
        .map(String::from)
        .to_vec();
    let rows = report
        .per_column
        .iter()
        .map(|column| {
            vec![
                column.column_name.clone(),
                column.inferred_role.to_string(),
                column.data_type.to_string(),
                column
                    .sample_values
                    .iter()
                    .map(|cell| cell.as_display())
                    .collect::<Vec<_>>()
                    .join(", "),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);

    println!();
    let mapping_rows = Role::CANONICAL
        .iter()
        .map(|role| {
            vec![
                role.to_string(),
                report.mapping.get(*role).unwrap_or("-").to_string(),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&["role".to_string(), "column".to_string()], &mapping_rows);
    Ok(())
}

fn handle_normalize(args: &cli::NormalizeArgs) -> Result<()> {
    let config = load_config(&args.source)?;
    let dataset = load_dataset(&args.source, config)?;
    let delimiter = args.output_delimiter.unwrap_or(io_utils::DEFAULT_CSV_DELIMITER);
    let headers = normalize::output_headers(dataset.schema.stats.columns.as_slice());
    debug!("Output columns: {:?}", headers);

    let mut writer = io_utils::open_csv_writer(args.output.as_deref(), delimiter)?;
    writer
        .write_record(&headers)
        .context("Writing output headers")?;
    for record in &dataset.records {
        writer
            .write_record(normalize::output_row(record, &dataset.schema.stats.columns))
            .with_context(|| format!("Writing row {}", record.row_index + 2))?;
    }
    writer.flush().context("Flushing output")?;
    info!(
        "Wrote {} normalized row(s) ({} rejected, {} empty)",
        dataset.report.valid_rows, dataset.report.rejected_rows, dataset.report.empty_rows
    );
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
