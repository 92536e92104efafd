use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::{aggregate::Aggregation, normalize::NormalizeMode};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Infer sales roles from arbitrary spreadsheets and aggregate them",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Infer the role and data type of every column
    Probe(ProbeArgs),
    /// Emit canonical records as CSV
    Normalize(NormalizeArgs),
    /// Group records by a field and aggregate a value
    Aggregate(AggregateArgs),
    /// Sum a value per calendar month
    Series(SeriesArgs),
    /// Produce the structured sales summary
    Summary(SummaryArgs),
    /// Produce the line, bar and pie chart datasets as JSON
    Charts(ChartsArgs),
}

/// Options shared by every command that loads a sales file.
#[derive(Debug, Args)]
pub struct InputArgs {
    /// Input CSV, TSV or JSON file (`-` reads CSV from stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Row acceptance policy used while normalizing
    #[arg(long, value_enum, default_value_t = ModeArg::Lenient)]
    pub mode: ModeArg,
    /// YAML file overriding inference thresholds and fallbacks
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ModeArg {
    Strict,
    Lenient,
}

impl From<ModeArg> for NormalizeMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Strict => NormalizeMode::Strict,
            ModeArg::Lenient => NormalizeMode::Lenient,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum OpArg {
    Sum,
    Average,
    Count,
}

impl From<OpArg> for Aggregation {
    fn from(value: OpArg) -> Self {
        match value {
            OpArg::Sum => Aggregation::Sum,
            OpArg::Average => Aggregation::Average,
            OpArg::Count => Aggregation::Count,
        }
    }
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub source: InputArgs,
    /// Number of rows to sample when inferring roles (overrides the config)
    #[arg(long)]
    pub sample_rows: Option<usize>,
    /// Output format for the inference report
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct NormalizeArgs {
    #[command(flatten)]
    pub source: InputArgs,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Delimiter to use for output (defaults to ',')
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
}

#[derive(Debug, Args)]
pub struct AggregateArgs {
    #[command(flatten)]
    pub source: InputArgs,
    /// Field to group by: a canonical name such as `region`, or an original column
    #[arg(long = "by")]
    pub by: String,
    /// Field to aggregate (defaults to `revenue`)
    #[arg(long, default_value = "revenue")]
    pub value: String,
    /// Aggregation applied per group
    #[arg(long, value_enum, default_value_t = OpArg::Sum)]
    pub op: OpArg,
    /// Keep only the N largest groups
    #[arg(long)]
    pub top: Option<usize>,
    /// Drop groups whose aggregated value is zero
    #[arg(long = "skip-zero")]
    pub skip_zero: bool,
    /// Output format for the grouped values
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct SeriesArgs {
    #[command(flatten)]
    pub source: InputArgs,
    /// Field summed per month (defaults to `revenue`)
    #[arg(long, default_value = "revenue")]
    pub value: String,
    /// Field holding the date (defaults to `date`)
    #[arg(long, default_value = "date")]
    pub date: String,
    /// Order months by calendar instead of first occurrence
    #[arg(long)]
    pub chronological: bool,
    /// Output format for the series
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct SummaryArgs {
    #[command(flatten)]
    pub source: InputArgs,
    /// Restrict product statistics to this region (case-insensitive)
    #[arg(long)]
    pub region: Option<String>,
    /// Number of products listed (overrides the config)
    #[arg(long)]
    pub top: Option<usize>,
    /// Output format for the summary
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct ChartsArgs {
    #[command(flatten)]
    pub source: InputArgs,
    /// Pretty-print the JSON document
    #[arg(long)]
    pub pretty: bool,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_named_delimiters() {
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert_eq!(parse_delimiter("semicolon"), Ok(b';'));
        assert_eq!(parse_delimiter("#"), Ok(b'#'));
        assert!(parse_delimiter("").is_err());
        assert!(parse_delimiter("ab").is_err());
    }

    #[test]
    fn aggregate_defaults_to_revenue_sum() {
        let cli = Cli::try_parse_from(["sales-lens", "aggregate", "-i", "s.csv", "--by", "region"])
            .expect("parse");
        match cli.command {
            Commands::Aggregate(args) => {
                assert_eq!(args.value, "revenue");
                assert_eq!(args.op, OpArg::Sum);
                assert_eq!(args.source.mode, ModeArg::Lenient);
                assert!(!args.skip_zero);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
