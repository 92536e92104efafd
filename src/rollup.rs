use anyhow::Result;
use log::info;

use crate::{
    aggregate::{self, Aggregate, Aggregation, FieldRef},
    cli::{AggregateArgs, OutputFormat, SeriesArgs},
    normalize::CanonicalRecord,
    table,
};

pub fn execute_aggregate(args: &AggregateArgs) -> Result<()> {
    let config = crate::load_config(&args.source)?;
    let dataset = crate::load_dataset(&args.source, config)?;
    let key = FieldRef::parse(args.by.trim());
    let value = FieldRef::parse(args.value.trim());
    let aggregation = Aggregation::from(args.op);

    let grouped = rollup(
        &dataset.records,
        &key,
        &value,
        aggregation,
        args.top,
        args.skip_zero,
    );
    info!(
        "Aggregated {} record(s) into {} group(s) by '{key}' ({aggregation} of '{value}')",
        dataset.records.len(),
        grouped.len()
    );
    emit(&grouped, &key.to_string(), &value_header(aggregation, &value), args.format)
}

pub fn execute_series(args: &SeriesArgs) -> Result<()> {
    let config = crate::load_config(&args.source)?;
    let dataset = crate::load_dataset(&args.source, config)?;
    let date = FieldRef::parse(args.date.trim());
    let value = FieldRef::parse(args.value.trim());

    let series = if args.chronological {
        aggregate::monthly_trend(&dataset.records, &date, &value)
    } else {
        aggregate::monthly_time_series(&dataset.records, &date, &value)
    };
    info!(
        "Bucketed {} record(s) into {} month(s)",
        dataset.records.len(),
        series.len()
    );
    emit(&series, "month", &value.to_string(), args.format)
}

/// Groups, optionally drops zero groups, then keeps the `top` largest.
/// Without `top` the first-seen group order is preserved.
pub fn rollup(
    records: &[CanonicalRecord],
    key: &FieldRef,
    value: &FieldRef,
    aggregation: Aggregation,
    top: Option<usize>,
    skip_zero: bool,
) -> Aggregate {
    let grouped = aggregate::group_by(records, key, value, aggregation);
    match (top, skip_zero) {
        (Some(n), true) => aggregate::zero_filtered_top_n(&grouped, n),
        (Some(n), false) => aggregate::top_n(&grouped, n),
        (None, true) => Aggregate::from_pairs(
            grouped
                .entries()
                .iter()
                .filter(|entry| entry.value != 0.0)
                .map(|entry| (entry.name.clone(), entry.value)),
        ),
        (None, false) => grouped,
    }
}

fn value_header(aggregation: Aggregation, value: &FieldRef) -> String {
    match aggregation {
        Aggregation::Count => "count".to_string(),
        other => format!("{other}({value})"),
    }
}

fn emit(
    aggregate: &Aggregate,
    key_header: &str,
    value_header: &str,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Table => {
            table::print_aggregate(key_header, value_header, aggregate);
            Ok(())
        }
        other => crate::print_structured(aggregate, other),
    }
}
