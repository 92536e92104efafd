use std::io::Write;

use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::{ChartsArgs, OutputFormat, SummaryArgs},
    data::format_number,
    summary::{self, GroupStats, SalesSummary, SummaryOptions},
    table,
};

pub fn execute_summary(args: &SummaryArgs) -> Result<()> {
    let config = crate::load_config(&args.source)?;
    let top = args.top.unwrap_or(config.summary_top);
    let customer_fallbacks = vec![
        config.strict_customer_fallback.clone(),
        config.lenient_customer_fallback.clone(),
    ];
    let dataset = crate::load_dataset(&args.source, config)?;
    let options = SummaryOptions {
        top,
        region: args
            .region
            .as_deref()
            .map(str::trim)
            .filter(|region| !region.is_empty())
            .map(str::to_string),
        customer_fallbacks,
    };
    let summary = summary::summarize(&dataset.records, &dataset.schema, &options);
    info!(
        "Summarized {} record(s) ranked by {:?}",
        summary.total_records, summary.metric
    );
    match args.format {
        OutputFormat::Table => {
            print!("{}", render_summary(&summary));
            Ok(())
        }
        other => crate::print_structured(&summary, other),
    }
}

pub fn execute_charts(args: &ChartsArgs) -> Result<()> {
    let config = crate::load_config(&args.source)?;
    let dataset = crate::load_dataset(&args.source, config)?;
    let charts = summary::chart_data(&dataset.records);
    let mut rendered = if args.pretty {
        serde_json::to_string_pretty(&charts)
    } else {
        serde_json::to_string(&charts)
    }
    .context("Serializing chart data")?;
    rendered.push('\n');
    std::io::stdout()
        .lock()
        .write_all(rendered.as_bytes())
        .context("Writing to stdout")?;
    info!(
        "Chart data: {} month(s), {} product(s), {} category slice(s)",
        charts.line.len(),
        charts.bar.len(),
        charts.pie.len()
    );
    Ok(())
}

fn render_summary(summary: &SalesSummary) -> String {
    let mut facts = vec![
        ("records", summary.total_records.to_string()),
        ("metric", format!("{:?}", summary.metric).to_lowercase()),
        ("total revenue", format_number(summary.total_revenue)),
        ("total quantity", format_number(summary.total_quantity)),
        ("average revenue", format_number(summary.average_revenue)),
        ("average quantity", format_number(summary.average_quantity)),
        ("regions", summary.regions.join(", ")),
        ("categories", summary.categories.join(", ")),
    ];
    if let Some(range) = &summary.date_range {
        facts.push(("date range", format!("{} to {}", range.first, range.last)));
    }
    if let Some(region) = &summary.region_filter {
        facts.push(("region filter", region.clone()));
    }
    let fact_rows = facts
        .into_iter()
        .map(|(key, value)| vec![key.to_string(), value])
        .collect::<Vec<_>>();

    let mut output = table::render_table(&["fact".to_string(), "value".to_string()], &fact_rows);
    output.push('\n');
    output.push_str(&render_stats("product", &summary.top_products));
    output.push('\n');
    output.push_str(&render_stats("region", &summary.region_performance));
    output.push('\n');
    output.push_str(&table::render_aggregate("month", "total", &summary.monthly_trend));
    output
}

fn render_stats(label: &str, stats: &[GroupStats]) -> String {
    let headers = [label, "revenue", "quantity", "rows"].map(String::from).to_vec();
    let rows = stats
        .iter()
        .map(|s| {
            vec![
                s.name.clone(),
                format_number(s.revenue),
                format_number(s.quantity),
                s.count.to_string(),
            ]
        })
        .collect::<Vec<_>>();
    table::render_table(&headers, &rows)
}
